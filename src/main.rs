use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use vibeit::application::git::CommandGit;
use vibeit::application::host::{HostEffect, HostEvent, HostState};
use vibeit::application::notes::notes_path;
use vibeit::application::overview::{OverviewMux, OverviewOutcome, TmuxOverview, toggle_overview};
use vibeit::application::session_lifecycle::{
    ControllerError, InteractiveCommand, ProcessCommandRunner, SessionController,
};
use vibeit::application::tabs::{session_name, tab_name_for};
use vibeit::application::workspace_provisioning::{
    CreateWorkspaceRequest, DeleteWorkspaceRequest, ShellHookRunner, WorkspaceProvisioner,
    ensure_config,
};
use vibeit::application::workspace_registry::{
    Discovery, RegistryOptions, WorkspaceRegistry, initial_selection,
};
use vibeit::domain::{TabType, Workspace};
use vibeit::infrastructure::config::{self, VibeConfig};
use vibeit::infrastructure::event_log::{
    Event, EventLogger, FileEventLogger, NullEventLogger, now_millis,
};
use vibeit::infrastructure::process::binary_available;

const DEBUG_RECORD_DIR: &str = ".vibeit";

const USAGE: &str = "usage: vibeit [--event-log <path>] [--debug-record] <command>

commands:
  list                          workspaces with git status
  watch                         keep the list fresh on the poll interval
  open <workspace> [tab]        attach, or open a tab type (term, lazygit, claude, codex, nvim, notes)
  tab <workspace> <type>        add a tab of that type
  tabs <workspace>              tab names in the workspace session
  goto <workspace> <tab-name>   switch to an existing tab
  new <branch> [--base <ref>]   create a workspace on a new branch
  rm <workspace> [--delete-notes]
                                delete a workspace, its session and worktree branch
  kill <workspace>              kill the workspace session
  overview                      toggle the tiled overview (tmux only)
  config                        create .vibe/wt.json when missing
  notes <workspace>             edit the workspace notes
  version
  help

<workspace> is a list index, a directory name, or a branch.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum CliCommand {
    #[default]
    List,
    Watch,
    Open {
        workspace: String,
        tab: Option<TabType>,
    },
    Tab {
        workspace: String,
        tab: TabType,
    },
    Tabs {
        workspace: String,
    },
    GoTo {
        workspace: String,
        tab_name: String,
    },
    New {
        branch: String,
        base: Option<String>,
    },
    Remove {
        workspace: String,
        delete_notes: bool,
    },
    Kill {
        workspace: String,
    },
    Overview,
    Config,
    Notes {
        workspace: String,
    },
    Version,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct CliArgs {
    command: CliCommand,
    event_log_path: Option<PathBuf>,
    debug_record: bool,
}

fn invalid_input(message: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, message.into())
}

fn parse_tab_type(value: &str) -> std::io::Result<TabType> {
    TabType::from_marker(value).ok_or_else(|| invalid_input(format!("unknown tab type '{value}'")))
}

fn parse_cli_args(args: impl IntoIterator<Item = String>) -> std::io::Result<CliArgs> {
    let mut cli = CliArgs::default();
    let mut positional = Vec::new();
    let mut base = None;
    let mut delete_notes = false;
    let mut args = args.into_iter();

    while let Some(argument) = args.next() {
        match argument.as_str() {
            "--event-log" => {
                let Some(path) = args.next() else {
                    return Err(invalid_input("--event-log requires a file path"));
                };
                cli.event_log_path = Some(PathBuf::from(path));
            }
            "--debug-record" => {
                cli.debug_record = true;
            }
            "--base" => {
                let Some(reference) = args.next() else {
                    return Err(invalid_input("--base requires a branch"));
                };
                base = Some(reference);
            }
            "--delete-notes" => {
                delete_notes = true;
            }
            "-h" | "--help" => positional.insert(0, "help".to_string()),
            "-V" | "--version" => positional.insert(0, "version".to_string()),
            _ => positional.push(argument),
        }
    }

    let mut positional = positional.into_iter();
    let Some(name) = positional.next() else {
        return Ok(cli);
    };
    let mut required = |what: &str| {
        positional
            .next()
            .ok_or_else(|| invalid_input(format!("{name} requires <{what}>")))
    };

    cli.command = match name.as_str() {
        "list" | "ls" => CliCommand::List,
        "watch" => CliCommand::Watch,
        "open" => {
            let workspace = required("workspace")?;
            let tab = match required("tab") {
                Ok(tab) => Some(parse_tab_type(&tab)?),
                Err(_) => None,
            };
            CliCommand::Open { workspace, tab }
        }
        "tab" => CliCommand::Tab {
            workspace: required("workspace")?,
            tab: parse_tab_type(&required("type")?)?,
        },
        "tabs" => CliCommand::Tabs {
            workspace: required("workspace")?,
        },
        "goto" => CliCommand::GoTo {
            workspace: required("workspace")?,
            tab_name: required("tab-name")?,
        },
        "new" => CliCommand::New {
            branch: required("branch")?,
            base,
        },
        "rm" => CliCommand::Remove {
            workspace: required("workspace")?,
            delete_notes,
        },
        "kill" => CliCommand::Kill {
            workspace: required("workspace")?,
        },
        "overview" => CliCommand::Overview,
        "config" => CliCommand::Config,
        "notes" => CliCommand::Notes {
            workspace: required("workspace")?,
        },
        "version" => CliCommand::Version,
        "help" => CliCommand::Help,
        other => return Err(invalid_input(format!("unknown command '{other}'"))),
    };

    Ok(cli)
}

fn debug_record_path(app_start_ts: u64) -> std::io::Result<PathBuf> {
    let dir = PathBuf::from(DEBUG_RECORD_DIR);
    fs::create_dir_all(&dir)?;

    let mut sequence = 0u32;
    loop {
        let file_name = if sequence == 0 {
            format!("debug-record-{app_start_ts}-{}.jsonl", std::process::id())
        } else {
            format!(
                "debug-record-{app_start_ts}-{}-{sequence}.jsonl",
                std::process::id()
            )
        };
        let path = dir.join(file_name);
        if !path.exists() {
            return Ok(path);
        }
        sequence = sequence.saturating_add(1);
    }
}

fn resolve_event_log_path(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }

    let record_dir = Path::new(DEBUG_RECORD_DIR);
    if path.starts_with(record_dir) {
        return path;
    }

    record_dir.join(path)
}

fn ensure_event_log_parent_directory(path: &Path) -> std::io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent)
}

/// Looks a workspace up by list index, directory name, or branch.
fn find_workspace<'a>(workspaces: &'a [Workspace], selector: &str) -> Option<&'a Workspace> {
    if let Ok(index) = selector.parse::<usize>() {
        return workspaces.get(index);
    }
    workspaces
        .iter()
        .find(|workspace| workspace.name == selector)
        .or_else(|| workspaces.iter().find(|workspace| workspace.branch == selector))
}

fn format_workspace_line(index: usize, workspace: &Workspace, current: bool) -> String {
    let marker = if current { "*" } else { " " };
    let mut line = format!(
        "{marker} {index:>2}  {:<24} {:<24} {}",
        workspace.name,
        workspace.branch,
        workspace.status_label()
    );
    if workspace.ahead_count > 0 {
        line.push_str(&format!(" +{}", workspace.ahead_count));
    }
    if workspace.behind_count > 0 {
        line.push_str(&format!(" -{}", workspace.behind_count));
    }
    if workspace.stash_count > 0 {
        line.push_str(&format!(" stash:{}", workspace.stash_count));
    }
    if workspace.notes_exists {
        line.push_str(" notes");
    }
    line
}

fn format_workspace_table(workspaces: &[Workspace], selected: usize) -> Vec<String> {
    workspaces
        .iter()
        .enumerate()
        .map(|(index, workspace)| format_workspace_line(index, workspace, index == selected))
        .collect()
}

struct App {
    config: VibeConfig,
    cwd: PathBuf,
    logger: Box<dyn EventLogger>,
}

impl App {
    fn registry<'a>(&'a self, git: &'a CommandGit) -> WorkspaceRegistry<'a, CommandGit> {
        WorkspaceRegistry::new(
            git,
            RegistryOptions {
                backend: self.config.workspace_backend,
                notes_layout: self.config.notes_layout,
            },
            self.logger.as_ref(),
        )
    }

    fn discover(&self) -> Result<Discovery, String> {
        self.registry(&CommandGit)
            .load_workspaces(&self.cwd)
            .map_err(|error| error.message())
    }

    fn controller(&self) -> SessionController<'_, ProcessCommandRunner> {
        SessionController::new(
            self.config.multiplexer,
            ProcessCommandRunner,
            self.logger.as_ref(),
        )
    }

    fn session_for(&self, discovery: &Discovery, workspace: &Workspace) -> String {
        let branch = self
            .config
            .session_per_branch
            .then_some(workspace.branch.as_str());
        session_name(&discovery.project_name, &workspace.name, branch)
    }

    fn require_multiplexer(&self) -> Result<(), String> {
        let binary = self.config.multiplexer.binary();
        if binary_available(binary) {
            return Ok(());
        }
        Err(format!("{binary} is not installed or not on PATH"))
    }

    fn select<'a>(discovery: &'a Discovery, selector: &str) -> Result<&'a Workspace, String> {
        find_workspace(&discovery.workspaces, selector)
            .ok_or_else(|| format!("no workspace matches '{selector}'"))
    }

    fn run(&self, command: &CliCommand) -> Result<(), String> {
        match command {
            CliCommand::List => self.list(),
            CliCommand::Watch => self.watch(),
            CliCommand::Open { workspace, tab } => self.open(workspace, *tab),
            CliCommand::Tab { workspace, tab } => self.add_tab(workspace, *tab),
            CliCommand::Tabs { workspace } => self.tabs(workspace),
            CliCommand::GoTo {
                workspace,
                tab_name,
            } => self.go_to(workspace, tab_name),
            CliCommand::New { branch, base } => self.create(branch, base.clone()),
            CliCommand::Remove {
                workspace,
                delete_notes,
            } => self.remove(workspace, *delete_notes),
            CliCommand::Kill { workspace } => self.kill(workspace),
            CliCommand::Overview => self.overview(),
            CliCommand::Config => self.ensure_repo_config(),
            CliCommand::Notes { workspace } => self.notes(workspace),
            CliCommand::Version => {
                println!("vibeit {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            CliCommand::Help => {
                println!("{USAGE}");
                Ok(())
            }
        }
    }

    fn list(&self) -> Result<(), String> {
        let discovery = self.discover()?;
        println!(
            "{} ({}, {})",
            discovery.project_name,
            self.config.workspace_backend.label(),
            self.config.multiplexer.label()
        );
        let selected = initial_selection(&discovery.workspaces, &self.cwd);
        for line in format_workspace_table(&discovery.workspaces, selected) {
            println!("{line}");
        }
        if !discovery.config_exists {
            println!("no .vibe/wt.json; run `vibeit config` to create one");
        }
        Ok(())
    }

    fn watch(&self) -> Result<(), String> {
        let git = CommandGit;
        let registry = self.registry(&git);
        let mut state = HostState::new(self.cwd.clone(), self.config.git_poll_interval());
        let mut pending: VecDeque<HostEffect> = state.apply(HostEvent::Started).into();
        let mut next_tick = None;
        let mut last_render = Vec::new();

        loop {
            while let Some(effect) = pending.pop_front() {
                let event = match effect {
                    HostEffect::LoadWorkspaces => match registry.load_workspaces(&self.cwd) {
                        Ok(discovery) => HostEvent::WorkspacesLoaded(discovery),
                        Err(error) => HostEvent::LoadFailed(error.message()),
                    },
                    HostEffect::RefreshGitStatus {
                        generation,
                        project_path,
                        project_name,
                        workspaces,
                    } => HostEvent::GitStatusRefreshed {
                        generation,
                        workspaces: registry.refresh_git_status(
                            &workspaces,
                            &project_path,
                            &project_name,
                        ),
                    },
                    HostEffect::ScheduleTick(interval) => {
                        next_tick = Some(interval);
                        continue;
                    }
                };
                pending.extend(state.apply(event));
            }

            let mut render = format_workspace_table(state.workspaces(), state.selected_index());
            if let Some(status) = state.status() {
                render.push(status.text().to_string());
            }
            if render != last_render {
                println!();
                for line in &render {
                    println!("{line}");
                }
                last_render = render;
            }

            let Some(interval) = next_tick.take() else {
                return Ok(());
            };
            std::thread::sleep(interval);
            pending.extend(state.apply(HostEvent::Tick));
        }
    }

    fn open(&self, selector: &str, tab: Option<TabType>) -> Result<(), String> {
        let discovery = self.discover()?;
        let workspace = Self::select(&discovery, selector)?;
        if tab == Some(TabType::Notes) {
            return self.open_notes(&discovery, workspace);
        }
        self.require_multiplexer()?;
        let controller = self.controller();
        let session = self.session_for(&discovery, workspace);
        let command = match tab {
            Some(tab) => controller
                .open_with_command(&session, &workspace.path, tab)
                .map_err(|error| error.message())?,
            None => controller.attach_or_create(&session, &workspace.path),
        };
        command.run()
    }

    fn add_tab(&self, selector: &str, tab: TabType) -> Result<(), String> {
        let discovery = self.discover()?;
        let workspace = Self::select(&discovery, selector)?;
        if tab == TabType::Notes {
            return self.open_notes(&discovery, workspace);
        }
        self.require_multiplexer()?;
        let controller = self.controller();
        let session = self.session_for(&discovery, workspace);
        let existing = match controller.query_tab_names(&session) {
            Ok(tabs) => tabs,
            Err(ControllerError::SessionNotFound(_)) => Vec::new(),
            Err(error) => return Err(error.message()),
        };
        let prepared = if tab.is_single_instance() {
            controller.go_to_or_create_single_tab(&session, &workspace.path, tab)
        } else {
            let name = tab_name_for(&existing, tab);
            controller.new_tab(&session, &workspace.path, &name, tab)
        };
        prepared.map_err(|error| error.message())?.run()
    }

    fn tabs(&self, selector: &str) -> Result<(), String> {
        let discovery = self.discover()?;
        let workspace = Self::select(&discovery, selector)?;
        self.require_multiplexer()?;
        let session = self.session_for(&discovery, workspace);
        match self.controller().query_tab_names(&session) {
            Ok(tabs) => {
                for tab in tabs {
                    println!("{tab}");
                }
                Ok(())
            }
            Err(ControllerError::SessionNotFound(_)) => {
                println!("no session for {}", workspace.name);
                Ok(())
            }
            Err(error) => Err(error.message()),
        }
    }

    fn go_to(&self, selector: &str, tab_name: &str) -> Result<(), String> {
        let discovery = self.discover()?;
        let workspace = Self::select(&discovery, selector)?;
        self.require_multiplexer()?;
        let session = self.session_for(&discovery, workspace);
        self.controller()
            .go_to_tab(&session, &workspace.path, tab_name)
            .run()
    }

    fn create(&self, branch: &str, base: Option<String>) -> Result<(), String> {
        let discovery = self.discover()?;
        let git = CommandGit;
        let provisioner = WorkspaceProvisioner::new(
            &git,
            &ShellHookRunner,
            self.config.workspace_backend,
            self.logger.as_ref(),
        );
        let request = CreateWorkspaceRequest::new(branch, base);
        let result = provisioner
            .create_workspace(&discovery.project_path, &request)
            .map_err(|error| error.message())?;

        println!(
            "created {} on {}",
            result.workspace_path.display(),
            result.branch
        );
        for warning in &result.warnings {
            eprintln!("warning: {warning}");
        }
        Ok(())
    }

    fn remove(&self, selector: &str, delete_notes: bool) -> Result<(), String> {
        let discovery = self.discover()?;
        let workspace = Self::select(&discovery, selector)?;
        let git = CommandGit;
        let provisioner = WorkspaceProvisioner::new(
            &git,
            &ShellHookRunner,
            self.config.workspace_backend,
            self.logger.as_ref(),
        );
        let session = binary_available(self.config.multiplexer.binary())
            .then(|| self.session_for(&discovery, workspace));
        let request = DeleteWorkspaceRequest {
            repo_root: discovery.project_path.clone(),
            workspace_path: workspace.path.clone(),
            branch: workspace.branch.clone(),
            is_main: workspace.is_main(),
            session_name: session,
            delete_notes,
        };

        let (result, warnings) = provisioner.delete_workspace(&request, &self.controller());
        for warning in &warnings {
            eprintln!("warning: {warning}");
        }
        result.map_err(|error| error.message())?;
        println!("deleted {}", workspace.name);
        Ok(())
    }

    fn kill(&self, selector: &str) -> Result<(), String> {
        let discovery = self.discover()?;
        let workspace = Self::select(&discovery, selector)?;
        self.require_multiplexer()?;
        let session = self.session_for(&discovery, workspace);
        self.controller()
            .kill_session(&session)
            .map_err(|error| error.message())?;
        println!("killed {session}");
        Ok(())
    }

    fn overview(&self) -> Result<(), String> {
        if !self.config.multiplexer.supports_overview() {
            return Err(ControllerError::Unsupported("overview").message());
        }
        self.require_multiplexer()?;
        let mux = TmuxOverview::new(ProcessCommandRunner);
        let session = mux.current_session()?;
        let outcome = toggle_overview(&mux, &session).map_err(|error| error.message())?;
        let (kind, panes) = match outcome {
            OverviewOutcome::Shown { panes } => ("shown", panes),
            OverviewOutcome::NothingToShow => ("empty", 0),
            OverviewOutcome::Hidden { restored } => ("hidden", restored),
        };
        self.logger.log(
            Event::new("overview", kind)
                .with_text("session", &session)
                .with_data("panes", Value::from(panes)),
        );
        if outcome == OverviewOutcome::NothingToShow {
            println!("no single-pane tabs to show");
        }
        Ok(())
    }

    fn ensure_repo_config(&self) -> Result<(), String> {
        let discovery = self.discover()?;
        let (path, created) =
            ensure_config(&discovery.project_path).map_err(|error| error.to_string())?;
        let verb = if created { "created" } else { "exists" };
        println!("{verb}: {}", path.display());
        if let Some(app_config) = config::config_path() {
            println!("app config: {}", app_config.display());
        }
        Ok(())
    }

    fn notes(&self, selector: &str) -> Result<(), String> {
        let discovery = self.discover()?;
        let workspace = Self::select(&discovery, selector)?;
        self.open_notes(&discovery, workspace)
    }

    fn open_notes(&self, discovery: &Discovery, workspace: &Workspace) -> Result<(), String> {
        let path = notes_path(
            &discovery.project_path,
            &discovery.project_name,
            Some(workspace.branch.as_str()),
            self.config.notes_layout,
        );
        let command: InteractiveCommand = self
            .controller()
            .open_notes(&path, &workspace.path)
            .map_err(|error| error.message())?;
        command.run()
    }
}

fn main() -> std::io::Result<()> {
    let cli = match parse_cli_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(error) => {
            eprintln!("vibeit: {error}\n\n{USAGE}");
            std::process::exit(2);
        }
    };
    let app_start_ts = now_millis();
    let debug_record_path = if cli.debug_record {
        Some(debug_record_path(app_start_ts)?)
    } else {
        None
    };
    if let Some(path) = debug_record_path.as_ref() {
        eprintln!("vibeit debug record: {}", path.display());
    }
    let event_log_path = debug_record_path.or(cli.event_log_path.map(resolve_event_log_path));
    let logger: Box<dyn EventLogger> = match event_log_path.as_ref() {
        Some(path) => {
            ensure_event_log_parent_directory(path)?;
            Box::new(FileEventLogger::open(path)?)
        }
        None => Box::new(NullEventLogger),
    };

    let config = match config::load() {
        Ok(loaded) => loaded.config,
        Err(error) => {
            eprintln!("warning: {error}; using defaults");
            VibeConfig::default()
        }
    };
    logger.log(
        Event::new("app", "started")
            .with_data("ts", Value::from(app_start_ts))
            .with_text("multiplexer", config.multiplexer.label())
            .with_text("backend", config.workspace_backend.label()),
    );

    let app = App {
        config,
        cwd: std::env::current_dir()?,
        logger,
    };
    if let Err(error) = app.run(&cli.command) {
        app.logger
            .log(Event::new("app", "command_failed").with_text("error", &error));
        eprintln!("vibeit: {error}");
        std::process::exit(1);
    }
    Ok(())
}
