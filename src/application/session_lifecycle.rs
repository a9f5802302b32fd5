use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::application::notes::ensure_notes_file;
use crate::application::tabs::tab_instance_number;
use crate::domain::{MultiplexerKind, TabType};
use crate::infrastructure::event_log::{Event, EventLogger};
use crate::infrastructure::process::{capture_command, run_interactive};

const EDITOR_PROGRAM: &str = "nvim";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    SessionNotFound(String),
    CommandFailed(String),
    LayoutWrite(String),
    Unsupported(&'static str),
}

impl ControllerError {
    pub fn message(&self) -> String {
        match self {
            Self::SessionNotFound(session) => format!("session '{session}' not found"),
            Self::CommandFailed(message) => format!("multiplexer command failed: {message}"),
            Self::LayoutWrite(message) => format!("layout write failed: {message}"),
            Self::Unsupported(what) => format!("{what} is not supported by this multiplexer"),
        }
    }
}

impl fmt::Display for ControllerError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message())
    }
}

/// Non-interactive multiplexer queries and control commands.
pub trait CommandRunner {
    fn output(&self, command: &[String]) -> Result<String, String>;
}

pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn output(&self, command: &[String]) -> Result<String, String> {
        capture_command(command, None)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn output(&self, command: &[String]) -> Result<String, String> {
        (**self).output(command)
    }
}

/// A program that takes over the terminal until it exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl InteractiveCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.to_path_buf(),
        }
    }

    fn shell(script: String, cwd: &Path) -> Self {
        Self::new("sh", vec!["-c".to_string(), script], cwd)
    }

    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// The shell script, when this command is a composed `sh -c` invocation.
    pub fn script(&self) -> Option<&str> {
        if self.program != "sh" {
            return None;
        }
        match self.args.as_slice() {
            [flag, script] if flag == "-c" => Some(script.as_str()),
            _ => None,
        }
    }

    pub fn run(&self) -> Result<(), String> {
        run_interactive(&self.argv(), Some(&self.cwd))
    }
}

pub(crate) fn shell_quote(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    if value
        .chars()
        .all(|character| character.is_ascii_alphanumeric() || "@%_+=,./-".contains(character))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}

fn kdl_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Removes a workspace's session during workspace deletion.
pub trait SessionCleanup {
    fn delete_session(&self, session: &str) -> Result<(), ControllerError>;
}

impl<R: CommandRunner> SessionCleanup for SessionController<'_, R> {
    fn delete_session(&self, session: &str) -> Result<(), ControllerError> {
        SessionController::delete_session(self, session)
    }
}

pub struct SessionController<'a, R: CommandRunner> {
    kind: MultiplexerKind,
    runner: R,
    inside_tmux: bool,
    layout_dir: PathBuf,
    logger: &'a dyn EventLogger,
}

impl<'a, R: CommandRunner> SessionController<'a, R> {
    pub fn new(kind: MultiplexerKind, runner: R, logger: &'a dyn EventLogger) -> Self {
        Self {
            kind,
            runner,
            inside_tmux: std::env::var_os("TMUX").is_some_and(|value| !value.is_empty()),
            layout_dir: default_layout_dir(),
            logger,
        }
    }

    pub fn with_inside_tmux(mut self, inside_tmux: bool) -> Self {
        self.inside_tmux = inside_tmux;
        self
    }

    pub fn with_layout_dir(mut self, layout_dir: PathBuf) -> Self {
        self.layout_dir = layout_dir;
        self
    }

    pub const fn kind(&self) -> MultiplexerKind {
        self.kind
    }

    fn command(&self, args: &[&str]) -> Vec<String> {
        let mut command = vec![self.kind.binary().to_string()];
        command.extend(args.iter().map(|arg| (*arg).to_string()));
        command
    }

    pub fn session_exists(&self, session: &str) -> bool {
        match self.kind {
            MultiplexerKind::Tmux => {
                let target = format!("={session}");
                self.runner
                    .output(&self.command(&["has-session", "-t", &target]))
                    .is_ok()
            }
            MultiplexerKind::Zellij => self
                .list_sessions()
                .is_ok_and(|sessions| sessions.iter().any(|name| name == session)),
        }
    }

    pub fn list_sessions(&self) -> Result<Vec<String>, ControllerError> {
        let command = match self.kind {
            MultiplexerKind::Tmux => self.command(&["list-sessions", "-F", "#{session_name}"]),
            MultiplexerKind::Zellij => {
                self.command(&["list-sessions", "--short", "--no-formatting"])
            }
        };
        let output = self
            .runner
            .output(&command)
            .map_err(ControllerError::CommandFailed)?;
        Ok(output
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(ToOwned::to_owned)
            .collect())
    }

    /// Window or tab names in the multiplexer's own order.
    pub fn query_tab_names(&self, session: &str) -> Result<Vec<String>, ControllerError> {
        let command = match self.kind {
            MultiplexerKind::Tmux => {
                let target = format!("={session}");
                self.command(&["list-windows", "-t", &target, "-F", "#W"])
            }
            MultiplexerKind::Zellij => {
                self.command(&["--session", session, "action", "query-tab-names"])
            }
        };
        let output = self.runner.output(&command).map_err(|error| {
            if self.session_exists(session) {
                ControllerError::CommandFailed(error)
            } else {
                ControllerError::SessionNotFound(session.to_string())
            }
        })?;

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    pub fn kill_session(&self, session: &str) -> Result<(), ControllerError> {
        let command = match self.kind {
            MultiplexerKind::Tmux => {
                let target = format!("={session}");
                self.command(&["kill-session", "-t", &target])
            }
            MultiplexerKind::Zellij => self.command(&["kill-session", session]),
        };
        self.remove_session(session, &command, "killed")
    }

    /// Removes the session including any exited zellij remains.
    pub fn delete_session(&self, session: &str) -> Result<(), ControllerError> {
        let command = match self.kind {
            MultiplexerKind::Tmux => {
                let target = format!("={session}");
                self.command(&["kill-session", "-t", &target])
            }
            MultiplexerKind::Zellij => self.command(&["delete-session", "--force", session]),
        };
        self.remove_session(session, &command, "deleted")?;
        if self.kind == MultiplexerKind::Zellij {
            self.remove_layouts(session);
        }
        Ok(())
    }

    /// Drops the layout files written for `session`'s managed tabs.
    fn remove_layouts(&self, session: &str) {
        let Ok(entries) = fs::read_dir(&self.layout_dir) else {
            return;
        };
        let prefix = format!("{session}-");
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(tab_name) = file_name
                .to_str()
                .and_then(|name| name.strip_prefix(&prefix))
                .and_then(|rest| rest.strip_suffix(".kdl"))
            else {
                continue;
            };
            let managed = TabType::ALL
                .into_iter()
                .any(|tab_type| tab_instance_number(tab_name, tab_type.marker()).is_some());
            if managed {
                let _ = fs::remove_file(entry.path());
            }
        }
    }

    fn remove_session(
        &self,
        session: &str,
        command: &[String],
        kind: &str,
    ) -> Result<(), ControllerError> {
        match self.runner.output(command) {
            Ok(_) => {
                self.logger
                    .log(Event::new("session", kind).with_text("session", session));
                Ok(())
            }
            Err(_) if !self.session_exists(session) => Ok(()),
            Err(error) => {
                self.logger.log(
                    Event::new("session", "remove_failed")
                        .with_text("session", session)
                        .with_text("error", &error),
                );
                Err(ControllerError::CommandFailed(error))
            }
        }
    }

    pub fn attach_or_create(&self, session: &str, work_dir: &Path) -> InteractiveCommand {
        self.log_open("attach_or_create", session, None);
        match self.kind {
            MultiplexerKind::Tmux => {
                let script = format!(
                    "{} || tmux new-session -d -s {} -c {}; {}",
                    tmux_has_session(session),
                    shell_quote(session),
                    shell_quote(&work_dir.to_string_lossy()),
                    self.tmux_attach(session),
                );
                InteractiveCommand::shell(script, work_dir)
            }
            MultiplexerKind::Zellij => InteractiveCommand::new(
                "zellij",
                vec![
                    "attach".to_string(),
                    "--create".to_string(),
                    session.to_string(),
                ],
                work_dir,
            ),
        }
    }

    /// Ensures a tab of `tab_type` runs its launch command, creating the session around it when missing.
    pub fn open_with_command(
        &self,
        session: &str,
        work_dir: &Path,
        tab_type: TabType,
    ) -> Result<InteractiveCommand, ControllerError> {
        if tab_type.launch_command().is_none() {
            return Ok(self.attach_or_create(session, work_dir));
        }
        self.log_open("open_with_command", session, Some(tab_type.marker()));
        self.ensure_tab(session, work_dir, tab_type.marker(), tab_type)
    }

    pub fn go_to_or_create_single_tab(
        &self,
        session: &str,
        work_dir: &Path,
        tab_type: TabType,
    ) -> Result<InteractiveCommand, ControllerError> {
        self.log_open("go_to_or_create_single_tab", session, Some(tab_type.marker()));
        self.ensure_tab(session, work_dir, tab_type.marker(), tab_type)
    }

    pub fn new_tab(
        &self,
        session: &str,
        work_dir: &Path,
        tab_name: &str,
        tab_type: TabType,
    ) -> Result<InteractiveCommand, ControllerError> {
        self.log_open("new_tab", session, Some(tab_name));
        let dir = shell_quote(&work_dir.to_string_lossy());
        let name = shell_quote(tab_name);
        match self.kind {
            MultiplexerKind::Tmux => {
                let command = tmux_command_suffix(tab_type);
                let script = format!(
                    "if {has}; then tmux new-window -t {session} -n {name} -c {dir}{command}; \
                     else tmux new-session -d -s {session} -n {name} -c {dir}{command}; fi; \
                     tmux select-window -t {window} 2>/dev/null; {attach}",
                    has = tmux_has_session(session),
                    session = shell_quote(session),
                    window = tmux_window_target(session, tab_name),
                    attach = self.tmux_attach(session),
                );
                Ok(InteractiveCommand::shell(script, work_dir))
            }
            MultiplexerKind::Zellij => {
                let layout = self.write_layout(session, work_dir, tab_name, tab_type)?;
                let layout = shell_quote(&layout.to_string_lossy());
                let script = format!(
                    "if {has}; then zellij --session {session} action new-tab --layout {layout} --name {name}; \
                     zellij attach {session}; else zellij --session {session} --layout {layout}; fi",
                    has = zellij_has_session(session),
                    session = shell_quote(session),
                );
                Ok(InteractiveCommand::shell(script, work_dir))
            }
        }
    }

    /// Selects `tab_name` and attaches; a vanished session is recreated fresh.
    pub fn go_to_tab(&self, session: &str, work_dir: &Path, tab_name: &str) -> InteractiveCommand {
        self.log_open("go_to_tab", session, Some(tab_name));
        let dir = shell_quote(&work_dir.to_string_lossy());
        let name = shell_quote(tab_name);
        let quoted_session = shell_quote(session);
        let script = match self.kind {
            MultiplexerKind::Tmux => format!(
                "if {has}; then tmux select-window -t {window} 2>/dev/null; \
                 else tmux new-session -d -s {quoted_session} -n {name} -c {dir}; fi; {attach}",
                has = tmux_has_session(session),
                window = tmux_window_target(session, tab_name),
                attach = self.tmux_attach(session),
            ),
            MultiplexerKind::Zellij => format!(
                "if {has}; then zellij --session {quoted_session} action go-to-tab-name {name}; \
                 zellij attach {quoted_session}; else zellij attach --create {quoted_session}; fi",
                has = zellij_has_session(session),
            ),
        };
        InteractiveCommand::shell(script, work_dir)
    }

    /// Opens the notes file in the editor outside the multiplexer, creating it first.
    pub fn open_notes(
        &self,
        notes_path: &Path,
        work_dir: &Path,
    ) -> Result<InteractiveCommand, ControllerError> {
        ensure_notes_file(notes_path).map_err(|error| {
            ControllerError::CommandFailed(format!(
                "notes file '{}' unavailable: {error}",
                notes_path.display()
            ))
        })?;
        Ok(InteractiveCommand::new(
            EDITOR_PROGRAM,
            vec![notes_path.to_string_lossy().to_string()],
            work_dir,
        ))
    }

    fn ensure_tab(
        &self,
        session: &str,
        work_dir: &Path,
        tab_name: &str,
        tab_type: TabType,
    ) -> Result<InteractiveCommand, ControllerError> {
        let dir = shell_quote(&work_dir.to_string_lossy());
        let name = shell_quote(tab_name);
        let quoted_session = shell_quote(session);
        match self.kind {
            MultiplexerKind::Tmux => {
                let command = tmux_command_suffix(tab_type);
                let window = tmux_window_target(session, tab_name);
                let script = format!(
                    "if {has}; then tmux select-window -t {window} 2>/dev/null || \
                     tmux new-window -t {quoted_session} -n {name} -c {dir}{command}; \
                     else tmux new-session -d -s {quoted_session} -n {name} -c {dir}{command}; fi; \
                     tmux select-window -t {window} 2>/dev/null; {attach}",
                    has = tmux_has_session(session),
                    attach = self.tmux_attach(session),
                );
                Ok(InteractiveCommand::shell(script, work_dir))
            }
            MultiplexerKind::Zellij => {
                let layout = self.write_layout(session, work_dir, tab_name, tab_type)?;
                let layout = shell_quote(&layout.to_string_lossy());
                let script = format!(
                    "if {has}; then \
                     zellij --session {quoted_session} action query-tab-names 2>/dev/null | grep -Fqx -- {name} && \
                     zellij --session {quoted_session} action go-to-tab-name {name} || \
                     zellij --session {quoted_session} action new-tab --layout {layout} --name {name}; \
                     zellij attach {quoted_session}; \
                     else zellij --session {quoted_session} --layout {layout}; fi",
                    has = zellij_has_session(session),
                );
                Ok(InteractiveCommand::shell(script, work_dir))
            }
        }
    }

    fn tmux_attach(&self, session: &str) -> String {
        let target = shell_quote(&format!("={session}"));
        if self.inside_tmux {
            format!("tmux switch-client -t {target}")
        } else {
            format!("tmux attach-session -t {target}")
        }
    }

    fn write_layout(
        &self,
        session: &str,
        work_dir: &Path,
        tab_name: &str,
        tab_type: TabType,
    ) -> Result<PathBuf, ControllerError> {
        let path = self.layout_dir.join(format!("{session}-{tab_name}.kdl"));
        fs::create_dir_all(&self.layout_dir)
            .and_then(|()| write_fresh(&path, &zellij_layout(work_dir, tab_name, tab_type)))
            .map_err(|error| ControllerError::LayoutWrite(error.to_string()))?;
        Ok(path)
    }

    fn log_open(&self, operation: &str, session: &str, tab: Option<&str>) {
        let mut event = Event::new("session", operation)
            .with_text("session", session)
            .with_text("multiplexer", self.kind.label());
        if let Some(tab) = tab {
            event = event.with_text("tab", tab);
        }
        self.logger.log(event);
    }
}

/// Per-user directory for generated zellij layouts.
pub(crate) fn default_layout_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("vibeit")
        .join("layouts")
}

/// Replaces whatever sits at `path`, never writing through a link.
fn write_fresh(path: &Path, contents: &str) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return Err(error),
    }
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(contents.as_bytes())
}

fn tmux_has_session(session: &str) -> String {
    format!(
        "tmux has-session -t {} 2>/dev/null",
        shell_quote(&format!("={session}"))
    )
}

fn tmux_window_target(session: &str, tab_name: &str) -> String {
    shell_quote(&format!("={session}:={tab_name}"))
}

fn tmux_command_suffix(tab_type: TabType) -> String {
    tab_type
        .launch_command()
        .map(|command| format!(" {}", shell_quote(command)))
        .unwrap_or_default()
}

fn zellij_has_session(session: &str) -> String {
    format!(
        "zellij list-sessions --short --no-formatting 2>/dev/null | grep -Fqx -- {}",
        shell_quote(session)
    )
}

pub(crate) fn zellij_layout(work_dir: &Path, tab_name: &str, tab_type: TabType) -> String {
    let pane = match tab_type.launch_command() {
        Some(command) => format!("pane command={}", kdl_string(command)),
        None => "pane".to_string(),
    };
    format!(
        "layout {{\n    tab name={} cwd={} {{\n        {pane}\n    }}\n}}\n",
        kdl_string(tab_name),
        kdl_string(&work_dir.to_string_lossy()),
    )
}
