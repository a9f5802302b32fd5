use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use walkdir::WalkDir;

use crate::application::git::GitCli;
use crate::application::notes::{branch_notes_path, delete_notes_file};
use crate::application::session_lifecycle::SessionCleanup;
use crate::application::workspace_registry::{
    MAX_SLOT, MIN_SLOT, directory_name, slot_directory_name, slot_for_directory,
};
use crate::domain::WorkspaceBackend;
use crate::infrastructure::event_log::{Event, EventLogger};

const CONFIG_DIRECTORY: &str = ".vibe";
const CONFIG_FILE: &str = "wt.json";
pub const DEFAULT_CONFIG: &str = r#"{
    "before": [],
    "copy": [
        ".env",
        "node_modules",
        "vendor"
    ],
    "after": []
}
"#;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub copy: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    EmptyBranchName,
    InvalidBranchName(String),
    ProjectNameUnavailable(PathBuf),
    SlotsExhausted,
    DirectoryExists(PathBuf),
    MainWorkspace,
    GitCommandFailed(String),
    Io(String),
}

impl ProvisioningError {
    pub fn message(&self) -> String {
        match self {
            Self::EmptyBranchName => "branch name is required".to_string(),
            Self::InvalidBranchName(branch) => {
                format!("branch name '{branch}' must not contain whitespace")
            }
            Self::ProjectNameUnavailable(path) => {
                format!("could not derive project name from '{}'", path.display())
            }
            Self::SlotsExhausted => {
                format!("maximum number of workspaces ({MAX_SLOT}) reached")
            }
            Self::DirectoryExists(path) => {
                format!("directory already exists: {}", path.display())
            }
            Self::MainWorkspace => "the main workspace cannot be deleted".to_string(),
            Self::GitCommandFailed(message) => format!("git command failed: {message}"),
            Self::Io(message) => format!("io error: {message}"),
        }
    }
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Before,
    After,
}

impl HookPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    ConfigRead(String),
    ConfigParse(String),
    CommandFailed {
        phase: HookPhase,
        command: String,
        message: String,
    },
}

impl HookError {
    pub fn message(&self) -> String {
        match self {
            Self::ConfigRead(message) => format!("failed to read wt.json: {message}"),
            Self::ConfigParse(message) => format!("failed to parse wt.json: {message}"),
            Self::CommandFailed {
                phase,
                command,
                message,
            } => format!("{} command failed '{command}': {message}", phase.label()),
        }
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message())
    }
}

pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_DIRECTORY).join(CONFIG_FILE)
}

pub fn config_exists(repo_root: &Path) -> bool {
    config_path(repo_root).exists()
}

/// Writes the default `.vibe/wt.json` when missing; returns the path and whether it was created.
pub fn ensure_config(repo_root: &Path) -> io::Result<(PathBuf, bool)> {
    let path = config_path(repo_root);
    match fs::metadata(&path) {
        Ok(_) => return Ok((path, false)),
        Err(error) if error.kind() != io::ErrorKind::NotFound => return Err(error),
        Err(_) => {}
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, DEFAULT_CONFIG)?;
    Ok((path, true))
}

/// `Ok(None)` when the repository has no provisioning config.
pub fn load_config(repo_root: &Path) -> Result<Option<ProvisioningConfig>, HookError> {
    let path = config_path(repo_root);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(HookError::ConfigRead(error.to_string())),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|error| HookError::ConfigParse(error.to_string()))
}

/// Runs one `before`/`after` hook command inside the new workspace.
pub trait HookCommandRunner {
    fn run(&self, workspace_path: &Path, command: &str) -> Result<(), String>;
}

/// `sh -c <command>` with stdout and stderr passed through to the terminal.
pub struct ShellHookRunner;

impl HookCommandRunner for ShellHookRunner {
    fn run(&self, workspace_path: &Path, command: &str) -> Result<(), String> {
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(workspace_path)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|error| error.to_string())?;

        if status.success() {
            return Ok(());
        }
        Err(format!("exited with status {status}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateWorkspaceRequest {
    pub branch: String,
    pub base_branch: Option<String>,
}

impl CreateWorkspaceRequest {
    pub fn new(branch: impl Into<String>, base_branch: Option<String>) -> Self {
        Self {
            branch: branch.into(),
            base_branch: base_branch
                .map(|base| base.trim().to_string())
                .filter(|base| !base.is_empty()),
        }
    }

    pub fn validate(&self) -> Result<(), ProvisioningError> {
        if self.branch.trim().is_empty() {
            return Err(ProvisioningError::EmptyBranchName);
        }
        if self.branch.chars().any(char::is_whitespace) {
            return Err(ProvisioningError::InvalidBranchName(self.branch.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateWorkspaceResult {
    pub workspace_path: PathBuf,
    pub branch: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteWorkspaceRequest {
    pub repo_root: PathBuf,
    pub workspace_path: PathBuf,
    pub branch: String,
    pub is_main: bool,
    pub session_name: Option<String>,
    pub delete_notes: bool,
}

pub struct WorkspaceProvisioner<'a, G: GitCli, H: HookCommandRunner> {
    git: &'a G,
    hooks: &'a H,
    backend: WorkspaceBackend,
    logger: &'a dyn EventLogger,
}

impl<'a, G: GitCli, H: HookCommandRunner> WorkspaceProvisioner<'a, G, H> {
    pub fn new(
        git: &'a G,
        hooks: &'a H,
        backend: WorkspaceBackend,
        logger: &'a dyn EventLogger,
    ) -> Self {
        Self {
            git,
            hooks,
            backend,
            logger,
        }
    }

    /// Creates the workspace, then runs the post-create hook.
    ///
    /// Hook problems do not undo the workspace; they come back as warnings.
    pub fn create_workspace(
        &self,
        repo_root: &Path,
        request: &CreateWorkspaceRequest,
    ) -> Result<CreateWorkspaceResult, ProvisioningError> {
        request.validate()?;
        let workspace_path = match self.backend {
            WorkspaceBackend::Clone => self.clone_workspace(repo_root, request)?,
            WorkspaceBackend::Worktree => self.add_worktree(repo_root, request)?,
        };
        self.logger.log(
            Event::new("provision", "created")
                .with_path("workspace", &workspace_path)
                .with_text("branch", &request.branch)
                .with_text("backend", self.backend.label()),
        );

        let (hook_result, mut warnings) = self.run_post_create_hook(repo_root, &workspace_path);
        if let Err(error) = hook_result {
            warnings.push(format!("post-create hook failed: {error}"));
        }

        Ok(CreateWorkspaceResult {
            workspace_path,
            branch: request.branch.clone(),
            warnings,
        })
    }

    fn clone_workspace(
        &self,
        repo_root: &Path,
        request: &CreateWorkspaceRequest,
    ) -> Result<PathBuf, ProvisioningError> {
        let (parent, project_name) = project_parts(repo_root)?;
        let slot = find_next_slot(parent, &project_name)?;
        let workspace_path = parent.join(slot_directory_name(&project_name, slot));
        self.logger.log(
            Event::new("provision", "slot_selected")
                .with_data("slot", Value::from(slot))
                .with_path("workspace", &workspace_path),
        );

        let origin_url = self
            .git
            .output(repo_root, &["remote", "get-url", "origin"])
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let repo_arg = repo_root.to_string_lossy();
        let workspace_arg = workspace_path.to_string_lossy();
        if let Err(error) = self
            .git
            .run(parent, &["clone", repo_arg.as_ref(), workspace_arg.as_ref()])
        {
            self.roll_back(&workspace_path, "clone");
            return Err(ProvisioningError::GitCommandFailed(error));
        }

        let remote_result = match origin_url.as_deref() {
            Some(url) => self
                .git
                .run(&workspace_path, &["remote", "set-url", "origin", url]),
            None => self
                .git
                .run(&workspace_path, &["remote", "remove", "origin"]),
        };
        if let Err(error) = remote_result {
            self.roll_back(&workspace_path, "remote");
            return Err(ProvisioningError::GitCommandFailed(error));
        }

        let mut checkout = vec!["checkout", "-b", request.branch.as_str()];
        checkout.extend(request.base_branch.as_deref());
        if let Err(error) = self.git.run(&workspace_path, &checkout) {
            self.roll_back(&workspace_path, "checkout");
            return Err(ProvisioningError::GitCommandFailed(error));
        }

        Ok(workspace_path)
    }

    fn add_worktree(
        &self,
        repo_root: &Path,
        request: &CreateWorkspaceRequest,
    ) -> Result<PathBuf, ProvisioningError> {
        let workspace_path = worktree_path(repo_root, &request.branch)?;
        if workspace_path.exists() {
            return Err(ProvisioningError::DirectoryExists(workspace_path));
        }

        let workspace_arg = workspace_path.to_string_lossy();
        let mut args = vec![
            "worktree",
            "add",
            "-b",
            request.branch.as_str(),
            workspace_arg.as_ref(),
        ];
        args.extend(request.base_branch.as_deref());
        self.git
            .run(repo_root, &args)
            .map_err(ProvisioningError::GitCommandFailed)?;
        Ok(workspace_path)
    }

    fn roll_back(&self, workspace_path: &Path, step: &str) {
        if !workspace_path.exists() {
            return;
        }
        let mut event = Event::new("provision", "rolled_back")
            .with_path("workspace", workspace_path)
            .with_text("step", step);
        if let Err(error) = fs::remove_dir_all(workspace_path) {
            event = event.with_text("cleanup_error", error.to_string());
        }
        self.logger.log(event);
    }

    /// Runs `before`, `copy`, then `after` from the main repository's config.
    ///
    /// A failed command stops the hook; a copy that fails only adds a warning.
    pub fn run_post_create_hook(
        &self,
        repo_root: &Path,
        workspace_path: &Path,
    ) -> (Result<(), HookError>, Vec<String>) {
        let mut warnings = Vec::new();
        let config = match load_config(repo_root) {
            Ok(Some(config)) => config,
            Ok(None) => return (Ok(()), warnings),
            Err(error) => return (Err(error), warnings),
        };
        self.logger.log(
            Event::new("provision", "hook_started")
                .with_path("workspace", workspace_path)
                .with_data("before", Value::from(config.before.len()))
                .with_data("copy", Value::from(config.copy.len()))
                .with_data("after", Value::from(config.after.len())),
        );

        if let Err(error) = self.run_hook_commands(HookPhase::Before, &config.before, workspace_path)
        {
            return (Err(error), warnings);
        }

        for item in &config.copy {
            if let Err(error) = copy_config_item(repo_root, workspace_path, item) {
                self.logger.log(
                    Event::new("provision", "copy_skipped")
                        .with_text("item", item)
                        .with_text("error", &error),
                );
                warnings.push(format!("failed to copy {item}: {error}"));
            }
        }

        if let Err(error) = self.run_hook_commands(HookPhase::After, &config.after, workspace_path)
        {
            return (Err(error), warnings);
        }

        self.logger.log(
            Event::new("provision", "hook_finished")
                .with_path("workspace", workspace_path)
                .with_data("warnings", Value::from(warnings.len())),
        );
        (Ok(()), warnings)
    }

    fn run_hook_commands(
        &self,
        phase: HookPhase,
        commands: &[String],
        workspace_path: &Path,
    ) -> Result<(), HookError> {
        for command in commands {
            if let Err(message) = self.hooks.run(workspace_path, command) {
                self.logger.log(
                    Event::new("provision", "hook_command_failed")
                        .with_text("phase", phase.label())
                        .with_text("command", command)
                        .with_text("error", &message),
                );
                return Err(HookError::CommandFailed {
                    phase,
                    command: command.clone(),
                    message,
                });
            }
        }
        Ok(())
    }

    /// Removes the workspace, then its worktree branch and optionally its notes.
    ///
    /// Only the removal itself is fatal. Session, branch and notes cleanup
    /// failures come back as warnings.
    pub fn delete_workspace(
        &self,
        request: &DeleteWorkspaceRequest,
        sessions: &impl SessionCleanup,
    ) -> (Result<(), ProvisioningError>, Vec<String>) {
        let mut warnings = Vec::new();
        if request.is_main || request.workspace_path == request.repo_root {
            return (Err(ProvisioningError::MainWorkspace), warnings);
        }

        if let Some(session) = request.session_name.as_deref()
            && let Err(error) = sessions.delete_session(session)
        {
            warnings.push(format!("session: {error}"));
        }

        if let Err(error) = self.remove_workspace_directory(request) {
            self.logger.log(
                Event::new("provision", "delete_failed")
                    .with_path("workspace", &request.workspace_path)
                    .with_text("error", error.message()),
            );
            return (Err(error), warnings);
        }

        // Clone branches live in the removed clone; never touch the main repository's.
        let branch = request.branch.trim();
        if self.backend == WorkspaceBackend::Worktree
            && !branch.is_empty()
            && let Err(error) = self.git.run(&request.repo_root, &["branch", "-D", branch])
            && !error.contains("not found")
        {
            warnings.push(format!("local branch: {error}"));
        }

        if request.delete_notes && !branch.is_empty() {
            match project_parts(&request.repo_root) {
                Ok((_, project_name)) => {
                    let path = branch_notes_path(&request.repo_root, &project_name, branch);
                    if let Err(error) = delete_notes_file(&path) {
                        warnings.push(error);
                    }
                }
                Err(error) => warnings.push(error.message()),
            }
        }

        self.logger.log(
            Event::new("provision", "deleted")
                .with_path("workspace", &request.workspace_path)
                .with_text("branch", branch)
                .with_data("warnings", Value::from(warnings.len())),
        );
        (Ok(()), warnings)
    }

    fn remove_workspace_directory(
        &self,
        request: &DeleteWorkspaceRequest,
    ) -> Result<(), ProvisioningError> {
        match self.backend {
            WorkspaceBackend::Worktree => {
                let workspace_arg = request.workspace_path.to_string_lossy();
                self.git
                    .run(
                        &request.repo_root,
                        &["worktree", "remove", workspace_arg.as_ref(), "--force"],
                    )
                    .map_err(ProvisioningError::GitCommandFailed)
            }
            WorkspaceBackend::Clone => match fs::remove_dir_all(&request.workspace_path) {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(error) => Err(ProvisioningError::Io(error.to_string())),
            },
        }
    }
}

fn project_parts(repo_root: &Path) -> Result<(&Path, String), ProvisioningError> {
    let project_name = directory_name(repo_root)
        .ok_or_else(|| ProvisioningError::ProjectNameUnavailable(repo_root.to_path_buf()))?;
    let parent = repo_root
        .parent()
        .ok_or_else(|| ProvisioningError::ProjectNameUnavailable(repo_root.to_path_buf()))?;
    Ok((parent, project_name))
}

/// Lowest free `<project>-wt-<N>` slot in `parent`; any existing entry occupies its slot.
pub fn find_next_slot(parent: &Path, project_name: &str) -> Result<u32, ProvisioningError> {
    let entries = fs::read_dir(parent)
        .map_err(|error| ProvisioningError::Io(format!("failed to read directory: {error}")))?;
    let used: HashSet<u32> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name();
            slot_for_directory(name.to_str()?, project_name)
        })
        .collect();

    (MIN_SLOT..=MAX_SLOT)
        .find(|slot| !used.contains(slot))
        .ok_or(ProvisioningError::SlotsExhausted)
}

pub fn worktree_path(repo_root: &Path, branch: &str) -> Result<PathBuf, ProvisioningError> {
    let (parent, project_name) = project_parts(repo_root)?;
    Ok(parent.join(format!("{project_name}-{}", branch.replace('/', "-"))))
}

fn copy_config_item(repo_root: &Path, workspace_path: &Path, item: &str) -> Result<(), String> {
    let relative = Path::new(item);
    let escapes = relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if item.trim().is_empty() || escapes {
        return Err("copy entries must be paths inside the repository".to_string());
    }

    copy_path(&repo_root.join(relative), &workspace_path.join(relative))
        .map(|_| ())
        .map_err(|error| error.to_string())
}

/// Copies a file, symlink or directory tree, keeping permission bits and
/// recreating symlinks rather than following them. Returns the number of
/// non-directory entries copied.
pub fn copy_path(source: &Path, destination: &Path) -> io::Result<usize> {
    let metadata = fs::symlink_metadata(source)?;
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    if !metadata.is_dir() {
        copy_entry(source, destination, metadata.file_type().is_symlink())?;
        return Ok(1);
    }

    let mut copied = 0;
    let mut directories = Vec::new();
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            directories.push((target, entry.metadata()?.permissions()));
        } else {
            copy_entry(entry.path(), &target, entry.path_is_symlink())?;
            copied += 1;
        }
    }

    // Read-only directories would block their own children, so modes go on last.
    for (directory, permissions) in directories.into_iter().rev() {
        fs::set_permissions(&directory, permissions)?;
    }
    Ok(copied)
}

fn copy_entry(source: &Path, destination: &Path, is_symlink: bool) -> io::Result<()> {
    if is_symlink {
        return copy_symlink(source, destination);
    }
    fs::copy(source, destination).map(|_| ())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    let link_target = fs::read_link(source)?;
    match fs::remove_file(destination) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return Err(error),
    }
    std::os::unix::fs::symlink(link_target, destination)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    fs::copy(source, destination).map(|_| ())
}
