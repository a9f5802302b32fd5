use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::application::git::GitCli;
use crate::application::git_status::update_git_status;
use crate::application::notes::{NotesLayout, notes_path, read_notes_preview};
use crate::application::workspace_provisioning::config_exists;
use crate::domain::{Workspace, WorkspaceBackend};
use crate::infrastructure::event_log::{Event, EventLogger};

pub const SLOT_SEPARATOR: &str = "-wt-";
pub const MIN_SLOT: u32 = 1;
pub const MAX_SLOT: u32 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    NotAGitRepository(String),
    ProjectNameUnavailable(PathBuf),
}

impl RegistryError {
    pub fn message(&self) -> String {
        match self {
            Self::NotAGitRepository(message) => format!("not a git repository: {message}"),
            Self::ProjectNameUnavailable(path) => {
                format!("could not derive project name from '{}'", path.display())
            }
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub project_name: String,
    pub project_path: PathBuf,
    pub workspaces: Vec<Workspace>,
    pub config_exists: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryOptions {
    pub backend: WorkspaceBackend,
    pub notes_layout: NotesLayout,
}

pub struct WorkspaceRegistry<'a, G: GitCli> {
    git: &'a G,
    options: RegistryOptions,
    logger: &'a dyn EventLogger,
}

impl<'a, G: GitCli> WorkspaceRegistry<'a, G> {
    pub fn new(git: &'a G, options: RegistryOptions, logger: &'a dyn EventLogger) -> Self {
        Self {
            git,
            options,
            logger,
        }
    }

    pub fn detect(&self, cwd: &Path) -> Result<Vec<Workspace>, RegistryError> {
        self.load_workspaces(cwd).map(|discovery| discovery.workspaces)
    }

    pub fn load_workspaces(&self, cwd: &Path) -> Result<Discovery, RegistryError> {
        let project_path = resolve_project_root(self.git, cwd)?;
        let project_name = directory_name(&project_path)
            .ok_or_else(|| RegistryError::ProjectNameUnavailable(project_path.clone()))?;

        let discovered = match self.options.backend {
            WorkspaceBackend::Clone => list_sibling_workspaces(&project_path, &project_name),
            WorkspaceBackend::Worktree => {
                match list_worktree_workspaces(self.git, &project_path) {
                    Ok(workspaces) => workspaces,
                    Err(error) => {
                        self.logger.log(
                            Event::new("registry", "worktree_list_failed")
                                .with_text("error", &error),
                        );
                        vec![Workspace::main(project_name.clone(), project_path.clone())]
                    }
                }
            }
        };

        let workspaces = self.with_status(&discovered, &project_path, &project_name);
        self.logger.log(
            Event::new("registry", "loaded")
                .with_path("project_path", &project_path)
                .with_text("backend", self.options.backend.label())
                .with_data("workspaces", Value::from(workspaces.len())),
        );

        Ok(Discovery {
            config_exists: config_exists(&project_path),
            project_name,
            project_path,
            workspaces,
        })
    }

    /// Re-reads status for a known list without rescanning the filesystem.
    pub fn refresh_git_status(
        &self,
        workspaces: &[Workspace],
        project_path: &Path,
        project_name: &str,
    ) -> Vec<Workspace> {
        let refreshed = self.with_status(workspaces, project_path, project_name);
        let dirty = refreshed.iter().filter(|workspace| workspace.is_dirty).count();
        self.logger.log(
            Event::new("registry", "status_refreshed")
                .with_data("workspaces", Value::from(refreshed.len()))
                .with_data("dirty", Value::from(dirty)),
        );
        refreshed
    }

    fn with_status(
        &self,
        workspaces: &[Workspace],
        project_path: &Path,
        project_name: &str,
    ) -> Vec<Workspace> {
        workspaces
            .iter()
            .cloned()
            .map(|workspace| {
                let updated = update_git_status(self.git, workspace);
                let path = notes_path(
                    project_path,
                    project_name,
                    Some(updated.branch.as_str()),
                    self.options.notes_layout,
                );
                read_notes_preview(&path).apply_to(updated)
            })
            .collect()
    }
}

pub(crate) fn directory_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
}

pub fn slot_directory_name(project_name: &str, slot: u32) -> String {
    format!("{project_name}{SLOT_SEPARATOR}{slot}")
}

/// Splits `<prefix>-wt-<digits>` into its parts; any digit run is accepted here.
pub fn split_slot_directory_name(name: &str) -> Option<(&str, u32)> {
    let (prefix, digits) = name.rsplit_once(SLOT_SEPARATOR)?;
    if prefix.is_empty() || digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit())
    {
        return None;
    }
    let slot = digits.parse::<u32>().ok()?;
    Some((prefix, slot))
}

/// The slot a sibling directory occupies, if its name is `<project>-wt-<1..=9>`.
pub fn slot_for_directory(name: &str, project_name: &str) -> Option<u32> {
    let (prefix, slot) = split_slot_directory_name(name)?;
    if prefix != project_name || !(MIN_SLOT..=MAX_SLOT).contains(&slot) {
        return None;
    }
    Some(slot)
}

pub fn resolve_project_root(git: &impl GitCli, cwd: &Path) -> Result<PathBuf, RegistryError> {
    let toplevel = git
        .output(cwd, &["rev-parse", "--show-toplevel"])
        .map_err(RegistryError::NotAGitRepository)?;
    let toplevel = toplevel.trim();
    if toplevel.is_empty() {
        return Err(RegistryError::NotAGitRepository(format!(
            "git returned no toplevel for '{}'",
            cwd.display()
        )));
    }
    let mut root = PathBuf::from(toplevel);

    if let Ok(common_dir) = git.output(
        cwd,
        &["rev-parse", "--path-format=absolute", "--git-common-dir"],
    ) && let Some(main_root) = main_root_from_common_dir(Path::new(common_dir.trim()))
    {
        root = main_root;
    }

    Ok(main_root_for_slot_directory(&root).unwrap_or(root))
}

pub(crate) fn main_root_from_common_dir(common_dir: &Path) -> Option<PathBuf> {
    if common_dir.file_name()? != ".git" {
        return None;
    }
    common_dir.parent().map(Path::to_path_buf)
}

fn main_root_for_slot_directory(root: &Path) -> Option<PathBuf> {
    let name = root.file_name()?.to_str()?;
    let (project_name, _) = split_slot_directory_name(name)?;
    let main_root = root.parent()?.join(project_name);
    if !main_root.join(".git").exists() {
        return None;
    }
    Some(main_root)
}

pub fn list_sibling_workspaces(main_root: &Path, project_name: &str) -> Vec<Workspace> {
    let mut workspaces = vec![Workspace::main(project_name, main_root.to_path_buf())];
    let Some(parent) = main_root.parent() else {
        return workspaces;
    };
    let Ok(entries) = fs::read_dir(parent) else {
        return workspaces;
    };

    let mut siblings: Vec<(u32, String, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let slot = slot_for_directory(&name, project_name)?;
            let path = entry.path();
            if !path.join(".git").exists() {
                return None;
            }
            Some((slot, name, path))
        })
        .collect();
    siblings.sort_by_key(|(slot, _, _)| *slot);

    workspaces.extend(
        siblings
            .into_iter()
            .map(|(_, name, path)| Workspace::derived(name, path)),
    );
    workspaces
}

pub fn list_worktree_workspaces(
    git: &impl GitCli,
    main_root: &Path,
) -> Result<Vec<Workspace>, String> {
    let porcelain = git.output(main_root, &["worktree", "list", "--porcelain"])?;
    let entries = parse_worktree_porcelain(&porcelain)?;

    let mut workspaces = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        if entry.is_bare {
            continue;
        }
        let is_main = index == 0 || entry.path.as_path() == main_root;
        if !is_main && !entry.path.join(".git").exists() {
            continue;
        }
        let name = directory_name(&entry.path).unwrap_or_else(|| entry.path.display().to_string());
        let workspace = if is_main {
            Workspace::main(name, entry.path)
        } else {
            Workspace::derived(name, entry.path)
        };
        workspaces.push(workspace.with_branch(entry.branch.unwrap_or_default()));
    }

    Ok(workspaces)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct ParsedWorktree {
    pub path: PathBuf,
    pub branch: Option<String>,
    pub is_bare: bool,
}

pub(crate) fn parse_worktree_porcelain(input: &str) -> Result<Vec<ParsedWorktree>, String> {
    let mut worktrees = Vec::new();
    let mut current: Option<ParsedWorktree> = None;

    for line in input.lines().map(str::trim_end) {
        if line.is_empty() {
            worktrees.extend(current.take());
            continue;
        }

        if let Some(path) = line.strip_prefix("worktree ") {
            worktrees.extend(current.take());
            current = Some(ParsedWorktree {
                path: PathBuf::from(path),
                ..ParsedWorktree::default()
            });
            continue;
        }

        let Some(entry) = current.as_mut() else {
            return Err("encountered metadata before any worktree line".to_string());
        };

        if let Some(branch_ref) = line.strip_prefix("branch ") {
            entry.branch = Some(
                branch_ref
                    .strip_prefix("refs/heads/")
                    .unwrap_or(branch_ref)
                    .to_string(),
            );
        } else if line == "detached" {
            entry.branch = None;
        } else if line == "bare" {
            entry.is_bare = true;
        }
    }

    worktrees.extend(current.take());
    Ok(worktrees)
}

/// Index of the workspace that contains `cwd`, falling back to the main workspace.
pub fn initial_selection(workspaces: &[Workspace], cwd: &Path) -> usize {
    workspaces
        .iter()
        .enumerate()
        .filter(|(_, workspace)| cwd.starts_with(&workspace.path))
        .max_by_key(|(_, workspace)| workspace.path.components().count())
        .map(|(index, _)| index)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests;
