use std::path::Path;

use crate::application::git::GitCli;
use crate::domain::{RECENT_COMMIT_LIMIT, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    NoUpstream,
    Known { ahead: u32, behind: u32 },
}

impl Divergence {
    pub const fn ahead_behind(self) -> (u32, u32) {
        match self {
            Self::NoUpstream => (0, 0),
            Self::Known { ahead, behind } => (ahead, behind),
        }
    }
}

/// One status pass. `None` means the sub-query failed and the caller keeps what it had.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GitStatusSnapshot {
    pub branch: Option<String>,
    pub is_dirty: Option<bool>,
    pub divergence: Option<Divergence>,
    pub stash_count: Option<usize>,
    pub recent_commits: Option<Vec<String>>,
}

impl GitStatusSnapshot {
    pub fn apply_to(self, mut workspace: Workspace) -> Workspace {
        if let Some(branch) = self.branch {
            workspace.branch = branch;
        }
        if let Some(is_dirty) = self.is_dirty {
            workspace.is_dirty = is_dirty;
        }
        if let Some(divergence) = self.divergence {
            let (ahead, behind) = divergence.ahead_behind();
            workspace.ahead_count = ahead;
            workspace.behind_count = behind;
        }
        if let Some(stash_count) = self.stash_count {
            workspace.stash_count = stash_count;
        }
        if let Some(recent_commits) = self.recent_commits {
            workspace.recent_commits = recent_commits;
        }
        workspace
    }
}

pub fn read_status(git: &impl GitCli, path: &Path) -> GitStatusSnapshot {
    GitStatusSnapshot {
        branch: read_branch(git, path),
        is_dirty: read_dirty(git, path),
        divergence: read_divergence(git, path),
        stash_count: read_stash_count(git, path),
        recent_commits: read_recent_commits(git, path, RECENT_COMMIT_LIMIT),
    }
}

pub fn update_git_status(git: &impl GitCli, workspace: Workspace) -> Workspace {
    let snapshot = read_status(git, &workspace.path);
    snapshot.apply_to(workspace)
}

fn read_branch(git: &impl GitCli, path: &Path) -> Option<String> {
    let output = git
        .output(path, &["rev-parse", "--abbrev-ref", "HEAD"])
        .ok()?;
    let branch = output.trim();
    if branch.is_empty() || branch == "HEAD" {
        return None;
    }
    Some(branch.to_string())
}

fn read_dirty(git: &impl GitCli, path: &Path) -> Option<bool> {
    let output = git.output(path, &["status", "--porcelain"]).ok()?;
    Some(!output.trim().is_empty())
}

fn read_divergence(git: &impl GitCli, path: &Path) -> Option<Divergence> {
    let upstream = match git.output(
        path,
        &[
            "rev-parse",
            "--abbrev-ref",
            "--symbolic-full-name",
            "@{upstream}",
        ],
    ) {
        Ok(upstream) if !upstream.trim().is_empty() => upstream.trim().to_string(),
        _ => return Some(Divergence::NoUpstream),
    };

    let range = format!("{upstream}...HEAD");
    let counts = git
        .output(path, &["rev-list", "--left-right", "--count", &range])
        .ok()?;
    parse_left_right_counts(&counts)
}

/// `rev-list --left-right --count upstream...HEAD` prints `<behind>\t<ahead>`.
pub(crate) fn parse_left_right_counts(output: &str) -> Option<Divergence> {
    let mut fields = output.split_whitespace();
    let behind = fields.next()?.parse::<u32>().ok()?;
    let ahead = fields.next()?.parse::<u32>().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(Divergence::Known { ahead, behind })
}

fn read_stash_count(git: &impl GitCli, path: &Path) -> Option<usize> {
    let output = git.output(path, &["stash", "list"]).ok()?;
    Some(count_nonempty_lines(&output))
}

pub(crate) fn count_nonempty_lines(output: &str) -> usize {
    output.lines().filter(|line| !line.trim().is_empty()).count()
}

fn read_recent_commits(git: &impl GitCli, path: &Path, limit: usize) -> Option<Vec<String>> {
    let limit_arg = limit.to_string();
    let output = git
        .output(path, &["log", "-n", &limit_arg, "--pretty=format:%h %s"])
        .ok()?;
    Some(
        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(limit)
            .map(ToOwned::to_owned)
            .collect(),
    )
}
