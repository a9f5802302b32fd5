use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const RECENT_COMMIT_LIMIT: usize = 5;
pub const NOTES_PREVIEW_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstancePolicy {
    Single,
    Multi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabType {
    Terminal,
    GitUi,
    Claude,
    Codex,
    Editor,
    Notes,
}

impl TabType {
    pub const ALL: [Self; 6] = [
        Self::Terminal,
        Self::GitUi,
        Self::Claude,
        Self::Codex,
        Self::Editor,
        Self::Notes,
    ];

    /// Types offered when the user asks for a fresh tab.
    pub const NEW_TAB_CHOICES: [Self; 4] = [Self::Claude, Self::Codex, Self::Editor, Self::Terminal];

    pub const fn marker(self) -> &'static str {
        match self {
            Self::Terminal => "term",
            Self::GitUi => "lazygit",
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Editor => "nvim",
            Self::Notes => "notes",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Terminal => "Term",
            Self::GitUi => "Lazygit",
            Self::Claude => "Claude",
            Self::Codex => "Codex",
            Self::Editor => "Nvim",
            Self::Notes => "Notes",
        }
    }

    pub const fn launch_command(self) -> Option<&'static str> {
        match self {
            Self::Terminal | Self::Notes => None,
            Self::GitUi => Some("lazygit"),
            Self::Claude => Some("claude"),
            Self::Codex => Some("codex"),
            Self::Editor => Some("nvim"),
        }
    }

    pub const fn instance_policy(self) -> InstancePolicy {
        match self {
            Self::GitUi | Self::Notes => InstancePolicy::Single,
            Self::Terminal | Self::Claude | Self::Codex | Self::Editor => InstancePolicy::Multi,
        }
    }

    pub const fn is_single_instance(self) -> bool {
        matches!(self.instance_policy(), InstancePolicy::Single)
    }

    /// Notes open outside the multiplexer, so a `notes` window is never ours.
    pub const fn is_managed(self) -> bool {
        !matches!(self, Self::Notes)
    }

    pub fn from_marker(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tab_type| tab_type.marker() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceBackend {
    #[default]
    Clone,
    Worktree,
}

impl WorkspaceBackend {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Clone => "clone",
            Self::Worktree => "worktree",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MultiplexerKind {
    #[default]
    Tmux,
    Zellij,
}

impl MultiplexerKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Tmux => "tmux",
            Self::Zellij => "zellij",
        }
    }

    pub const fn binary(self) -> &'static str {
        self.label()
    }

    pub const fn supports_overview(self) -> bool {
        matches!(self, Self::Tmux)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Workspace {
    pub name: String,
    pub path: PathBuf,
    pub is_sub_workspace: bool,
    pub branch: String,
    pub is_dirty: bool,
    pub ahead_count: u32,
    pub behind_count: u32,
    pub stash_count: usize,
    pub recent_commits: Vec<String>,
    pub notes_exists: bool,
    pub notes_preview: Vec<String>,
}

impl Workspace {
    pub fn main(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
            is_sub_workspace: false,
            ..Self::default()
        }
    }

    pub fn derived(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
            is_sub_workspace: true,
            ..Self::default()
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub const fn is_main(&self) -> bool {
        !self.is_sub_workspace
    }

    pub const fn can_delete(&self) -> bool {
        self.is_sub_workspace
    }

    pub const fn status_label(&self) -> &'static str {
        if self.is_dirty { "dirty" } else { "clean" }
    }
}
