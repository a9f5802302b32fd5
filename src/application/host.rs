use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::application::workspace_registry::{Discovery, initial_selection};
use crate::domain::Workspace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Info(String),
    Success(String),
    Error(String),
}

impl StatusMessage {
    pub fn text(&self) -> &str {
        match self {
            Self::Info(text) | Self::Success(text) | Self::Error(text) => text,
        }
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Started,
    WorkspacesLoaded(Discovery),
    LoadFailed(String),
    GitStatusRefreshed {
        generation: u64,
        workspaces: Vec<Workspace>,
    },
    Tick,
    /// An external command, create or delete finished; `session` is released.
    MutationFinished {
        session: Option<String>,
        result: Result<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEffect {
    LoadWorkspaces,
    RefreshGitStatus {
        generation: u64,
        project_path: PathBuf,
        project_name: String,
        workspaces: Vec<Workspace>,
    },
    ScheduleTick(Duration),
}

/// What the hosting loop knows about the project between refreshes.
#[derive(Debug, Clone)]
pub struct HostState {
    cwd: PathBuf,
    poll_interval: Duration,
    generation: u64,
    project: Option<(String, PathBuf)>,
    workspaces: Vec<Workspace>,
    selected: usize,
    ticking: bool,
    busy_sessions: HashSet<String>,
    status: Option<StatusMessage>,
}

impl HostState {
    pub fn new(cwd: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            cwd: cwd.into(),
            poll_interval,
            generation: 0,
            project: None,
            workspaces: Vec::new(),
            selected: 0,
            ticking: false,
            busy_sessions: HashSet::new(),
            status: None,
        }
    }

    pub fn apply(&mut self, event: HostEvent) -> Vec<HostEffect> {
        match event {
            HostEvent::Started => vec![HostEffect::LoadWorkspaces],
            HostEvent::WorkspacesLoaded(discovery) => self.on_loaded(discovery),
            HostEvent::LoadFailed(error) => {
                self.status = Some(StatusMessage::Error(error));
                self.start_ticking()
            }
            HostEvent::GitStatusRefreshed {
                generation,
                workspaces,
            } => {
                self.on_status(generation, workspaces);
                Vec::new()
            }
            HostEvent::Tick => self.on_tick(),
            HostEvent::MutationFinished { session, result } => {
                if let Some(session) = session {
                    self.finish_mutation(&session);
                }
                self.status = Some(match result {
                    Ok(message) => StatusMessage::Success(message),
                    Err(error) => StatusMessage::Error(error),
                });
                vec![HostEffect::LoadWorkspaces]
            }
        }
    }

    fn on_loaded(&mut self, discovery: Discovery) -> Vec<HostEffect> {
        let first_load = self.project.is_none();
        let previous = self.selected_workspace().map(|workspace| workspace.path.clone());

        self.generation += 1;
        self.workspaces = discovery.workspaces;
        self.project = Some((discovery.project_name, discovery.project_path));
        self.selected = if first_load {
            initial_selection(&self.workspaces, &self.cwd)
        } else {
            previous
                .and_then(|path| self.index_of(&path))
                .unwrap_or_else(|| self.selected.min(self.workspaces.len().saturating_sub(1)))
        };

        let mut effects: Vec<HostEffect> = self.refresh_effect().into_iter().collect();
        effects.extend(self.start_ticking());
        effects
    }

    fn on_status(&mut self, generation: u64, refreshed: Vec<Workspace>) {
        if generation != self.generation {
            return;
        }
        for workspace in refreshed {
            if let Some(index) = self.index_of(&workspace.path) {
                self.workspaces[index] = workspace;
            }
        }
    }

    fn on_tick(&mut self) -> Vec<HostEffect> {
        let mut effects = Vec::new();
        match self.refresh_effect() {
            Some(refresh) => effects.push(refresh),
            None => effects.push(HostEffect::LoadWorkspaces),
        }
        effects.push(HostEffect::ScheduleTick(self.poll_interval));
        effects
    }

    fn start_ticking(&mut self) -> Vec<HostEffect> {
        if self.ticking {
            return Vec::new();
        }
        self.ticking = true;
        vec![HostEffect::ScheduleTick(self.poll_interval)]
    }

    fn refresh_effect(&self) -> Option<HostEffect> {
        let (project_name, project_path) = self.project.as_ref()?;
        Some(HostEffect::RefreshGitStatus {
            generation: self.generation,
            project_path: project_path.clone(),
            project_name: project_name.clone(),
            workspaces: self.workspaces.clone(),
        })
    }

    fn index_of(&self, path: &Path) -> Option<usize> {
        self.workspaces
            .iter()
            .position(|workspace| workspace.path == path)
    }

    /// Marks `session` busy; false when a mutation for it is already running.
    pub fn try_begin_mutation(&mut self, session: &str) -> bool {
        self.busy_sessions.insert(session.to_string())
    }

    pub fn finish_mutation(&mut self, session: &str) {
        self.busy_sessions.remove(session);
    }

    pub fn is_busy(&self, session: &str) -> bool {
        self.busy_sessions.contains(session)
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index.min(self.workspaces.len().saturating_sub(1));
    }

    pub fn selected_workspace(&self) -> Option<&Workspace> {
        self.workspaces.get(self.selected)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn workspaces(&self) -> &[Workspace] {
        &self.workspaces
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }
}
