use crate::application::session_lifecycle::{CommandRunner, ControllerError};
use crate::application::tabs::is_managed_tab_name;

pub const OVERVIEW_WINDOW_NAME: &str = "__vibeit_overview";
pub const PLACEHOLDER_COMMAND: &str = "sleep 1000000";

pub const ACTIVE_OPTION: &str = "@vibeit_overview_active";
pub const WINDOW_OPTION: &str = "@vibeit_overview_window";
pub const LAST_WINDOW_OPTION: &str = "@vibeit_overview_last_window";
pub const PLACEHOLDER_OPTION: &str = "@vibeit_overview_placeholder";
pub const ORIGIN_WINDOW_OPTION: &str = "@vibeit_overview_orig_window";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionScope {
    Session,
    Pane,
}

/// Key-value options kept on the multiplexer itself, so they outlive this process.
pub trait OptionStore {
    fn get(&self, scope: OptionScope, target: &str, key: &str) -> Option<String>;
    fn set(&self, scope: OptionScope, target: &str, key: &str, value: &str) -> Result<(), String>;
    fn unset(&self, scope: OptionScope, target: &str, key: &str) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: String,
    pub name: String,
    pub panes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewWindow {
    pub window: String,
    pub seed_pane: String,
}

/// Window and pane primitives the overview toggle needs.
pub trait OverviewMux: OptionStore {
    fn current_session(&self) -> Result<String, String>;
    fn current_window(&self) -> Result<String, String>;
    fn create_overview_window(&self, session: &str) -> Result<OverviewWindow, String>;
    fn list_windows(&self, session: &str) -> Result<Vec<WindowInfo>, String>;
    fn list_panes(&self, window: &str) -> Result<Vec<String>, String>;
    fn split_placeholder(&self, window: &str) -> Result<String, String>;
    fn swap_pane(&self, source: &str, target: &str) -> Result<(), String>;
    fn move_pane(&self, source: &str, target_window: &str) -> Result<(), String>;
    fn pane_exists(&self, pane: &str) -> bool;
    fn window_exists(&self, window: &str) -> bool;
    fn tile(&self, window: &str) -> Result<(), String>;
    fn select_window(&self, window: &str) -> Result<(), String>;
    fn kill_window(&self, window: &str) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewOutcome {
    Shown { panes: usize },
    NothingToShow,
    Hidden { restored: usize },
}

pub fn toggle_overview(
    mux: &impl OverviewMux,
    session: &str,
) -> Result<OverviewOutcome, ControllerError> {
    if mux.get(OptionScope::Session, session, ACTIVE_OPTION).as_deref() == Some("1") {
        return Ok(hide_overview(mux, session));
    }
    show_overview(mux, session)
}

pub fn show_overview(
    mux: &impl OverviewMux,
    session: &str,
) -> Result<OverviewOutcome, ControllerError> {
    let last_window = mux
        .current_window()
        .ok()
        .filter(|window| !window.is_empty())
        .ok_or_else(|| ControllerError::CommandFailed("tmux window not found".to_string()))?;
    let overview = mux
        .create_overview_window(session)
        .map_err(ControllerError::CommandFailed)?;

    let windows = match mux.list_windows(session) {
        Ok(windows) => windows,
        Err(error) => {
            let _ = mux.kill_window(&overview.window);
            return Err(ControllerError::CommandFailed(error));
        }
    };

    let mut moved = 0;
    let mut placeholder = overview.seed_pane.clone();
    for window in windows {
        if window.id == overview.window || window.panes != 1 || !is_managed_tab_name(&window.name)
        {
            continue;
        }
        let Some(pane) = mux
            .list_panes(&window.id)
            .ok()
            .and_then(|panes| panes.into_iter().next())
        else {
            continue;
        };

        if moved > 0 {
            match mux.split_placeholder(&overview.window) {
                Ok(split) if !split.is_empty() => placeholder = split,
                _ => continue,
            }
        }

        let _ = mux.set(OptionScope::Pane, &pane, PLACEHOLDER_OPTION, &placeholder);
        let _ = mux.set(OptionScope::Pane, &pane, ORIGIN_WINDOW_OPTION, &window.id);
        let _ = mux.swap_pane(&pane, &placeholder);
        moved += 1;
    }

    if moved == 0 {
        let _ = mux.kill_window(&overview.window);
        return Ok(OverviewOutcome::NothingToShow);
    }

    let _ = mux.tile(&overview.window);
    let _ = mux.select_window(&overview.window);
    let _ = mux.set(OptionScope::Session, session, ACTIVE_OPTION, "1");
    let _ = mux.set(OptionScope::Session, session, WINDOW_OPTION, &overview.window);
    let _ = mux.set(OptionScope::Session, session, LAST_WINDOW_OPTION, &last_window);
    Ok(OverviewOutcome::Shown { panes: moved })
}

/// Puts every gathered pane back and clears all bookkeeping; safe when the
/// overview window has already disappeared.
pub fn hide_overview(mux: &impl OverviewMux, session: &str) -> OverviewOutcome {
    let overview_window = mux.get(OptionScope::Session, session, WINDOW_OPTION);
    let last_window = mux.get(OptionScope::Session, session, LAST_WINDOW_OPTION);
    let mut restored = 0;

    if let Some(overview_window) = overview_window.as_deref() {
        for pane in mux.list_panes(overview_window).unwrap_or_default() {
            let placeholder = mux.get(OptionScope::Pane, &pane, PLACEHOLDER_OPTION);
            let origin = mux.get(OptionScope::Pane, &pane, ORIGIN_WINDOW_OPTION);

            let moved = if let Some(placeholder) =
                placeholder.filter(|candidate| mux.pane_exists(candidate))
            {
                mux.swap_pane(&pane, &placeholder).is_ok()
            } else if let Some(origin) = origin.filter(|window| mux.window_exists(window)) {
                mux.move_pane(&pane, &origin).is_ok()
            } else if let Some(last_window) = last_window.as_deref() {
                mux.move_pane(&pane, last_window).is_ok()
            } else {
                false
            };
            if moved {
                restored += 1;
            }

            let _ = mux.unset(OptionScope::Pane, &pane, PLACEHOLDER_OPTION);
            let _ = mux.unset(OptionScope::Pane, &pane, ORIGIN_WINDOW_OPTION);
        }
        let _ = mux.kill_window(overview_window);
    }

    if let Some(last_window) = last_window.as_deref() {
        let _ = mux.select_window(last_window);
    }

    for key in [ACTIVE_OPTION, WINDOW_OPTION, LAST_WINDOW_OPTION] {
        let _ = mux.unset(OptionScope::Session, session, key);
    }
    OverviewOutcome::Hidden { restored }
}

/// `OverviewMux` over the tmux command line.
pub struct TmuxOverview<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> TmuxOverview<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn output(&self, args: &[&str]) -> Result<String, String> {
        let mut command = vec!["tmux".to_string()];
        command.extend(args.iter().map(|arg| (*arg).to_string()));
        self.runner
            .output(&command)
            .map(|output| output.trim().to_string())
    }

    fn run(&self, args: &[&str]) -> Result<(), String> {
        self.output(args).map(|_| ())
    }

    fn nonempty_output(&self, args: &[&str], what: &str) -> Result<String, String> {
        let output = self.output(args)?;
        if output.is_empty() {
            return Err(format!("tmux returned no {what}"));
        }
        Ok(output)
    }
}

fn scope_flag(scope: OptionScope) -> Option<&'static str> {
    match scope {
        OptionScope::Session => None,
        OptionScope::Pane => Some("-p"),
    }
}

fn option_args<'a>(
    scope: OptionScope,
    command: &'a str,
    extra: &'a [&'a str],
    target: &'a str,
) -> Vec<&'a str> {
    let mut args = vec![command];
    args.extend(scope_flag(scope));
    args.extend_from_slice(extra);
    args.extend(["-t", target]);
    args
}

impl<R: CommandRunner> OptionStore for TmuxOverview<R> {
    fn get(&self, scope: OptionScope, target: &str, key: &str) -> Option<String> {
        let mut args = option_args(scope, "show-options", &["-v"], target);
        args.push(key);
        self.output(&args).ok().filter(|value| !value.is_empty())
    }

    fn set(&self, scope: OptionScope, target: &str, key: &str, value: &str) -> Result<(), String> {
        let mut args = option_args(scope, "set-option", &[], target);
        args.extend([key, value]);
        self.run(&args)
    }

    fn unset(&self, scope: OptionScope, target: &str, key: &str) -> Result<(), String> {
        let mut args = option_args(scope, "set-option", &["-u"], target);
        args.push(key);
        self.run(&args)
    }
}

impl<R: CommandRunner> OverviewMux for TmuxOverview<R> {
    fn current_session(&self) -> Result<String, String> {
        self.nonempty_output(&["display-message", "-p", "#S"], "session")
    }

    fn current_window(&self) -> Result<String, String> {
        self.nonempty_output(&["display-message", "-p", "#{window_id}"], "window")
    }

    fn create_overview_window(&self, session: &str) -> Result<OverviewWindow, String> {
        let target = format!("={session}:");
        let info = self.nonempty_output(
            &[
                "new-window",
                "-P",
                "-F",
                "#{window_id}:#{pane_id}",
                "-n",
                OVERVIEW_WINDOW_NAME,
                "-t",
                &target,
                "-d",
                PLACEHOLDER_COMMAND,
            ],
            "overview window",
        )?;
        let (window, seed_pane) = info
            .split_once(':')
            .ok_or_else(|| format!("unexpected overview window info '{info}'"))?;
        Ok(OverviewWindow {
            window: window.to_string(),
            seed_pane: seed_pane.to_string(),
        })
    }

    fn list_windows(&self, session: &str) -> Result<Vec<WindowInfo>, String> {
        let target = format!("={session}");
        let output = self.output(&[
            "list-windows",
            "-t",
            &target,
            "-F",
            "#{window_id}\t#{window_name}\t#{window_panes}",
        ])?;
        Ok(parse_window_list(&output))
    }

    fn list_panes(&self, window: &str) -> Result<Vec<String>, String> {
        let output = self.output(&["list-panes", "-t", window, "-F", "#{pane_id}"])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    fn split_placeholder(&self, window: &str) -> Result<String, String> {
        self.nonempty_output(
            &[
                "split-window",
                "-t",
                window,
                "-d",
                "-P",
                "-F",
                "#{pane_id}",
                PLACEHOLDER_COMMAND,
            ],
            "placeholder pane",
        )
    }

    fn swap_pane(&self, source: &str, target: &str) -> Result<(), String> {
        self.run(&["swap-pane", "-s", source, "-t", target])
    }

    fn move_pane(&self, source: &str, target_window: &str) -> Result<(), String> {
        self.run(&["move-pane", "-s", source, "-t", target_window])
    }

    fn pane_exists(&self, pane: &str) -> bool {
        self.run(&["display-message", "-p", "-t", pane, "#{pane_id}"])
            .is_ok()
    }

    fn window_exists(&self, window: &str) -> bool {
        self.run(&["display-message", "-p", "-t", window, "#{window_id}"])
            .is_ok()
    }

    fn tile(&self, window: &str) -> Result<(), String> {
        self.run(&["select-layout", "-t", window, "tiled"])
    }

    fn select_window(&self, window: &str) -> Result<(), String> {
        self.run(&["select-window", "-t", window])
    }

    fn kill_window(&self, window: &str) -> Result<(), String> {
        self.run(&["kill-window", "-t", window])
    }
}

pub(crate) fn parse_window_list(output: &str) -> Vec<WindowInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, '\t');
            let id = fields.next()?.trim();
            let name = fields.next()?;
            let panes = fields.next()?.trim().parse::<usize>().ok()?;
            if id.is_empty() {
                return None;
            }
            Some(WindowInfo {
                id: id.to_string(),
                name: name.to_string(),
                panes,
            })
        })
        .collect()
}
