use crate::domain::{InstancePolicy, TabType};

pub const SESSION_PREFIX: &str = "vibeit-";

const COLLAPSED_CHARACTERS: [char; 4] = ['/', ' ', '.', ':'];

/// Replaces characters the multiplexers reject in session names.
///
/// When anything was replaced, a short hash of the raw value is appended so
/// `a/b` and `a-b` map to different names.
pub fn sanitize_session_component(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|character| {
            if COLLAPSED_CHARACTERS.contains(&character) {
                '-'
            } else {
                character
            }
        })
        .collect();

    if replaced == value {
        return replaced;
    }
    format!("{replaced}-{:08x}", fnv1a(value))
}

pub fn session_name(project_name: &str, workspace_name: &str, branch: Option<&str>) -> String {
    let mut name = format!(
        "{SESSION_PREFIX}{}-{}",
        sanitize_session_component(project_name),
        sanitize_session_component(workspace_name)
    );
    if let Some(branch) = branch.map(str::trim).filter(|branch| !branch.is_empty()) {
        name.push('-');
        name.push_str(&sanitize_session_component(branch));
    }
    name
}

fn fnv1a(value: &str) -> u32 {
    value.bytes().fold(0x811c_9dc5_u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

/// Instance number of `name` for `prefix`: the bare prefix is instance 1,
/// `prefix-<N>` is instance N for positive all-digit N.
pub fn tab_instance_number(name: &str, prefix: &str) -> Option<u32> {
    if name == prefix {
        return Some(1);
    }
    let suffix = name.strip_prefix(prefix)?.strip_prefix('-')?;
    if suffix.is_empty() || !suffix.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    suffix.parse::<u32>().ok().filter(|number| *number > 0)
}

pub fn filter_tabs_by_prefix(tabs: &[String], prefix: &str) -> Vec<String> {
    tabs.iter()
        .filter(|tab| tab_instance_number(tab, prefix).is_some())
        .cloned()
        .collect()
}

pub fn next_tab_name(tabs: &[String], tab_type: TabType) -> String {
    let prefix = tab_type.marker();
    let highest = tabs
        .iter()
        .filter_map(|tab| tab_instance_number(tab, prefix))
        .max()
        .unwrap_or(0);
    format!("{prefix}-{}", highest.saturating_add(1))
}

/// The name a new tab of `tab_type` should get; single-instance types always use the bare marker.
pub fn tab_name_for(tabs: &[String], tab_type: TabType) -> String {
    match tab_type.instance_policy() {
        InstancePolicy::Single => tab_type.marker().to_string(),
        InstancePolicy::Multi => next_tab_name(tabs, tab_type),
    }
}

pub fn tab_type_for_name(name: &str) -> Option<TabType> {
    TabType::ALL
        .into_iter()
        .find(|tab_type| tab_instance_number(name, tab_type.marker()).is_some())
}

pub fn is_managed_tab_name(name: &str) -> bool {
    tab_type_for_name(name).is_some_and(TabType::is_managed)
}

pub fn managed_tabs(tabs: &[String]) -> Vec<String> {
    tabs.iter()
        .filter(|tab| is_managed_tab_name(tab))
        .cloned()
        .collect()
}
