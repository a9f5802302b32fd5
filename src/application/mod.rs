pub mod git;
pub mod git_status;
pub mod host;
pub mod notes;
pub mod overview;
pub mod session_lifecycle;
pub mod tabs;
pub mod workspace_provisioning;
pub mod workspace_registry;

#[cfg(test)]
pub(crate) mod test_support;
