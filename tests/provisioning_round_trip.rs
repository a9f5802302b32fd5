mod support;

use std::fs;

use support::{FakeRepoGit, RecordingCleanup, TempTree};
use vibeit::application::tabs::session_name;
use vibeit::application::workspace_provisioning::{
    CreateWorkspaceRequest, DeleteWorkspaceRequest, HookCommandRunner, WorkspaceProvisioner,
    ensure_config,
};
use vibeit::application::workspace_registry::{RegistryOptions, WorkspaceRegistry};
use vibeit::domain::WorkspaceBackend;
use vibeit::infrastructure::event_log::MemoryEventLogger;

struct NoopHooks;

impl HookCommandRunner for NoopHooks {
    fn run(&self, _workspace_path: &std::path::Path, _command: &str) -> Result<(), String> {
        Ok(())
    }
}

#[test]
fn created_workspace_is_listed_then_deleted_and_its_slot_reused() {
    let tree = TempTree::new("round-trip");
    let main = tree.repo("shop", "main");
    ensure_config(&main).expect("default config should be written");
    fs::write(main.join(".env"), "SECRET=1\n").expect("env should be written");
    fs::create_dir_all(main.join("vendor/lib")).expect("vendor should be created");
    fs::write(main.join("vendor/lib/mod.txt"), "vendored").expect("vendor file");
    let git = FakeRepoGit::default();
    let logger = MemoryEventLogger::default();
    let provisioner = WorkspaceProvisioner::new(&git, &NoopHooks, WorkspaceBackend::Clone, &logger);
    let registry = WorkspaceRegistry::new(&git, RegistryOptions::default(), &logger);

    let created = provisioner
        .create_workspace(&main, &CreateWorkspaceRequest::new("feature/cart", None))
        .expect("workspace should be created");

    assert_eq!(created.workspace_path, tree.root.join("shop-wt-1"));
    assert_eq!(created.warnings.len(), 1, "only node_modules is missing");
    assert!(created.warnings[0].contains("node_modules"));
    assert_eq!(
        fs::read_to_string(created.workspace_path.join(".env")).expect("env copied"),
        "SECRET=1\n"
    );
    assert!(created.workspace_path.join("vendor/lib/mod.txt").exists());

    let listed = registry.load_workspaces(&main).expect("discovery");
    assert!(listed.config_exists);
    let workspace = listed
        .workspaces
        .iter()
        .find(|workspace| workspace.path == created.workspace_path)
        .expect("new workspace should be listed");
    assert_eq!(workspace.branch, "feature/cart");

    let cleanup = RecordingCleanup::default();
    let request = DeleteWorkspaceRequest {
        repo_root: main.clone(),
        workspace_path: workspace.path.clone(),
        branch: workspace.branch.clone(),
        is_main: workspace.is_main(),
        session_name: Some(session_name("shop", &workspace.name, None)),
        delete_notes: false,
    };
    let (deleted, warnings) = provisioner.delete_workspace(&request, &cleanup);
    deleted.expect("delete should succeed");
    assert!(warnings.is_empty());
    assert_eq!(
        cleanup.sessions.borrow().clone(),
        vec!["vibeit-shop-shop-wt-1".to_string()]
    );

    let after_delete = registry.load_workspaces(&main).expect("discovery");
    assert_eq!(after_delete.workspaces.len(), 1);
    assert!(
        git.calls().iter().all(|args| !args.starts_with("branch -D")),
        "clone deletion leaves the main repository's branches alone"
    );

    let again = provisioner
        .create_workspace(&main, &CreateWorkspaceRequest::new("feature/next", None))
        .expect("workspace should be created again");
    assert_eq!(again.workspace_path, tree.root.join("shop-wt-1"));
}
