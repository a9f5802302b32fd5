use super::{
    RegistryError, RegistryOptions, WorkspaceRegistry, initial_selection, list_sibling_workspaces,
    list_worktree_workspaces, main_root_from_common_dir, parse_worktree_porcelain,
    resolve_project_root, slot_for_directory, split_slot_directory_name,
};
use crate::application::notes::NotesLayout;
use crate::application::test_support::{StubGit, TestDir};
use crate::domain::{Workspace, WorkspaceBackend};
use crate::infrastructure::event_log::{MemoryEventLogger, NullEventLogger};
use std::fs;
use std::path::{Path, PathBuf};

fn names(workspaces: &[Workspace]) -> Vec<String> {
    workspaces
        .iter()
        .map(|workspace| workspace.name.clone())
        .collect()
}

#[test]
fn slot_directories_need_numeric_suffix_in_range() {
    assert_eq!(slot_for_directory("proj-wt-1", "proj"), Some(1));
    assert_eq!(slot_for_directory("proj-wt-9", "proj"), Some(9));
    assert_eq!(slot_for_directory("proj-wt-0", "proj"), None);
    assert_eq!(slot_for_directory("proj-wt-10", "proj"), None);
    assert_eq!(slot_for_directory("proj-wt-x", "proj"), None);
    assert_eq!(slot_for_directory("proj-wt-", "proj"), None);
    assert_eq!(slot_for_directory("other-wt-1", "proj"), None);
    assert_eq!(slot_for_directory("my-proj-wt-1", "proj"), None);
}

#[test]
fn split_slot_name_keeps_dashed_project_names() {
    assert_eq!(
        split_slot_directory_name("my-app-wt-3"),
        Some(("my-app", 3))
    );
    assert_eq!(split_slot_directory_name("-wt-3"), None);
    assert_eq!(split_slot_directory_name("my-app"), None);
}

#[test]
fn sibling_scan_orders_by_slot_and_skips_invalid_directories() {
    let temp = TestDir::new("registry-siblings");
    let main = temp.git_dir("proj");
    temp.git_dir("proj-wt-5");
    temp.git_dir("proj-wt-1");
    temp.git_dir("proj-wt-x");
    temp.plain_dir("proj-wt-2");
    temp.git_dir("proj-wt-12");
    temp.git_dir("other-wt-3");
    fs::write(temp.path.join("proj-wt-4"), "not a directory").expect("file should be written");

    let workspaces = list_sibling_workspaces(&main, "proj");

    assert_eq!(names(&workspaces), vec!["proj", "proj-wt-1", "proj-wt-5"]);
    assert!(workspaces[0].is_main());
    assert!(workspaces[1..].iter().all(|workspace| workspace.is_sub_workspace));
    assert_eq!(workspaces[2].path, temp.path.join("proj-wt-5"));
}

#[test]
fn detect_from_main_root_returns_main_then_slots() {
    let temp = TestDir::new("registry-detect");
    let main = temp.git_dir("proj");
    let first = temp.git_dir("proj-wt-1");
    let fifth = temp.git_dir("proj-wt-5");
    temp.git_dir("proj-wt-x");
    temp.plain_dir("proj-wt-2");

    let main_str = main.to_string_lossy().to_string();
    let git = StubGit::new()
        .respond(&main, "rev-parse --show-toplevel", Ok(&main_str))
        .clean_status(&main, "main")
        .clean_status(&first, "feature-a")
        .clean_status(&fifth, "feature-e");
    let logger = MemoryEventLogger::default();
    let registry = WorkspaceRegistry::new(&git, RegistryOptions::default(), &logger);

    let workspaces = registry.detect(&main).expect("detect should succeed");

    assert_eq!(names(&workspaces), vec!["proj", "proj-wt-1", "proj-wt-5"]);
    assert_eq!(workspaces[0].branch, "main");
    assert_eq!(workspaces[1].branch, "feature-a");
    assert_eq!(workspaces[2].branch, "feature-e");
    assert_eq!(logger.kinds("registry"), vec!["loaded".to_string()]);
}

#[test]
fn detect_from_inside_a_slot_anchors_on_main() {
    let temp = TestDir::new("registry-from-slot");
    let main = temp.git_dir("proj");
    let slot = temp.git_dir("proj-wt-3");

    let slot_str = slot.to_string_lossy().to_string();
    let slot_git_dir = slot.join(".git").to_string_lossy().to_string();
    let nested = slot.join("src");
    let git = StubGit::new()
        .respond(&nested, "rev-parse --show-toplevel", Ok(&slot_str))
        .respond(
            &nested,
            "rev-parse --path-format=absolute --git-common-dir",
            Ok(&slot_git_dir),
        );

    assert_eq!(resolve_project_root(&git, &nested), Ok(main));
}

#[test]
fn slot_without_main_checkout_stays_its_own_root() {
    let temp = TestDir::new("registry-orphan-slot");
    let slot = temp.git_dir("proj-wt-3");
    let slot_str = slot.to_string_lossy().to_string();
    let git = StubGit::new().respond(&slot, "rev-parse --show-toplevel", Ok(&slot_str));

    assert_eq!(resolve_project_root(&git, &slot), Ok(slot));
}

#[test]
fn linked_worktree_resolves_through_common_dir() {
    let cwd = Path::new("/p/proj-feature");
    let git = StubGit::new()
        .respond(cwd, "rev-parse --show-toplevel", Ok("/p/proj-feature"))
        .respond(
            cwd,
            "rev-parse --path-format=absolute --git-common-dir",
            Ok("/p/proj/.git"),
        );

    assert_eq!(
        resolve_project_root(&git, cwd),
        Ok(PathBuf::from("/p/proj"))
    );
    assert_eq!(
        main_root_from_common_dir(Path::new("/p/proj/.git/worktrees/x")),
        None
    );
}

#[test]
fn outside_a_repository_is_fatal() {
    let cwd = Path::new("/tmp/nowhere");
    let git = StubGit::new().respond(
        cwd,
        "rev-parse --show-toplevel",
        Err("fatal: not a git repository"),
    );
    let registry = WorkspaceRegistry::new(&git, RegistryOptions::default(), &NullEventLogger);

    let error = registry.detect(cwd).expect_err("detect should fail");

    assert_eq!(
        error,
        RegistryError::NotAGitRepository("fatal: not a git repository".to_string())
    );
    assert!(error.message().starts_with("not a git repository"));
}

#[test]
fn failing_status_read_keeps_sibling_with_zero_values() {
    let temp = TestDir::new("registry-degraded");
    let main = temp.git_dir("proj");
    temp.git_dir("proj-wt-1");
    let main_str = main.to_string_lossy().to_string();
    let git = StubGit::new()
        .respond(&main, "rev-parse --show-toplevel", Ok(&main_str))
        .clean_status(&main, "main");
    let registry = WorkspaceRegistry::new(&git, RegistryOptions::default(), &NullEventLogger);

    let workspaces = registry.detect(&main).expect("detect should succeed");

    assert_eq!(workspaces.len(), 2);
    assert_eq!(workspaces[1].branch, "");
    assert!(!workspaces[1].is_dirty);
    assert_eq!(workspaces[1].stash_count, 0);
}

#[test]
fn load_workspaces_reports_config_and_notes() {
    let temp = TestDir::new("registry-load");
    let main = temp.git_dir("proj");
    fs::create_dir_all(main.join(".vibe")).expect(".vibe should be created");
    fs::write(main.join(".vibe/wt.json"), "{}").expect("config should be written");
    fs::write(temp.path.join("proj.md"), "# Notes\n\n- ship it\n").expect("notes written");

    let main_str = main.to_string_lossy().to_string();
    let git = StubGit::new()
        .respond(&main, "rev-parse --show-toplevel", Ok(&main_str))
        .clean_status(&main, "main");
    let options = RegistryOptions {
        backend: WorkspaceBackend::Clone,
        notes_layout: NotesLayout::Project,
    };
    let registry = WorkspaceRegistry::new(&git, options, &NullEventLogger);

    let discovery = registry.load_workspaces(&main).expect("load should succeed");

    assert_eq!(discovery.project_name, "proj");
    assert_eq!(discovery.project_path, main);
    assert!(discovery.config_exists);
    assert!(discovery.workspaces[0].notes_exists);
    assert_eq!(
        discovery.workspaces[0].notes_preview,
        vec!["# Notes".to_string(), String::new(), "- ship it".to_string()]
    );
}

#[test]
fn refresh_preserves_input_order_and_does_not_rescan() {
    let temp = TestDir::new("registry-refresh");
    let main = temp.git_dir("proj");
    let slot = temp.git_dir("proj-wt-2");
    let git = StubGit::new()
        .clean_status(&main, "main")
        .clean_status(&slot, "topic");
    let logger = MemoryEventLogger::default();
    let registry = WorkspaceRegistry::new(&git, RegistryOptions::default(), &logger);
    let input = vec![
        Workspace::derived("proj-wt-2", slot.clone()),
        Workspace::main("proj", main.clone()),
    ];

    let refreshed = registry.refresh_git_status(&input, &main, "proj");

    assert_eq!(names(&refreshed), vec!["proj-wt-2", "proj"]);
    assert_eq!(refreshed[0].branch, "topic");
    assert_eq!(logger.kinds("registry"), vec!["status_refreshed".to_string()]);
    assert!(
        !git.call_args()
            .iter()
            .any(|args| args.contains("show-toplevel"))
    );
}

#[test]
fn worktree_porcelain_parses_branches_detached_and_bare_entries() {
    let output = "worktree /p/proj\nHEAD 123\nbranch refs/heads/main\n\nworktree /p/proj-feature\nHEAD 456\nbranch refs/heads/feature/a\n\nworktree /p/proj-detached\nHEAD 789\ndetached\n\nworktree /p/bare\nbare\n";

    let parsed = parse_worktree_porcelain(output).expect("porcelain should parse");

    assert_eq!(parsed.len(), 4);
    assert_eq!(parsed[0].branch.as_deref(), Some("main"));
    assert_eq!(parsed[1].branch.as_deref(), Some("feature/a"));
    assert_eq!(parsed[2].branch, None);
    assert!(parsed[3].is_bare);
    assert!(parse_worktree_porcelain("branch refs/heads/main\n").is_err());
}

#[test]
fn worktree_listing_keeps_main_first_and_skips_missing_paths() {
    let temp = TestDir::new("registry-worktrees");
    let main = temp.git_dir("proj");
    let linked = temp.plain_dir("proj-feature");
    fs::write(linked.join(".git"), "gitdir: /p/proj/.git/worktrees/proj-feature\n")
        .expect("gitdir pointer should be written");
    let porcelain = format!(
        "worktree {}\nbranch refs/heads/main\n\nworktree {}\nbranch refs/heads/feature\n\nworktree {}\nbranch refs/heads/gone\n",
        main.display(),
        linked.display(),
        temp.path.join("proj-gone").display()
    );
    let git = StubGit::new().respond(&main, "worktree list --porcelain", Ok(&porcelain));

    let workspaces = list_worktree_workspaces(&git, &main).expect("listing should succeed");

    assert_eq!(names(&workspaces), vec!["proj", "proj-feature"]);
    assert!(workspaces[0].is_main());
    assert_eq!(workspaces[1].branch, "feature");
}

#[test]
fn initial_selection_prefers_the_deepest_containing_workspace() {
    let workspaces = vec![
        Workspace::main("proj", PathBuf::from("/p/proj")),
        Workspace::derived("proj-wt-1", PathBuf::from("/p/proj-wt-1")),
    ];

    assert_eq!(
        initial_selection(&workspaces, Path::new("/p/proj-wt-1/src")),
        1
    );
    assert_eq!(initial_selection(&workspaces, Path::new("/p/proj")), 0);
    assert_eq!(initial_selection(&workspaces, Path::new("/elsewhere")), 0);
}
