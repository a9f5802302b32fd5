#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use vibeit::application::git::GitCli;
use vibeit::application::session_lifecycle::{ControllerError, SessionCleanup};

const BRANCH_FILE: &str = "FAKE_BRANCH";

pub struct TempTree {
    pub root: PathBuf,
}

impl TempTree {
    pub fn new(label: &str) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_nanos();
        let root = std::env::temp_dir().join(format!(
            "vibeit-it-{label}-{}-{timestamp}",
            std::process::id()
        ));
        fs::create_dir_all(&root).expect("temp root should be created");
        Self { root }
    }

    /// A directory that looks like a repository checked out on `branch`.
    pub fn repo(&self, name: &str, branch: &str) -> PathBuf {
        let path = self.root.join(name);
        fs::create_dir_all(path.join(".git")).expect("fake .git should be created");
        fs::write(path.join(".git").join(BRANCH_FILE), branch).expect("branch should be written");
        path
    }
}

impl Drop for TempTree {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// Answers the git calls vibeit makes by looking at the fake repositories on disk.
#[derive(Default)]
pub struct FakeRepoGit {
    calls: RefCell<Vec<String>>,
}

impl FakeRepoGit {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn toplevel(dir: &Path) -> Result<PathBuf, String> {
        dir.ancestors()
            .find(|candidate| candidate.join(".git").exists())
            .map(Path::to_path_buf)
            .ok_or_else(|| "fatal: not a git repository".to_string())
    }
}

impl GitCli for FakeRepoGit {
    fn output(&self, dir: &Path, args: &[&str]) -> Result<String, String> {
        self.calls.borrow_mut().push(args.join(" "));
        match args {
            ["rev-parse", "--show-toplevel"] => {
                Self::toplevel(dir).map(|path| path.to_string_lossy().to_string())
            }
            ["rev-parse", "--path-format=absolute", "--git-common-dir"] => Self::toplevel(dir)
                .map(|path| path.join(".git").to_string_lossy().to_string()),
            ["rev-parse", "--abbrev-ref", "HEAD"] => {
                let top = Self::toplevel(dir)?;
                fs::read_to_string(top.join(".git").join(BRANCH_FILE))
                    .map_err(|error| error.to_string())
            }
            ["status", "--porcelain"] | ["stash", "list"] => Ok(String::new()),
            ["log", ..] => Ok("abc1234 initial".to_string()),
            ["remote", "get-url", "origin"] => Err("error: No such remote 'origin'".to_string()),
            ["clone", _, target] => fs::create_dir_all(Path::new(target).join(".git"))
                .map(|_| String::new())
                .map_err(|error| error.to_string()),
            ["checkout", "-b", branch, ..] => {
                fs::write(dir.join(".git").join(BRANCH_FILE), branch)
                    .map(|_| String::new())
                    .map_err(|error| error.to_string())
            }
            ["remote", "remove", "origin"] | ["branch", "-D", _] => Ok(String::new()),
            _ => Err(format!("unexpected git call: {}", args.join(" "))),
        }
    }
}

#[derive(Default)]
pub struct RecordingCleanup {
    pub sessions: RefCell<Vec<String>>,
}

impl SessionCleanup for RecordingCleanup {
    fn delete_session(&self, session: &str) -> Result<(), ControllerError> {
        self.sessions.borrow_mut().push(session.to_string());
        Ok(())
    }
}
