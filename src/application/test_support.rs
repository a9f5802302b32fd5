use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::application::git::GitCli;
use crate::application::session_lifecycle::CommandRunner;

#[derive(Debug)]
pub(crate) struct TestDir {
    pub path: PathBuf,
}

impl TestDir {
    pub fn new(label: &str) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "vibeit-{label}-{}-{timestamp}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("test dir should be created");
        Self { path }
    }

    /// Creates `<root>/<name>/.git` so the directory passes the validity check.
    pub fn git_dir(&self, name: &str) -> PathBuf {
        let path = self.path.join(name);
        fs::create_dir_all(path.join(".git")).expect("fake .git should be created");
        path
    }

    pub fn plain_dir(&self, name: &str) -> PathBuf {
        let path = self.path.join(name);
        fs::create_dir_all(&path).expect("plain dir should be created");
        path
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Answers git calls from a table keyed by directory and space-joined arguments.
pub(crate) struct StubGit {
    responses: HashMap<(PathBuf, String), Result<String, String>>,
    fallback: Result<String, String>,
    calls: RefCell<Vec<(PathBuf, String)>>,
}

impl StubGit {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            fallback: Err("not stubbed".to_string()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_fallback_ok(mut self) -> Self {
        self.fallback = Ok(String::new());
        self
    }

    pub fn respond(mut self, dir: &Path, args: &str, result: Result<&str, &str>) -> Self {
        self.responses.insert(
            (dir.to_path_buf(), args.to_string()),
            result.map(ToOwned::to_owned).map_err(ToOwned::to_owned),
        );
        self
    }

    /// Stubs a full healthy status read for `dir`.
    pub fn clean_status(self, dir: &Path, branch: &str) -> Self {
        self.respond(dir, "rev-parse --abbrev-ref HEAD", Ok(branch))
            .respond(dir, "status --porcelain", Ok(""))
            .respond(
                dir,
                "rev-parse --abbrev-ref --symbolic-full-name @{upstream}",
                Err("fatal: no upstream configured"),
            )
            .respond(dir, "stash list", Ok(""))
            .respond(dir, "log -n 5 --pretty=format:%h %s", Ok("abc1234 initial"))
    }

    pub fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.borrow().clone()
    }

    pub fn call_args(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, args)| args).collect()
    }
}

impl GitCli for StubGit {
    fn output(&self, dir: &Path, args: &[&str]) -> Result<String, String> {
        let joined = args.join(" ");
        self.calls
            .borrow_mut()
            .push((dir.to_path_buf(), joined.clone()));
        self.responses
            .get(&(dir.to_path_buf(), joined))
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Answers multiplexer commands from a table keyed by the space-joined command line.
pub(crate) struct StubRunner {
    responses: HashMap<String, Vec<Result<String, String>>>,
    fallback: Result<String, String>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl StubRunner {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            fallback: Ok(String::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Queues a response; repeated calls consume queued responses in order and
    /// the last one sticks.
    pub fn respond(mut self, command: &str, result: Result<&str, &str>) -> Self {
        self.responses
            .entry(command.to_string())
            .or_default()
            .push(result.map(ToOwned::to_owned).map_err(ToOwned::to_owned));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|command| command.join(" "))
            .collect()
    }
}

impl CommandRunner for StubRunner {
    fn output(&self, command: &[String]) -> Result<String, String> {
        self.calls.borrow_mut().push(command.to_vec());
        let joined = command.join(" ");
        let Some(queue) = self.responses.get(&joined) else {
            return self.fallback.clone();
        };
        let consumed = self
            .calls
            .borrow()
            .iter()
            .filter(|call| call.join(" ") == joined)
            .count();
        let index = consumed.saturating_sub(1).min(queue.len().saturating_sub(1));
        queue
            .get(index)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
