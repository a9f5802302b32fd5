use std::path::Path;

use crate::infrastructure::process::capture_command;

/// The git command line, scoped to one working directory per call.
pub trait GitCli {
    /// Runs `git -C <dir> <args>` and returns stdout without the trailing newline.
    fn output(&self, dir: &Path, args: &[&str]) -> Result<String, String>;

    fn run(&self, dir: &Path, args: &[&str]) -> Result<(), String> {
        self.output(dir, args).map(|_| ())
    }
}

pub struct CommandGit;

pub(crate) fn git_command(dir: &Path, args: &[&str]) -> Vec<String> {
    let mut command = vec![
        "git".to_string(),
        "-C".to_string(),
        dir.to_string_lossy().to_string(),
    ];
    command.extend(args.iter().map(|arg| (*arg).to_string()));
    command
}

impl GitCli for CommandGit {
    fn output(&self, dir: &Path, args: &[&str]) -> Result<String, String> {
        capture_command(&git_command(dir, args), None)
    }
}

#[cfg(test)]
mod tests {
    use super::git_command;
    use std::path::Path;

    #[test]
    fn git_command_scopes_every_call_to_the_directory() {
        assert_eq!(
            git_command(Path::new("/p/myapp-wt-1"), &["status", "--porcelain"]),
            vec![
                "git".to_string(),
                "-C".to_string(),
                "/p/myapp-wt-1".to_string(),
                "status".to_string(),
                "--porcelain".to_string(),
            ]
        );
    }
}
