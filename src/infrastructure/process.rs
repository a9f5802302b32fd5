use std::path::Path;
use std::process::{Command, Output, Stdio};

pub fn stderr_trimmed(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

pub fn stderr_or_status(output: &Output) -> String {
    let stderr = stderr_trimmed(output);
    if stderr.is_empty() {
        return output.status.to_string();
    }
    stderr
}

/// Runs `command` to completion and returns trimmed stdout, or the failure text.
pub fn capture_command(command: &[String], cwd: Option<&Path>) -> Result<String, String> {
    let Some(program) = command.first() else {
        return Err("command is empty".to_string());
    };
    let mut process = Command::new(program);
    process.args(&command[1..]);
    if let Some(cwd) = cwd {
        process.current_dir(cwd);
    }
    let output = process
        .stdin(Stdio::null())
        .output()
        .map_err(|error| format!("{}: {error}", command.join(" ")))?;

    if !output.status.success() {
        return Err(format!("{}: {}", command.join(" "), stderr_or_status(&output)));
    }

    String::from_utf8(output.stdout)
        .map(|stdout| stdout.trim_end().to_string())
        .map_err(|error| format!("{}: stdout decode failed: {error}", command.join(" ")))
}

/// Hands the terminal to `command` and blocks until it exits.
pub fn run_interactive(command: &[String], cwd: Option<&Path>) -> Result<(), String> {
    let Some(program) = command.first() else {
        return Err("command is empty".to_string());
    };
    let mut process = Command::new(program);
    process.args(&command[1..]);
    if let Some(cwd) = cwd {
        process.current_dir(cwd);
    }
    let status = process
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|error| format!("{program}: {error}"))?;

    if status.success() {
        return Ok(());
    }
    Err(format!("{program} exited with status {status}"))
}

pub fn binary_available(program: &str) -> bool {
    Command::new(program)
        .arg("-V")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}
