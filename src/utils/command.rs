//! Helpers for spawning git processes
//!
//! Every git invocation goes through [`create_command`] so that console
//! windows stay hidden on Windows and credential prompts never block.

use std::path::Path;
use std::process::Command;

use crate::error::{ReposcopeError, Result};

/// Creates a Command with platform-specific settings to hide console windows.
pub fn create_command(program: &str) -> Command {
    let mut cmd = Command::new(program);

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        // CREATE_NO_WINDOW
        cmd.creation_flags(0x08000000);
    }

    if program == "git" {
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        // output is parsed, keep it stable across locales
        cmd.env("LC_ALL", "C");
    }

    cmd
}

/// Run git in `dir` and return its raw stdout.
///
/// The output is not trimmed: porcelain formats are whitespace sensitive.
pub fn run_git<S: AsRef<str>>(dir: &Path, args: &[S]) -> Result<String> {
    let args: Vec<&str> = args.iter().map(|a| a.as_ref()).collect();
    let command_line = args.join(" ");
    tracing::debug!(dir = %dir.display(), "git {}", command_line);

    let output = create_command("git")
        .current_dir(dir)
        .args(&args)
        .output()
        .map_err(|e| ReposcopeError::CommandFailed {
            command: command_line.clone(),
            message: format!("failed to spawn git: {}", e),
        })?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let message = if stderr.trim().is_empty() { stdout } else { stderr };

    Err(ReposcopeError::CommandFailed {
        command: command_line,
        message: message.trim().to_string(),
    })
}

/// Parse `git version 2.39.2.windows.1` into (major, minor, patch)
pub fn parse_git_version(output: &str) -> Option<(u32, u32, u32)> {
    let version = output.trim().strip_prefix("git version ")?;
    let mut parts = version.split('.').map(|p| {
        p.chars()
            .take_while(char::is_ascii_digit)
            .collect::<String>()
            .parse::<u32>()
            .ok()
    });

    let major = parts.next()??;
    let minor = parts.next()??;
    let patch = parts.next().flatten().unwrap_or(0);
    Some((major, minor, patch))
}
