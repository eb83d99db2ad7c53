//! Process control adapters.
//!
//! Platform-specific spawning, liveness checks and termination.

#[cfg(unix)]
mod unix;

#[cfg(windows)]
mod windows;

use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::ports::LaunchSpec;

#[cfg(unix)]
pub use unix::UnixProcessControl as SystemProcessControl;

#[cfg(windows)]
pub use windows::WindowsProcessControl as SystemProcessControl;

#[cfg(not(any(unix, windows)))]
compile_error!("Unsupported platform: only Unix and Windows are supported");

/// Build the platform-neutral part of a detached launch: program, args,
/// working directory, environment overlay and silenced stdio.
fn base_command(spec: &LaunchSpec) -> Result<Command> {
    let parts = shell_words::split(&spec.command)
        .map_err(|e| Error::InvalidCommand(format!("{}: {}", spec.command, e)))?;

    let Some((program, args)) = parts.split_first() else {
        return Err(Error::InvalidCommand("command is empty".to_string()));
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(&spec.cwd)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    Ok(command)
}
