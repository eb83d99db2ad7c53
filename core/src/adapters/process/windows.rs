//! Windows process control implementation
//!
//! Uses the following system commands:
//! - `tasklist /FI "PID eq xxx"` to check if process is running
//! - `taskkill /PID xxx /T /F` to stop a process tree

use std::os::windows::process::CommandExt;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use super::base_command;
use crate::error::{Error, Result};
use crate::ports::{LaunchSpec, ProcessControl, ProcessLiveness};

const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
const DETACHED_PROCESS: u32 = 0x0000_0008;

/// Windows process control implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsProcessControl;

impl WindowsProcessControl {
    /// Create a new WindowsProcessControl instance
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLiveness for WindowsProcessControl {
    fn is_alive(&self, pid: u32) -> bool {
        if pid == 0 {
            return false;
        }
        let output = std::process::Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid), "/NH"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output();

        match output {
            // tasklist prints "INFO: No tasks are running..." when nothing matches
            Ok(output) => String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()),
            Err(_) => false,
        }
    }
}

impl ProcessControl for WindowsProcessControl {
    fn spawn_detached(&self, spec: &LaunchSpec) -> Result<u32> {
        let mut command = base_command(spec)?;
        command.creation_flags(CREATE_NEW_PROCESS_GROUP | DETACHED_PROCESS);

        let child = command
            .spawn()
            .map_err(|e| Error::SpawnFailed(format!("{}: {}", spec.command, e)))?;

        let pid = child.id();
        debug!(pid = pid, command = %spec.command, "Spawned detached process");
        Ok(pid)
    }

    async fn terminate(&self, pid: u32) -> Result<()> {
        debug!(pid = pid, "Executing taskkill");

        let output = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not found") {
            debug!(pid = pid, "Process already gone");
            return Ok(());
        }
        if stderr.contains("Access is denied") {
            warn!(pid = pid, "Permission denied to kill process");
            return Err(Error::PermissionDenied(format!("cannot stop process {}", pid)));
        }

        Err(Error::KillFailed {
            pid,
            reason: stderr.trim().to_string(),
        })
    }
}
