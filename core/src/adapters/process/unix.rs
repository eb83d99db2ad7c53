//! Unix process control using signals.
//!
//! - `kill(pid, 0)` to check if a process exists
//! - `killpg(pid, SIGTERM)` to stop a detached process and its children
//! - `kill(pid, SIGTERM)` when the pid does not lead a process group

use std::os::unix::process::CommandExt;

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use super::base_command;
use crate::error::{Error, Result};
use crate::ports::{LaunchSpec, ProcessControl, ProcessLiveness};

/// Unix process control implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixProcessControl;

impl UnixProcessControl {
    /// Create a new UnixProcessControl instance
    pub fn new() -> Self {
        Self
    }
}

/// Pid 0 and pids beyond `i32` address groups or nothing at all, never a
/// single tracked process.
fn to_pid(pid: u32) -> Option<Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}

fn signal_error(pid: u32, errno: Errno) -> Error {
    match errno {
        Errno::EPERM => Error::PermissionDenied(format!("cannot signal process {}", pid)),
        other => Error::KillFailed {
            pid,
            reason: other.desc().to_string(),
        },
    }
}

impl ProcessLiveness for UnixProcessControl {
    fn is_alive(&self, pid: u32) -> bool {
        let Some(target) = to_pid(pid) else {
            return false;
        };
        match kill(target, None) {
            Ok(()) => true,
            // Exists but belongs to someone else.
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

impl ProcessControl for UnixProcessControl {
    fn spawn_detached(&self, spec: &LaunchSpec) -> Result<u32> {
        let mut command = base_command(spec)?;
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|e| Error::SpawnFailed(format!("{}: {}", spec.command, e)))?;

        let pid = child.id();
        debug!(pid = pid, command = %spec.command, cwd = %spec.cwd.display(), "Spawned detached process");
        Ok(pid)
    }

    async fn terminate(&self, pid: u32) -> Result<()> {
        let Some(target) = to_pid(pid) else {
            return Err(Error::KillFailed {
                pid,
                reason: "invalid process id".to_string(),
            });
        };

        debug!(pid = pid, "Sending SIGTERM to process group");
        match killpg(target, Signal::SIGTERM) {
            Ok(()) => return Ok(()),
            Err(Errno::ESRCH) => {
                debug!(pid = pid, "No process group, signalling the process directly");
            }
            Err(errno) => {
                warn!(pid = pid, error = %errno, "Failed to signal process group");
                return Err(signal_error(pid, errno));
            }
        }

        match kill(target, Signal::SIGTERM) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => {
                debug!(pid = pid, "Process already gone");
                Ok(())
            }
            Err(errno) => {
                warn!(pid = pid, error = %errno, "Failed to send SIGTERM");
                Err(signal_error(pid, errno))
            }
        }
    }
}
