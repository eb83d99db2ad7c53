//! Process liveness and control ports (interfaces).

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Result;

/// Port for checking whether a process id exists on this host.
pub trait ProcessLiveness: Send + Sync {
    /// True when a process with `pid` currently exists.
    fn is_alive(&self, pid: u32) -> bool;
}

impl<T: ProcessLiveness + ?Sized> ProcessLiveness for &T {
    fn is_alive(&self, pid: u32) -> bool {
        (**self).is_alive(pid)
    }
}

/// Everything needed to start a tracked process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Full command line, split with shell word rules.
    pub command: String,
    /// Variables added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
}

/// Port for starting and stopping tracked processes.
///
/// Implementations handle platform-specific spawning and signal delivery.
pub trait ProcessControl: ProcessLiveness {
    /// Start the process detached from the caller (own process group, no
    /// inherited stdio) and return its pid.
    fn spawn_detached(&self, spec: &LaunchSpec) -> Result<u32>;

    /// Ask the process and its descendants to terminate.
    ///
    /// A process that is already gone counts as success.
    fn terminate(&self, pid: u32) -> impl std::future::Future<Output = Result<()>> + Send;
}
