//! In-memory fakes for the port traits, shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use crate::domain::{InjectionType, ProcessMapping, ProcessStatus};
use crate::error::{Error, Result};
use crate::ports::{ComposeRuntime, LaunchSpec, PortProber, ProcessControl, ProcessLiveness};

/// A running env-injected mapping on `port` owned by `pid`.
pub fn mapping(port: u16, pid: u32) -> ProcessMapping {
    ProcessMapping {
        port,
        pid,
        command: "node server.js".to_string(),
        original_command: "node server.js".to_string(),
        injection_type: InjectionType::Env,
        cwd: "/tmp/project".to_string(),
        started_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
        status: ProcessStatus::Running,
        compose_ports: None,
    }
}

/// Prober that treats a fixed set of ports as bound by someone else.
#[derive(Debug, Default)]
pub struct FakeProber {
    busy: HashSet<u16>,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_busy(ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            busy: ports.into_iter().collect(),
        }
    }
}

impl PortProber for FakeProber {
    fn nearest_free(&self, port: u16) -> Result<u16> {
        (port.max(1)..=u16::MAX)
            .find(|p| !self.busy.contains(p))
            .ok_or(Error::PortExhausted {
                preferred: port,
                attempts: 0,
            })
    }
}

/// Liveness check answering from a mutable set of pids.
#[derive(Debug, Clone, Default)]
pub struct FakeLiveness {
    alive: Arc<Mutex<HashSet<u32>>>,
}

impl FakeLiveness {
    pub fn with_alive(pids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            alive: Arc::new(Mutex::new(pids.into_iter().collect())),
        }
    }

    pub fn kill(&self, pid: u32) {
        self.alive.lock().remove(&pid);
    }
}

impl ProcessLiveness for FakeLiveness {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().contains(&pid)
    }
}

/// Process control that records launches and terminations.
#[derive(Debug, Clone)]
pub struct FakeProcessControl {
    pub liveness: FakeLiveness,
    next_pid: Arc<AtomicU32>,
    pub spawned: Arc<Mutex<Vec<LaunchSpec>>>,
    pub terminated: Arc<Mutex<Vec<u32>>>,
    /// Pids whose termination is refused.
    pub protected: Arc<Mutex<HashSet<u32>>>,
    /// File overwritten with garbage on every spawn.
    clobber: Arc<Mutex<Option<PathBuf>>>,
}

impl FakeProcessControl {
    pub fn new() -> Self {
        Self {
            liveness: FakeLiveness::default(),
            next_pid: Arc::new(AtomicU32::new(4000)),
            spawned: Arc::default(),
            terminated: Arc::default(),
            protected: Arc::default(),
            clobber: Arc::default(),
        }
    }

    pub fn with_alive(pids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            liveness: FakeLiveness::with_alive(pids),
            ..Self::new()
        }
    }

    pub fn protect(&self, pid: u32) {
        self.protected.lock().insert(pid);
    }

    /// Corrupt `path` whenever a process is spawned.
    pub fn clobber_on_spawn(&self, path: PathBuf) {
        *self.clobber.lock() = Some(path);
    }
}

impl ProcessLiveness for FakeProcessControl {
    fn is_alive(&self, pid: u32) -> bool {
        self.liveness.is_alive(pid)
    }
}

impl ProcessControl for FakeProcessControl {
    fn spawn_detached(&self, spec: &LaunchSpec) -> Result<u32> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.spawned.lock().push(spec.clone());
        self.liveness.alive.lock().insert(pid);
        if let Some(path) = self.clobber.lock().as_ref() {
            std::fs::write(path, "{ not json").unwrap();
        }
        Ok(pid)
    }

    async fn terminate(&self, pid: u32) -> Result<()> {
        if self.protected.lock().contains(&pid) {
            return Err(Error::PermissionDenied(format!("cannot signal process {}", pid)));
        }
        self.terminated.lock().push(pid);
        self.liveness.kill(pid);
        Ok(())
    }
}

/// Compose runtime with canned status and a scripted `down` result.
#[derive(Debug, Clone, Default)]
pub struct FakeComposeRuntime {
    pub status: HashMap<String, bool>,
    pub fail_down: bool,
    pub downs: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeComposeRuntime {
    pub fn with_status(status: &[(&str, bool)]) -> Self {
        Self {
            status: status
                .iter()
                .map(|(name, running)| (name.to_string(), *running))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing_down() -> Self {
        Self {
            fail_down: true,
            ..Self::default()
        }
    }
}

impl ComposeRuntime for FakeComposeRuntime {
    async fn service_status(&self, _cwd: &Path) -> HashMap<String, bool> {
        self.status.clone()
    }

    async fn down(&self, cwd: &Path) -> Result<()> {
        self.downs.lock().push(cwd.to_path_buf());
        if self.fail_down {
            Err(Error::CommandFailed("docker compose down failed".to_string()))
        } else {
            Ok(())
        }
    }
}
