//! Stopping tracked runs.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ports::{ComposeRuntime, ProcessControl};
use crate::registry::Registry;

/// What stopping one entry did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum StopOutcome {
    /// The process was signalled (or its Compose project taken down).
    Stopped { pid: u32 },
    /// The process had already exited; only the entry was removed.
    AlreadyStopped { pid: u32 },
}

impl StopOutcome {
    pub fn pid(&self) -> u32 {
        match self {
            StopOutcome::Stopped { pid } | StopOutcome::AlreadyStopped { pid } => *pid,
        }
    }
}

/// Per-entry result of [`StopService::stop_all`].
#[derive(Debug)]
pub struct StopReport {
    pub name: String,
    pub result: Result<StopOutcome>,
}

/// Stops tracked runs and removes them from the registry.
pub struct StopService<C: ProcessControl, R: ComposeRuntime> {
    registry: Registry,
    control: C,
    compose: R,
}

impl<C: ProcessControl, R: ComposeRuntime> StopService<C, R> {
    pub fn new(registry: Registry, control: C, compose: R) -> Self {
        Self {
            registry,
            control,
            compose,
        }
    }

    /// Stop the run recorded under `name`.
    ///
    /// The entry is removed once the process is gone. A failed signal
    /// (e.g. permission denied) leaves the entry in place.
    pub async fn stop(&self, name: &str) -> Result<StopOutcome> {
        let mapping = self
            .registry
            .get_process(name)
            .await?
            .ok_or_else(|| Error::ProcessNotFound(name.to_string()))?;
        let pid = mapping.pid;

        if mapping.is_compose() {
            match self.compose.down(Path::new(&mapping.cwd)).await {
                Ok(()) => {
                    self.registry.remove_process(name).await?;
                    info!(name = %name, cwd = %mapping.cwd, "Compose project stopped");
                    return Ok(StopOutcome::Stopped { pid });
                }
                Err(e) => {
                    warn!(name = %name, error = %e, "docker compose down failed, terminating process");
                }
            }
        }

        if !self.control.is_alive(pid) {
            debug!(name = %name, pid = pid, "Process already exited");
            self.registry.remove_process(name).await?;
            return Ok(StopOutcome::AlreadyStopped { pid });
        }

        self.control.terminate(pid).await?;
        self.registry.remove_process(name).await?;
        info!(name = %name, pid = pid, "Process stopped");
        Ok(StopOutcome::Stopped { pid })
    }

    /// Stop every entry, collecting each result instead of failing fast.
    pub async fn stop_all(&self) -> Result<Vec<StopReport>> {
        let state = self.registry.load().await?;
        let mut reports = Vec::with_capacity(state.mappings.len());
        for name in state.mappings.into_keys() {
            let result = self.stop(&name).await;
            if let Err(e) = &result {
                warn!(name = %name, error = %e, "Failed to stop process");
            }
            reports.push(StopReport { name, result });
        }
        Ok(reports)
    }

    /// Restart is not implemented: the run is stopped and must be started
    /// again with `run`.
    pub async fn restart(&self, name: &str) -> Result<StopOutcome> {
        warn!(name = %name, "Restart only stops the process; start it again with `pa run`");
        self.stop(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComposeServicePort, InjectionType};
    use crate::test_support::{mapping, FakeComposeRuntime, FakeProcessControl};
    use tempfile::tempdir;
    use tokio_test::{assert_err, assert_ok};

    fn service(
        dir: &Path,
        control: FakeProcessControl,
        compose: FakeComposeRuntime,
    ) -> StopService<FakeProcessControl, FakeComposeRuntime> {
        StopService::new(Registry::with_path(dir.join("state.json")), control, compose)
    }

    #[tokio::test]
    async fn test_stop_live_process() {
        let dir = tempdir().unwrap();
        let svc = service(
            dir.path(),
            FakeProcessControl::with_alive([100]),
            FakeComposeRuntime::default(),
        );
        svc.registry.add_process("web", mapping(3000, 100)).await.unwrap();

        let outcome = assert_ok!(svc.stop("web").await);
        assert_eq!(outcome, StopOutcome::Stopped { pid: 100 });
        assert_eq!(*svc.control.terminated.lock(), vec![100]);
        assert!(svc.registry.get_process("web").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stop_dead_process_removes_entry() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path(), FakeProcessControl::new(), FakeComposeRuntime::default());
        svc.registry.add_process("web", mapping(3000, 100)).await.unwrap();

        let outcome = svc.stop("web").await.unwrap();
        assert_eq!(outcome, StopOutcome::AlreadyStopped { pid: 100 });
        assert!(svc.control.terminated.lock().is_empty());
        assert!(svc.registry.load().await.unwrap().mappings.is_empty());
    }

    #[tokio::test]
    async fn test_stop_unknown_name() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path(), FakeProcessControl::new(), FakeComposeRuntime::default());

        let result = svc.stop("ghost").await;
        assert!(matches!(result, Err(Error::ProcessNotFound(name)) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_permission_denied_keeps_entry() {
        let dir = tempdir().unwrap();
        let control = FakeProcessControl::with_alive([100]);
        control.protect(100);
        let svc = service(dir.path(), control, FakeComposeRuntime::default());
        svc.registry.add_process("web", mapping(3000, 100)).await.unwrap();

        let result = svc.stop("web").await;
        assert!(matches!(result, Err(Error::PermissionDenied(_))));
        assert!(svc.registry.get_process("web").await.unwrap().is_some());
    }

    fn compose_mapping(pid: u32, cwd: &Path) -> crate::domain::ProcessMapping {
        let mut m = mapping(8080, pid);
        m.injection_type = InjectionType::Compose;
        m.cwd = cwd.to_string_lossy().into_owned();
        m.compose_ports = Some(vec![ComposeServicePort {
            service_name: "web".to_string(),
            port: 8080,
            running: None,
        }]);
        m
    }

    #[tokio::test]
    async fn test_compose_stop_runs_down() {
        let dir = tempdir().unwrap();
        let svc = service(
            dir.path(),
            FakeProcessControl::with_alive([100]),
            FakeComposeRuntime::default(),
        );
        svc.registry
            .add_process("shop", compose_mapping(100, dir.path()))
            .await
            .unwrap();

        let outcome = svc.stop("shop").await.unwrap();
        assert_eq!(outcome, StopOutcome::Stopped { pid: 100 });
        assert_eq!(*svc.compose.downs.lock(), vec![dir.path().to_path_buf()]);
        assert!(svc.control.terminated.lock().is_empty());
        assert!(svc.registry.get_process("shop").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_compose_down_failure_falls_back_to_terminate() {
        let dir = tempdir().unwrap();
        let svc = service(
            dir.path(),
            FakeProcessControl::with_alive([100]),
            FakeComposeRuntime::failing_down(),
        );
        svc.registry
            .add_process("shop", compose_mapping(100, dir.path()))
            .await
            .unwrap();

        let outcome = svc.stop("shop").await.unwrap();
        assert_eq!(outcome, StopOutcome::Stopped { pid: 100 });
        assert_eq!(*svc.control.terminated.lock(), vec![100]);
    }

    #[tokio::test]
    async fn test_stop_all_collects_results() {
        let dir = tempdir().unwrap();
        let control = FakeProcessControl::with_alive([1, 2]);
        control.protect(2);
        let svc = service(dir.path(), control, FakeComposeRuntime::default());
        svc.registry.add_process("a", mapping(3000, 1)).await.unwrap();
        svc.registry.add_process("b", mapping(3001, 2)).await.unwrap();
        svc.registry.add_process("c", mapping(3002, 3)).await.unwrap();

        let reports = svc.stop_all().await.unwrap();
        let names: Vec<_> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        assert_eq!(*reports[0].result.as_ref().unwrap(), StopOutcome::Stopped { pid: 1 });
        assert_err!(&reports[1].result);
        assert_eq!(
            *reports[2].result.as_ref().unwrap(),
            StopOutcome::AlreadyStopped { pid: 3 }
        );

        let remaining: Vec<_> = svc.registry.load().await.unwrap().mappings.into_keys().collect();
        assert_eq!(remaining, vec!["b"]);
    }

    #[tokio::test]
    async fn test_restart_only_stops() {
        let dir = tempdir().unwrap();
        let svc = service(
            dir.path(),
            FakeProcessControl::with_alive([100]),
            FakeComposeRuntime::default(),
        );
        svc.registry.add_process("web", mapping(3000, 100)).await.unwrap();

        let outcome = svc.restart("web").await.unwrap();
        assert_eq!(outcome.pid(), 100);
        assert!(svc.control.spawned.lock().is_empty());
        assert!(svc.registry.get_process("web").await.unwrap().is_none());
    }
}
