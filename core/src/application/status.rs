//! Live status of tracked runs.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::domain::{ProcessMapping, ProcessStatus};
use crate::error::Result;
use crate::ports::{ComposeRuntime, ProcessLiveness};
use crate::registry::Registry;

/// Registry entries by name with live status filled in.
pub type Snapshot = BTreeMap<String, ProcessMapping>;

/// Combines the registry with liveness and Compose status probes.
pub struct StatusReporter<L: ProcessLiveness, R: ComposeRuntime> {
    registry: Registry,
    liveness: L,
    compose: R,
}

impl<L: ProcessLiveness, R: ComposeRuntime> StatusReporter<L, R> {
    pub fn new(registry: Registry, liveness: L, compose: R) -> Self {
        Self {
            registry,
            liveness,
            compose,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Load the registry and re-derive every entry's status.
    ///
    /// A process counts as running when its pid exists. Compose entries
    /// also count as running while any of their services' containers run,
    /// since the launching `docker compose up -d` usually exits at once.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let state = self.registry.load().await?;
        let mut snapshot = state.mappings;

        for (name, mapping) in snapshot.iter_mut() {
            let mut running = self.liveness.is_alive(mapping.pid);

            if mapping.is_compose() {
                if let Some(services) = mapping.compose_ports.as_mut().filter(|s| !s.is_empty()) {
                    let status = self.compose.service_status(Path::new(&mapping.cwd)).await;
                    for service in services.iter_mut() {
                        service.running =
                            Some(status.get(&service.service_name).copied().unwrap_or(false));
                    }
                    running |= services.iter().any(|s| s.running == Some(true));
                }
            }

            mapping.status = if running {
                ProcessStatus::Running
            } else {
                ProcessStatus::Stopped
            };
            debug!(name = %name, pid = mapping.pid, status = %mapping.status, "Resolved status");
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComposeServicePort, InjectionType};
    use crate::test_support::{mapping, FakeComposeRuntime, FakeLiveness};
    use tempfile::tempdir;

    fn compose_entry(pid: u32) -> ProcessMapping {
        let mut m = mapping(8080, pid);
        m.injection_type = InjectionType::Compose;
        m.compose_ports = Some(vec![
            ComposeServicePort {
                service_name: "web".to_string(),
                port: 8080,
                running: None,
            },
            ComposeServicePort {
                service_name: "db".to_string(),
                port: 5432,
                running: None,
            },
        ]);
        m
    }

    #[tokio::test]
    async fn test_status_follows_liveness() {
        let dir = tempdir().unwrap();
        let registry = Registry::with_path(dir.path().join("state.json"));
        registry.add_process("alive", mapping(3000, 1)).await.unwrap();
        registry.add_process("dead", mapping(3001, 2)).await.unwrap();

        let reporter =
            StatusReporter::new(registry, FakeLiveness::with_alive([1]), FakeComposeRuntime::default());
        let snapshot = reporter.snapshot().await.unwrap();

        assert_eq!(snapshot["alive"].status, ProcessStatus::Running);
        assert_eq!(snapshot["dead"].status, ProcessStatus::Stopped);
    }

    #[tokio::test]
    async fn test_compose_services_get_running_flags() {
        let dir = tempdir().unwrap();
        let registry = Registry::with_path(dir.path().join("state.json"));
        registry.add_process("shop", compose_entry(9)).await.unwrap();

        let reporter = StatusReporter::new(
            registry,
            FakeLiveness::default(),
            FakeComposeRuntime::with_status(&[("web", true)]),
        );
        let snapshot = reporter.snapshot().await.unwrap();
        let shop = &snapshot["shop"];
        let services = shop.compose_ports.as_ref().unwrap();

        assert_eq!(services[0].running, Some(true));
        assert_eq!(services[1].running, Some(false));
        assert_eq!(shop.status, ProcessStatus::Running);
    }

    #[tokio::test]
    async fn test_unavailable_compose_status_means_stopped() {
        let dir = tempdir().unwrap();
        let registry = Registry::with_path(dir.path().join("state.json"));
        registry.add_process("shop", compose_entry(9)).await.unwrap();

        let reporter =
            StatusReporter::new(registry, FakeLiveness::default(), FakeComposeRuntime::default());
        let snapshot = reporter.snapshot().await.unwrap();
        let shop = &snapshot["shop"];

        assert!(shop
            .compose_ports
            .as_ref()
            .unwrap()
            .iter()
            .all(|s| s.running == Some(false)));
        assert_eq!(shop.status, ProcessStatus::Stopped);
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let dir = tempdir().unwrap();
        let reporter = StatusReporter::new(
            Registry::with_path(dir.path().join("state.json")),
            FakeLiveness::default(),
            FakeComposeRuntime::default(),
        );
        assert!(reporter.snapshot().await.unwrap().is_empty());
    }
}
