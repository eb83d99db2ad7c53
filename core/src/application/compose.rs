//! Compose override planning.
//!
//! Reads the project manifest, reallocates every published host port and,
//! when anything moved, writes an override file that replaces the port
//! lists of the affected services.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info};

use crate::domain::compose::{
    extract_service_names, generate_override_yaml, transform_compose_command, MANIFEST_FILENAMES,
    OVERRIDE_FILENAME,
};
use crate::domain::{AllocatedComposePort, AllocatedService, ComposeManifest, ComposeServicePort};
use crate::error::{Error, Result};
use crate::ports::{PortProber, ProcessLiveness};

use super::PortAllocator;

/// Outcome of planning a Compose invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposePlan {
    /// Allocated ports per service, in manifest or command order.
    pub services: Vec<AllocatedService>,
    /// Set when an override file was written.
    pub override_path: Option<PathBuf>,
    /// The command to execute.
    pub command: String,
}

impl ComposePlan {
    /// First allocated port of the first service, or 0 without ports.
    pub fn representative_port(&self) -> u16 {
        self.services
            .first()
            .and_then(AllocatedService::primary_port)
            .unwrap_or(0)
    }

    /// One display entry per service, carrying its first allocated port.
    pub fn service_ports(&self) -> Vec<ComposeServicePort> {
        self.services
            .iter()
            .filter_map(|service| {
                service.primary_port().map(|port| ComposeServicePort {
                    service_name: service.service_name.clone(),
                    port,
                    running: None,
                })
            })
            .collect()
    }

    pub fn has_override(&self) -> bool {
        self.override_path.is_some()
    }
}

/// Plans port reassignments for `docker compose` invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposePlanner;

impl ComposePlanner {
    pub fn new() -> Self {
        Self
    }

    /// Locate the first conventional manifest file in `cwd`.
    pub async fn find_manifest(&self, cwd: &Path) -> Result<PathBuf> {
        for name in MANIFEST_FILENAMES {
            let candidate = cwd.join(name);
            if fs::try_exists(&candidate).await.unwrap_or(false) {
                return Ok(candidate);
            }
        }
        Err(Error::ManifestNotFound(cwd.to_path_buf()))
    }

    /// Allocate host ports for the services `command` targets.
    pub async fn plan<P, L>(
        &self,
        cwd: &Path,
        command: &str,
        allocator: &mut PortAllocator<P, L>,
    ) -> Result<ComposePlan>
    where
        P: PortProber,
        L: ProcessLiveness,
    {
        let manifest_path = self.find_manifest(cwd).await?;
        let content = fs::read_to_string(&manifest_path).await?;
        let manifest = ComposeManifest::parse(&content)?;

        let requested = extract_service_names(command);
        if let Some(unknown) = requested.iter().find(|name| !manifest.has_service(name)) {
            return Err(Error::ServiceNotFound(unknown.clone()));
        }

        let declared = manifest.all_service_ports(&requested)?;
        if declared.is_empty() {
            debug!(cwd = %cwd.display(), "No published ports, running command unchanged");
            return Ok(ComposePlan {
                services: Vec::new(),
                override_path: None,
                command: command.to_string(),
            });
        }

        // One snapshot for the whole loop; the reservation set keeps
        // services apart.
        let state = allocator.registry().load().await?;
        let mut services = Vec::with_capacity(declared.len());
        for service in declared {
            let mut ports = Vec::with_capacity(service.ports.len());
            for mapping in service.ports {
                let port = allocator.allocate_with_state(&state, mapping.host_port, &[])?;
                ports.push(AllocatedComposePort::new(mapping, port));
            }
            services.push(AllocatedService {
                service_name: service.service_name,
                ports,
            });
        }

        let affected: Vec<AllocatedService> = services
            .iter()
            .filter(|s| s.has_conflict())
            .cloned()
            .collect();

        if affected.is_empty() {
            debug!(services = services.len(), "No port conflicts");
            return Ok(ComposePlan {
                services,
                override_path: None,
                command: command.to_string(),
            });
        }

        let override_path = cwd.join(OVERRIDE_FILENAME);
        fs::write(&override_path, generate_override_yaml(&affected)).await?;
        info!(
            path = %override_path.display(),
            services = affected.len(),
            "Wrote compose override"
        );

        let manifest_name = manifest_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(MANIFEST_FILENAMES[0]);

        Ok(ComposePlan {
            command: transform_compose_command(command, manifest_name),
            services,
            override_path: Some(override_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::test_support::{mapping, FakeLiveness, FakeProber};
    use tempfile::{tempdir, TempDir};

    const MANIFEST: &str = r#"
services:
  web:
    image: nginx
    ports:
      - "8080:80"
  db:
    image: postgres
    ports:
      - "5432:5432"
  worker:
    image: busybox
"#;

    fn project(manifest: &str) -> TempDir {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("docker-compose.yml"), manifest).unwrap();
        dir
    }

    fn allocator(
        dir: &Path,
        busy: &[u16],
        live: &[u32],
    ) -> PortAllocator<FakeProber, FakeLiveness> {
        PortAllocator::new(
            Registry::with_path(dir.join("state.json")),
            FakeProber::with_busy(busy.iter().copied()),
            FakeLiveness::with_alive(live.iter().copied()),
        )
    }

    #[tokio::test]
    async fn test_no_conflicts_keeps_command() {
        let dir = project(MANIFEST);
        let mut alloc = allocator(dir.path(), &[], &[]);

        let plan = ComposePlanner::new()
            .plan(dir.path(), "docker compose up -d", &mut alloc)
            .await
            .unwrap();

        assert_eq!(plan.command, "docker compose up -d");
        assert!(!plan.has_override());
        assert!(!dir.path().join(OVERRIDE_FILENAME).exists());
        assert_eq!(plan.services.len(), 2);
        assert_eq!(plan.representative_port(), 8080);
    }

    #[tokio::test]
    async fn test_conflict_writes_minimal_override() {
        let dir = project(MANIFEST);
        let mut alloc = allocator(dir.path(), &[5432], &[]);

        let plan = ComposePlanner::new()
            .plan(dir.path(), "docker compose up -d", &mut alloc)
            .await
            .unwrap();

        assert_eq!(
            plan.command,
            "docker compose -f docker-compose.yml -f .pa-compose-override.yml up -d"
        );
        let content = std::fs::read_to_string(dir.path().join(OVERRIDE_FILENAME)).unwrap();
        assert_eq!(
            content,
            "services:\n  db:\n    ports: !override\n      - \"5433:5432\"\n"
        );
        assert_eq!(plan.representative_port(), 8080);

        let ports = plan.service_ports();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[1].service_name, "db");
        assert_eq!(ports[1].port, 5433);
    }

    #[tokio::test]
    async fn test_registry_conflict_moves_port() {
        let dir = project(MANIFEST);
        let registry = Registry::with_path(dir.path().join("state.json"));
        registry.add_process("other", mapping(8080, 9)).await.unwrap();
        let mut alloc = allocator(dir.path(), &[], &[9]);

        let plan = ComposePlanner::new()
            .plan(dir.path(), "docker compose up web", &mut alloc)
            .await
            .unwrap();

        assert_eq!(plan.services.len(), 1);
        assert_eq!(plan.representative_port(), 8081);
        assert!(plan.command.ends_with("up web"));
        assert!(plan.command.contains("-f .pa-compose-override.yml"));
    }

    #[tokio::test]
    async fn test_option_values_are_not_services() {
        let dir = project(MANIFEST);
        let mut alloc = allocator(dir.path(), &[8080], &[]);

        let plan = ComposePlanner::new()
            .plan(dir.path(), "docker compose up --timeout 10 web", &mut alloc)
            .await
            .unwrap();

        assert_eq!(plan.services.len(), 1);
        assert_eq!(plan.representative_port(), 8081);
        assert!(plan.command.ends_with("up --timeout 10 web"));
    }

    #[tokio::test]
    async fn test_services_do_not_collide_within_a_run() {
        let dir = project(
            r#"
services:
  a:
    ports: ["3000:3000"]
  b:
    ports: ["3000:4000"]
"#,
        );
        let mut alloc = allocator(dir.path(), &[], &[]);

        let plan = ComposePlanner::new()
            .plan(dir.path(), "docker compose up", &mut alloc)
            .await
            .unwrap();

        let ports: Vec<u16> = plan.services.iter().filter_map(|s| s.primary_port()).collect();
        assert_eq!(ports, vec![3000, 3001]);
        assert!(plan.has_override());
    }

    #[tokio::test]
    async fn test_portless_targets_skip_allocation() {
        let dir = project(MANIFEST);
        let mut alloc = allocator(dir.path(), &[], &[]);

        let plan = ComposePlanner::new()
            .plan(dir.path(), "docker compose up worker", &mut alloc)
            .await
            .unwrap();

        assert!(plan.services.is_empty());
        assert_eq!(plan.representative_port(), 0);
        assert_eq!(plan.command, "docker compose up worker");
        assert!(alloc.reserved().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_service_fails() {
        let dir = project(MANIFEST);
        let mut alloc = allocator(dir.path(), &[], &[]);

        let result = ComposePlanner::new()
            .plan(dir.path(), "docker compose up cache", &mut alloc)
            .await;
        assert!(matches!(result, Err(Error::ServiceNotFound(name)) if name == "cache"));
    }

    #[tokio::test]
    async fn test_missing_and_invalid_manifest() {
        let empty = tempdir().unwrap();
        let mut alloc = allocator(empty.path(), &[], &[]);
        let result = ComposePlanner::new()
            .plan(empty.path(), "docker compose up", &mut alloc)
            .await;
        assert!(matches!(result, Err(Error::ManifestNotFound(_))));

        let broken = project("- just\n- a list\n");
        let result = ComposePlanner::new()
            .plan(broken.path(), "docker compose up", &mut alloc)
            .await;
        assert!(matches!(result, Err(Error::InvalidManifest(_))));
    }

    #[tokio::test]
    async fn test_alternate_manifest_name_is_used() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("compose.yaml"),
            "services:\n  web:\n    ports:\n      - \"8080:80/tcp\"\n",
        )
        .unwrap();
        let mut alloc = allocator(dir.path(), &[8080], &[]);

        let plan = ComposePlanner::new()
            .plan(dir.path(), "docker compose start", &mut alloc)
            .await
            .unwrap();

        assert_eq!(
            plan.command,
            "docker compose -f compose.yaml -f .pa-compose-override.yml start"
        );
        let content = std::fs::read_to_string(dir.path().join(OVERRIDE_FILENAME)).unwrap();
        assert!(content.contains("\"8081:80/tcp\""));
    }
}
