//! Run orchestration: resolve ports, rewrite the command, spawn, record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::injection::DEFAULT_PORT;
use crate::domain::{
    classify, default_port, inject, ComposeServicePort, InjectionType, ProcessMapping,
    ProcessStatus,
};
use crate::error::{Error, Result};
use crate::ports::{LaunchSpec, PortProber, ProcessControl};
use crate::registry::Registry;

use super::{ComposePlanner, PortAllocator};

/// Name used when the working directory has no final component.
const FALLBACK_NAME: &str = "app";

/// A request to start one tracked run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub command: String,
    pub cwd: PathBuf,
    /// Registry name; defaults to the base name of `cwd`.
    pub name: Option<String>,
    /// Preferred port; defaults to the tool's conventional port.
    pub port: Option<u16>,
    pub dry_run: bool,
}

impl RunRequest {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
            name: None,
            port: None,
            dry_run: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The registry name this request resolves to.
    pub fn resolved_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| default_name(&self.cwd))
    }
}

fn default_name(cwd: &Path) -> String {
    cwd.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}

/// Everything decided before the process is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPlan {
    pub name: String,
    /// Representative port (0 for Compose runs without published ports).
    pub port: u16,
    pub command: String,
    pub original_command: String,
    pub env: BTreeMap<String, String>,
    pub injection_type: InjectionType,
    pub tool_name: String,
    pub cwd: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compose_ports: Option<Vec<ComposeServicePort>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_path: Option<PathBuf>,
}

impl RunPlan {
    /// The registry entry recording this plan once spawned as `pid`.
    pub fn to_mapping(&self, pid: u32) -> ProcessMapping {
        ProcessMapping {
            port: self.port,
            pid,
            command: self.command.clone(),
            original_command: self.original_command.clone(),
            injection_type: self.injection_type,
            cwd: self.cwd.to_string_lossy().into_owned(),
            started_at: Utc::now(),
            status: ProcessStatus::Running,
            compose_ports: self.compose_ports.clone(),
        }
    }

    fn launch_spec(&self) -> LaunchSpec {
        LaunchSpec {
            command: self.command.clone(),
            env: self.env.clone(),
            cwd: self.cwd.clone(),
        }
    }
}

/// Result of [`RunService::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub plan: RunPlan,
    /// `None` for dry runs.
    pub pid: Option<u32>,
}

/// Starts commands on conflict-free ports and records them in the registry.
pub struct RunService<P: PortProber, C: ProcessControl> {
    registry: Registry,
    prober: P,
    control: C,
    planner: ComposePlanner,
}

impl<P: PortProber, C: ProcessControl> RunService<P, C> {
    pub fn new(registry: Registry, prober: P, control: C) -> Self {
        Self {
            registry,
            prober,
            control,
            planner: ComposePlanner::new(),
        }
    }

    /// Resolve ports and rewrite the command without spawning anything.
    ///
    /// For Compose commands this may write the override file, which is part
    /// of the plan itself.
    pub async fn plan(&self, request: &RunRequest) -> Result<RunPlan> {
        let command = request.command.trim();
        if command.is_empty() {
            return Err(Error::InvalidCommand("command is empty".to_string()));
        }

        let name = request.resolved_name();
        let mut allocator =
            PortAllocator::new(self.registry.clone(), &self.prober, &self.control);

        let compose_rule = classify(command)
            .filter(|rule| rule.strategy.injection_type() == InjectionType::Compose);

        if let Some(rule) = compose_rule {
            let compose = self
                .planner
                .plan(&request.cwd, command, &mut allocator)
                .await?;
            debug!(name = %name, services = compose.services.len(), "Planned compose run");

            return Ok(RunPlan {
                name,
                port: compose.representative_port(),
                command: compose.command.clone(),
                original_command: command.to_string(),
                env: BTreeMap::new(),
                injection_type: InjectionType::Compose,
                tool_name: rule.name.to_string(),
                cwd: request.cwd.clone(),
                compose_ports: Some(compose.service_ports()),
                override_path: compose.override_path,
            });
        }

        let preferred = request
            .port
            .or_else(|| default_port(command))
            .unwrap_or(DEFAULT_PORT);
        let port = allocator.allocate(preferred, &[]).await?;
        let injection = inject(command, port);
        debug!(
            name = %name,
            port = port,
            tool = %injection.tool_name,
            injection = %injection.injection_type,
            "Planned run"
        );

        Ok(RunPlan {
            name,
            port,
            command: injection.command,
            original_command: command.to_string(),
            env: injection.env,
            injection_type: injection.injection_type,
            tool_name: injection.tool_name,
            cwd: request.cwd.clone(),
            compose_ports: None,
            override_path: None,
        })
    }

    /// Plan, spawn detached and record the run. Dry runs stop after planning.
    pub async fn run(&self, request: &RunRequest) -> Result<RunOutcome> {
        let plan = self.plan(request).await?;
        if request.dry_run {
            return Ok(RunOutcome { plan, pid: None });
        }

        let pid = self.control.spawn_detached(&plan.launch_spec())?;
        if let Err(e) = self
            .registry
            .add_process(&plan.name, plan.to_mapping(pid))
            .await
        {
            warn!(name = %plan.name, pid = pid, error = %e, "Failed to record process, terminating it");
            if let Err(kill_err) = self.control.terminate(pid).await {
                warn!(pid = pid, error = %kill_err, "Failed to terminate unrecorded process");
            }
            return Err(e);
        }
        info!(name = %plan.name, pid = pid, port = plan.port, "Started process");

        Ok(RunOutcome {
            plan,
            pid: Some(pid),
        })
    }
}
