//! Process registry domain models.
//!
//! These types are serialized verbatim into the registry file, so field
//! names follow the camelCase layout shared with the dashboard.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// InjectionType
// ============================================================================

/// How a chosen port was communicated to the spawned tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionType {
    /// `PORT` environment variable.
    Env,
    /// `--port <n>` style option.
    Flag,
    /// Trailing positional argument.
    Arg,
    /// Ports come from a Compose manifest.
    Compose,
}

impl InjectionType {
    /// Lowercase identifier as stored in the registry.
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectionType::Env => "env",
            InjectionType::Flag => "flag",
            InjectionType::Arg => "arg",
            InjectionType::Compose => "compose",
        }
    }
}

impl std::fmt::Display for InjectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ProcessStatus
// ============================================================================

/// Recorded lifecycle status. Advisory only: liveness is always re-derived
/// from the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    #[default]
    Running,
    Stopped,
}

impl ProcessStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessStatus::Running)
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessStatus::Running => f.write_str("running"),
            ProcessStatus::Stopped => f.write_str("stopped"),
        }
    }
}

// ============================================================================
// ProcessMapping
// ============================================================================

/// Host port published by one Compose service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeServicePort {
    pub service_name: String,
    pub port: u16,
    /// Live container state, filled in when the registry is displayed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
}

/// One tracked run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMapping {
    /// Representative host port (0 for Compose runs without exposed ports).
    pub port: u16,
    /// Process ID of the spawned process.
    pub pid: u32,
    /// The command actually spawned, after injection.
    pub command: String,
    /// The command as the user typed it.
    pub original_command: String,
    pub injection_type: InjectionType,
    /// Working directory the process was started in.
    pub cwd: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ProcessStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose_ports: Option<Vec<ComposeServicePort>>,
}

impl ProcessMapping {
    /// Every host port this run holds: the representative port plus any
    /// per-service Compose ports. Port 0 is never reported.
    pub fn claimed_ports(&self) -> Vec<u16> {
        let mut ports = Vec::new();
        if self.port != 0 {
            ports.push(self.port);
        }
        if let Some(compose) = &self.compose_ports {
            ports.extend(compose.iter().map(|svc| svc.port).filter(|p| *p != 0));
        }
        ports
    }

    pub fn is_compose(&self) -> bool {
        self.injection_type == InjectionType::Compose
    }
}

// ============================================================================
// State
// ============================================================================

/// The whole registry file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub mappings: BTreeMap<String, ProcessMapping>,
}
