//! Port Arranger Core Library
//!
//! Runs several local development servers side by side without manual port
//! bookkeeping. Provides functionality to:
//! - Allocate ports free on the host and among tracked processes
//! - Rewrite a command (or its environment) so the tool binds a given port
//! - Reassign Docker Compose published ports through an override file
//! - Track spawned processes in a file-backed registry
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure business logic and data models
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: External system implementations
//! - `application`: Use case services
//!
//! # Platform Support
//! - Unix: signals via `nix`, detached process groups
//! - Windows: `tasklist` / `taskkill`

pub mod adapters;
pub mod application;
pub mod domain;
pub mod error;
pub mod ports;
pub mod registry;

#[cfg(test)]
mod test_support;

// Re-export domain types (primary API)
pub use domain::{
    ComposeServicePort, InjectionResult, InjectionType, ProcessMapping, ProcessStatus, State,
};

// Re-export other commonly used types
pub use adapters::{DockerCompose, OsPortProber, SystemProcessControl};
pub use application::{
    PortAllocator, RegistryWatcher, RunOutcome, RunPlan, RunRequest, RunService, Snapshot,
    StatusReporter, StopOutcome, StopReport, StopService, WatchHandle,
};
pub use error::{Error, Result};
pub use registry::Registry;
