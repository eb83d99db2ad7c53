//! Application layer - Use case services.
//!
//! Services orchestrate domain logic and adapter interactions:
//! - Accept domain types as inputs
//! - Use ports (traits) for external dependencies
//! - Return domain types as outputs

mod allocator;
mod compose;
mod run_service;
mod status;
mod stop_service;
mod watcher;

pub use allocator::{PortAllocator, MAX_ATTEMPTS};
pub use compose::{ComposePlan, ComposePlanner};
pub use run_service::{RunOutcome, RunPlan, RunRequest, RunService};
pub use status::{Snapshot, StatusReporter};
pub use stop_service::{StopOutcome, StopReport, StopService};
pub use watcher::{RegistryWatcher, WatchHandle, POLL_INTERVAL};
