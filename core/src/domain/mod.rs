//! Domain layer - Pure business logic and data models.
//!
//! This module contains domain entities that represent core business concepts.
//! These types have no I/O dependencies and can be tested in isolation.

pub mod compose;
pub mod injection;
mod mapping;

// Re-export all domain types
pub use compose::{
    AllocatedComposePort, AllocatedService, ComposeManifest, ComposePortMapping,
    ComposeServicePorts, PortProtocol,
};
pub use injection::{classify, default_port, inject, CommandRule, InjectionResult, Strategy};
pub use mapping::{ComposeServicePort, InjectionType, ProcessMapping, ProcessStatus, State};
