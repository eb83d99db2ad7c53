//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the application layer uses
//! to interact with external systems. Implementations live in `adapters`.

mod compose;
mod process;
mod prober;

pub use compose::ComposeRuntime;
pub use process::{LaunchSpec, ProcessControl, ProcessLiveness};
pub use prober::PortProber;
