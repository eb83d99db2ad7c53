//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`:
//! TCP probing, OS process control and the Docker Compose CLI.

pub mod compose;
pub mod prober;
pub mod process;

pub use compose::DockerCompose;
pub use prober::OsPortProber;
pub use process::SystemProcessControl;
