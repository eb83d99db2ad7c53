//! Compose runtime port (interface).

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

/// Port for talking to the container runtime behind a Compose project.
pub trait ComposeRuntime: Send + Sync {
    /// Running state per service name for the project in `cwd`.
    ///
    /// Best effort: any failure yields an empty map.
    fn service_status(
        &self,
        cwd: &Path,
    ) -> impl std::future::Future<Output = HashMap<String, bool>> + Send;

    /// Stop and remove the project's containers.
    fn down(&self, cwd: &Path) -> impl std::future::Future<Output = Result<()>> + Send;
}
