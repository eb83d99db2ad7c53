//! Docker Compose runtime using the `docker compose` CLI.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, Result};
use crate::ports::ComposeRuntime;

/// Default paths to search for docker. GUI launches often get a trimmed
/// PATH, so well-known install locations are tried before PATH lookup.
const DOCKER_PATHS: &[&str] = &[
    "/opt/homebrew/bin/docker", // Apple Silicon
    "/usr/local/bin/docker",    // Intel Mac / Docker Desktop
    "/usr/bin/docker",          // System
];

/// Timeout for `docker compose ps`.
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for `docker compose down`.
const DOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// One container line of `docker compose ps --format json`.
#[derive(Debug, Deserialize)]
struct PsEntry {
    #[serde(rename = "Service", default)]
    service: Option<String>,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "State", default)]
    state: Option<String>,
}

/// Compose runtime backed by the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCompose {
    docker_path: PathBuf,
    status_timeout: Duration,
    down_timeout: Duration,
}

impl DockerCompose {
    /// Creates a runtime using the first docker binary found in the
    /// well-known locations, falling back to `docker` on PATH.
    pub fn new() -> Self {
        let docker_path =
            find_executable(DOCKER_PATHS).unwrap_or_else(|| PathBuf::from("docker"));
        Self::with_docker_path(docker_path)
    }

    /// Creates a runtime with a custom docker path.
    pub fn with_docker_path(docker_path: PathBuf) -> Self {
        Self {
            docker_path,
            status_timeout: STATUS_TIMEOUT,
            down_timeout: DOWN_TIMEOUT,
        }
    }

    /// Overrides both command timeouts.
    pub fn with_timeouts(mut self, status: Duration, down: Duration) -> Self {
        self.status_timeout = status;
        self.down_timeout = down;
        self
    }

    pub fn docker_path(&self) -> &Path {
        &self.docker_path
    }

    /// Executes a docker command in `cwd` and returns stdout.
    async fn execute(&self, cwd: &Path, args: &[&str], limit: Duration) -> Result<String> {
        let result = timeout(limit, async {
            let output = Command::new(&self.docker_path)
                .args(args)
                .current_dir(cwd)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await?;

            Ok::<_, std::io::Error>((output.status, output.stdout, output.stderr))
        })
        .await;

        match result {
            Ok(Ok((status, stdout, stderr))) => {
                if status.success() {
                    Ok(String::from_utf8_lossy(&stdout).into_owned())
                } else {
                    Err(Error::CommandFailed(format!(
                        "docker {} failed: {}",
                        args.join(" "),
                        String::from_utf8_lossy(&stderr).trim()
                    )))
                }
            }
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => Err(Error::CommandFailed(format!(
                "docker {} timed out after {}s",
                args.join(" "),
                limit.as_secs()
            ))),
        }
    }
}

impl Default for DockerCompose {
    fn default() -> Self {
        Self::new()
    }
}

impl ComposeRuntime for DockerCompose {
    async fn service_status(&self, cwd: &Path) -> HashMap<String, bool> {
        match self
            .execute(cwd, &["compose", "ps", "-a", "--format", "json"], self.status_timeout)
            .await
        {
            Ok(output) => parse_ps_output(&output),
            Err(e) => {
                debug!(cwd = %cwd.display(), error = %e, "Compose status unavailable");
                HashMap::new()
            }
        }
    }

    async fn down(&self, cwd: &Path) -> Result<()> {
        debug!(cwd = %cwd.display(), "Running docker compose down");
        self.execute(cwd, &["compose", "down"], self.down_timeout)
            .await
            .map(|_| ())
    }
}

/// Parse `docker compose ps --format json` output.
///
/// Newer Compose releases print one JSON object per line, older ones a
/// single array. A service counts as running when any of its containers
/// is running. Unparseable lines are skipped.
pub fn parse_ps_output(output: &str) -> HashMap<String, bool> {
    let trimmed = output.trim();
    let entries: Vec<PsEntry> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).unwrap_or_default()
    } else {
        trimmed
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    };

    let mut status = HashMap::new();
    for entry in entries {
        let Some(service) = entry.service.or(entry.name) else {
            continue;
        };
        let running = entry
            .state
            .map(|s| s.eq_ignore_ascii_case("running"))
            .unwrap_or(false);
        if running || !status.contains_key(&service) {
            status.insert(service, running);
        }
    }
    status
}

/// Finds an executable in the given paths.
fn find_executable(paths: &[&str]) -> Option<PathBuf> {
    paths.iter().map(PathBuf::from).find(|path| path.exists())
}
