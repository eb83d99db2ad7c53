//! File-backed process registry.
//!
//! Stores every tracked run in JSON format at `~/.port-arranger/state.json`.
//! Each mutation reloads the whole file, edits the copy and writes it back.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::domain::{ProcessMapping, State};
use crate::error::{Error, Result};

/// Directory under the home directory holding the registry.
pub const STATE_DIR: &str = ".port-arranger";

/// Registry file name.
pub const STATE_FILE: &str = "state.json";

/// Distinguishes temp files of saves running in the same process.
static SAVE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Persistent mapping of run names to tracked processes.
#[derive(Debug, Clone)]
pub struct Registry {
    state_path: PathBuf,
}

impl Registry {
    /// Create a registry at the default path `~/.port-arranger/state.json`.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Registry("Could not determine home directory".to_string()))?;

        Ok(Self {
            state_path: home.join(STATE_DIR).join(STATE_FILE),
        })
    }

    /// Create a registry with a custom path.
    pub fn with_path(state_path: PathBuf) -> Self {
        Self { state_path }
    }

    pub fn path(&self) -> &Path {
        &self.state_path
    }

    /// Load the registry from disk.
    ///
    /// Returns an empty state if the file doesn't exist.
    pub async fn load(&self) -> Result<State> {
        let content = match fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(State::default()),
            Err(e) => {
                return Err(Error::Registry(format!(
                    "Failed to read {}: {}",
                    self.state_path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            Error::Registry(format!(
                "Failed to parse {}: {}",
                self.state_path.display(),
                e
            ))
        })
    }

    /// Save the registry to disk.
    ///
    /// Writes to a temp file and renames it over the target so readers never
    /// see a partial document.
    pub async fn save(&self, state: &State) -> Result<()> {
        if let Some(dir) = self.state_path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await.map_err(|e| {
                    Error::Registry(format!("Failed to create registry directory: {}", e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| Error::Registry(format!("Failed to serialize registry: {}", e)))?;

        let temp_path = self.temp_path();
        if let Err(e) = write_synced(&temp_path, content.as_bytes()).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &self.state_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::Registry(format!(
                "Failed to rename registry file: {}",
                e
            )));
        }

        debug!(path = %self.state_path.display(), entries = state.mappings.len(), "Registry saved");
        Ok(())
    }

    /// Temp file next to the registry, unique per save so concurrent
    /// writers never share one.
    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .state_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| STATE_FILE.to_string());
        let seq = SAVE_SEQ.fetch_add(1, Ordering::Relaxed);
        self.state_path.with_file_name(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            seq
        ))
    }

    /// Insert or replace the entry under `name`.
    pub async fn add_process(&self, name: &str, mapping: ProcessMapping) -> Result<()> {
        let mut state = self.load().await?;
        state.mappings.insert(name.to_string(), mapping);
        self.save(&state).await
    }

    /// Remove the entry under `name`. Removing an absent name is a no-op.
    pub async fn remove_process(&self, name: &str) -> Result<()> {
        let mut state = self.load().await?;
        if state.mappings.remove(name).is_some() {
            self.save(&state).await?;
        }
        Ok(())
    }

    pub async fn get_all_processes(&self) -> Result<State> {
        self.load().await
    }

    pub async fn get_process(&self, name: &str) -> Result<Option<ProcessMapping>> {
        let mut state = self.load().await?;
        Ok(state.mappings.remove(name))
    }
}

async fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| Error::Registry(format!("Failed to create temp registry file: {}", e)))?;

    file.write_all(content)
        .await
        .map_err(|e| Error::Registry(format!("Failed to write registry: {}", e)))?;

    file.sync_all()
        .await
        .map_err(|e| Error::Registry(format!("Failed to sync registry: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::mapping;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let registry = Registry::with_path(dir.path().join("state.json"));

        let state = registry.load().await.unwrap();
        assert!(state.mappings.is_empty());
    }

    #[tokio::test]
    async fn test_add_get_remove() {
        let dir = tempdir().unwrap();
        let registry = Registry::with_path(dir.path().join("nested").join("state.json"));

        registry.add_process("web", mapping(3001, 100)).await.unwrap();
        registry.add_process("api", mapping(8001, 200)).await.unwrap();

        let all = registry.get_all_processes().await.unwrap();
        let names: Vec<_> = all.mappings.keys().cloned().collect();
        assert_eq!(names, vec!["api", "web"]);

        let web = registry.get_process("web").await.unwrap().unwrap();
        assert_eq!(web.port, 3001);
        assert_eq!(web.pid, 100);

        registry.remove_process("web").await.unwrap();
        assert!(registry.get_process("web").await.unwrap().is_none());

        // Absent names are ignored.
        registry.remove_process("missing").await.unwrap();
        assert_eq!(registry.get_all_processes().await.unwrap().mappings.len(), 1);
    }

    #[tokio::test]
    async fn test_add_replaces_existing_entry() {
        let dir = tempdir().unwrap();
        let registry = Registry::with_path(dir.path().join("state.json"));

        registry.add_process("web", mapping(3001, 100)).await.unwrap();
        registry.add_process("web", mapping(3002, 101)).await.unwrap();

        let state = registry.load().await.unwrap();
        assert_eq!(state.mappings.len(), 1);
        assert_eq!(state.mappings["web"].port, 3002);
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let registry = Registry::with_path(path.clone());

        registry.add_process("web", mapping(3001, 100)).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("state.json")]);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"mappings\""));
        assert!(content.contains("\"originalCommand\""));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let registry = Registry::with_path(path);
        assert!(matches!(registry.load().await, Err(Error::Registry(_))));
        assert!(registry.add_process("web", mapping(3001, 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_mappings_key_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{}").unwrap();

        let state = Registry::with_path(path).load().await.unwrap();
        assert!(state.mappings.is_empty());
    }

    #[test]
    fn test_parallel_writers_never_fail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let registry = Registry::with_path(path.clone());
                std::thread::spawn(move || {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .unwrap();
                    runtime.block_on(async {
                        for i in 0..50u16 {
                            let name = format!("w{}-{}", writer, i);
                            registry
                                .add_process(&name, mapping(3000 + i, u32::from(i) + 1))
                                .await?;
                        }
                        Ok::<_, Error>(())
                    })
                })
            })
            .collect();

        for writer in writers {
            assert!(writer.join().unwrap().is_ok());
        }

        // Updates may be lost, but the file always parses and no temp file lingers.
        let content = std::fs::read_to_string(&path).unwrap();
        let state: State = serde_json::from_str(&content).unwrap();
        assert!(!state.mappings.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
