//! Registry change notifications.
//!
//! Two producers feed one broadcast channel: filesystem events on the
//! registry file and a periodic poll that catches Compose container state,
//! which never touches the file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ports::{ComposeRuntime, ProcessLiveness};

use super::{Snapshot, StatusReporter};

/// Default interval between status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

const CHANNEL_CAPACITY: usize = 16;

struct Shared<L: ProcessLiveness, R: ComposeRuntime> {
    reporter: StatusReporter<L, R>,
    sender: broadcast::Sender<Snapshot>,
    latest: RwLock<Snapshot>,
}

impl<L: ProcessLiveness, R: ComposeRuntime> Shared<L, R> {
    async fn publish(&self) -> Snapshot {
        let snapshot = match self.reporter.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to read registry");
                Snapshot::new()
            }
        };

        *self.latest.write() = snapshot.clone();
        // No subscribers is fine.
        let _ = self.sender.send(snapshot.clone());
        snapshot
    }
}

/// Publishes registry snapshots to any number of subscribers.
pub struct RegistryWatcher<L: ProcessLiveness, R: ComposeRuntime> {
    shared: Arc<Shared<L, R>>,
    poll_interval: Duration,
}

impl<L, R> RegistryWatcher<L, R>
where
    L: ProcessLiveness + 'static,
    R: ComposeRuntime + 'static,
{
    pub fn new(reporter: StatusReporter<L, R>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                reporter,
                sender,
                latest: RwLock::new(Snapshot::new()),
            }),
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Register a new listener. Dropping the receiver unregisters it.
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.shared.sender.subscribe()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> Snapshot {
        self.shared.latest.read().clone()
    }

    /// Build, cache and broadcast a snapshot now.
    pub async fn refresh(&self) -> Snapshot {
        self.shared.publish().await
    }

    /// Start watching the registry file and polling.
    ///
    /// Both producers stop when the returned handle is dropped.
    pub fn start(&self) -> Result<WatchHandle> {
        let path = self.shared.reporter.registry().path().to_path_buf();
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);

        let watcher = watch_file(path, trigger_tx)?;

        let shared = Arc::clone(&self.shared);
        let poll_interval = self.poll_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    Some(()) = trigger_rx.recv() => {
                        debug!("Registry file changed");
                    }
                }
                shared.publish().await;
            }
        });

        Ok(WatchHandle {
            task,
            _watcher: watcher,
        })
    }
}

/// Watch the directory holding `path` and signal `trigger` on events that
/// touch the file itself. The directory is watched because atomic saves
/// replace the file.
fn watch_file(path: PathBuf, trigger: mpsc::Sender<()>) -> Result<RecommendedWatcher> {
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;

    let file_name = path.file_name().map(|n| n.to_os_string());
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<NotifyEvent>| {
            let Ok(event) = res else {
                return;
            };
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            let touches_file = event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
            if touches_file {
                // A pending trigger already covers this event.
                let _ = trigger.try_send(());
            }
        },
        notify::Config::default(),
    )
    .map_err(|e| Error::Registry(format!("Failed to create watcher: {}", e)))?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|e| Error::Registry(format!("Failed to watch {}: {}", dir.display(), e)))?;

    debug!(dir = %dir.display(), "Watching registry directory");
    Ok(watcher)
}

/// Keeps the watcher alive. Dropping it stops both producers.
pub struct WatchHandle {
    task: JoinHandle<()>,
    _watcher: RecommendedWatcher,
}

impl WatchHandle {
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
