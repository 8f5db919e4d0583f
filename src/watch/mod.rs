//! Debounced rebuild trigger
//!
//! Change notifications arrive as root-relative file paths. The debouncer is
//! a small actor with three states:
//!
//! - `Idle`: nothing pending
//! - `PendingDebounce`: a delay is running and restarts on every new event
//! - `Rebuilding`: one rebuild is in flight; events arriving now are queued
//!   and start a fresh debounce once it finishes
//!
//! At most one rebuild runs at a time and a burst of events coalesces into a
//! single rebuild call covering every file it touched.

pub mod poller;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;

pub use poller::{relative_path, ChangePoller};

/// Configuration for watching a source tree
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Root directory to watch
    pub root: PathBuf,
    /// File extensions to include (empty = all files)
    pub extensions: Vec<String>,
    /// Directory names to skip anywhere in the tree
    pub exclude_dirs: Vec<String>,
    /// Whether to follow gitignore rules
    pub respect_gitignore: bool,
    /// Files fingerprinted regardless of the filters above, such as the
    /// analyzer output; relative paths are resolved against `root`
    pub tracked_files: Vec<PathBuf>,
    /// Quiet period before a rebuild starts
    pub debounce: Duration,
    /// How often the tree is rescanned
    pub poll_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extensions: vec![
                "go".to_string(),
                "rs".to_string(),
                "ts".to_string(),
                "js".to_string(),
                "py".to_string(),
                "java".to_string(),
            ],
            exclude_dirs: vec![
                "node_modules".to_string(),
                "target".to_string(),
                "dist".to_string(),
                "build".to_string(),
                "vendor".to_string(),
                "testdata".to_string(),
            ],
            respect_gitignore: true,
            tracked_files: Vec::new(),
            debounce: Duration::from_millis(500),
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    Idle,
    PendingDebounce,
    Rebuilding,
}

type RebuildFn = dyn Fn(BTreeSet<String>) -> Result<()> + Send + Sync;

/// Handle to a running debouncer
pub struct Debouncer {
    events: mpsc::UnboundedSender<String>,
    state: watch::Receiver<WatchState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Start the actor. `rebuild` runs on the blocking pool with the set of
    /// files that changed since the previous rebuild.
    pub fn spawn<F>(debounce: Duration, rebuild: F) -> Self
    where
        F: Fn(BTreeSet<String>) -> Result<()> + Send + Sync + 'static,
    {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(WatchState::Idle);
        let cancel = CancellationToken::new();

        let actor = DebounceActor {
            debounce,
            rebuild: Arc::new(rebuild),
            events: events_rx,
            state: state_tx,
            cancel: cancel.clone(),
            pending: BTreeSet::new(),
        };
        let task = tokio::spawn(actor.run());

        Self {
            events: events_tx,
            state: state_rx,
            cancel,
            task,
        }
    }

    /// Report a changed file. Returns false once the debouncer has stopped.
    pub fn notify(&self, file: impl Into<String>) -> bool {
        self.events.send(file.into()).is_ok()
    }

    pub fn notify_all<I, S>(&self, files: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        files.into_iter().all(|f| self.notify(f))
    }

    pub fn state(&self) -> WatchState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WatchState> {
        self.state.clone()
    }

    /// Stop the actor. A rebuild already in flight is allowed to finish;
    /// pending events are dropped.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Debouncer task failed: {}", e);
        }
    }
}

struct DebounceActor {
    debounce: Duration,
    rebuild: Arc<RebuildFn>,
    events: mpsc::UnboundedReceiver<String>,
    state: watch::Sender<WatchState>,
    cancel: CancellationToken,
    pending: BTreeSet<String>,
}

impl DebounceActor {
    async fn run(mut self) {
        let mut state = WatchState::Idle;

        loop {
            self.state.send_replace(state);

            state = match state {
                WatchState::Idle => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        event = self.events.recv() => match event {
                            Some(file) => {
                                self.pending.insert(file);
                                WatchState::PendingDebounce
                            }
                            None => break,
                        },
                    }
                }
                WatchState::PendingDebounce => {
                    // A fresh sleep on every pass restarts the delay
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        event = self.events.recv() => match event {
                            Some(file) => {
                                self.pending.insert(file);
                                WatchState::PendingDebounce
                            }
                            None => break,
                        },
                        _ = tokio::time::sleep(self.debounce) => WatchState::Rebuilding,
                    }
                }
                WatchState::Rebuilding => {
                    self.rebuild_pending().await;
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    if self.pending.is_empty() {
                        WatchState::Idle
                    } else {
                        WatchState::PendingDebounce
                    }
                }
            };
        }

        self.state.send_replace(WatchState::Idle);
        debug!("Debouncer stopped");
    }

    /// Run one rebuild while continuing to collect events
    async fn rebuild_pending(&mut self) {
        let files = std::mem::take(&mut self.pending);
        info!("Rebuilding for {} changed files", files.len());

        let rebuild = Arc::clone(&self.rebuild);
        let mut job = tokio::task::spawn_blocking(move || rebuild(files));

        let mut events_open = true;
        loop {
            tokio::select! {
                result = &mut job => {
                    match result {
                        Ok(Ok(())) => debug!("Rebuild finished"),
                        Ok(Err(e)) => warn!("Rebuild failed: {}", e),
                        Err(e) => warn!("Rebuild task panicked: {}", e),
                    }
                    return;
                }
                event = self.events.recv(), if events_open => match event {
                    Some(file) => {
                        self.pending.insert(file);
                    }
                    None => events_open = false,
                },
            }
        }
    }
}

/// Poll `config.root` until `cancel` fires, feeding changed files to a
/// debouncer that calls `rebuild`.
pub async fn watch_tree<F>(config: WatchConfig, cancel: CancellationToken, rebuild: F) -> Result<()>
where
    F: Fn(BTreeSet<String>) -> Result<()> + Send + Sync + 'static,
{
    let mut poller = ChangePoller::new(config.clone());
    let files = poller.prime()?;
    info!(
        "Watching {} ({} files, debounce {:?})",
        config.root.display(),
        files,
        config.debounce
    );

    let debouncer = Debouncer::spawn(config.debounce, rebuild);
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let scan = tokio::task::spawn_blocking(move || {
            let changed = poller.poll();
            (poller, changed)
        })
        .await;

        let changed = match scan {
            Ok((returned, changed)) => {
                poller = returned;
                changed
            }
            Err(e) => {
                warn!("Poll task failed: {}", e);
                break;
            }
        };

        match changed {
            Ok(files) if !files.is_empty() => {
                debug!("Changed files: {:?}", files);
                if !debouncer.notify_all(files) {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Poll failed: {}", e),
        }
    }

    debouncer.shutdown().await;
    Ok(())
}
