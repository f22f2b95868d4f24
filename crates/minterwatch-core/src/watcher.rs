//! The watcher: a single control task pairing a reader with a handler.
//!
//! Each poll cycle drains every block the reader has available, handing
//! them to the handler one at a time, then sleeps for whatever is left of
//! the poll interval. A pause request is honored between blocks and wakes a
//! sleeping cycle early; an error stops the task and is kept for [`ActionWatcher::info`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::WatchError;
use crate::handler::BlockHandler;
use crate::reader::BlockReader;
use crate::types::{HandlerInfo, ReaderInfo};

/// Watcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Time between the starts of two poll cycles (milliseconds).
    pub poll_interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
        }
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Derived lifecycle status of a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexingStatus {
    /// Never started.
    Initial,
    /// Polling and processing blocks.
    Indexing,
    /// Pause requested; finishing the block in flight.
    Pausing,
    /// Stopped on request.
    Paused,
    /// Halted by an error.
    Stopped,
}

impl std::fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "Initial"),
            Self::Indexing => write!(f, "Indexing"),
            Self::Pausing => write!(f, "Pausing"),
            Self::Paused => write!(f, "Paused"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Snapshot of a watcher, its reader and its handler.
#[derive(Debug, Clone)]
pub struct WatcherInfo {
    pub indexing_status: IndexingStatus,
    pub error: Option<Arc<WatchError>>,
    pub handler: HandlerInfo,
    pub reader: ReaderInfo,
}

#[derive(Debug)]
struct RunFlags {
    clean: bool,
    running: bool,
    should_pause: bool,
    error: Option<Arc<WatchError>>,
    reader: ReaderInfo,
    handler: HandlerInfo,
}

impl RunFlags {
    fn status(&self) -> IndexingStatus {
        if self.clean {
            return IndexingStatus::Initial;
        }
        if self.running && !self.should_pause {
            return IndexingStatus::Indexing;
        }
        if self.running && self.should_pause {
            return IndexingStatus::Pausing;
        }
        if self.error.is_some() {
            return IndexingStatus::Stopped;
        }
        IndexingStatus::Paused
    }
}

struct Pipeline<R, H> {
    reader: R,
    handler: H,
}

struct Shared<R, H> {
    pipeline: tokio::sync::Mutex<Pipeline<R, H>>,
    flags: Mutex<RunFlags>,
    pause: Notify,
    poll_interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<R: BlockReader, H: BlockHandler> Shared<R, H> {
    fn flags(&self) -> MutexGuard<'_, RunFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(self: Arc<Self>) {
        tracing::info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "watcher started");
        loop {
            {
                let mut flags = self.flags();
                if flags.should_pause {
                    flags.running = false;
                    flags.should_pause = false;
                    tracing::info!(
                        block = flags.handler.last_processed_block_height,
                        "watcher paused"
                    );
                    return;
                }
            }

            let started = Instant::now();
            if let Err(e) = self.check_for_blocks().await {
                tracing::error!(error = %e, "watcher stopped");
                let mut flags = self.flags();
                flags.running = false;
                flags.should_pause = false;
                flags.error = Some(Arc::new(e));
                return;
            }

            // Register for the wake-up before re-checking the flag so a pause
            // landing in between is not missed.
            let notified = self.pause.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.flags().should_pause {
                continue;
            }

            let remaining = self.poll_interval.saturating_sub(started.elapsed());
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                _ = notified => {}
            }
        }
    }

    /// Drain every block currently available, checking for a pause between blocks.
    async fn check_for_blocks(&self) -> Result<(), WatchError> {
        let mut pipeline = self.pipeline.lock().await;
        let Pipeline { reader, handler } = &mut *pipeline;

        let mut head_block_height: Option<u64> = None;
        while head_block_height.map_or(true, |head| reader.info().current_block_height < head) {
            let pause_requested = self.flags().should_pause;
            if pause_requested {
                return Ok(());
            }

            let next_block = reader.get_next_block().await;
            self.flags().reader = reader.info();
            let next_block = next_block?;

            if !next_block.block_meta.is_new_block {
                break;
            }

            handler.handle_block(&next_block).await?;
            self.flags().handler = handler.info();

            head_block_height = Some(reader.info().head_block_height);
        }
        Ok(())
    }
}

/// Polls a reader and feeds new blocks to a handler on a background task.
pub struct ActionWatcher<R, H> {
    shared: Arc<Shared<R, H>>,
}

impl<R, H> ActionWatcher<R, H>
where
    R: BlockReader + 'static,
    H: BlockHandler + 'static,
{
    pub fn new(reader: R, handler: H, config: WatcherConfig) -> Self {
        let flags = RunFlags {
            clean: true,
            running: false,
            should_pause: false,
            error: None,
            reader: reader.info(),
            handler: handler.info(),
        };
        Self {
            shared: Arc::new(Shared {
                pipeline: tokio::sync::Mutex::new(Pipeline { reader, handler }),
                flags: Mutex::new(flags),
                pause: Notify::new(),
                poll_interval: config.poll_interval(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Start polling. Returns `false` if the watcher is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        {
            let mut flags = self.shared.flags();
            if flags.running {
                return false;
            }
            flags.running = true;
            flags.clean = false;
            flags.error = None;
        }

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(shared.run());
        *self
            .shared
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        true
    }

    /// Request a pause at the next safe point. Returns `false` if not running.
    pub fn pause(&self) -> bool {
        {
            let mut flags = self.shared.flags();
            if !flags.running {
                return false;
            }
            flags.should_pause = true;
        }
        // Wakes only a sleeping cycle; no permit outlives the control task.
        self.shared.pause.notify_waiters();
        true
    }

    pub fn info(&self) -> WatcherInfo {
        let flags = self.shared.flags();
        WatcherInfo {
            indexing_status: flags.status(),
            error: flags.error.clone(),
            handler: flags.handler.clone(),
            reader: flags.reader,
        }
    }

    /// Wait for the current control task (if any) to exit.
    pub async fn stopped(&self) {
        let handle = self
            .shared
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "watcher task panicked");
            }
        }
    }
}
