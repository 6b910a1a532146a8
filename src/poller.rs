//! Ingestion poller - backfill then periodic incremental polling.
//!
//! One spawned task owns the cursor and drives the whole sequence:
//! seed the cursor from the store, drain the backlog as fast as the
//! source allows, then poll on a fixed interval until cancelled or a
//! fetch fails. Batches are applied write-then-advance, so a crash
//! between the store write and the cursor update is safe to replay;
//! the idempotent insert absorbs the re-delivered tail window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::Result;
use crate::repository::DelegationRepository;
use crate::translate::translate_batch;
use crate::transport::DelegationSource;

/// How much of the source has been consumed: a pagination offset and
/// the exclusive lower bound for the next fetch. Empty `last_seen`
/// means "fetch from the beginning".
///
/// The offset is approximate by design: overlapping windows can
/// re-deliver records, and duplicates still count. The id-deduplicating
/// insert keeps the store correct regardless of the drift; the offset
/// is only a forward-progress hint to the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub offset: u64,
    pub last_seen: String,
}

/// Outcome of one successful fetch-and-apply step.
#[derive(Debug)]
struct Applied {
    /// Records fetched (not records newly stored).
    fetched: u64,
    /// Timestamp of the batch's last element, or the unchanged cursor
    /// when the batch was empty.
    last_seen: String,
}

pub struct Poller {
    repo: Arc<dyn DelegationRepository>,
    source: Arc<dyn DelegationSource>,
    tick_interval: Duration,
    started: AtomicBool,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl Poller {
    pub fn new(
        repo: Arc<dyn DelegationRepository>,
        source: Arc<dyn DelegationSource>,
        tick_interval: Duration,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            repo,
            source,
            tick_interval,
            started: AtomicBool::new(false),
            cancel_tx,
            cancel_rx,
        }
    }

    /// Launch the backfill-then-poll sequence on its own task and
    /// return immediately. Idempotent: a second call is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            poller.run().await;
        });
    }

    /// Signal cooperative cancellation. Observed between poll ticks;
    /// a running backfill completes first.
    pub fn stop(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Whether the cancellation signal has been set, by `stop()` or by
    /// a fatal poll error.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    async fn run(&self) {
        let mut cursor = self.seed();
        self.backfill(&mut cursor).await;
        self.poll(&mut cursor).await;
    }

    /// Reconstruct the cursor from the store's latest record in the
    /// current calendar-year partition. A miss or a store error is not
    /// a fault; it just means "fetch from the beginning".
    fn seed(&self) -> Cursor {
        let mut cursor = Cursor::default();
        let year = Utc::now().year();
        match self.repo.latest_delegation(year) {
            Ok(Some(latest)) if !latest.timestamp.is_empty() => {
                info!(timestamp = %latest.timestamp, "Seeded cursor from stored delegation");
                cursor.last_seen = latest.timestamp;
            }
            Ok(_) => info!("No stored delegation for {}, starting from the beginning", year),
            Err(e) => info!("Could not seed cursor ({}), starting from the beginning", e),
        }
        cursor
    }

    /// One fetch against the source, translated and written to the
    /// store. Duplicates still advance the cursor: a fetched batch is
    /// evidence its window has been covered.
    async fn fetch_and_apply(&self, offset: u64, cursor_ts: &str) -> Result<Applied> {
        let raw = self.source.fetch(offset, cursor_ts).await?;
        if raw.is_empty() {
            return Ok(Applied {
                fetched: 0,
                last_seen: cursor_ts.to_string(),
            });
        }

        let batch = translate_batch(&raw)?;
        self.repo.insert_batch(&batch)?;

        // Batches arrive timestamp-ascending, so the last element is
        // the new exclusive lower bound.
        let last_seen = batch
            .last()
            .map(|d| d.timestamp.clone())
            .unwrap_or_else(|| cursor_ts.to_string());

        Ok(Applied {
            fetched: raw.len() as u64,
            last_seen,
        })
    }

    /// Drain the backlog in a tight loop until the source reports an
    /// empty page. An error aborts the backfill (logged, not retried);
    /// the poller proceeds to steady-state polling regardless.
    async fn backfill(&self, cursor: &mut Cursor) {
        info!("Starting backfill");
        loop {
            match self.fetch_and_apply(0, &cursor.last_seen).await {
                Ok(applied) if applied.fetched == 0 => {
                    info!("No more delegations to fetch, backfill complete");
                    return;
                }
                Ok(applied) => {
                    cursor.offset += applied.fetched;
                    cursor.last_seen = applied.last_seen;
                    info!(
                        count = applied.fetched,
                        offset = cursor.offset,
                        last_seen = %cursor.last_seen,
                        "Applied backfill batch"
                    );
                }
                Err(e) => {
                    error!("Backfill aborted: {}", e);
                    return;
                }
            }
        }
    }

    /// Steady-state loop: one fetch-and-apply per tick. An empty batch
    /// is the normal caught-up state; any error stops the poller
    /// permanently (fail-stop, restart is the supervisor's job).
    async fn poll(&self, cursor: &mut Cursor) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        // interval fires immediately; swallow that so the first real
        // poll waits one full tick after backfill
        ticker.tick().await;

        let mut cancel = self.cancel_rx.clone();
        loop {
            tokio::select! {
                _ = async { let _ = cancel.wait_for(|&cancelled| cancelled).await; } => {
                    info!("Polling stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.fetch_and_apply(cursor.offset, &cursor.last_seen).await {
                        Ok(applied) if applied.fetched == 0 => {
                            info!("No new delegations found, continuing to poll");
                        }
                        Ok(applied) => {
                            cursor.offset += applied.fetched;
                            cursor.last_seen = applied.last_seen;
                            info!(
                                count = applied.fetched,
                                offset = cursor.offset,
                                last_seen = %cursor.last_seen,
                                "Applied polled batch"
                            );
                        }
                        Err(e) => {
                            error!("Polling failed, stopping poller: {}", e);
                            self.stop();
                            return;
                        }
                    }
                }
            }
        }
    }
}
