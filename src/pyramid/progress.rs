//! Progress reporting and cooperative cancellation.
//!
//! Progress is published on a [`tokio::sync::watch`] channel. Sending never
//! blocks and only the latest value is kept, so a slow or absent consumer
//! cannot stall a build.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::ConversionError;

/// Snapshot of a running build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Tiles written so far
    pub tiles_completed: u64,

    /// Tiles the whole pyramid will contain
    pub tiles_total: u64,

    /// Level currently being tiled
    pub level: Option<u32>,
}

impl Progress {
    /// Completion ratio in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.tiles_total == 0 {
            return 0.0;
        }
        (self.tiles_completed as f64 / self.tiles_total as f64).min(1.0)
    }

    /// Whole percent, `0..=100`.
    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).floor() as u8
    }

    pub fn is_complete(&self) -> bool {
        self.tiles_total > 0 && self.tiles_completed >= self.tiles_total
    }
}

/// Create a progress channel for [`ProgressReporter::new`].
pub fn progress_channel() -> (watch::Sender<Progress>, watch::Receiver<Progress>) {
    watch::channel(Progress::default())
}

/// Publishes monotonically increasing [`Progress`] values.
///
/// A reporter without a sender is a no-op.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    sender: Option<watch::Sender<Progress>>,
    completed: AtomicU64,
    total: AtomicU64,
}

impl ProgressReporter {
    pub fn new(sender: watch::Sender<Progress>) -> Self {
        Self {
            sender: Some(sender),
            completed: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Reporter that discards every update.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Reset the counters for a build of `tiles_total` tiles.
    pub fn start(&self, tiles_total: u64) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(tiles_total, Ordering::Relaxed);
        self.publish(Progress {
            tiles_completed: 0,
            tiles_total,
            level: None,
        });
    }

    /// Record `tiles` more finished tiles at `level`.
    pub fn advance(&self, tiles: u64, level: u32) {
        let total = self.total.load(Ordering::Relaxed);
        let completed = (self.completed.fetch_add(tiles, Ordering::Relaxed) + tiles).min(total);
        self.publish(Progress {
            tiles_completed: completed,
            tiles_total: total,
            level: Some(level),
        });
    }

    fn publish(&self, progress: Progress) {
        if let Some(sender) = &self.sender {
            // send_replace succeeds even when every receiver is gone
            sender.send_replace(progress);
        }
    }
}

/// Shared flag requesting cooperative cancellation.
///
/// The builder checks it between bands and between tiles.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), ConversionError> {
        if self.is_cancelled() {
            Err(ConversionError::Cancelled)
        } else {
            Ok(())
        }
    }
}
