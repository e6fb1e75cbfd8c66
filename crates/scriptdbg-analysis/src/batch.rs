//! Debounced collection of changed files.
//!
//! Bursts of file events (project load, rapid saves) are coalesced into a
//! pending set that is only flushed once no file was added for a full tick
//! interval.

use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::clock::Clock;
use crate::file::{FileHandle, FileId};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Default number of files flushed per tick (`available cores * 4`).
#[must_use]
pub fn default_flush_threshold() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .saturating_mul(4)
}

#[derive(Debug, Default)]
struct PendingBatch {
    files: IndexMap<FileId, FileHandle>,
    last_added: Option<Duration>,
}

#[derive(Debug)]
pub struct BatchCollector<C: Clock> {
    clock: C,
    tick_interval: Duration,
    threshold: usize,
    pending: Mutex<PendingBatch>,
}

impl<C: Clock> BatchCollector<C> {
    pub fn new(clock: C, tick_interval: Duration, threshold: usize) -> Self {
        Self {
            clock,
            tick_interval,
            threshold: threshold.max(1),
            pending: Mutex::new(PendingBatch::default()),
        }
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Add files to the pending batch and restart the quiet period.
    pub fn add_files<I>(&self, files: I)
    where
        I: IntoIterator<Item = FileHandle>,
    {
        let mut files = files.into_iter().peekable();
        if files.peek().is_none() {
            return;
        }
        let mut pending = self.pending.lock();
        for file in files {
            pending.files.entry(file.id()).or_insert(file);
        }
        pending.last_added = Some(self.clock.now());
    }

    /// Flush up to `threshold` files once the quiet period has elapsed.
    pub fn tick(&self) -> Option<Vec<FileHandle>> {
        let mut pending = self.pending.lock();
        if pending.files.is_empty() {
            return None;
        }
        let last_added = pending.last_added.unwrap_or_default();
        let elapsed = self.clock.now().saturating_sub(last_added);
        if elapsed <= self.tick_interval {
            return None;
        }
        let count = pending.files.len().min(self.threshold);
        let flushed: Vec<FileHandle> = pending.files.drain(..count).map(|(_, file)| file).collect();
        debug!(
            flushed = flushed.len(),
            remaining = pending.files.len(),
            "flushing pending analysis batch"
        );
        Some(flushed)
    }

    pub fn clear(&self) {
        let mut pending = self.pending.lock();
        pending.files.clear();
        pending.last_added = None;
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::file::PluginId;

    fn handles(range: std::ops::Range<u32>) -> Vec<FileHandle> {
        range
            .map(|id| FileHandle::new(FileId(id), format!("/p/{id}.lua"), PluginId::new("lua")))
            .collect()
    }

    #[test]
    fn flushes_once_after_quiet_period() {
        let clock = ManualClock::new();
        let collector = BatchCollector::new(clock.clone(), DEFAULT_TICK_INTERVAL, 64);
        collector.add_files(handles(0..5));
        clock.advance(Duration::from_millis(30));
        collector.add_files(handles(3..8));

        clock.advance(Duration::from_millis(80));
        assert!(collector.tick().is_none(), "quiet period restarted by second add");

        clock.advance(Duration::from_millis(30));
        let flushed = collector.tick().expect("flush after quiet period");
        let ids: Vec<u32> = flushed.iter().map(|file| file.id().0).collect();
        assert_eq!(ids, [0, 1, 2, 3, 4, 5, 6, 7]);

        clock.advance(Duration::from_millis(500));
        assert!(collector.tick().is_none());
        assert_eq!(collector.pending_len(), 0);
    }

    #[test]
    fn elapsed_equal_to_interval_does_not_flush() {
        let clock = ManualClock::new();
        let collector = BatchCollector::new(clock.clone(), DEFAULT_TICK_INTERVAL, 64);
        collector.add_files(handles(0..1));
        clock.advance(DEFAULT_TICK_INTERVAL);
        assert!(collector.tick().is_none());
        clock.advance(Duration::from_millis(1));
        assert!(collector.tick().is_some());
    }

    #[test]
    fn threshold_limits_each_flush_oldest_first() {
        let clock = ManualClock::new();
        let collector = BatchCollector::new(clock.clone(), DEFAULT_TICK_INTERVAL, 4);
        collector.add_files(handles(0..10));
        clock.advance(Duration::from_millis(150));

        let first: Vec<u32> = collector.tick().unwrap().iter().map(|f| f.id().0).collect();
        let second: Vec<u32> = collector.tick().unwrap().iter().map(|f| f.id().0).collect();
        let third: Vec<u32> = collector.tick().unwrap().iter().map(|f| f.id().0).collect();
        assert_eq!(first, [0, 1, 2, 3]);
        assert_eq!(second, [4, 5, 6, 7]);
        assert_eq!(third, [8, 9]);
        assert!(collector.tick().is_none());
    }

    #[test]
    fn empty_add_keeps_previous_timestamp() {
        let clock = ManualClock::new();
        let collector = BatchCollector::new(clock.clone(), DEFAULT_TICK_INTERVAL, 8);
        collector.add_files(handles(0..2));
        clock.advance(Duration::from_millis(90));
        collector.add_files(Vec::new());
        clock.advance(Duration::from_millis(20));
        assert_eq!(collector.tick().map(|files| files.len()), Some(2));
    }

    #[test]
    fn clear_drops_pending_files() {
        let clock = ManualClock::new();
        let collector = BatchCollector::new(clock.clone(), DEFAULT_TICK_INTERVAL, 8);
        collector.add_files(handles(0..3));
        collector.clear();
        clock.advance(Duration::from_secs(1));
        assert!(collector.tick().is_none());
    }

    #[test]
    fn default_threshold_scales_with_cores() {
        assert!(default_flush_threshold() >= 4);
        assert_eq!(default_flush_threshold() % 4, 0);
    }
}
