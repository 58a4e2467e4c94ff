//! Epoch window and retrain-interval arithmetic.

use crate::prune::config::AutoPruneConfig;

/// Which epochs open, close and commit trials.
///
/// A trial opens at every epoch `e` in `[start, end]` with
/// `(e - start) % interval == 0` and closes at the end of epoch
/// `e + interval - 1`. An interval of 0 behaves like 1 for closing: the
/// trial is scored at the end of the epoch it opened in. The commit happens
/// at the end of `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochSchedule {
    start: usize,
    end: usize,
    interval: usize,
}

impl EpochSchedule {
    pub fn new(start: usize, end: usize, interval: usize) -> Self {
        Self { start, end, interval }
    }

    pub fn from_config(config: &AutoPruneConfig) -> Self {
        Self::new(config.start_epoch(), config.end_epoch(), config.effective_retrain_epoch())
    }

    pub fn interval(&self) -> usize {
        self.interval
    }

    pub fn in_window(&self, epoch: usize) -> bool {
        epoch >= self.start && epoch <= self.end
    }

    /// Whether `on_epoch_begin` may open a trial at `epoch`.
    pub fn opens_at(&self, epoch: usize) -> bool {
        self.in_window(epoch)
            && (self.interval == 0 || (epoch - self.start) % self.interval == 0)
    }

    /// Epoch whose end scores a trial opened at `opened_at`.
    pub fn close_epoch(&self, opened_at: usize) -> usize {
        opened_at + self.interval.max(1) - 1
    }

    pub fn is_commit_epoch(&self, epoch: usize) -> bool {
        epoch == self.end
    }

    /// Whether training should be skipped while a trial is open.
    pub fn skips_training(&self) -> bool {
        self.interval == 0
    }
}
