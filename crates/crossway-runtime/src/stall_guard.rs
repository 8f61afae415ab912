//! [`StallGuard`] – detects a STOP wait that is no longer making progress.
//!
//! The STOP stage only finishes once its watch list drains. If a watched
//! obstacle lingers near the stop line the list never changes, and the ego
//! vehicle waits indefinitely. The guard keeps a rolling window of the last
//! `threshold` watch-list snapshots and reports a stall when they are all
//! identical and non-empty. It only reports; it never forces a transition.
//!
//! # Example
//!
//! ```rust
//! use crossway_runtime::stall_guard::StallGuard;
//!
//! let mut guard = StallGuard::new(3);
//! let watched = vec!["v1".to_string()];
//!
//! assert!(!guard.record(&watched));
//! assert!(!guard.record(&watched));
//! assert!(guard.record(&watched)); // third identical tick
//!
//! guard.reset();
//! assert!(!guard.record(&watched));
//! ```

use std::collections::VecDeque;

use crossway_types::ObstacleId;

pub struct StallGuard {
    threshold: usize,
    history: VecDeque<Vec<ObstacleId>>,
}

impl StallGuard {
    /// `threshold` is the number of consecutive identical snapshots that
    /// count as a stall. Values below 1 are treated as 1.
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            threshold,
            history: VecDeque::with_capacity(threshold),
        }
    }

    /// Record this tick's flattened watch list. Returns `true` while stalled.
    pub fn record(&mut self, watched: &[ObstacleId]) -> bool {
        let mut snapshot = watched.to_vec();
        snapshot.sort_unstable();
        self.history.push_back(snapshot);
        while self.history.len() > self.threshold {
            self.history.pop_front();
        }
        self.is_stalled()
    }

    pub fn is_stalled(&self) -> bool {
        if self.history.len() < self.threshold {
            return false;
        }
        let first = &self.history[0];
        !first.is_empty() && self.history.iter().all(|s| s == first)
    }

    /// Forget all snapshots, e.g. when the scenario leaves STOP.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}
