//! The propagation engine.
//!
//! Drives a [`Circuit`] to a stable state after an external stimulus with a
//! breadth-first, FIFO work queue: pop a node, commit and forward its value,
//! enqueue its frontier, repeat until the queue drains. Feedback loops settle
//! naturally because a stable node returns an empty frontier; topologies that
//! never settle are cut off by a configurable pop bound.

use std::collections::{HashSet, VecDeque};

use thiserror::Error;

use crate::circuit::Circuit;
use crate::types::Id;

/// Default bound on queue pops per drain.
pub const DEFAULT_MAX_POPS: u64 = 10_000;

/// Raised when a drain exceeds its pop bound.
///
/// This is a recoverable operating condition, not a corruption: values
/// committed before the bound was hit are retained.
#[derive(Error, Debug)]
pub enum PropagationError {
    #[error("simulation did not settle after {pops} queue pops")]
    DidNotSettle {
        /// Queue pops consumed before giving up
        pops: u64,
    },
}

/// Summary of one completed drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Queue pops consumed reaching the fixed point
    pub pops: u64,
}

/// Statistics collected by the propagation engine.
#[derive(Clone, Debug, Default)]
pub struct EngineStats {
    /// Completed drains
    pub drains: u64,
    /// Total queue pops across all drains
    pub pops: u64,
    /// Drains aborted by the pop bound
    pub unsettled_drains: u64,
    /// Largest queue length observed
    pub peak_queue: usize,
}

/// Queue-based fixed-point driver for a circuit.
///
/// The engine is single-threaded and synchronous: a drain runs to completion
/// on the calling thread, and change events fire in the exact order nodes
/// settle, which is deterministic given deterministic seed order.
pub struct PropagationEngine {
    max_pops: u64,
    stats: EngineStats,
}

impl Default for PropagationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PropagationEngine {
    /// Creates an engine with the default pop bound.
    pub fn new() -> Self {
        Self {
            max_pops: DEFAULT_MAX_POPS,
            stats: EngineStats::default(),
        }
    }

    /// Sets the pop bound per drain.
    pub fn with_max_pops(mut self, max_pops: u64) -> Self {
        self.max_pops = max_pops;
        self
    }

    /// Returns the configured pop bound.
    pub fn max_pops(&self) -> u64 {
        self.max_pops
    }

    /// Drains the queue seeded with the given nodes until the circuit is
    /// quiescent.
    ///
    /// One drain corresponds to one discrete simulation step. FIFO discipline
    /// is preserved, and a node already queued in this pass is not enqueued
    /// twice (it may re-enter after being popped, which is how feedback loops
    /// converge).
    pub fn drain(
        &mut self,
        circuit: &mut Circuit,
        seeds: impl IntoIterator<Item = Id>,
    ) -> Result<DrainReport, PropagationError> {
        let mut queue: VecDeque<Id> = VecDeque::new();
        let mut queued: HashSet<Id> = HashSet::new();

        for seed in seeds {
            if queued.insert(seed.clone()) {
                queue.push_back(seed);
            }
        }

        let mut pops: u64 = 0;
        while let Some(id) = queue.pop_front() {
            queued.remove(&id);
            pops += 1;
            if pops > self.max_pops {
                self.stats.pops += pops;
                self.stats.unsettled_drains += 1;
                tracing::warn!(pops, "drain aborted: circuit did not settle");
                return Err(PropagationError::DidNotSettle { pops });
            }

            for next in circuit.propagate_node(&id) {
                if queued.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
            self.stats.peak_queue = self.stats.peak_queue.max(queue.len());
        }

        self.stats.drains += 1;
        self.stats.pops += pops;
        tracing::debug!(pops, "drain settled");
        Ok(DrainReport { pops })
    }

    /// Returns the engine statistics.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Exports statistics as JSON.
    pub fn export_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "max_pops": self.max_pops,
            "drains": self.stats.drains,
            "pops": self.stats.pops,
            "unsettled_drains": self.stats.unsettled_drains,
            "peak_queue": self.stats.peak_queue,
        })
    }
}
