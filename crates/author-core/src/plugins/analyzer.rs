//! Background block analysis.

use super::BlockAnalyzerPlugin;
use crate::block::Block;
use crate::project::Project;
use log::{error, trace, warn};
use parking_lot::{Condvar, Mutex};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One scheduled analysis: runs every analyzer plugin over a block at a captured version.
///
/// Before each plugin the block version is compared with the captured one. Once the block has
/// moved on, the remaining plugins are skipped; a newer analysis has been scheduled for it.
pub struct BlockAnalyzer {
    project: Arc<Project>,
    block: Arc<Block>,
    block_version: u64,
    analyzers: Vec<(String, Arc<dyn BlockAnalyzerPlugin>)>,
}

impl BlockAnalyzer {
    /// Create an analysis of `block` at `block_version`.
    pub fn new(
        project: Arc<Project>,
        block: Arc<Block>,
        block_version: u64,
        analyzers: Vec<(String, Arc<dyn BlockAnalyzerPlugin>)>,
    ) -> Self {
        Self {
            project,
            block,
            block_version,
            analyzers,
        }
    }

    /// The version the analysis was scheduled for.
    pub fn block_version(&self) -> u64 {
        self.block_version
    }

    /// Run the plugins in order on the calling thread.
    ///
    /// A plugin returning an error or panicking is logged and does not stop the others.
    pub fn run(&self) {
        let key = self.block.key();
        for (plugin, analyzer) in &self.analyzers {
            if self.block.is_stale(self.block_version) {
                trace!("analysis of block {key} at version {} is stale", self.block_version);
                return;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                analyzer.analyze_block(&self.project, &self.block, self.block_version)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("analyzer '{plugin}' failed on block {key}: {err}"),
                Err(_) => error!("analyzer '{plugin}' panicked on block {key}"),
            }
        }
    }
}

/// Countdown of in-flight analyses.
#[derive(Debug, Default)]
pub(crate) struct AnalysisTracker {
    running: Mutex<usize>,
    idle: Condvar,
}

impl AnalysisTracker {
    pub(crate) fn begin(self: &Arc<Self>) -> AnalysisTicket {
        *self.running.lock() += 1;
        AnalysisTicket {
            tracker: Arc::clone(self),
        }
    }

    pub(crate) fn running(&self) -> usize {
        *self.running.lock()
    }

    pub(crate) fn wait(&self) {
        let mut running = self.running.lock();
        while *running > 0 {
            self.idle.wait(&mut running);
        }
    }

    /// Returns `false` if analyses were still running at the deadline.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut running = self.running.lock();
        while *running > 0 {
            if self.idle.wait_until(&mut running, deadline).timed_out() {
                return *running == 0;
            }
        }
        true
    }
}

/// Keeps one analysis counted until dropped, including when the analysis panics.
pub(crate) struct AnalysisTicket {
    tracker: Arc<AnalysisTracker>,
}

impl Drop for AnalysisTicket {
    fn drop(&mut self) {
        let mut running = self.tracker.running.lock();
        *running = running.saturating_sub(1);
        if *running == 0 {
            self.tracker.idle.notify_all();
        }
    }
}
