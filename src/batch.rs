use camino::Utf8Path;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::HarvestError;
use crate::listing;

/// Aggregate outcome of one batch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }
}

/// Drives `stage` over every file in `dir` whose name satisfies `predicate`.
/// A stage error degrades only that file to a failure; siblings are always
/// still visited. Each stage closure reads its own input and writes its own
/// output path, so the contract also holds under parallel execution.
pub fn run_batch(
    dir: &Utf8Path,
    predicate: impl Fn(&str) -> bool,
    stage: impl Fn(&str) -> Result<(), HarvestError>,
) -> Result<RunSummary, HarvestError> {
    let candidates = listing::list_matching(dir, predicate)?;
    let mut summary = RunSummary {
        total: candidates.len(),
        succeeded: 0,
    };
    for name in &candidates {
        match stage(name) {
            Ok(()) => summary.succeeded += 1,
            Err(err) => warn!(file = %dir.join(name), error = %err, "stage failed"),
        }
    }
    info!(
        processed = summary.total,
        errors = summary.failed(),
        "batch complete"
    );
    Ok(summary)
}
