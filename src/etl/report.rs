//! Row-count diagnostics emitted at stage checkpoints

use tracing::info;

const SEPARATOR_WIDTH: usize = 80;

/// Rows before and after one filtering step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCount {
    pub stage: &'static str,
    pub step: &'static str,
    pub before: usize,
    pub after: usize,
}

impl FilterCount {
    pub fn excluded(&self) -> usize {
        self.before.saturating_sub(self.after)
    }
}

/// Accumulated filter diagnostics for one run
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    entries: Vec<FilterCount>,
}

impl StageReport {
    pub fn record(&mut self, stage: &'static str, step: &'static str, before: usize, after: usize) {
        let entry = FilterCount {
            stage,
            step,
            before,
            after,
        };
        info!(
            stage,
            step,
            before,
            after,
            excluded = entry.excluded(),
            "{}: {} rows -> {} rows",
            step,
            before,
            after
        );
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[FilterCount] {
        &self.entries
    }

    pub fn find(&self, stage: &str, step: &str) -> Option<&FilterCount> {
        self.entries
            .iter()
            .find(|e| e.stage == stage && e.step == step)
    }

    pub fn excluded_in(&self, stage: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.stage == stage)
            .map(FilterCount::excluded)
            .sum()
    }
}

/// Visual break between pipeline phases in the log
pub fn separator() {
    info!("{}", "-".repeat(SEPARATOR_WIDTH));
}
