use serde::Serialize;
use tracing::info;

/// Counters of one search run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub generated: usize,
    pub expanded: usize,
    pub evaluations: usize,
    pub reopened: usize,
    pub plan_length: Option<usize>,
    pub time_us: u128,
}

impl Stats {
    pub fn print(&self) {
        info!(
            "Plan length {:?} Time(microseconds) {:?} Expanded nodes: {:?} Generated nodes: {:?} Heuristic evaluations: {:?} Reopened nodes: {:?}",
            self.plan_length,
            self.time_us,
            self.expanded,
            self.generated,
            self.evaluations,
            self.reopened
        );
    }
}
