use super::{BitSet, OperatorId, Task};

use std::collections::HashMap;
use tracing::debug;

/// Which operators are worth testing for applicability after a given
/// operator fired. Built once per task, read-only afterwards.
#[derive(Debug, Clone)]
pub enum ApplicabilityGraph {
    /// Every operator is a candidate successor of every other.
    Full { all: BitSet },
    Pruned {
        rows: Vec<BitSet>,
        /// Operators applicable in the literal initial state; seeds the first
        /// expansion.
        initial: BitSet,
    },
}

impl ApplicabilityGraph {
    pub fn build(task: &Task) -> Self {
        let operator_count = task.operators().len();
        let mut all = BitSet::full(operator_count);
        all.compute_bounds();

        // Argument sharing: two operators are linked if they mention the same
        // object.
        let mut by_object: HashMap<&str, BitSet> = HashMap::new();
        for operator in task.operators() {
            for arg in &operator.args {
                by_object
                    .entry(arg.as_str())
                    .or_insert_with(|| BitSet::new(operator_count))
                    .set(operator.id, true);
            }
        }

        let mut sharing = Vec::with_capacity(operator_count);
        for operator in task.operators() {
            let mut row = BitSet::new(operator_count);
            row.set(operator.id, true);
            for arg in &operator.args {
                if let Some(users) = by_object.get(arg.as_str()) {
                    row.or(users);
                }
            }
            sharing.push(row);
        }

        if sharing.iter().any(|row| row.count_ones() == operator_count) {
            debug!("an operator shares arguments with all others, using full applicability graph");
            return ApplicabilityGraph::Full { all };
        }

        // Precondition graph: fact -> operators requiring it.
        let mut consumers = vec![BitSet::new(operator_count); task.fact_count()];
        for operator in task.operators() {
            for &fact in &operator.pre {
                consumers[fact].set(operator.id, true);
            }
        }

        let mut initial = BitSet::new(operator_count);
        for operator in task.operators() {
            if operator.is_applicable(task.init_mask()) {
                initial.set(operator.id, true);
            }
        }

        let rows = task
            .operators()
            .iter()
            .zip(sharing)
            .map(|(operator, mut row)| {
                for &fact in &operator.add {
                    row.or(&consumers[fact]);
                }
                row.or(&initial);
                row.compute_bounds();
                row
            })
            .collect();
        initial.compute_bounds();

        ApplicabilityGraph::Pruned { rows, initial }
    }

    /// Candidate operators after `from` fired; `None` means the initial state.
    pub fn successors(&self, from: Option<OperatorId>) -> &BitSet {
        match self {
            ApplicabilityGraph::Full { all } => all,
            ApplicabilityGraph::Pruned { rows, initial } => match from {
                Some(operator) => &rows[operator],
                None => initial,
            },
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, ApplicabilityGraph::Full { .. })
    }
}
