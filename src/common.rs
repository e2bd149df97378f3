mod applicability;
mod bitset;
mod node;
mod queue;
mod state;
mod task;

pub use applicability::ApplicabilityGraph;
pub use bitset::{BitSet, Ones};
pub use node::{NodeId, SearchNode};
pub use queue::{FixedMaxPriorityQueue, OpenList};
pub use state::{FactHashes, State};
pub use task::{Fact, FactId, Operator, OperatorId, Task};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanStep {
    pub name: String,
    pub args: Vec<String>,
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, ")")
    }
}

/// An ordered sequence of grounded actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Replays the plan from the initial state and checks that it ends in a
    /// goal state.
    pub fn verify(&self, task: &Task, hashes: &FactHashes) -> bool {
        let mut state = State::initial(task, hashes);
        for (index, step) in self.steps.iter().enumerate() {
            let Some(operator) = task.find_operator(&step.name, &step.args) else {
                debug!("step {index} {step} is not an operator of the task");
                return false;
            };
            if !state.is_applicable(operator) {
                debug!("step {index} {step} is not applicable");
                return false;
            }
            state = state.apply(operator, hashes);
        }
        state.satisfies(task.goal_mask())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{step}")?;
        }
        write!(f, "; {} steps", self.steps.len())
    }
}
