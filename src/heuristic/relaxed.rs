use super::{Heuristic, INFINITE};
use crate::common::{OperatorId, SearchNode, State, Task};

/// Layered reachability under the delete relaxation.
///
/// `fact_layer[f]` is the first layer at which `f` becomes true (0 for the
/// facts of the source state, `INFINITE` if never). `layers[t]` holds the
/// operators first enabled at layer `t`; they add the facts of layer `t + 1`.
#[derive(Debug, Clone)]
pub struct RelaxedGraph {
    pub(crate) fact_layer: Vec<usize>,
    pub(crate) op_layer: Vec<usize>,
    pub(crate) layers: Vec<Vec<OperatorId>>,
    goal_reached: bool,
}

impl RelaxedGraph {
    pub fn build(state: &State, task: &Task) -> Self {
        let operators = task.operators();
        let mut fact_layer = vec![INFINITE; task.fact_count()];
        let mut op_layer = vec![INFINITE; operators.len()];
        let mut layers = Vec::new();

        let mut relaxed = state.bits().clone();
        for fact in relaxed.iter() {
            fact_layer[fact] = 0;
        }

        let mut goal_reached = task.goal_mask().is_subset_of(&relaxed);
        while !goal_reached {
            let layer = layers.len();
            let enabled: Vec<OperatorId> = operators
                .iter()
                .filter(|operator| op_layer[operator.id] == INFINITE && operator.is_applicable(&relaxed))
                .map(|operator| operator.id)
                .collect();
            if enabled.is_empty() {
                break;
            }

            let mut next = relaxed.clone();
            for &id in &enabled {
                next.or(&operators[id].add_mask);
            }
            if next == relaxed {
                break;
            }

            for &id in &enabled {
                op_layer[id] = layer;
                for &fact in &operators[id].add {
                    if fact_layer[fact] == INFINITE {
                        fact_layer[fact] = layer + 1;
                    }
                }
            }
            layers.push(enabled);
            relaxed = next;
            goal_reached = task.goal_mask().is_subset_of(&relaxed);
        }

        RelaxedGraph {
            fact_layer,
            op_layer,
            layers,
            goal_reached,
        }
    }

    pub fn goal_reached(&self) -> bool {
        self.goal_reached
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn fact_layer(&self, fact: usize) -> usize {
        self.fact_layer[fact]
    }

    /// Sum of the goal layers, or `INFINITE` if some goal never appears.
    pub fn additive_cost(&self, task: &Task) -> usize {
        let mut total = 0usize;
        for &goal in task.goal() {
            let layer = self.fact_layer[goal];
            if layer == INFINITE {
                return INFINITE;
            }
            total = total.saturating_add(layer);
        }
        total
    }

    pub fn max_cost(&self, task: &Task) -> usize {
        task.goal()
            .iter()
            .map(|&goal| self.fact_layer[goal])
            .max()
            .unwrap_or(0)
    }
}

/// hAdd
#[derive(Debug, Default)]
pub struct AdditiveHeuristic {
    evaluations: usize,
}

impl Heuristic for AdditiveHeuristic {
    fn value(&mut self, _parent: Option<&SearchNode>, state: &State, task: &Task) -> usize {
        self.evaluations += 1;
        RelaxedGraph::build(state, task).additive_cost(task)
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn reset(&mut self) {
        self.evaluations = 0;
    }
}

/// hMax
#[derive(Debug, Default)]
pub struct HMaxHeuristic {
    evaluations: usize,
}

impl Heuristic for HMaxHeuristic {
    fn value(&mut self, _parent: Option<&SearchNode>, state: &State, task: &Task) -> usize {
        self.evaluations += 1;
        RelaxedGraph::build(state, task).max_cost(task)
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn reset(&mut self) {
        self.evaluations = 0;
    }
}
