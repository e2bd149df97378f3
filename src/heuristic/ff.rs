use super::relaxed::RelaxedGraph;
use super::{Heuristic, INFINITE};
use crate::common::{BitSet, FactId, Operator, OperatorId, SearchNode, State, Task};

/// Extracts relaxed plans (Hoffmann and Nebel backward extraction).
///
/// Caches the achievers of every fact for the task it last saw; `reset`
/// drops the cache so the planner can move to a re-translated task.
#[derive(Debug, Default)]
pub struct RelaxedPlanner {
    achievers: Option<Vec<Vec<OperatorId>>>,
    compiled_for: Option<(usize, usize)>,
}

impl RelaxedPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.achievers = None;
        self.compiled_for = None;
    }

    /// Operators of a relaxed plan from `state`, in layer order, or `None`
    /// when the goal is unreachable even without deletes.
    pub fn plan(&mut self, state: &State, task: &Task) -> Option<Vec<OperatorId>> {
        let graph = RelaxedGraph::build(state, task);
        if !graph.goal_reached() {
            return None;
        }
        let achievers = self.achievers(task);
        Some(extract(&graph, task, achievers))
    }

    fn achievers(&mut self, task: &Task) -> &[Vec<OperatorId>] {
        let key = (task.fact_count(), task.operators().len());
        if self.compiled_for != Some(key) {
            self.achievers = None;
            self.compiled_for = Some(key);
        }
        self.achievers.get_or_insert_with(|| {
            let mut achievers = vec![Vec::new(); task.fact_count()];
            for operator in task.operators() {
                for &fact in &operator.add {
                    achievers[fact].push(operator.id);
                }
            }
            achievers
        })
    }
}

fn difficulty(graph: &RelaxedGraph, operator: &Operator) -> usize {
    operator
        .pre
        .iter()
        .map(|&fact| graph.fact_layer[fact])
        .min()
        .unwrap_or(0)
}

fn extract(graph: &RelaxedGraph, task: &Task, achievers: &[Vec<OperatorId>]) -> Vec<OperatorId> {
    let depth = task
        .goal()
        .iter()
        .map(|&goal| graph.fact_layer[goal])
        .max()
        .unwrap_or(0);

    let mut needed: Vec<Vec<FactId>> = vec![Vec::new(); depth + 1];
    for &goal in task.goal() {
        needed[graph.fact_layer[goal]].push(goal);
    }
    // marked[t]: facts already made true at layer t by a selected operator.
    let mut marked = vec![BitSet::new(task.fact_count()); depth + 1];
    let mut selected = Vec::new();

    for layer in (1..=depth).rev() {
        let goals = std::mem::take(&mut needed[layer]);
        for fact in goals {
            if marked[layer].get(fact) {
                continue;
            }
            let best = achievers[fact]
                .iter()
                .copied()
                .filter(|&id| graph.op_layer[id] == layer - 1)
                .min_by_key(|&id| difficulty(graph, task.operator(id)));
            let Some(id) = best else {
                continue;
            };
            selected.push(id);

            let operator = task.operator(id);
            for &pre in &operator.pre {
                let pre_layer = graph.fact_layer[pre];
                if pre_layer != 0 && !marked[layer - 1].get(pre) {
                    needed[pre_layer].push(pre);
                }
            }
            for &add in &operator.add {
                marked[layer].set(add, true);
                marked[layer - 1].set(add, true);
            }
        }
    }

    selected.reverse();
    selected
}

/// hFF: length of the extracted relaxed plan.
#[derive(Debug, Default)]
pub struct FfHeuristic {
    planner: RelaxedPlanner,
    evaluations: usize,
}

impl Heuristic for FfHeuristic {
    fn value(&mut self, _parent: Option<&SearchNode>, state: &State, task: &Task) -> usize {
        self.evaluations += 1;
        self.planner
            .plan(state, task)
            .map_or(INFINITE, |plan| plan.len())
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn reset(&mut self) {
        self.evaluations = 0;
        self.planner.reset();
    }
}
