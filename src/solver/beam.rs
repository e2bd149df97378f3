use super::greedy::{finish, Expansion};
use super::{applicable_operators, SearchOutcome, SearchSpace, Solver};
use crate::common::{FixedMaxPriorityQueue, OpenList, OperatorId, SearchNode, State};
use crate::heuristic::Heuristic;
use crate::stat::Stats;
use crate::termination::CancelToken;
use crate::translator::TranslatorContext;

use std::cmp::Reverse;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{info, instrument, trace};

/// Greedy search keeping only the `width` best successors of each
/// expansion. Discarded successors are forgotten and may be regenerated
/// later from another parent.
pub struct BeamSearch {
    heuristic: Box<dyn Heuristic>,
    width: usize,
    stats: Stats,
}

impl BeamSearch {
    pub fn new(heuristic: Box<dyn Heuristic>, width: usize) -> Self {
        assert!(width > 0, "beam width must be positive");
        BeamSearch {
            heuristic,
            width,
            stats: Stats::default(),
        }
    }

    fn run(
        &mut self,
        context: &TranslatorContext,
        cancel: &CancelToken,
        space: &mut SearchSpace,
    ) -> Expansion {
        let task = &context.task;
        let hashes = &context.fact_hashes;

        let init = State::initial(task, hashes);
        let h = self.heuristic.value(None, &init, task);
        let root = space.insert(SearchNode::root(init, h));
        self.stats.generated += 1;
        if space.node(root).state.satisfies(task.goal_mask()) {
            return Expansion::Goal(root);
        }

        let mut open = OpenList::new();
        open.enqueue(root, h);

        loop {
            if let Some(reason) = cancel.check() {
                return Expansion::Aborted(reason);
            }
            let Some(current) = open.dequeue() else {
                return Expansion::Exhausted;
            };
            self.stats.expanded += 1;

            let node = space.node(current).clone();
            let mut beam: FixedMaxPriorityQueue<(State, OperatorId, usize), Reverse<usize>> =
                FixedMaxPriorityQueue::new(self.width);
            // Two operators may lead to the same state; it takes one slot.
            let mut offered: HashSet<State> = HashSet::new();
            for id in applicable_operators(context, &node.state, node.operator, None) {
                let state = node.state.apply(task.operator(id), hashes);
                if space.contains(&state) || offered.contains(&state) {
                    continue;
                }
                let h = self.heuristic.value(Some(&node), &state, task);
                self.stats.generated += 1;
                if state.satisfies(task.goal_mask()) {
                    let child =
                        space.insert(SearchNode::child(state, current, node.steps, id, h, true));
                    return Expansion::Goal(child);
                }
                offered.insert(state.clone());
                beam.enqueue((state, id, h), Reverse(h));
            }
            if offered.len() > beam.len() {
                trace!("beam kept {} of {} successors", beam.len(), offered.len());
            }

            for (state, id, h) in beam.into_sorted_vec() {
                let child = space.insert(SearchNode::child(state, current, node.steps, id, h, true));
                open.enqueue(child, h);
            }
        }
    }
}

impl Solver for BeamSearch {
    #[instrument(skip_all, name = "beam", fields(width = self.width), level = "debug")]
    fn solve(&mut self, context: &TranslatorContext, cancel: &CancelToken) -> SearchOutcome {
        let start = Instant::now();
        self.stats = Stats::default();
        self.heuristic.reset();

        let mut space = SearchSpace::new();
        let expansion = self.run(context, cancel, &mut space);

        self.stats.evaluations = self.heuristic.evaluations();
        self.stats.time_us = start.elapsed().as_micros();
        let outcome = finish(expansion, &space, context, &mut self.stats);
        info!("beam search: {outcome:?}");
        outcome
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::{FfHeuristic, GoalHeuristic};
    use crate::problem::Declaration;
    use crate::solver::test_support::{init_tracing, load};
    use crate::termination::AbortReason;
    use crate::translator::translate;
    use std::collections::HashSet;

    // Two operators lead from `s` to the dead end `a`; only `b` reaches `g`.
    const TWIN_DEAD_END: &str = r#"
name: twin-dead-end
objects: [s, a, b, g]
actions:
  - name: toa1
    precondition: ["at s"]
    add: ["at a"]
    delete: ["at s"]
  - name: toa2
    precondition: ["at s"]
    add: ["at a"]
    delete: ["at s"]
  - name: tob
    precondition: ["at s"]
    add: ["at b"]
    delete: ["at s"]
  - name: tog
    precondition: ["at b"]
    add: ["at g"]
    delete: ["at b"]
init: ["at s"]
goal: ["at g"]
"#;

    #[test]
    fn test_solves_fixtures() {
        init_tracing();
        for path in [
            "problems/gripper.yaml",
            "problems/blocks.yaml",
            "problems/delivery.yaml",
        ] {
            let context = load(path);
            let mut solver = BeamSearch::new(Box::new(FfHeuristic::default()), 3);
            let outcome = solver.solve(&context, &CancelToken::new());
            let plan = outcome.plan().unwrap_or_else(|| panic!("{path}: {outcome:?}"));
            assert!(plan.verify(&context.task, &context.fact_hashes), "{path}");
        }
    }

    #[test]
    fn test_width_one_keeps_a_single_child() {
        for path in ["problems/gripper.yaml", "problems/blocks.yaml"] {
            let context = load(path);
            let mut solver = BeamSearch::new(Box::new(FfHeuristic::default()), 1);
            let mut space = SearchSpace::new();
            let expansion = solver.run(&context, &CancelToken::new(), &mut space);
            assert!(!matches!(expansion, Expansion::Aborted(_)), "{path}");

            // Each expansion records at most one child, so the space is a chain.
            let mut parents = HashSet::new();
            for node in space.nodes() {
                if let Some(parent) = node.parent {
                    assert!(parents.insert(parent), "{path}: node {parent} has two children");
                }
            }
            assert!(solver.stats.expanded <= space.len());
        }
    }

    #[test]
    fn test_duplicate_successor_takes_one_slot() {
        init_tracing();
        let declaration = Declaration::from_yaml_str(TWIN_DEAD_END).unwrap();
        let context = translate(&declaration, None, 0).unwrap();
        assert_eq!(context.task.operators().len(), 4);

        let mut solver = BeamSearch::new(Box::new(GoalHeuristic::default()), 2);
        let outcome = solver.solve(&context, &CancelToken::new());
        let plan = outcome.plan().unwrap_or_else(|| panic!("{outcome:?}"));
        assert!(plan.verify(&context.task, &context.fact_hashes));
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_unsolvable() {
        let context = load("problems/trap.yaml");
        let mut solver = BeamSearch::new(Box::new(GoalHeuristic::default()), 2);
        assert_eq!(
            solver.solve(&context, &CancelToken::new()),
            SearchOutcome::Unsolvable
        );
    }

    #[test]
    fn test_cancelled() {
        let context = load("problems/blocks.yaml");
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut solver = BeamSearch::new(Box::new(FfHeuristic::default()), 2);
        assert_eq!(
            solver.solve(&context, &cancel),
            SearchOutcome::Aborted(AbortReason::Cancelled)
        );
    }

    #[test]
    #[should_panic]
    fn test_zero_width_panics() {
        BeamSearch::new(Box::new(GoalHeuristic::default()), 0);
    }
}
