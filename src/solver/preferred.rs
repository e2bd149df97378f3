use super::greedy::{finish, Expansion};
use super::{applicable_operators, SearchOutcome, SearchSpace, Solver};
use crate::common::{BitSet, NodeId, OpenList, OperatorId, SearchNode, State};
use crate::heuristic::{Heuristic, RelaxedPlanner};
use crate::stat::Stats;
use crate::termination::CancelToken;
use crate::translator::TranslatorContext;

use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Queue {
    Normal,
    Preferred,
}

impl Queue {
    /// Operators an expansion from this queue may apply. The preferred queue
    /// only follows relaxed-plan operators.
    fn successors(
        self,
        context: &TranslatorContext,
        node: &SearchNode,
        preferred_ops: &BitSet,
    ) -> Vec<OperatorId> {
        let allowed = match self {
            Queue::Normal => None,
            Queue::Preferred => Some(preferred_ops),
        };
        applicable_operators(context, &node.state, node.operator, allowed)
    }
}

/// Greedy search with a second open list restricted to the operators of a
/// relaxed plan from the initial state. The two lists take turns.
pub struct PreferredSearch {
    heuristic: Box<dyn Heuristic>,
    planner: RelaxedPlanner,
    stats: Stats,
}

impl PreferredSearch {
    pub fn new(heuristic: Box<dyn Heuristic>) -> Self {
        PreferredSearch {
            heuristic,
            planner: RelaxedPlanner::new(),
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
        let Some(relaxed_plan) = self.planner.plan(&init, task) else {
            debug!("no relaxed plan from the initial state");
            return Expansion::Exhausted;
        };
        let preferred_ops = BitSet::from_indices(task.operators().len(), relaxed_plan);
        debug!("{} preferred operators", preferred_ops.count_ones());

        let h = self.heuristic.value(None, &init, task);
        let root = space.insert(SearchNode::root(init, h));
        self.stats.generated += 1;
        if space.node(root).state.satisfies(task.goal_mask()) {
            return Expansion::Goal(root);
        }

        let mut normal = OpenList::new();
        let mut preferred = OpenList::new();
        let mut normal_seen: HashSet<NodeId> = HashSet::from([root]);
        let mut preferred_seen: HashSet<NodeId> = HashSet::from([root]);
        normal.enqueue(root, h);
        preferred.enqueue(root, h);

        let mut iteration = 0usize;
        loop {
            if let Some(reason) = cancel.check() {
                return Expansion::Aborted(reason);
            }
            let turn = if iteration % 2 == 0 {
                Queue::Normal
            } else {
                Queue::Preferred
            };
            iteration += 1;

            let (queue, current) = match (turn, normal.is_empty(), preferred.is_empty()) {
                (_, true, true) => return Expansion::Exhausted,
                (Queue::Normal, false, _) | (Queue::Preferred, false, true) => {
                    (Queue::Normal, normal.dequeue())
                }
                _ => (Queue::Preferred, preferred.dequeue()),
            };
            let Some(current) = current else {
                continue;
            };
            self.stats.expanded += 1;

            let node = space.node(current).clone();
            for id in queue.successors(context, &node, &preferred_ops) {
                let state = node.state.apply(task.operator(id), hashes);
                let (child, h) = match space.lookup(&state) {
                    Some(existing) => (existing, space.node(existing).h),
                    None => {
                        let h = self.heuristic.value(Some(&node), &state, task);
                        let goal = state.satisfies(task.goal_mask());
                        let child =
                            space.insert(SearchNode::child(state, current, node.steps, id, h, true));
                        self.stats.generated += 1;
                        if goal {
                            return Expansion::Goal(child);
                        }
                        (child, h)
                    }
                };

                if queue == Queue::Normal && normal_seen.insert(child) {
                    normal.enqueue(child, h);
                }
                if preferred_seen.insert(child) {
                    preferred.enqueue(child, h);
                }
            }
        }
    }
}

impl Solver for PreferredSearch {
    #[instrument(skip_all, name = "preferred", level = "debug")]
    fn solve(&mut self, context: &TranslatorContext, cancel: &CancelToken) -> SearchOutcome {
        let start = Instant::now();
        self.stats = Stats::default();
        self.heuristic.reset();
        self.planner.reset();

        let mut space = SearchSpace::new();
        let expansion = self.run(context, cancel, &mut space);

        self.stats.evaluations = self.heuristic.evaluations();
        self.stats.time_us = start.elapsed().as_micros();
        let outcome = finish(expansion, &space, context, &mut self.stats);
        info!("preferred operators search: {outcome:?}");
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

    // `detour` is applicable from the start but never helps reach `done`.
    const DETOUR: &str = r#"
name: detour
objects: [x]
actions:
  - name: finish
    precondition: ["ready x"]
    add: ["done x"]
  - name: detour
    precondition: ["ready x"]
    add: ["lost x"]
    delete: ["ready x"]
init: ["ready x"]
goal: ["done x"]
"#;

    #[test]
    fn test_preferred_queue_follows_relaxed_plan_only() {
        let declaration = Declaration::from_yaml_str(DETOUR).unwrap();
        let context = translate(&declaration, None, 0).unwrap();
        let task = &context.task;
        let detour = task.find_operator("detour", &[]).unwrap().id;
        let finish = task.find_operator("finish", &[]).unwrap().id;

        let init = State::initial(task, &context.fact_hashes);
        let relaxed_plan = RelaxedPlanner::new().plan(&init, task).unwrap();
        assert_eq!(relaxed_plan, vec![finish]);
        let preferred_ops = BitSet::from_indices(task.operators().len(), relaxed_plan);

        let root = SearchNode::root(init, 1);
        let mut normal = Queue::Normal.successors(&context, &root, &preferred_ops);
        normal.sort_unstable();
        let mut expected = vec![detour, finish];
        expected.sort_unstable();
        assert_eq!(normal, expected);
        assert_eq!(
            Queue::Preferred.successors(&context, &root, &preferred_ops),
            vec![finish]
        );

        let mut solver = PreferredSearch::new(Box::new(GoalHeuristic::default()));
        let plan = solver.solve(&context, &CancelToken::new()).plan().cloned().unwrap();
        assert!(plan.verify(task, &context.fact_hashes));
    }

    #[test]
    fn test_solves_fixtures() {
        init_tracing();
        for path in [
            "problems/gripper.yaml",
            "problems/blocks.yaml",
            "problems/delivery.yaml",
        ] {
            let context = load(path);
            let mut solver = PreferredSearch::new(Box::new(FfHeuristic::default()));
            let outcome = solver.solve(&context, &CancelToken::new());
            let plan = outcome.plan().unwrap_or_else(|| panic!("{path}: {outcome:?}"));
            assert!(plan.verify(&context.task, &context.fact_hashes), "{path}");
            assert!(plan.len() >= 6);
        }
    }

    #[test]
    fn test_no_relaxed_plan_is_unsolvable() {
        let context = load("problems/unreachable.yaml");
        let mut solver = PreferredSearch::new(Box::new(GoalHeuristic::default()));
        assert_eq!(
            solver.solve(&context, &CancelToken::new()),
            SearchOutcome::Unsolvable
        );
        // Nothing was searched.
        assert_eq!(solver.stats().generated, 0);
    }

    #[test]
    fn test_relaxed_trap_is_exhausted() {
        let context = load("problems/trap.yaml");
        let mut solver = PreferredSearch::new(Box::new(GoalHeuristic::default()));
        assert_eq!(
            solver.solve(&context, &CancelToken::new()),
            SearchOutcome::Unsolvable
        );
        assert!(solver.stats().expanded >= 1);
    }

    #[test]
    fn test_cancelled() {
        let context = load("problems/gripper.yaml");
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut solver = PreferredSearch::new(Box::new(FfHeuristic::default()));
        assert_eq!(
            solver.solve(&context, &cancel),
            SearchOutcome::Aborted(AbortReason::Cancelled)
        );
    }
}
