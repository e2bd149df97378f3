use super::{applicable_operators, SearchOutcome, SearchSpace, Solver};
use crate::common::{NodeId, OpenList, SearchNode, State};
use crate::heuristic::Heuristic;
use crate::stat::Stats;
use crate::termination::{AbortReason, CancelToken};
use crate::translator::TranslatorContext;

use std::time::Instant;
use tracing::{debug, info, instrument};

/// How a best-first run over a `SearchSpace` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expansion {
    Goal(NodeId),
    Exhausted,
    /// The expansion budget ran out first.
    Budget,
    Aborted(AbortReason),
}

/// Greedy best-first search with generation-time goal test. Every generated
/// state lands in `space`, open or closed.
pub(crate) fn best_first(
    context: &TranslatorContext,
    heuristic: &mut dyn Heuristic,
    cancel: &CancelToken,
    stats: &mut Stats,
    space: &mut SearchSpace,
    budget: Option<usize>,
) -> Expansion {
    let task = &context.task;
    let hashes = &context.fact_hashes;

    let init = State::initial(task, hashes);
    let h = heuristic.value(None, &init, task);
    let root = space.insert(SearchNode::root(init, h));
    stats.generated += 1;
    if space.node(root).state.satisfies(task.goal_mask()) {
        return Expansion::Goal(root);
    }

    let mut open = OpenList::new();
    open.enqueue(root, h);
    let mut expanded = 0;

    loop {
        if let Some(reason) = cancel.check() {
            return Expansion::Aborted(reason);
        }
        if budget.is_some_and(|budget| expanded >= budget) {
            return Expansion::Budget;
        }
        let Some(current) = open.dequeue() else {
            return Expansion::Exhausted;
        };
        expanded += 1;
        stats.expanded += 1;

        let node = space.node(current).clone();
        for id in applicable_operators(context, &node.state, node.operator, None) {
            let state = node.state.apply(task.operator(id), hashes);
            if space.contains(&state) {
                continue;
            }
            let h = heuristic.value(Some(&node), &state, task);
            let goal = state.satisfies(task.goal_mask());
            let child = space.insert(SearchNode::child(state, current, node.steps, id, h, true));
            stats.generated += 1;
            if goal {
                return Expansion::Goal(child);
            }
            open.enqueue(child, h);
        }
    }
}

/// Turns the end of a run into a plan (or the reason there is none).
pub(crate) fn finish(
    expansion: Expansion,
    space: &SearchSpace,
    context: &TranslatorContext,
    stats: &mut Stats,
) -> SearchOutcome {
    match expansion {
        Expansion::Goal(node) => {
            let plan = space.plan(node, &context.task);
            stats.plan_length = Some(plan.len());
            SearchOutcome::Solved(plan)
        }
        Expansion::Exhausted | Expansion::Budget => SearchOutcome::Unsolvable,
        Expansion::Aborted(reason) => SearchOutcome::Aborted(reason),
    }
}

pub struct GreedySearch {
    heuristic: Box<dyn Heuristic>,
    stats: Stats,
}

impl GreedySearch {
    pub fn new(heuristic: Box<dyn Heuristic>) -> Self {
        GreedySearch {
            heuristic,
            stats: Stats::default(),
        }
    }
}

impl Solver for GreedySearch {
    #[instrument(skip_all, name = "greedy", level = "debug")]
    fn solve(&mut self, context: &TranslatorContext, cancel: &CancelToken) -> SearchOutcome {
        let start = Instant::now();
        self.stats = Stats::default();
        self.heuristic.reset();

        let mut space = SearchSpace::new();
        let expansion = best_first(
            context,
            self.heuristic.as_mut(),
            cancel,
            &mut self.stats,
            &mut space,
            None,
        );
        debug!("greedy search ended with {expansion:?} after {} nodes", space.len());

        self.stats.evaluations = self.heuristic.evaluations();
        self.stats.time_us = start.elapsed().as_micros();
        let outcome = finish(expansion, &space, context, &mut self.stats);
        info!("greedy search: {outcome:?}");
        outcome
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::{ConstantHeuristic, FfHeuristic, GoalHeuristic};
    use crate::solver::test_support::{init_tracing, load};

    #[test]
    fn test_solves_fixtures() {
        init_tracing();
        for path in [
            "problems/gripper.yaml",
            "problems/blocks.yaml",
            "problems/delivery.yaml",
        ] {
            let context = load(path);
            let mut solver = GreedySearch::new(Box::new(FfHeuristic::default()));
            let outcome = solver.solve(&context, &CancelToken::new());
            let plan = outcome.plan().unwrap_or_else(|| panic!("{path}: {outcome:?}"));
            assert!(plan.verify(&context.task, &context.fact_hashes), "{path}");
            assert!(plan.len() >= 6, "{path}");
            assert!(solver.stats().expanded > 0);
            assert!(solver.stats().evaluations >= solver.stats().expanded);
        }
    }

    #[test]
    fn test_exhausts_unsolvable_tasks() {
        init_tracing();
        for path in ["problems/trap.yaml", "problems/unreachable.yaml"] {
            let context = load(path);
            let mut solver = GreedySearch::new(Box::new(GoalHeuristic::default()));
            assert_eq!(
                solver.solve(&context, &CancelToken::new()),
                SearchOutcome::Unsolvable,
                "{path}"
            );
            assert_eq!(solver.stats().plan_length, None);
        }
    }

    #[test]
    fn test_blind_search_still_solves() {
        let context = load("problems/gripper.yaml");
        let mut solver = GreedySearch::new(Box::new(ConstantHeuristic::new(0)));
        let outcome = solver.solve(&context, &CancelToken::new());
        assert!(outcome
            .plan()
            .is_some_and(|plan| plan.verify(&context.task, &context.fact_hashes)));
    }

    #[test]
    fn test_cancelled_token_aborts() {
        let context = load("problems/blocks.yaml");
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut solver = GreedySearch::new(Box::new(FfHeuristic::default()));
        assert_eq!(
            solver.solve(&context, &cancel),
            SearchOutcome::Aborted(AbortReason::Cancelled)
        );
        // Only the root was generated.
        assert_eq!(solver.stats().generated, 1);
        assert_eq!(solver.stats().expanded, 0);
    }

    #[test]
    fn test_budget_stops_early() {
        let context = load("problems/blocks.yaml");
        let mut heuristic = ConstantHeuristic::new(1);
        let mut stats = Stats::default();
        let mut space = SearchSpace::new();
        let expansion = best_first(
            &context,
            &mut heuristic,
            &CancelToken::new(),
            &mut stats,
            &mut space,
            Some(2),
        );
        assert_eq!(expansion, Expansion::Budget);
        assert_eq!(stats.expanded, 2);
        assert!(space.len() > 2);
    }
}
