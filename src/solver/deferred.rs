use super::greedy::{finish, Expansion};
use super::{applicable_operators, SearchOutcome, SearchSpace, Solver};
use crate::common::{OpenList, SearchNode, State};
use crate::heuristic::{Heuristic, INFINITE};
use crate::stat::Stats;
use crate::termination::CancelToken;
use crate::translator::TranslatorContext;

use std::time::Instant;
use tracing::{info, instrument};

/// Deferred heuristic evaluation (Helmert 2006).
///
/// Successors are evaluated one by one until one beats the parent; the rest
/// of that expansion is queued under the parent's value and evaluated only
/// if popped.
pub struct DeferredSearch {
    heuristic: Box<dyn Heuristic>,
    stats: Stats,
}

impl DeferredSearch {
    pub fn new(heuristic: Box<dyn Heuristic>) -> Self {
        DeferredSearch {
            heuristic,
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

            if !space.node(current).evaluated {
                let node = space.node(current);
                let parent = node.parent.map(|parent| space.node(parent));
                let h = self.heuristic.value(parent, &node.state, task);
                let node = space.node_mut(current);
                node.h = h;
                node.evaluated = true;
            }
            let node = space.node(current).clone();
            if node.h == INFINITE {
                continue;
            }
            self.stats.expanded += 1;

            let mut found_lower = false;
            for id in applicable_operators(context, &node.state, node.operator, None) {
                let state = node.state.apply(task.operator(id), hashes);
                if space.contains(&state) {
                    continue;
                }
                let (h, evaluated) = if found_lower {
                    (node.h, false)
                } else {
                    let h = self.heuristic.value(Some(&node), &state, task);
                    found_lower = h < node.h;
                    (h, true)
                };
                let goal = state.satisfies(task.goal_mask());
                let child =
                    space.insert(SearchNode::child(state, current, node.steps, id, h, evaluated));
                self.stats.generated += 1;
                if goal {
                    return Expansion::Goal(child);
                }
                open.enqueue(child, h);
            }
        }
    }
}

impl Solver for DeferredSearch {
    #[instrument(skip_all, name = "deferred", level = "debug")]
    fn solve(&mut self, context: &TranslatorContext, cancel: &CancelToken) -> SearchOutcome {
        let start = Instant::now();
        self.stats = Stats::default();
        self.heuristic.reset();

        let mut space = SearchSpace::new();
        let expansion = self.run(context, cancel, &mut space);

        self.stats.evaluations = self.heuristic.evaluations();
        self.stats.time_us = start.elapsed().as_micros();
        let outcome = finish(expansion, &space, context, &mut self.stats);
        info!("deferred search: {outcome:?}");
        outcome
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }
}
