use super::greedy::{finish, Expansion};
use super::{applicable_operators, SearchOutcome, SearchSpace, Solver};
use crate::common::{BitSet, NodeId, OpenList, OperatorId, SearchNode, State};
use crate::heuristic::{Heuristic, RelaxedPlanner, INFINITE};
use crate::stat::Stats;
use crate::termination::CancelToken;
use crate::translator::TranslatorContext;

use std::collections::{BTreeSet, HashSet};
use std::time::Instant;
use tracing::{debug, info, instrument, trace};

/// Bookkeeping of one refinement run.
struct Frontier {
    /// Operators the search may currently use.
    working: BitSet,
    open: OpenList<NodeId>,
    closed: BTreeSet<NodeId>,
    /// Closed nodes whose relaxed plan was already harvested.
    planned: HashSet<NodeId>,
    /// Closed nodes whose every applicable operator was admitted.
    fully_closed: HashSet<NodeId>,
}

/// Greedy search over a growing subset of the operators, starting from
/// those of a relaxed plan for the initial state.
///
/// The subset is widened whenever the search runs dry, hits only dead ends,
/// or stops improving: first with relaxed plans from the most promising
/// closed states, then with everything applicable in them. Closed states
/// that a newly admitted operator applies to are reopened.
pub struct RefinementSearch {
    heuristic: Box<dyn Heuristic>,
    planner: RelaxedPlanner,
    stats: Stats,
}

impl RefinementSearch {
    pub fn new(heuristic: Box<dyn Heuristic>) -> Self {
        RefinementSearch {
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

        let h = self.heuristic.value(None, &init, task);
        let root = space.insert(SearchNode::root(init, h));
        self.stats.generated += 1;
        if space.node(root).state.satisfies(task.goal_mask()) {
            return Expansion::Goal(root);
        }

        let mut frontier = Frontier {
            working: BitSet::from_indices(task.operators().len(), relaxed_plan),
            open: OpenList::new(),
            closed: BTreeSet::new(),
            planned: HashSet::from([root]),
            fully_closed: HashSet::new(),
        };
        frontier.open.enqueue(root, h);
        debug!(
            "starting with {} of {} operators",
            frontier.working.count_ones(),
            task.operators().len()
        );

        let mut stalled = false;
        loop {
            if let Some(reason) = cancel.check() {
                return Expansion::Aborted(reason);
            }

            let blocked = frontier
                .open
                .peek_priority()
                .map_or(true, |priority| priority == INFINITE);
            if blocked || stalled {
                stalled = false;
                let admitted = self.admit(context, space, &mut frontier);
                if admitted.is_empty() {
                    if frontier.open.is_empty() {
                        return Expansion::Exhausted;
                    }
                } else {
                    self.reopen(context, space, &mut frontier, &admitted);
                }
            }

            let Some(current) = frontier.open.dequeue() else {
                continue;
            };
            frontier.closed.insert(current);
            self.stats.expanded += 1;

            let node = space.node(current).clone();
            let mut best = INFINITE;
            for id in
                applicable_operators(context, &node.state, node.operator, Some(&frontier.working))
            {
                let state = node.state.apply(task.operator(id), hashes);
                if space.contains(&state) {
                    continue;
                }
                let h = self.heuristic.value(Some(&node), &state, task);
                let goal = state.satisfies(task.goal_mask());
                let child = space.insert(SearchNode::child(state, current, node.steps, id, h, true));
                self.stats.generated += 1;
                if goal {
                    return Expansion::Goal(child);
                }
                frontier.open.enqueue(child, h);
                best = best.min(h);
            }
            stalled = best >= node.h;
        }
    }

    /// Picks operators to add to the working set; empty when both passes
    /// come up dry.
    fn admit(
        &mut self,
        context: &TranslatorContext,
        space: &SearchSpace,
        frontier: &mut Frontier,
    ) -> Vec<OperatorId> {
        let task = &context.task;
        let mut candidates: Vec<NodeId> = frontier
            .closed
            .iter()
            .copied()
            .filter(|id| !frontier.fully_closed.contains(id))
            .collect();
        candidates.sort_by_key(|&id| (space.node(id).h, id));
        let groups = group_by_h(&candidates, space);

        for group in &groups {
            let mut admitted = BTreeSet::new();
            for &id in *group {
                if !frontier.planned.insert(id) {
                    continue;
                }
                if let Some(plan) = self.planner.plan(&space.node(id).state, task) {
                    admitted.extend(plan.into_iter().filter(|&op| !frontier.working.get(op)));
                }
            }
            if !admitted.is_empty() {
                trace!("relaxed plans admit {} operators", admitted.len());
                return admitted.into_iter().collect();
            }
        }

        for group in &groups {
            let mut admitted = BTreeSet::new();
            for &id in *group {
                frontier.fully_closed.insert(id);
                let node = space.node(id);
                admitted.extend(
                    applicable_operators(context, &node.state, node.operator, None)
                        .into_iter()
                        .filter(|&op| !frontier.working.get(op)),
                );
            }
            if !admitted.is_empty() {
                trace!("applicable operators admit {} operators", admitted.len());
                return admitted.into_iter().collect();
            }
        }
        Vec::new()
    }

    fn reopen(
        &mut self,
        context: &TranslatorContext,
        space: &SearchSpace,
        frontier: &mut Frontier,
        admitted: &[OperatorId],
    ) {
        for &op in admitted {
            frontier.working.set(op, true);
        }
        let enabled: Vec<NodeId> = frontier
            .closed
            .iter()
            .copied()
            .filter(|&id| {
                let node = space.node(id);
                let row = context.graph.successors(node.operator);
                admitted.iter().any(|&op| {
                    row.get(op) && node.state.is_applicable(context.task.operator(op))
                })
            })
            .collect();
        for id in &enabled {
            frontier.closed.remove(id);
            frontier.open.enqueue(*id, space.node(*id).h);
        }
        self.stats.reopened += enabled.len();
        debug!(
            "admitted {} operators ({} in use), reopened {} nodes",
            admitted.len(),
            frontier.working.count_ones(),
            enabled.len()
        );
    }
}

/// Splits nodes sorted by `h` into runs of equal `h`.
fn group_by_h<'a>(sorted: &'a [NodeId], space: &SearchSpace) -> Vec<&'a [NodeId]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for end in 1..=sorted.len() {
        if end == sorted.len() || space.node(sorted[end]).h != space.node(sorted[start]).h {
            groups.push(&sorted[start..end]);
            start = end;
        }
    }
    groups
}

impl Solver for RefinementSearch {
    #[instrument(skip_all, name = "refinement", level = "debug")]
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
        info!("refinement search: {outcome:?}");
        outcome
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }
}
