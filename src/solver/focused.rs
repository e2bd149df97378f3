use super::greedy::{best_first, finish, Expansion};
use super::{MacroLibrary, SearchOutcome, SearchSpace, Solver};
use crate::config::MacroConfig;
use crate::heuristic::{EffectHeuristic, Heuristic, PathHeuristic, SumHeuristic};
use crate::stat::Stats;
use crate::termination::CancelToken;
use crate::translator::{translate, TranslatorContext};

use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Greedy search over the task extended with macro operators learned from a
/// short exploratory search.
pub struct FocusedSearch {
    heuristic: Box<dyn Heuristic>,
    config: MacroConfig,
    stats: Stats,
    learned: usize,
}

impl FocusedSearch {
    pub fn new(heuristic: Box<dyn Heuristic>, config: MacroConfig) -> Self {
        FocusedSearch {
            heuristic,
            config,
            stats: Stats::default(),
            learned: 0,
        }
    }

    /// Macros injected by the last run.
    pub fn learned(&self) -> usize {
        self.learned
    }

    fn explore(
        &mut self,
        context: &TranslatorContext,
        cancel: &CancelToken,
        space: &mut SearchSpace,
    ) -> Expansion {
        let mut explorer = SumHeuristic::new(vec![
            Box::new(PathHeuristic::default()),
            Box::new(EffectHeuristic::default()),
        ]);
        let expansion = best_first(
            context,
            &mut explorer,
            cancel,
            &mut self.stats,
            space,
            Some(self.config.exploration_expansions),
        );
        self.stats.evaluations += explorer.evaluations();
        expansion
    }

    fn augment(
        &self,
        context: &TranslatorContext,
        library: &MacroLibrary,
        cancel: &CancelToken,
    ) -> Option<TranslatorContext> {
        let declaration = context
            .declaration
            .with_actions(library.schemas().iter().cloned());
        let budget = Duration::from_millis(self.config.translate_time_limit_ms);
        let budget = cancel.remaining().map_or(budget, |left| left.min(budget));
        match translate(&declaration, Some(budget), context.seed) {
            Ok(augmented) => Some(augmented),
            Err(error) => {
                warn!("macro translation failed, searching without macros: {error}");
                None
            }
        }
    }

    fn run(&mut self, context: &TranslatorContext, cancel: &CancelToken) -> SearchOutcome {
        let mut space = SearchSpace::new();
        let expansion = self.explore(context, cancel, &mut space);
        if expansion != Expansion::Budget {
            info!("exploration ended the search: {expansion:?}");
            return finish(expansion, &space, context, &mut self.stats);
        }

        let library = MacroLibrary::learn(&space, &context.task, &context.declaration, &self.config);
        let augmented = if library.is_empty() {
            None
        } else {
            self.augment(context, &library, cancel)
        };
        self.learned = if augmented.is_some() { library.len() } else { 0 };
        info!("searching with {} macros", self.learned);

        let target = augmented.as_ref().unwrap_or(context);
        let mut space = SearchSpace::new();
        let expansion = best_first(
            target,
            self.heuristic.as_mut(),
            cancel,
            &mut self.stats,
            &mut space,
            None,
        );
        match finish(expansion, &space, target, &mut self.stats) {
            SearchOutcome::Solved(plan) => {
                let plan = library.expand_plan(plan);
                if plan.verify(&context.task, &context.fact_hashes) {
                    self.stats.plan_length = Some(plan.len());
                    return SearchOutcome::Solved(plan);
                }
                warn!("expanded macro plan does not replay, searching without macros");
                self.learned = 0;
                self.stats.plan_length = None;
                let mut space = SearchSpace::new();
                let expansion = best_first(
                    context,
                    self.heuristic.as_mut(),
                    cancel,
                    &mut self.stats,
                    &mut space,
                    None,
                );
                finish(expansion, &space, context, &mut self.stats)
            }
            outcome => outcome,
        }
    }
}

impl Solver for FocusedSearch {
    #[instrument(skip_all, name = "focused", level = "debug")]
    fn solve(&mut self, context: &TranslatorContext, cancel: &CancelToken) -> SearchOutcome {
        let start = Instant::now();
        self.stats = Stats::default();
        self.learned = 0;
        self.heuristic.reset();

        let outcome = self.run(context, cancel);

        self.stats.evaluations += self.heuristic.evaluations();
        self.stats.time_us = start.elapsed().as_micros();
        info!("focused search: {outcome:?}");
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
    use crate::solver::test_support::{init_tracing, load};
    use crate::termination::AbortReason;

    fn short_exploration() -> MacroConfig {
        MacroConfig {
            exploration_expansions: 3,
            macro_count: 3,
            max_length: 2,
            ..MacroConfig::default()
        }
    }

    #[test]
    fn test_learns_macros_and_expands_plan() {
        init_tracing();
        for path in ["problems/blocks.yaml", "problems/delivery.yaml"] {
            let context = load(path);
            let mut solver =
                FocusedSearch::new(Box::new(FfHeuristic::default()), short_exploration());
            let outcome = solver.solve(&context, &CancelToken::new());
            let plan = outcome.plan().unwrap_or_else(|| panic!("{path}: {outcome:?}"));

            // Only primitive actions survive expansion.
            assert!(plan.steps.iter().all(|step| !step.name.starts_with("macro-")));
            assert!(plan.verify(&context.task, &context.fact_hashes), "{path}");
            assert!(plan.len() >= 6);
            assert_eq!(solver.stats().plan_length, Some(plan.len()));
        }
    }

    #[test]
    fn test_exploration_can_finish_alone() {
        let context = load("problems/gripper.yaml");
        let config = MacroConfig {
            exploration_expansions: 10_000,
            ..MacroConfig::default()
        };
        let mut solver = FocusedSearch::new(Box::new(FfHeuristic::default()), config);
        let outcome = solver.solve(&context, &CancelToken::new());
        assert!(outcome
            .plan()
            .is_some_and(|plan| plan.verify(&context.task, &context.fact_hashes)));
        assert_eq!(solver.learned(), 0);
    }

    #[test]
    fn test_unsolvable_and_cancelled() {
        let context = load("problems/trap.yaml");
        let mut solver = FocusedSearch::new(Box::new(GoalHeuristic::default()), short_exploration());
        assert_eq!(
            solver.solve(&context, &CancelToken::new()),
            SearchOutcome::Unsolvable
        );

        let context = load("problems/blocks.yaml");
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(
            solver.solve(&context, &cancel),
            SearchOutcome::Aborted(AbortReason::Cancelled)
        );
    }
}
