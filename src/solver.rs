mod beam;
mod deferred;
mod focused;
mod greedy;
mod lazy;
mod macros;
mod preferred;
mod refinement;
mod space;

pub use beam::BeamSearch;
pub use deferred::DeferredSearch;
pub use focused::FocusedSearch;
pub use greedy::GreedySearch;
pub use lazy::LazySearch;
pub use macros::{MacroExpansion, MacroLibrary};
pub use preferred::PreferredSearch;
pub use refinement::RefinementSearch;
pub use space::SearchSpace;

use crate::common::{BitSet, OperatorId, Plan, State};
use crate::config::{Config, Strategy};
use crate::heuristic::build_heuristic;
use crate::stat::Stats;
use crate::termination::{AbortReason, CancelToken};
use crate::translator::TranslatorContext;

use anyhow::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Solved(Plan),
    /// The reachable space was exhausted without generating a goal state.
    Unsolvable,
    Aborted(AbortReason),
}

impl SearchOutcome {
    pub fn plan(&self) -> Option<&Plan> {
        match self {
            SearchOutcome::Solved(plan) => Some(plan),
            _ => None,
        }
    }
}

pub trait Solver {
    fn solve(&mut self, context: &TranslatorContext, cancel: &CancelToken) -> SearchOutcome;

    fn stats(&self) -> &Stats;
}

pub fn build_solver(config: &Config) -> Result<Box<dyn Solver>> {
    let heuristic = build_heuristic(&config.heuristic)?;
    Ok(match config.strategy {
        Strategy::Greedy => Box::new(GreedySearch::new(heuristic)),
        Strategy::Lazy => Box::new(LazySearch::new(heuristic)),
        Strategy::Deferred => Box::new(DeferredSearch::new(heuristic)),
        Strategy::Preferred => Box::new(PreferredSearch::new(heuristic)),
        Strategy::Beam => Box::new(BeamSearch::new(heuristic, config.beam_width)),
        Strategy::Refinement => Box::new(RefinementSearch::new(heuristic)),
        Strategy::Focused => Box::new(FocusedSearch::new(heuristic, config.macros.clone())),
    })
}

/// Operators worth trying after `from` fired (per the applicability graph)
/// that are applicable in `state`, optionally restricted to `allowed`.
pub(crate) fn applicable_operators(
    context: &TranslatorContext,
    state: &State,
    from: Option<OperatorId>,
    allowed: Option<&BitSet>,
) -> Vec<OperatorId> {
    context
        .graph
        .successors(from)
        .iter()
        .filter(|&id| allowed.map_or(true, |allowed| allowed.get(id)))
        .filter(|&id| state.is_applicable(context.task.operator(id)))
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::problem::Declaration;
    use crate::translator::{translate, TranslatorContext};

    pub(crate) fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("trace")
            .try_init();
    }

    pub(crate) fn load(path: &str) -> TranslatorContext {
        let declaration = Declaration::from_file(path).unwrap();
        translate(&declaration, None, 0).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{init_tracing, load};
    use super::*;
    use crate::config::HeuristicConfig;

    #[test]
    fn test_every_strategy_solves_gripper() {
        init_tracing();
        let context = load("problems/gripper.yaml");
        for strategy in [
            Strategy::Greedy,
            Strategy::Lazy,
            Strategy::Deferred,
            Strategy::Preferred,
            Strategy::Beam,
            Strategy::Refinement,
            Strategy::Focused,
        ] {
            let config = Config {
                strategy,
                heuristic: HeuristicConfig::Ff,
                ..Config::default()
            };
            let mut solver = build_solver(&config).unwrap();
            let outcome = solver.solve(&context, &CancelToken::new());
            let plan = outcome.plan().unwrap_or_else(|| panic!("{strategy:?}: {outcome:?}"));
            assert!(plan.verify(&context.task, &context.fact_hashes), "{strategy:?}");
            assert!(plan.len() >= 6, "{strategy:?}");
            assert_eq!(solver.stats().plan_length, Some(plan.len()));
        }
    }

    #[test]
    fn test_applicable_operators_respect_allowed_set() {
        let context = load("problems/gripper.yaml");
        let init = State::initial(&context.task, &context.fact_hashes);
        let all = applicable_operators(&context, &init, None, None);
        // move to either room, pick ball1.
        assert_eq!(all.len(), 3);

        let allowed = BitSet::from_indices(context.task.operators().len(), [all[0]]);
        assert_eq!(
            applicable_operators(&context, &init, None, Some(&allowed)),
            vec![all[0]]
        );
    }
}
