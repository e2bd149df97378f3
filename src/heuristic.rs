mod basic;
mod ff;
mod relaxed;

pub use basic::{
    ConstantHeuristic, DepthHeuristic, EffectHeuristic, GoalHeuristic, MaxHeuristic,
    PathHeuristic, SumHeuristic, WeightedHeuristic,
};
pub use ff::{FfHeuristic, RelaxedPlanner};
pub use relaxed::{AdditiveHeuristic, HMaxHeuristic, RelaxedGraph};

use crate::common::{SearchNode, State, Task};
use crate::config::HeuristicConfig;

use anyhow::{ensure, Result};

/// Heuristic value meaning the goal is provably unreachable.
pub const INFINITE: usize = usize::MAX;

/// A state evaluator. `parent` is the node the state was generated from,
/// `None` for the root.
pub trait Heuristic {
    fn value(&mut self, parent: Option<&SearchNode>, state: &State, task: &Task) -> usize;

    /// Calls to `value` since the last `reset`.
    fn evaluations(&self) -> usize;

    /// Clears the counter and any cache tied to a particular task.
    fn reset(&mut self);
}

pub fn build_heuristic(config: &HeuristicConfig) -> Result<Box<dyn Heuristic>> {
    Ok(match config {
        HeuristicConfig::Goal => Box::new(GoalHeuristic::default()),
        HeuristicConfig::Constant { value } => Box::new(ConstantHeuristic::new(*value)),
        HeuristicConfig::Depth => Box::new(DepthHeuristic::default()),
        HeuristicConfig::Path => Box::new(PathHeuristic::default()),
        HeuristicConfig::Weighted { inner, weight } => {
            ensure!(
                weight.is_finite() && *weight >= 0.0,
                "heuristic weight must be finite and non-negative, got {weight}"
            );
            Box::new(WeightedHeuristic::new(build_heuristic(inner)?, *weight))
        }
        HeuristicConfig::Sum { parts } => Box::new(SumHeuristic::new(build_parts(parts)?)),
        HeuristicConfig::Max { parts } => Box::new(MaxHeuristic::new(build_parts(parts)?)),
        HeuristicConfig::Add => Box::new(AdditiveHeuristic::default()),
        HeuristicConfig::Hmax => Box::new(HMaxHeuristic::default()),
        HeuristicConfig::Ff => Box::new(FfHeuristic::default()),
        HeuristicConfig::Effect => Box::new(EffectHeuristic::default()),
    })
}

fn build_parts(parts: &[HeuristicConfig]) -> Result<Vec<Box<dyn Heuristic>>> {
    ensure!(!parts.is_empty(), "combined heuristic needs at least one part");
    parts.iter().map(build_heuristic).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::State;
    use crate::problem::Declaration;
    use crate::translator::{translate, TranslatorContext};

    fn gripper() -> TranslatorContext {
        let declaration = Declaration::from_file("problems/gripper.yaml").unwrap();
        translate(&declaration, None, 0).unwrap()
    }

    #[test]
    fn test_build_composite() {
        let config = HeuristicConfig::Sum {
            parts: vec![
                HeuristicConfig::Path,
                HeuristicConfig::Weighted {
                    inner: Box::new(HeuristicConfig::Goal),
                    weight: 3.0,
                },
            ],
        };
        let mut heuristic = build_heuristic(&config).unwrap();
        let context = gripper();
        let init = State::initial(&context.task, &context.fact_hashes);
        // Root: path 0 plus 3 * two unsatisfied goals.
        assert_eq!(heuristic.value(None, &init, &context.task), 6);
        assert_eq!(heuristic.evaluations(), 1);
        heuristic.reset();
        assert_eq!(heuristic.evaluations(), 0);
    }

    #[test]
    fn test_build_rejects_empty_parts() {
        assert!(build_heuristic(&HeuristicConfig::Max { parts: vec![] }).is_err());
        let config = HeuristicConfig::Weighted {
            inner: Box::new(HeuristicConfig::Ff),
            weight: f64::NAN,
        };
        assert!(build_heuristic(&config).is_err());
    }

    #[test]
    fn test_relaxed_heuristics_are_ordered() {
        let context = gripper();
        let task = &context.task;
        let init = State::initial(task, &context.fact_hashes);

        let hmax = build_heuristic(&HeuristicConfig::Hmax)
            .unwrap()
            .value(None, &init, task);
        let hadd = build_heuristic(&HeuristicConfig::Add)
            .unwrap()
            .value(None, &init, task);
        let hff = build_heuristic(&HeuristicConfig::Ff)
            .unwrap()
            .value(None, &init, task);

        assert_eq!(hmax, 3);
        assert_eq!(hadd, 5);
        assert_eq!(hff, 5);
        assert!(hmax <= hadd);
        assert!(hmax <= hff);
    }

    #[test]
    fn test_unreachable_goal_is_infinite_everywhere() {
        let declaration = Declaration::from_file("problems/unreachable.yaml").unwrap();
        let context = translate(&declaration, None, 0).unwrap();
        let init = State::initial(&context.task, &context.fact_hashes);
        for config in [HeuristicConfig::Add, HeuristicConfig::Hmax, HeuristicConfig::Ff] {
            let mut heuristic = build_heuristic(&config).unwrap();
            assert_eq!(heuristic.value(None, &init, &context.task), INFINITE);
        }
    }
}
