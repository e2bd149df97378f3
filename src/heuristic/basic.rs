use super::{Heuristic, INFINITE};
use crate::common::{SearchNode, State, Task};

/// Number of goal facts not yet true.
#[derive(Debug, Default)]
pub struct GoalHeuristic {
    evaluations: usize,
}

impl Heuristic for GoalHeuristic {
    fn value(&mut self, _parent: Option<&SearchNode>, state: &State, task: &Task) -> usize {
        self.evaluations += 1;
        let goal = task.goal_mask();
        goal.count_ones() - goal.intersection_count(state.bits())
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn reset(&mut self) {
        self.evaluations = 0;
    }
}

#[derive(Debug)]
pub struct ConstantHeuristic {
    constant: usize,
    evaluations: usize,
}

impl ConstantHeuristic {
    pub fn new(constant: usize) -> Self {
        ConstantHeuristic {
            constant,
            evaluations: 0,
        }
    }
}

impl Heuristic for ConstantHeuristic {
    fn value(&mut self, _parent: Option<&SearchNode>, _state: &State, _task: &Task) -> usize {
        self.evaluations += 1;
        self.constant
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn reset(&mut self) {
        self.evaluations = 0;
    }
}

/// One less than the parent's value, so deeper nodes are preferred.
///
/// The root starts just below `INFINITE` so it stays finite.
#[derive(Debug, Default)]
pub struct DepthHeuristic {
    evaluations: usize,
}

impl Heuristic for DepthHeuristic {
    fn value(&mut self, parent: Option<&SearchNode>, _state: &State, _task: &Task) -> usize {
        self.evaluations += 1;
        match parent {
            Some(parent) => parent.h.saturating_sub(1),
            None => INFINITE - 1,
        }
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn reset(&mut self) {
        self.evaluations = 0;
    }
}

/// Path cost of the evaluated state, one per step.
#[derive(Debug, Default)]
pub struct PathHeuristic {
    evaluations: usize,
}

impl Heuristic for PathHeuristic {
    fn value(&mut self, parent: Option<&SearchNode>, _state: &State, _task: &Task) -> usize {
        self.evaluations += 1;
        parent.map_or(0, |parent| parent.steps + 1)
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn reset(&mut self) {
        self.evaluations = 0;
    }
}

/// Inner value scaled by `weight`, truncated toward zero.
pub struct WeightedHeuristic {
    inner: Box<dyn Heuristic>,
    weight: f64,
    evaluations: usize,
}

impl WeightedHeuristic {
    pub fn new(inner: Box<dyn Heuristic>, weight: f64) -> Self {
        WeightedHeuristic {
            inner,
            weight,
            evaluations: 0,
        }
    }
}

impl Heuristic for WeightedHeuristic {
    fn value(&mut self, parent: Option<&SearchNode>, state: &State, task: &Task) -> usize {
        self.evaluations += 1;
        let value = self.inner.value(parent, state, task);
        if value == INFINITE {
            return INFINITE;
        }
        // Float to int casts saturate, so huge products clamp to INFINITE.
        (value as f64 * self.weight) as usize
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn reset(&mut self) {
        self.evaluations = 0;
        self.inner.reset();
    }
}

/// Saturating sum of its parts. Every part is evaluated even once the
/// sum is already infinite.
pub struct SumHeuristic {
    parts: Vec<Box<dyn Heuristic>>,
    evaluations: usize,
}

impl SumHeuristic {
    pub fn new(parts: Vec<Box<dyn Heuristic>>) -> Self {
        assert!(!parts.is_empty(), "sum heuristic needs at least one part");
        SumHeuristic {
            parts,
            evaluations: 0,
        }
    }
}

impl Heuristic for SumHeuristic {
    fn value(&mut self, parent: Option<&SearchNode>, state: &State, task: &Task) -> usize {
        self.evaluations += 1;
        let mut total = 0usize;
        for part in &mut self.parts {
            let value = part.value(parent, state, task);
            total = match total.checked_add(value) {
                Some(sum) if value != INFINITE && sum != INFINITE => sum,
                _ => INFINITE,
            };
        }
        total
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn reset(&mut self) {
        self.evaluations = 0;
        self.parts.iter_mut().for_each(|part| part.reset());
    }
}

pub struct MaxHeuristic {
    parts: Vec<Box<dyn Heuristic>>,
    evaluations: usize,
}

impl MaxHeuristic {
    pub fn new(parts: Vec<Box<dyn Heuristic>>) -> Self {
        assert!(!parts.is_empty(), "max heuristic needs at least one part");
        MaxHeuristic {
            parts,
            evaluations: 0,
        }
    }
}

impl Heuristic for MaxHeuristic {
    fn value(&mut self, parent: Option<&SearchNode>, state: &State, task: &Task) -> usize {
        self.evaluations += 1;
        self.parts
            .iter_mut()
            .map(|part| part.value(parent, state, task))
            .fold(0, usize::max)
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn reset(&mut self) {
        self.evaluations = 0;
        self.parts.iter_mut().for_each(|part| part.reset());
    }
}

/// Rewards distance from the initial state: the fewer facts differ from
/// init, the higher the value.
#[derive(Debug, Default)]
pub struct EffectHeuristic {
    evaluations: usize,
}

impl Heuristic for EffectHeuristic {
    fn value(&mut self, _parent: Option<&SearchNode>, state: &State, task: &Task) -> usize {
        self.evaluations += 1;
        task.fact_count() - state.bits().difference_count(task.init_mask())
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn reset(&mut self) {
        self.evaluations = 0;
    }
}
