use crate::common::{ApplicabilityGraph, Fact, FactHashes, FactId, Operator, Task};
use crate::problem::{is_variable, ActionSchema, Atom, Declaration};

use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("{owner}: variable {variable} is not a declared parameter")]
    UnboundVariable { owner: String, variable: String },

    #[error("{owner}: unknown object {object}")]
    UnknownObject { owner: String, object: String },

    #[error("predicate {predicate} used with {found} arguments, expected {expected}")]
    ArityMismatch {
        predicate: String,
        expected: usize,
        found: usize,
    },

    #[error("translation exceeded its time limit of {0:?}")]
    TimedOut(Duration),
}

/// Everything a search run needs about one finalized task.
///
/// Replaced wholesale whenever the task changes (macro injection); never
/// mutated in place.
#[derive(Debug, Clone)]
pub struct TranslatorContext {
    pub task: Task,
    pub declaration: Declaration,
    pub fact_hashes: FactHashes,
    pub graph: ApplicabilityGraph,
    pub seed: u64,
}

#[instrument(skip_all, name = "translate", fields(problem = declaration.name.as_str()), level = "debug")]
pub fn translate(
    declaration: &Declaration,
    time_limit: Option<Duration>,
    seed: u64,
) -> Result<TranslatorContext, TranslateError> {
    validate(declaration)?;

    let mut grounder = Grounder::new(declaration, time_limit);
    grounder.run()?;

    let mut atoms: Vec<Atom> = grounder.reachable.iter().cloned().collect();
    atoms.sort();
    let mut facts: IndexSet<Atom> = atoms.into_iter().collect();
    for goal in &declaration.goal {
        // Unreachable goals still need an id so the goal mask can name them.
        facts.insert(goal.clone());
    }
    let fact_count = facts.len();

    let mut ground: Vec<(usize, Vec<String>)> = grounder.ground.into_iter().collect();
    ground.sort();

    let mut operators = Vec::with_capacity(ground.len());
    for (action_index, args) in ground {
        let action = &declaration.actions[action_index];
        let lookup = |atoms: &[Atom]| -> Option<Vec<FactId>> {
            let mut ids = atoms
                .iter()
                .map(|atom| facts.get_index_of(&substitute(atom, action, &args)))
                .collect::<Option<Vec<_>>>()?;
            ids.sort_unstable();
            ids.dedup();
            Some(ids)
        };
        let Some(pre) = lookup(&action.precondition) else {
            continue;
        };
        let Some(add) = lookup(&action.add) else {
            continue;
        };
        // Deleting a fact that can never hold is a no-op.
        let mut del: Vec<FactId> = action
            .delete
            .iter()
            .filter_map(|atom| facts.get_index_of(&substitute(atom, action, &args)))
            .collect();
        del.sort_unstable();
        del.dedup();

        operators.push(Operator::new(
            operators.len(),
            &action.name,
            args,
            pre,
            add,
            del,
            fact_count,
        ));
    }

    let init = fact_ids(&facts, &declaration.init);
    let goal = fact_ids(&facts, &declaration.goal);
    let facts = facts
        .iter()
        .enumerate()
        .map(|(id, atom)| Fact::new(id, &atom.predicate, &atom.args))
        .collect();

    let task = Task::new(facts, operators, init, goal);
    let fact_hashes = FactHashes::new(task.fact_count(), seed);
    let graph = ApplicabilityGraph::build(&task);
    info!(
        "translated {}: {} facts, {} operators, full applicability graph: {}",
        declaration.name,
        task.fact_count(),
        task.operators().len(),
        graph.is_full()
    );

    Ok(TranslatorContext {
        task,
        declaration: declaration.clone(),
        fact_hashes,
        graph,
        seed,
    })
}

fn fact_ids(facts: &IndexSet<Atom>, atoms: &[Atom]) -> Vec<FactId> {
    let mut ids: Vec<FactId> = atoms
        .iter()
        .filter_map(|atom| facts.get_index_of(atom))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn substitute(atom: &Atom, action: &ActionSchema, args: &[String]) -> Atom {
    Atom {
        predicate: atom.predicate.clone(),
        args: atom
            .args
            .iter()
            .map(|term| {
                if is_variable(term) {
                    action
                        .parameters
                        .iter()
                        .position(|parameter| parameter == term)
                        .map_or_else(|| term.clone(), |slot| args[slot].clone())
                } else {
                    term.clone()
                }
            })
            .collect(),
    }
}

fn validate(declaration: &Declaration) -> Result<(), TranslateError> {
    let objects: HashSet<&str> = declaration.objects.iter().map(String::as_str).collect();
    let mut arity: HashMap<&str, usize> = HashMap::new();

    for action in &declaration.actions {
        for atom in action
            .precondition
            .iter()
            .chain(&action.add)
            .chain(&action.delete)
        {
            check_atom(&action.name, atom, &action.parameters, &objects, &mut arity)?;
        }
    }
    for atom in &declaration.init {
        check_atom("init", atom, &[], &objects, &mut arity)?;
    }
    for atom in &declaration.goal {
        check_atom("goal", atom, &[], &objects, &mut arity)?;
    }
    Ok(())
}

fn check_atom<'d>(
    owner: &str,
    atom: &'d Atom,
    parameters: &[String],
    objects: &HashSet<&str>,
    arity: &mut HashMap<&'d str, usize>,
) -> Result<(), TranslateError> {
    let expected = *arity
        .entry(atom.predicate.as_str())
        .or_insert(atom.args.len());
    if expected != atom.args.len() {
        return Err(TranslateError::ArityMismatch {
            predicate: atom.predicate.clone(),
            expected,
            found: atom.args.len(),
        });
    }
    for term in &atom.args {
        if is_variable(term) {
            if !parameters.contains(term) {
                return Err(TranslateError::UnboundVariable {
                    owner: owner.to_string(),
                    variable: term.clone(),
                });
            }
        } else if !objects.contains(term.as_str()) {
            return Err(TranslateError::UnknownObject {
                owner: owner.to_string(),
                object: term.clone(),
            });
        }
    }
    Ok(())
}

/// Delete-relaxed reachability grounding.
struct Grounder<'a> {
    declaration: &'a Declaration,
    started: Instant,
    time_limit: Option<Duration>,
    reachable: HashSet<Atom>,
    by_predicate: HashMap<String, Vec<Vec<String>>>,
    ground: IndexSet<(usize, Vec<String>)>,
}

impl<'a> Grounder<'a> {
    fn new(declaration: &'a Declaration, time_limit: Option<Duration>) -> Self {
        let mut grounder = Grounder {
            declaration,
            started: Instant::now(),
            time_limit,
            reachable: HashSet::new(),
            by_predicate: HashMap::new(),
            ground: IndexSet::new(),
        };
        for atom in &declaration.init {
            grounder.insert_atom(atom.clone());
        }
        grounder
    }

    fn insert_atom(&mut self, atom: Atom) {
        if self.reachable.insert(atom.clone()) {
            self.by_predicate
                .entry(atom.predicate)
                .or_default()
                .push(atom.args);
        }
    }

    fn check_time(&self) -> Result<(), TranslateError> {
        match self.time_limit {
            Some(limit) if self.started.elapsed() >= limit => Err(TranslateError::TimedOut(limit)),
            _ => Ok(()),
        }
    }

    fn run(&mut self) -> Result<(), TranslateError> {
        let declaration = self.declaration;
        let mut round = 0;
        loop {
            round += 1;
            let reachable_before = self.reachable.len();
            let ground_before = self.ground.len();

            for (index, action) in declaration.actions.iter().enumerate() {
                self.check_time()?;

                let mut bindings = Vec::new();
                let mut binding = vec![None; action.parameters.len()];
                self.match_preconditions(action, 0, &mut binding, &mut bindings);

                for args in bindings {
                    if self.ground.insert((index, args.clone())) {
                        for atom in &action.add {
                            self.insert_atom(substitute(atom, action, &args));
                        }
                    }
                }
            }

            debug!(
                "grounding round {round}: {} atoms, {} operators",
                self.reachable.len(),
                self.ground.len()
            );
            if self.reachable.len() == reachable_before && self.ground.len() == ground_before {
                return Ok(());
            }
        }
    }

    fn match_preconditions(
        &self,
        action: &ActionSchema,
        index: usize,
        binding: &mut [Option<String>],
        out: &mut Vec<Vec<String>>,
    ) {
        let Some(atom) = action.precondition.get(index) else {
            self.bind_free(action, binding, out);
            return;
        };
        let Some(candidates) = self.by_predicate.get(&atom.predicate) else {
            return;
        };

        for candidate in candidates {
            if candidate.len() != atom.args.len() {
                continue;
            }
            let mut assigned = Vec::new();
            let mut unifies = true;
            for (term, value) in atom.args.iter().zip(candidate) {
                if !is_variable(term) {
                    if term != value {
                        unifies = false;
                        break;
                    }
                    continue;
                }
                // Validated: every variable is a parameter.
                let Some(slot) = action.parameters.iter().position(|p| p == term) else {
                    unifies = false;
                    break;
                };
                match &binding[slot] {
                    Some(bound) if bound != value => {
                        unifies = false;
                        break;
                    }
                    Some(_) => {}
                    None => {
                        binding[slot] = Some(value.clone());
                        assigned.push(slot);
                    }
                }
            }
            if unifies {
                self.match_preconditions(action, index + 1, binding, out);
            }
            for slot in assigned {
                binding[slot] = None;
            }
        }
    }

    /// Parameters no precondition mentions range over every object.
    fn bind_free(
        &self,
        action: &ActionSchema,
        binding: &mut [Option<String>],
        out: &mut Vec<Vec<String>>,
    ) {
        match binding.iter().position(Option::is_none) {
            None => out.push(binding.iter().flatten().cloned().collect()),
            Some(slot) => {
                for object in &self.declaration.objects {
                    binding[slot] = Some(object.clone());
                    self.bind_free(action, binding, out);
                }
                binding[slot] = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::State;

    fn gripper() -> TranslatorContext {
        let declaration = Declaration::from_file("problems/gripper.yaml").unwrap();
        translate(&declaration, None, 0).unwrap()
    }

    #[test]
    fn test_gripper_ground_operators() {
        let context = gripper();
        let task = &context.task;

        // move: 2x2 room pairs; pick/drop: 2 balls x 2 rooms each.
        let count = |name: &str| task.operators().iter().filter(|op| op.name == name).count();
        assert_eq!(count("move"), 4);
        assert_eq!(count("pick"), 4);
        assert_eq!(count("drop"), 4);
        assert_eq!(task.goal().len(), 2);
        assert_eq!(task.init().len(), 8);

        for operator in task.operators() {
            for &fact in operator.pre.iter().chain(&operator.add).chain(&operator.del) {
                assert!(fact < task.fact_count());
            }
            assert_eq!(operator.pre_mask.len(), task.fact_count());
        }
    }

    #[test]
    fn test_translation_is_deterministic() {
        let first = gripper();
        let second = gripper();
        let signatures = |context: &TranslatorContext| {
            context
                .task
                .operators()
                .iter()
                .map(|op| op.signature())
                .collect::<Vec<_>>()
        };
        assert_eq!(signatures(&first), signatures(&second));
        assert_eq!(
            first.fact_hashes.hash_bits(first.task.init_mask()),
            second.fact_hashes.hash_bits(second.task.init_mask())
        );
    }

    #[test]
    fn test_replay_gripper_swap() {
        let context = gripper();
        let task = &context.task;
        let hashes = &context.fact_hashes;
        let operator = |name: &str, args: &[&str]| {
            let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
            task.find_operator(name, &args).unwrap()
        };

        let mut state = State::initial(task, hashes);
        for (name, args) in [
            ("pick", ["ball1", "rooma"]),
            ("move", ["rooma", "roomb"]),
            ("drop", ["ball1", "roomb"]),
            ("pick", ["ball2", "roomb"]),
            ("move", ["roomb", "rooma"]),
            ("drop", ["ball2", "rooma"]),
        ] {
            let op = operator(name, &args);
            assert!(state.is_applicable(op), "{name} {args:?}");
            state = state.apply(op, hashes);
        }
        assert!(state.satisfies(task.goal_mask()));
    }

    #[test]
    fn test_unreachable_goal_gets_fact_id() {
        let declaration = Declaration::from_file("problems/unreachable.yaml").unwrap();
        let context = translate(&declaration, None, 0).unwrap();
        let task = &context.task;
        assert_eq!(task.goal().len(), 1);
        let gold = task.fact(task.goal()[0]);
        assert_eq!(gold.name, "gold");
        assert!(!task.operators().iter().any(|op| op.add.contains(&gold.id)));
    }

    #[test]
    fn test_rejects_unbound_variable() {
        let mut declaration = Declaration::from_file("problems/gripper.yaml").unwrap();
        declaration.actions[0].add.push("at-robby ?nowhere".parse().unwrap());
        assert!(matches!(
            translate(&declaration, None, 0),
            Err(TranslateError::UnboundVariable { .. })
        ));
    }

    #[test]
    fn test_rejects_arity_mismatch() {
        let mut declaration = Declaration::from_file("problems/gripper.yaml").unwrap();
        declaration.goal.push("at ball1".parse().unwrap());
        assert!(matches!(
            translate(&declaration, None, 0),
            Err(TranslateError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_object() {
        let mut declaration = Declaration::from_file("problems/gripper.yaml").unwrap();
        declaration.init.push("room roomc".parse().unwrap());
        assert!(matches!(
            translate(&declaration, None, 0),
            Err(TranslateError::UnknownObject { .. })
        ));
    }

    #[test]
    fn test_zero_time_limit_times_out() {
        let declaration = Declaration::from_file("problems/gripper.yaml").unwrap();
        let result = translate(&declaration, Some(Duration::ZERO), 0);
        assert!(matches!(result, Err(TranslateError::TimedOut(_))));
    }
}
