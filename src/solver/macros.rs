use super::SearchSpace;
use crate::common::{FactId, FixedMaxPriorityQueue, OperatorId, Plan, PlanStep, Task};
use crate::config::MacroConfig;
use crate::problem::{ActionSchema, Atom, Declaration};

use indexmap::IndexMap;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, trace};

/// How to replay one macro as primitive actions: each step names an action
/// and the positions of its arguments among the macro's arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroExpansion {
    pub steps: Vec<(String, Vec<usize>)>,
}

impl MacroExpansion {
    pub fn expand(&self, args: &[String]) -> Vec<PlanStep> {
        self.steps
            .iter()
            .map(|(name, positions)| PlanStep {
                name: name.clone(),
                args: positions.iter().map(|&slot| args[slot].clone()).collect(),
            })
            .collect()
    }
}

/// Macros learned from one exploration, as action schemas to append to the
/// declaration plus the recipe to expand them back.
#[derive(Debug, Clone, Default)]
pub struct MacroLibrary {
    schemas: Vec<ActionSchema>,
    expansions: IndexMap<String, MacroExpansion>,
}

impl MacroLibrary {
    /// Harvests the operator paths from the root to explored nodes, keeps the
    /// `macro_count` whose end states differ most from the initial state,
    /// and lifts each into a schema over fresh parameters.
    pub fn learn(
        space: &SearchSpace,
        task: &Task,
        declaration: &Declaration,
        config: &MacroConfig,
    ) -> MacroLibrary {
        let mut best: FixedMaxPriorityQueue<Vec<OperatorId>, usize> =
            FixedMaxPriorityQueue::new(config.macro_count);
        let mut seen = HashSet::new();

        for (id, node) in space.nodes().iter().enumerate() {
            if node.steps < 2 || node.steps > config.max_length {
                continue;
            }
            let window = space.operator_path(id);
            if !seen.insert(window.clone()) {
                continue;
            }
            if distinct_arguments(task, &window).len() > config.max_parameters {
                trace!("skipping candidate with too many parameters");
                continue;
            }
            let divergence = node.state.bits().difference_count(task.init_mask());
            best.enqueue(window, divergence);
        }

        let mut library = MacroLibrary::default();
        let mut lifted_seen = HashSet::new();
        let mut counter = 0;
        for window in best.into_sorted_vec() {
            let (mut schema, expansion) = lift(task, &window);
            if !lifted_seen.insert(expansion.steps.clone()) {
                continue;
            }
            let name = loop {
                let name = format!("macro-{counter}");
                counter += 1;
                if declaration.action(&name).is_none() {
                    break name;
                }
            };
            debug!(
                "learned {name}: {}",
                expansion
                    .steps
                    .iter()
                    .map(|(action, _)| action.as_str())
                    .collect::<Vec<_>>()
                    .join(" ; ")
            );
            schema.name = name.clone();
            library.schemas.push(schema);
            library.expansions.insert(name, expansion);
        }
        library
    }

    pub fn len(&self) -> usize {
        self.expansions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expansions.is_empty()
    }

    pub fn schemas(&self) -> &[ActionSchema] {
        &self.schemas
    }

    pub fn get(&self, name: &str) -> Option<&MacroExpansion> {
        self.expansions.get(name)
    }

    /// Replaces every macro step with its primitive steps.
    pub fn expand_plan(&self, plan: Plan) -> Plan {
        let mut steps = Vec::with_capacity(plan.len());
        for step in plan.steps {
            match self.expansions.get(&step.name) {
                Some(expansion) => steps.extend(expansion.expand(&step.args)),
                None => steps.push(step),
            }
        }
        Plan { steps }
    }
}

/// Objects mentioned by the operators' arguments, in first-appearance order.
fn distinct_arguments<'t>(task: &'t Task, operators: &[OperatorId]) -> Vec<&'t str> {
    let mut objects: Vec<&str> = Vec::new();
    for &id in operators {
        for arg in &task.operator(id).args {
            if !objects.contains(&arg.as_str()) {
                objects.push(arg);
            }
        }
    }
    objects
}

/// Composes the sequence into one STRIPS action and replaces its objects by
/// parameters `?m0`, `?m1`, ...
fn lift(task: &Task, operators: &[OperatorId]) -> (ActionSchema, MacroExpansion) {
    let mut pre: BTreeSet<FactId> = BTreeSet::new();
    let mut add: BTreeSet<FactId> = BTreeSet::new();
    let mut del: BTreeSet<FactId> = BTreeSet::new();
    for &id in operators {
        let operator = task.operator(id);
        pre.extend(operator.pre.iter().filter(|fact| !add.contains(*fact)));
        for fact in &operator.del {
            add.remove(fact);
            del.insert(*fact);
        }
        for fact in &operator.add {
            del.remove(fact);
            add.insert(*fact);
        }
    }

    let objects = distinct_arguments(task, operators);
    let parameter = |term: &str| -> String {
        objects
            .iter()
            .position(|object| *object == term)
            .map_or_else(|| term.to_string(), |slot| format!("?m{slot}"))
    };
    let atoms = |facts: &BTreeSet<FactId>| -> Vec<Atom> {
        facts
            .iter()
            .map(|&fact| {
                let fact = task.fact(fact);
                Atom {
                    predicate: fact.name.clone(),
                    args: fact.args.iter().map(|arg| parameter(arg.as_str())).collect(),
                }
            })
            .collect()
    };

    let schema = ActionSchema {
        name: String::new(),
        parameters: (0..objects.len()).map(|slot| format!("?m{slot}")).collect(),
        precondition: atoms(&pre),
        add: atoms(&add),
        delete: atoms(&del),
    };
    let steps = operators
        .iter()
        .map(|&id| {
            let operator = task.operator(id);
            let positions = operator
                .args
                .iter()
                .map(|arg| {
                    objects
                        .iter()
                        .position(|object| *object == arg.as_str())
                        .unwrap_or_default()
                })
                .collect();
            (operator.name.clone(), positions)
        })
        .collect();
    (schema, MacroExpansion { steps })
}
