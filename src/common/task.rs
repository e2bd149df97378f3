use super::BitSet;

use std::fmt;
use std::hash::{Hash, Hasher};

pub type FactId = usize;
pub type OperatorId = usize;

/// A grounded proposition. Once the translator has assigned the dense id
/// space, identity is the id alone.
#[derive(Debug, Clone)]
pub struct Fact {
    pub id: FactId,
    pub name: String,
    pub args: Vec<String>,
}

impl Fact {
    pub fn new(id: FactId, name: &str, args: &[String]) -> Self {
        Fact {
            id,
            name: name.to_string(),
            args: args.to_vec(),
        }
    }

    /// Content comparison, for facts whose ids are not final yet.
    pub fn same_content(&self, other: &Fact) -> bool {
        self.name == other.name && self.args == other.args
    }
}

impl PartialEq for Fact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Fact {}

impl Hash for Fact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, ")")
    }
}

/// A grounded operator with its masks built once over the task's fact space.
#[derive(Debug, Clone)]
pub struct Operator {
    pub id: OperatorId,
    pub name: String,
    pub args: Vec<String>,
    pub pre: Vec<FactId>,
    pub add: Vec<FactId>,
    pub del: Vec<FactId>,
    pub pre_mask: BitSet,
    pub add_mask: BitSet,
    pub del_mask: BitSet,
    pub pre_count: usize,
}

impl Operator {
    pub fn new(
        id: OperatorId,
        name: &str,
        args: Vec<String>,
        pre: Vec<FactId>,
        add: Vec<FactId>,
        del: Vec<FactId>,
        fact_count: usize,
    ) -> Self {
        let pre_mask = BitSet::from_indices(fact_count, pre.iter().copied());
        let add_mask = BitSet::from_indices(fact_count, add.iter().copied());
        let del_mask = BitSet::from_indices(fact_count, del.iter().copied());
        let pre_count = pre_mask.count_ones();
        Operator {
            id,
            name: name.to_string(),
            args,
            pre,
            add,
            del,
            pre_mask,
            add_mask,
            del_mask,
            pre_count,
        }
    }

    /// Same operator (same id) with its masks rebuilt over `fact_count` facts.
    pub fn reset(&self, fact_count: usize) -> Operator {
        Operator::new(
            self.id,
            &self.name,
            self.args.clone(),
            self.pre.clone(),
            self.add.clone(),
            self.del.clone(),
            fact_count,
        )
    }

    pub fn is_applicable(&self, facts: &BitSet) -> bool {
        self.pre_mask.is_subset_of(facts)
    }

    pub fn signature(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.args.join(" "))
        }
    }
}

/// The finalized planning task handed to the search core.
///
/// Every fact id referenced by an operator, the goal or the initial state is
/// below `fact_count`, and every mask is exactly `fact_count` bits long.
#[derive(Debug, Clone)]
pub struct Task {
    facts: Vec<Fact>,
    operators: Vec<Operator>,
    init: Vec<FactId>,
    init_mask: BitSet,
    goal: Vec<FactId>,
    goal_mask: BitSet,
}

impl Task {
    pub fn new(
        facts: Vec<Fact>,
        operators: Vec<Operator>,
        init: Vec<FactId>,
        goal: Vec<FactId>,
    ) -> Self {
        let fact_count = facts.len();
        for (id, fact) in facts.iter().enumerate() {
            assert_eq!(fact.id, id, "fact ids must be dense");
        }
        for (id, operator) in operators.iter().enumerate() {
            assert_eq!(operator.id, id, "operator ids must be dense");
            assert_eq!(operator.pre_mask.len(), fact_count);
        }

        let init_mask = BitSet::from_indices(fact_count, init.iter().copied());
        let mut goal_mask = BitSet::from_indices(fact_count, goal.iter().copied());
        goal_mask.compute_bounds();

        Task {
            facts,
            operators,
            init,
            init_mask,
            goal,
            goal_mask,
        }
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn fact(&self, id: FactId) -> &Fact {
        &self.facts[id]
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn operator(&self, id: OperatorId) -> &Operator {
        &self.operators[id]
    }

    pub fn init(&self) -> &[FactId] {
        &self.init
    }

    pub fn init_mask(&self) -> &BitSet {
        &self.init_mask
    }

    pub fn goal(&self) -> &[FactId] {
        &self.goal
    }

    pub fn goal_mask(&self) -> &BitSet {
        &self.goal_mask
    }

    pub fn find_operator(&self, name: &str, args: &[String]) -> Option<&Operator> {
        self.operators
            .iter()
            .find(|operator| operator.name == name && operator.args == args)
    }
}
