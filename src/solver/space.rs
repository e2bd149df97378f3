use crate::common::{NodeId, OperatorId, Plan, PlanStep, SearchNode, State, Task};

use std::collections::HashMap;

/// Arena of every node generated by one search run.
///
/// Nodes are addressed by `NodeId` and never removed; parents are ids into
/// the same arena, so plan extraction is a walk up the parent chain.
#[derive(Debug, Default)]
pub struct SearchSpace {
    nodes: Vec<SearchNode>,
    by_hash: HashMap<u64, Vec<NodeId>>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: SearchNode) -> NodeId {
        let id = self.nodes.len();
        self.by_hash
            .entry(node.state.hash_value())
            .or_default()
            .push(id);
        self.nodes.push(node);
        id
    }

    /// Node holding exactly `state`, if one was generated. Hash collisions
    /// fall back to comparing the fact sets.
    pub fn lookup(&self, state: &State) -> Option<NodeId> {
        self.by_hash
            .get(&state.hash_value())?
            .iter()
            .copied()
            .find(|&id| self.nodes[id].state == *state)
    }

    pub fn contains(&self, state: &State) -> bool {
        self.lookup(state).is_some()
    }

    pub fn node(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SearchNode {
        &mut self.nodes[id]
    }

    pub fn nodes(&self) -> &[SearchNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Operators applied from the root to reach `id`, in execution order.
    pub fn operator_path(&self, id: NodeId) -> Vec<OperatorId> {
        let mut path = Vec::with_capacity(self.nodes[id].steps);
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id];
            if let Some(operator) = node.operator {
                path.push(operator);
            }
            current = node.parent;
        }
        path.reverse();
        path
    }

    pub fn plan(&self, id: NodeId, task: &Task) -> Plan {
        Plan {
            steps: self
                .operator_path(id)
                .into_iter()
                .map(|operator| {
                    let operator = task.operator(operator);
                    PlanStep {
                        name: operator.name.clone(),
                        args: operator.args.clone(),
                    }
                })
                .collect(),
        }
    }
}
