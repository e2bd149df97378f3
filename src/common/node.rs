use super::{OperatorId, State};

/// Handle of a node inside a search run's arena.
pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct SearchNode {
    pub state: State,
    pub parent: Option<NodeId>,
    pub operator: Option<OperatorId>, // generating operator, None for the root
    pub steps: usize,
    pub h: usize,
    pub evaluated: bool, // false while the heuristic value is a deferred proxy
}

impl SearchNode {
    pub fn root(state: State, h: usize) -> Self {
        SearchNode {
            state,
            parent: None,
            operator: None,
            steps: 0,
            h,
            evaluated: true,
        }
    }

    pub fn child(
        state: State,
        parent: NodeId,
        parent_steps: usize,
        operator: OperatorId,
        h: usize,
        evaluated: bool,
    ) -> Self {
        SearchNode {
            state,
            parent: Some(parent),
            operator: Some(operator),
            steps: parent_steps + 1,
            h,
            evaluated,
        }
    }
}
