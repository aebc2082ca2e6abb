//! Workflow transitions: directed, optionally conditional edges
//!
//! When several transitions leave the same node, they compete in
//! ascending `sort_order`; the first whose condition is satisfied (or
//! which carries no condition) wins.

use crate::NodeId;
use serde::{Deserialize, Serialize};

/// Unique identifier for a workflow transition
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub String);

impl TransitionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge between two workflow nodes
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTransition {
    pub id: TransitionId,
    #[serde(rename = "sourceNodeId")]
    pub source: NodeId,
    #[serde(rename = "targetNodeId")]
    pub target: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    /// Priority among competing edges from the same source
    pub sort_order: u32,
}

impl WorkflowTransition {
    /// Create an unconditional transition
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: TransitionId::generate(),
            source,
            target,
            condition_expression: None,
            sort_order: 0,
        }
    }

    /// Create a conditional transition
    pub fn conditional(source: NodeId, target: NodeId, expression: impl Into<String>) -> Self {
        Self {
            id: TransitionId::generate(),
            source,
            target,
            condition_expression: Some(expression.into()),
            sort_order: 0,
        }
    }

    pub fn with_sort_order(mut self, sort_order: u32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.condition_expression.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconditional() {
        let t = WorkflowTransition::new(NodeId::new("a"), NodeId::new("b"));
        assert!(!t.is_conditional());
        assert_eq!(t.sort_order, 0);
    }

    #[test]
    fn test_conditional_with_priority() {
        let t = WorkflowTransition::conditional(
            NodeId::new("gate"),
            NodeId::new("province"),
            "condition.result == true",
        )
        .with_sort_order(1);
        assert!(t.is_conditional());
        assert_eq!(t.sort_order, 1);
    }

    #[test]
    fn test_wire_shape() {
        let t = WorkflowTransition::new(NodeId::new("a"), NodeId::new("b"));
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["sourceNodeId"], "a");
        assert_eq!(json["targetNodeId"], "b");
        assert!(json.get("conditionExpression").is_none());
    }
}
