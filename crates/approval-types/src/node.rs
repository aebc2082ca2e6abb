//! Workflow nodes: the typed steps of an approval definition
//!
//! Node configuration arrives as a permissive field bag (`NodeConfig`)
//! mirroring the wire shape. The definition compiler narrows it into the
//! per-type form the engine executes, rejecting fields outside a node
//! type's allowed set.

use crate::RoleId;
use serde::{Deserialize, Serialize};

/// Unique identifier for a workflow node
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The type of a workflow node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// The entry point of the workflow
    Start,
    /// A single-approval step: the first decision binds
    Approve,
    /// A parallel countersign step resolved by a `CountersignRule`
    Countersign,
    /// A routing step: evaluates its expression and follows a transition
    Condition,
    /// A terminal node: reaching it completes the instance
    End,
}

/// How approvers are located for an approval step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApproverStrategy {
    /// Walk the initiator's reporting chain upward
    TreeReport,
    /// Users holding a role within the initiator's own department
    SpecificRole,
    /// Users holding a role anywhere in the organization
    GlobalRole,
}

/// Policy for resolving a countersign group to a single outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CountersignRule {
    /// Every task must be approved; one rejection rejects the group
    All,
    /// Approvals must strictly exceed half of the group's voters
    Majority,
}

/// Destination applied when an approval step is rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectTo {
    /// End the instance as rejected, returning it to the initiator
    Initiator,
    /// Re-open the node that transitioned into the current one
    Previous,
}

/// Per-node configuration, interpreted according to the node type.
///
/// All fields are optional at this layer; the compiler decides which
/// combination is legal for each `NodeType`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_strategy: Option<ApproverStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_role: Option<RoleId>,
    /// Number of reporting-chain hops for `TreeReport` resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_hops: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countersign_rule: Option<CountersignRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_to: Option<RejectTo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
}

impl NodeConfig {
    /// Resolve via the initiator's reporting chain, a fixed number of hops up
    pub fn tree_report_hops(hops: u32) -> Self {
        Self {
            approver_strategy: Some(ApproverStrategy::TreeReport),
            report_hops: Some(hops),
            ..Self::default()
        }
    }

    /// Resolve via the reporting chain to the first holder of `role`
    pub fn tree_report_role(role: RoleId) -> Self {
        Self {
            approver_strategy: Some(ApproverStrategy::TreeReport),
            approver_role: Some(role),
            ..Self::default()
        }
    }

    /// Resolve to holders of `role` in the initiator's department
    pub fn specific_role(role: RoleId) -> Self {
        Self {
            approver_strategy: Some(ApproverStrategy::SpecificRole),
            approver_role: Some(role),
            ..Self::default()
        }
    }

    /// Resolve to holders of `role` organization-wide
    pub fn global_role(role: RoleId) -> Self {
        Self {
            approver_strategy: Some(ApproverStrategy::GlobalRole),
            approver_role: Some(role),
            ..Self::default()
        }
    }

    /// Condition-node configuration
    pub fn condition(expression: impl Into<String>) -> Self {
        Self {
            condition_expression: Some(expression.into()),
            ..Self::default()
        }
    }

    pub fn with_countersign_rule(mut self, rule: CountersignRule) -> Self {
        self.countersign_rule = Some(rule);
        self
    }

    pub fn with_reject_to(mut self, reject_to: RejectTo) -> Self {
        self.reject_to = Some(reject_to);
        self
    }

    /// True when no configuration field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A node in a workflow definition
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    pub id: NodeId,
    /// Unique code within the owning definition
    pub node_code: String,
    pub name: String,
    pub node_type: NodeType,
    #[serde(rename = "nodeConfig", default)]
    pub config: NodeConfig,
    /// Tie-break only, never control flow
    pub sort_order: u32,
}

impl WorkflowNode {
    pub fn new(code: impl Into<String>, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: NodeId::generate(),
            node_code: code.into(),
            name: name.into(),
            node_type,
            config: NodeConfig::default(),
            sort_order: 0,
        }
    }

    /// Create a start node
    pub fn start(code: impl Into<String>) -> Self {
        Self::new(code, "Start", NodeType::Start)
    }

    /// Create an end node
    pub fn end(code: impl Into<String>) -> Self {
        Self::new(code, "End", NodeType::End)
    }

    /// Create a single-approval node
    pub fn approve(code: impl Into<String>, name: impl Into<String>, config: NodeConfig) -> Self {
        let mut node = Self::new(code, name, NodeType::Approve);
        node.config = config;
        node
    }

    /// Create a countersign node
    pub fn countersign(
        code: impl Into<String>,
        name: impl Into<String>,
        config: NodeConfig,
    ) -> Self {
        let mut node = Self::new(code, name, NodeType::Countersign);
        node.config = config;
        node
    }

    /// Create a condition (routing) node
    pub fn condition(
        code: impl Into<String>,
        name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        let mut node = Self::new(code, name, NodeType::Condition);
        node.config = NodeConfig::condition(expression);
        node
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = NodeId::new(id);
        self
    }

    pub fn with_sort_order(mut self, sort_order: u32) -> Self {
        self.sort_order = sort_order;
        self
    }
}
