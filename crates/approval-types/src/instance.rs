//! Workflow instances: one live approval run per contract
//!
//! The instance records its forward path through the graph so that a
//! rejection routed to the previous node can step back without guessing
//! from the static topology.

use crate::{ContractId, NodeId, UserId, WorkflowDefinitionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifier ───────────────────────────────────────────────────────

/// Unique identifier for a workflow instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowInstanceId(pub String);

impl WorkflowInstanceId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for WorkflowInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// The lifecycle state of a workflow instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    /// Advancing through the graph; sub-state is the current node
    Running,
    /// Reached an end node
    Completed,
    /// An approver voted it down and the rejection routed to the initiator
    Rejected,
    /// Cancelled by an actor or by the engine on an unresolvable step
    Terminated,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

// ── Workflow Instance ────────────────────────────────────────────────

/// A running (or finished) approval instance
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstance {
    pub id: WorkflowInstanceId,
    /// Pinned at start; later definition edits never affect this instance
    #[serde(rename = "workflowDefinitionId")]
    pub definition_id: WorkflowDefinitionId,
    pub contract_id: ContractId,
    #[serde(rename = "currentNodeId", skip_serializing_if = "Option::is_none")]
    pub current_node: Option<NodeId>,
    /// Forward path of entered nodes; the last element is the current node
    #[serde(default)]
    pub path: Vec<NodeId>,
    pub status: InstanceStatus,
    pub initiator_id: UserId,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<String>,
}

impl WorkflowInstance {
    pub fn new(
        definition_id: WorkflowDefinitionId,
        contract_id: ContractId,
        initiator_id: UserId,
    ) -> Self {
        Self {
            id: WorkflowInstanceId::generate(),
            definition_id,
            contract_id,
            current_node: None,
            path: Vec::new(),
            status: InstanceStatus::Running,
            initiator_id,
            start_time: Utc::now(),
            end_time: None,
            end_reason: None,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Move forward into a node, extending the path
    pub fn advance_to(&mut self, node: NodeId) {
        self.path.push(node.clone());
        self.current_node = Some(node);
    }

    /// Step back to the node that transitioned into the current one.
    ///
    /// Returns the re-entered node, or `None` if there is no prior node
    /// on the path (the current node was the first).
    pub fn step_back(&mut self) -> Option<NodeId> {
        self.path.pop();
        let prior = self.path.last().cloned();
        self.current_node = prior.clone();
        prior
    }

    /// The node that transitioned into the current one, if any
    pub fn previous_node(&self) -> Option<&NodeId> {
        if self.path.len() >= 2 {
            self.path.get(self.path.len() - 2)
        } else {
            None
        }
    }

    /// Mark the instance completed (an end node was reached)
    pub fn complete(&mut self) {
        self.status = InstanceStatus::Completed;
        self.end_time = Some(Utc::now());
    }

    /// Mark the instance rejected and clear the current position
    pub fn reject(&mut self, reason: impl Into<String>) {
        self.status = InstanceStatus::Rejected;
        self.current_node = None;
        self.end_time = Some(Utc::now());
        self.end_reason = Some(reason.into());
    }

    /// Mark the instance terminated, keeping the position it died at
    pub fn terminate(&mut self, reason: impl Into<String>) {
        self.status = InstanceStatus::Terminated;
        self.end_time = Some(Utc::now());
        self.end_reason = Some(reason.into());
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.status == InstanceStatus::Running
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn elapsed_secs(&self) -> i64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        end.signed_duration_since(self.start_time).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_instance() -> WorkflowInstance {
        WorkflowInstance::new(
            WorkflowDefinitionId::new("def-1"),
            ContractId::new("contract-1"),
            UserId::new("initiator-1"),
        )
    }

    #[test]
    fn test_new_instance_is_running() {
        let inst = make_instance();
        assert!(inst.is_running());
        assert!(!inst.is_terminal());
        assert!(inst.current_node.is_none());
        assert!(inst.path.is_empty());
    }

    #[test]
    fn test_advance_and_previous() {
        let mut inst = make_instance();
        inst.advance_to(NodeId::new("city"));
        assert_eq!(inst.current_node, Some(NodeId::new("city")));
        assert!(inst.previous_node().is_none());

        inst.advance_to(NodeId::new("province"));
        assert_eq!(inst.current_node, Some(NodeId::new("province")));
        assert_eq!(inst.previous_node(), Some(&NodeId::new("city")));
    }

    #[test]
    fn test_step_back() {
        let mut inst = make_instance();
        inst.advance_to(NodeId::new("city"));
        inst.advance_to(NodeId::new("province"));

        let reentered = inst.step_back();
        assert_eq!(reentered, Some(NodeId::new("city")));
        assert_eq!(inst.current_node, Some(NodeId::new("city")));

        // stepping back from the first node leaves no position
        let none = inst.step_back();
        assert!(none.is_none());
        assert!(inst.current_node.is_none());
    }

    #[test]
    fn test_reject_clears_position() {
        let mut inst = make_instance();
        inst.advance_to(NodeId::new("city"));
        inst.reject("city manager rejected");

        assert_eq!(inst.status, InstanceStatus::Rejected);
        assert!(inst.current_node.is_none());
        assert!(inst.end_time.is_some());
        assert_eq!(inst.end_reason.as_deref(), Some("city manager rejected"));
    }

    #[test]
    fn test_terminate_keeps_position() {
        let mut inst = make_instance();
        inst.advance_to(NodeId::new("city"));
        inst.terminate("withdrawn by initiator");

        assert_eq!(inst.status, InstanceStatus::Terminated);
        assert_eq!(inst.current_node, Some(NodeId::new("city")));
        assert!(inst.is_terminal());
    }

    #[test]
    fn test_complete() {
        let mut inst = make_instance();
        inst.advance_to(NodeId::new("end"));
        inst.complete();

        assert_eq!(inst.status, InstanceStatus::Completed);
        assert!(inst.end_time.is_some());
        assert!(inst.end_reason.is_none());
    }
}
