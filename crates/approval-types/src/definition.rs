//! Workflow definitions: the approval blueprint for a contract family
//!
//! A definition owns an ordered collection of typed nodes and the
//! conditional transitions between them. Builder methods perform no
//! validation; the definition compiler is the single place where a
//! definition is judged well-formed. Once any instance references a
//! definition it is logically frozen — edits must produce a new version.

use crate::{NodeId, NodeType, WorkflowNode, WorkflowTransition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifier ───────────────────────────────────────────────────────

/// Unique identifier for a workflow definition
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowDefinitionId(pub String);

impl WorkflowDefinitionId {
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

impl std::fmt::Display for WorkflowDefinitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Workflow Definition ──────────────────────────────────────────────

/// A workflow definition — the template an instance executes
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: WorkflowDefinitionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Contract types this definition applies to
    pub applicable_contract_types: Vec<String>,
    /// Gate deciding whether this definition applies to a contract at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    /// Monotonic; a new version is a new definition row
    pub version: u32,
    pub enabled: bool,
    pub nodes: Vec<WorkflowNode>,
    pub transitions: Vec<WorkflowTransition>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorkflowDefinitionId::generate(),
            name: name.into(),
            description: String::new(),
            applicable_contract_types: Vec::new(),
            condition_expression: None,
            version: 1,
            enabled: true,
            nodes: Vec::new(),
            transitions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a contract type this definition applies to
    pub fn applicable_to(mut self, contract_type: impl Into<String>) -> Self {
        self.applicable_contract_types.push(contract_type.into());
        self
    }

    pub fn with_condition(mut self, expression: impl Into<String>) -> Self {
        self.condition_expression = Some(expression.into());
        self
    }

    pub fn with_node(mut self, node: WorkflowNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_transition(mut self, transition: WorkflowTransition) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn add_node(&mut self, node: WorkflowNode) {
        self.nodes.push(node);
    }

    pub fn add_transition(&mut self, transition: WorkflowTransition) {
        self.transitions.push(transition);
    }

    /// Produce the successor version: fresh id, bumped version, same content
    pub fn new_version(&self) -> Self {
        let mut next = self.clone();
        next.id = WorkflowDefinitionId::generate();
        next.version = self.version + 1;
        next.created_at = Utc::now();
        next
    }

    // ── Graph queries ────────────────────────────────────────────────

    pub fn node(&self, id: &NodeId) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn node_by_code(&self, code: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.node_code == code)
    }

    pub fn start_node(&self) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.node_type == NodeType::Start)
    }

    pub fn end_nodes(&self) -> Vec<&WorkflowNode> {
        self.nodes
            .iter()
            .filter(|n| n.node_type == NodeType::End)
            .collect()
    }

    pub fn outgoing(&self, node_id: &NodeId) -> Vec<&WorkflowTransition> {
        self.transitions
            .iter()
            .filter(|t| &t.source == node_id)
            .collect()
    }

    pub fn incoming(&self, node_id: &NodeId) -> Vec<&WorkflowTransition> {
        self.transitions
            .iter()
            .filter(|t| &t.target == node_id)
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeConfig, RejectTo, RoleId};

    fn make_definition() -> WorkflowDefinition {
        WorkflowDefinition::new("Standard contract approval")
            .applicable_to("MAINTENANCE_SERVICE")
            .with_node(WorkflowNode::start("start").with_id("start"))
            .with_node(
                WorkflowNode::approve(
                    "city",
                    "City approval",
                    NodeConfig::specific_role(RoleId::new("CITY_MANAGER"))
                        .with_reject_to(RejectTo::Initiator),
                )
                .with_id("city"),
            )
            .with_node(WorkflowNode::end("end").with_id("end"))
            .with_transition(WorkflowTransition::new(
                NodeId::new("start"),
                NodeId::new("city"),
            ))
            .with_transition(WorkflowTransition::new(
                NodeId::new("city"),
                NodeId::new("end"),
            ))
    }

    #[test]
    fn test_create_definition() {
        let def = make_definition();
        assert_eq!(def.version, 1);
        assert!(def.enabled);
        assert_eq!(def.node_count(), 3);
        assert_eq!(def.transition_count(), 2);
        assert!(def.start_node().is_some());
        assert_eq!(def.end_nodes().len(), 1);
    }

    #[test]
    fn test_graph_queries() {
        let def = make_definition();

        let out = def.outgoing(&NodeId::new("start"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, NodeId::new("city"));

        let inc = def.incoming(&NodeId::new("end"));
        assert_eq!(inc.len(), 1);
        assert_eq!(inc[0].source, NodeId::new("city"));

        assert!(def.node_by_code("city").is_some());
        assert!(def.node_by_code("missing").is_none());
    }

    #[test]
    fn test_new_version() {
        let def = make_definition();
        let next = def.new_version();

        assert_ne!(next.id, def.id);
        assert_eq!(next.version, 2);
        assert_eq!(next.node_count(), def.node_count());
        // the original row is untouched
        assert_eq!(def.version, 1);
    }
}
