//! Definition compiler: turns a raw definition into an executable graph
//!
//! Compilation is a pure function. It validates the node/transition
//! graph, narrows each node's permissive `NodeConfig` into the closed
//! per-type `NodeKind`, and indexes outgoing transitions by priority.
//! The first violation found is reported; no partial compilation is
//! attempted.

use approval_types::{
    ApproverStrategy, CompileError, CountersignRule, NodeId, NodeType, RejectTo, RoleId,
    TransitionId, WorkflowDefinition, WorkflowDefinitionId, WorkflowNode,
};
use std::collections::{HashMap, HashSet};

// ── Compiled forms ───────────────────────────────────────────────────

/// How a node locates its approvers, fully resolved from the config bag
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApproverSpec {
    /// The n-th ancestor on the initiator's reporting chain
    ChainHops { hops: u32 },
    /// The first ancestor on the reporting chain holding `role`
    ChainRole { role: RoleId },
    /// Holders of `role` in the initiator's own department
    DepartmentRole { role: RoleId },
    /// Holders of `role` anywhere in the organization
    GlobalRole { role: RoleId },
}

/// The closed per-type interpretation of a node.
///
/// One case per node type, so node-entry handling is exhaustive by
/// construction.
#[derive(Clone, Debug)]
pub enum NodeKind {
    Start,
    Approve {
        approvers: ApproverSpec,
        reject_to: RejectTo,
    },
    Countersign {
        approvers: ApproverSpec,
        rule: CountersignRule,
        reject_to: RejectTo,
    },
    Condition {
        expression: String,
    },
    End,
}

/// A node ready for execution
#[derive(Clone, Debug)]
pub struct CompiledNode {
    pub id: NodeId,
    pub node_code: String,
    pub name: String,
    pub kind: NodeKind,
}

/// An outgoing transition, pre-sorted by priority
#[derive(Clone, Debug)]
pub struct CompiledTransition {
    pub id: TransitionId,
    pub target: NodeId,
    pub condition: Option<String>,
    pub sort_order: u32,
}

/// An executable workflow graph
#[derive(Clone, Debug)]
pub struct CompiledWorkflow {
    pub definition_id: WorkflowDefinitionId,
    pub version: u32,
    start: NodeId,
    entry_target: NodeId,
    nodes: HashMap<NodeId, CompiledNode>,
    outgoing: HashMap<NodeId, Vec<CompiledTransition>>,
}

impl CompiledWorkflow {
    pub fn node(&self, id: &NodeId) -> Option<&CompiledNode> {
        self.nodes.get(id)
    }

    /// Outgoing transitions of a node in ascending `sort_order`
    pub fn outgoing(&self, id: &NodeId) -> &[CompiledTransition] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn start_node(&self) -> &NodeId {
        &self.start
    }

    /// The start node's sole successor — where new instances begin
    pub fn entry_target(&self) -> &NodeId {
        &self.entry_target
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

// ── Compilation ──────────────────────────────────────────────────────

/// Compile a definition into an executable graph
pub fn compile(definition: &WorkflowDefinition) -> Result<CompiledWorkflow, CompileError> {
    if definition.nodes.is_empty() {
        return Err(CompileError::new("definition has no nodes"));
    }

    let mut codes = HashSet::new();
    let mut ids = HashSet::new();
    for node in &definition.nodes {
        if !codes.insert(node.node_code.as_str()) {
            return Err(CompileError::at_node(
                node.id.clone(),
                format!("duplicate node code '{}'", node.node_code),
            ));
        }
        if !ids.insert(&node.id) {
            return Err(CompileError::at_node(
                node.id.clone(),
                format!("duplicate node id '{}'", node.id),
            ));
        }
    }

    let start_nodes: Vec<&WorkflowNode> = definition
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Start)
        .collect();
    if start_nodes.is_empty() {
        return Err(CompileError::new("definition has no START node"));
    }
    if start_nodes.len() > 1 {
        return Err(CompileError::new("definition has more than one START node"));
    }
    let start = start_nodes[0].id.clone();

    if !definition
        .nodes
        .iter()
        .any(|n| n.node_type == NodeType::End)
    {
        return Err(CompileError::new("definition has no END node"));
    }

    // Narrow each config bag into its closed per-type form
    let mut nodes = HashMap::new();
    for node in &definition.nodes {
        let kind = compile_node(node)?;
        nodes.insert(
            node.id.clone(),
            CompiledNode {
                id: node.id.clone(),
                node_code: node.node_code.clone(),
                name: node.name.clone(),
                kind,
            },
        );
    }

    // Transition endpoints must exist
    for transition in &definition.transitions {
        for endpoint in [&transition.source, &transition.target] {
            if !nodes.contains_key(endpoint) {
                return Err(CompileError::new(format!(
                    "transition '{}' references unknown node '{}'",
                    transition.id, endpoint
                )));
            }
        }
    }

    // Degree checks
    for node in &definition.nodes {
        let out = definition.outgoing(&node.id);
        let inc = definition.incoming(&node.id);
        match node.node_type {
            NodeType::Start => {
                if out.len() != 1 {
                    return Err(CompileError::at_node(
                        node.id.clone(),
                        "START node must have exactly one outgoing transition",
                    ));
                }
                if !inc.is_empty() {
                    return Err(CompileError::at_node(
                        node.id.clone(),
                        "START node cannot have incoming transitions",
                    ));
                }
            }
            NodeType::End => {
                if !out.is_empty() {
                    return Err(CompileError::at_node(
                        node.id.clone(),
                        "END node cannot have outgoing transitions",
                    ));
                }
                if inc.is_empty() {
                    return Err(CompileError::at_node(
                        node.id.clone(),
                        "END node has no incoming transition",
                    ));
                }
            }
            _ => {
                if out.is_empty() {
                    return Err(CompileError::at_node(
                        node.id.clone(),
                        format!("node '{}' has no outgoing transition", node.node_code),
                    ));
                }
                if inc.is_empty() {
                    return Err(CompileError::at_node(
                        node.id.clone(),
                        format!("node '{}' has no incoming transition", node.node_code),
                    ));
                }
            }
        }
    }

    // Every node reachable from START
    let reachable = reachable_from(definition, &start);
    for node in &definition.nodes {
        if !reachable.contains(&node.id) {
            return Err(CompileError::at_node(
                node.id.clone(),
                format!("node '{}' is unreachable from START", node.node_code),
            ));
        }
    }

    // The unconditional subgraph must be acyclic; conditional back-edges
    // (rejection routing) are the one allowed exception.
    if let Some(node_id) = find_unconditional_cycle(definition) {
        return Err(CompileError::at_node(
            node_id,
            "cycle of unconditional transitions",
        ));
    }

    // Index outgoing transitions by priority
    let mut outgoing: HashMap<NodeId, Vec<CompiledTransition>> = HashMap::new();
    for transition in &definition.transitions {
        outgoing
            .entry(transition.source.clone())
            .or_default()
            .push(CompiledTransition {
                id: transition.id.clone(),
                target: transition.target.clone(),
                condition: transition.condition_expression.clone(),
                sort_order: transition.sort_order,
            });
    }
    for transitions in outgoing.values_mut() {
        transitions.sort_by_key(|t| t.sort_order);
    }

    let entry_target = definition.outgoing(&start)[0].target.clone();

    Ok(CompiledWorkflow {
        definition_id: definition.id.clone(),
        version: definition.version,
        start,
        entry_target,
        nodes,
        outgoing,
    })
}

/// Narrow one node's config bag into its closed per-type form.
///
/// A field outside the node type's allowed set is an error, and a
/// required field has no default.
fn compile_node(node: &WorkflowNode) -> Result<NodeKind, CompileError> {
    let config = &node.config;
    let at = |reason: String| CompileError::at_node(node.id.clone(), reason);

    match node.node_type {
        NodeType::Start | NodeType::End => {
            if !config.is_empty() {
                return Err(at(format!(
                    "node '{}': configuration is not allowed on {:?} nodes",
                    node.node_code, node.node_type
                )));
            }
            Ok(match node.node_type {
                NodeType::Start => NodeKind::Start,
                _ => NodeKind::End,
            })
        }
        NodeType::Approve | NodeType::Countersign => {
            if config.condition_expression.is_some() {
                return Err(at(format!(
                    "node '{}': conditionExpression is not allowed on {:?} nodes",
                    node.node_code, node.node_type
                )));
            }
            let approvers = compile_approver_spec(node)?;
            let reject_to = config.reject_to.ok_or_else(|| {
                at(format!("node '{}' is missing rejectTo", node.node_code))
            })?;

            match node.node_type {
                NodeType::Approve => {
                    if config.countersign_rule.is_some() {
                        return Err(at(format!(
                            "node '{}': countersignRule is not allowed on APPROVE nodes",
                            node.node_code
                        )));
                    }
                    Ok(NodeKind::Approve {
                        approvers,
                        reject_to,
                    })
                }
                _ => {
                    let rule = config.countersign_rule.ok_or_else(|| {
                        at(format!(
                            "countersign node '{}' is missing countersignRule",
                            node.node_code
                        ))
                    })?;
                    Ok(NodeKind::Countersign {
                        approvers,
                        rule,
                        reject_to,
                    })
                }
            }
        }
        NodeType::Condition => {
            if config.approver_strategy.is_some()
                || config.approver_role.is_some()
                || config.report_hops.is_some()
                || config.countersign_rule.is_some()
                || config.reject_to.is_some()
            {
                return Err(at(format!(
                    "node '{}': only conditionExpression is allowed on CONDITION nodes",
                    node.node_code
                )));
            }
            let expression = config.condition_expression.clone().ok_or_else(|| {
                at(format!(
                    "condition node '{}' is missing conditionExpression",
                    node.node_code
                ))
            })?;
            Ok(NodeKind::Condition { expression })
        }
    }
}

fn compile_approver_spec(node: &WorkflowNode) -> Result<ApproverSpec, CompileError> {
    let config = &node.config;
    let at = |reason: String| CompileError::at_node(node.id.clone(), reason);

    let strategy = config.approver_strategy.ok_or_else(|| {
        at(format!(
            "node '{}' is missing approverStrategy",
            node.node_code
        ))
    })?;

    match strategy {
        ApproverStrategy::TreeReport => match (&config.report_hops, &config.approver_role) {
            (Some(hops), None) => {
                if *hops == 0 {
                    return Err(at(format!(
                        "node '{}': reportHops must be at least 1",
                        node.node_code
                    )));
                }
                Ok(ApproverSpec::ChainHops { hops: *hops })
            }
            (None, Some(role)) => Ok(ApproverSpec::ChainRole { role: role.clone() }),
            (Some(_), Some(_)) => Err(at(format!(
                "node '{}': TREE_REPORT takes reportHops or approverRole, not both",
                node.node_code
            ))),
            (None, None) => Err(at(format!(
                "node '{}': TREE_REPORT requires reportHops or approverRole",
                node.node_code
            ))),
        },
        ApproverStrategy::SpecificRole | ApproverStrategy::GlobalRole => {
            if config.report_hops.is_some() {
                return Err(at(format!(
                    "node '{}': reportHops is only valid with TREE_REPORT",
                    node.node_code
                )));
            }
            let role = config.approver_role.clone().ok_or_else(|| {
                at(format!("node '{}' is missing approverRole", node.node_code))
            })?;
            Ok(match strategy {
                ApproverStrategy::SpecificRole => ApproverSpec::DepartmentRole { role },
                _ => ApproverSpec::GlobalRole { role },
            })
        }
    }
}

fn reachable_from(definition: &WorkflowDefinition, start: &NodeId) -> HashSet<NodeId> {
    let mut visited = HashSet::new();
    let mut queue = vec![start.clone()];
    while let Some(current) = queue.pop() {
        if visited.insert(current.clone()) {
            for transition in definition.outgoing(&current) {
                if !visited.contains(&transition.target) {
                    queue.push(transition.target.clone());
                }
            }
        }
    }
    visited
}

/// Find a node on a cycle of unconditional transitions, if any
fn find_unconditional_cycle(definition: &WorkflowDefinition) -> Option<NodeId> {
    let mut adjacency: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    for transition in &definition.transitions {
        if transition.condition_expression.is_none() {
            adjacency
                .entry(&transition.source)
                .or_default()
                .push(&transition.target);
        }
    }

    let mut done: HashSet<&NodeId> = HashSet::new();
    let mut on_stack: HashSet<&NodeId> = HashSet::new();

    fn visit<'a>(
        node: &'a NodeId,
        adjacency: &HashMap<&'a NodeId, Vec<&'a NodeId>>,
        done: &mut HashSet<&'a NodeId>,
        on_stack: &mut HashSet<&'a NodeId>,
    ) -> Option<NodeId> {
        if done.contains(node) {
            return None;
        }
        if !on_stack.insert(node) {
            return Some(node.clone());
        }
        if let Some(targets) = adjacency.get(node) {
            for target in targets {
                if let Some(found) = visit(target, adjacency, done, on_stack) {
                    return Some(found);
                }
            }
        }
        on_stack.remove(node);
        done.insert(node);
        None
    }

    for node in &definition.nodes {
        if let Some(found) = visit(&node.id, &adjacency, &mut done, &mut on_stack) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_types::{NodeConfig, WorkflowTransition};

    fn city_config() -> NodeConfig {
        NodeConfig::specific_role(RoleId::new("CITY_MANAGER")).with_reject_to(RejectTo::Initiator)
    }

    fn linear_definition() -> WorkflowDefinition {
        WorkflowDefinition::new("Linear")
            .applicable_to("MAINTENANCE_SERVICE")
            .with_node(WorkflowNode::start("start").with_id("start"))
            .with_node(
                WorkflowNode::approve("city", "City approval", city_config()).with_id("city"),
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
    fn test_compile_linear() {
        let compiled = compile(&linear_definition()).unwrap();
        assert_eq!(compiled.node_count(), 3);
        assert_eq!(compiled.start_node(), &NodeId::new("start"));
        assert_eq!(compiled.entry_target(), &NodeId::new("city"));

        let city = compiled.node(&NodeId::new("city")).unwrap();
        assert!(matches!(city.kind, NodeKind::Approve { .. }));
    }

    #[test]
    fn test_duplicate_node_code() {
        let def = linear_definition().with_node(
            WorkflowNode::approve("city", "Shadow", city_config()).with_id("city-2"),
        );
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("duplicate node code"));
    }

    #[test]
    fn test_missing_start() {
        let def = WorkflowDefinition::new("No start")
            .with_node(WorkflowNode::approve("a", "A", city_config()).with_id("a"))
            .with_node(WorkflowNode::end("end").with_id("end"))
            .with_transition(WorkflowTransition::new(NodeId::new("a"), NodeId::new("end")));
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("no START"));
    }

    #[test]
    fn test_two_starts() {
        let def = linear_definition().with_node(WorkflowNode::start("start-2").with_id("start-2"));
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("more than one START"));
    }

    #[test]
    fn test_missing_end() {
        let def = WorkflowDefinition::new("No end")
            .with_node(WorkflowNode::start("start").with_id("start"))
            .with_node(WorkflowNode::approve("a", "A", city_config()).with_id("a"))
            .with_transition(WorkflowTransition::new(
                NodeId::new("start"),
                NodeId::new("a"),
            ))
            .with_transition(WorkflowTransition::new(NodeId::new("a"), NodeId::new("start")));
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("no END"));
    }

    #[test]
    fn test_countersign_missing_rule_is_an_error() {
        let def = WorkflowDefinition::new("Countersign")
            .with_node(WorkflowNode::start("start").with_id("start"))
            .with_node(
                WorkflowNode::countersign(
                    "legal",
                    "Legal countersign",
                    NodeConfig::global_role(RoleId::new("LEGAL"))
                        .with_reject_to(RejectTo::Initiator),
                )
                .with_id("legal"),
            )
            .with_node(WorkflowNode::end("end").with_id("end"))
            .with_transition(WorkflowTransition::new(
                NodeId::new("start"),
                NodeId::new("legal"),
            ))
            .with_transition(WorkflowTransition::new(
                NodeId::new("legal"),
                NodeId::new("end"),
            ));
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("missing countersignRule"));
        assert_eq!(err.node, Some(NodeId::new("legal")));
    }

    #[test]
    fn test_approve_rejects_countersign_rule() {
        let def = WorkflowDefinition::new("Bad approve")
            .with_node(WorkflowNode::start("start").with_id("start"))
            .with_node(
                WorkflowNode::approve(
                    "city",
                    "City",
                    city_config().with_countersign_rule(CountersignRule::All),
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
            ));
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("countersignRule is not allowed"));
    }

    #[test]
    fn test_condition_node_rejects_approver_fields() {
        let mut node = WorkflowNode::condition("gate", "Gate", "amount > 10");
        node.config.approver_role = Some(RoleId::new("CITY_MANAGER"));
        let def = WorkflowDefinition::new("Bad condition")
            .with_node(WorkflowNode::start("start").with_id("start"))
            .with_node(node.with_id("gate"))
            .with_node(WorkflowNode::end("end").with_id("end"))
            .with_transition(WorkflowTransition::new(
                NodeId::new("start"),
                NodeId::new("gate"),
            ))
            .with_transition(WorkflowTransition::new(
                NodeId::new("gate"),
                NodeId::new("end"),
            ));
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("only conditionExpression"));
    }

    #[test]
    fn test_tree_report_requires_exactly_one_selector() {
        let both = NodeConfig::tree_report_hops(1);
        let mut both = both;
        both.approver_role = Some(RoleId::new("CITY_MANAGER"));
        let def = WorkflowDefinition::new("Ambiguous")
            .with_node(WorkflowNode::start("start").with_id("start"))
            .with_node(
                WorkflowNode::approve("up", "Up", both.with_reject_to(RejectTo::Initiator))
                    .with_id("up"),
            )
            .with_node(WorkflowNode::end("end").with_id("end"))
            .with_transition(WorkflowTransition::new(
                NodeId::new("start"),
                NodeId::new("up"),
            ))
            .with_transition(WorkflowTransition::new(NodeId::new("up"), NodeId::new("end")));
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("not both"));
    }

    #[test]
    fn test_end_cannot_have_outgoing() {
        let def = linear_definition()
            .with_node(WorkflowNode::approve("island", "Island", city_config()).with_id("island"))
            .with_node(WorkflowNode::end("end-2").with_id("end-2"))
            .with_transition(WorkflowTransition::new(
                NodeId::new("island"),
                NodeId::new("end-2"),
            ))
            .with_transition(WorkflowTransition::new(
                NodeId::new("end"),
                NodeId::new("island"),
            ));
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("END node cannot have outgoing"));
    }

    #[test]
    fn test_disconnected_node() {
        // island loops to itself through a conditional edge so degree
        // checks pass, but nothing reaches it from START
        let def = linear_definition()
            .with_node(WorkflowNode::approve("island", "Island", city_config()).with_id("island"))
            .with_transition(WorkflowTransition::conditional(
                NodeId::new("island"),
                NodeId::new("island"),
                "amount > 0",
            ));
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("unreachable"));
    }

    #[test]
    fn test_unconditional_cycle_rejected() {
        let def = WorkflowDefinition::new("Loop")
            .with_node(WorkflowNode::start("start").with_id("start"))
            .with_node(WorkflowNode::approve("a", "A", city_config()).with_id("a"))
            .with_node(WorkflowNode::approve("b", "B", city_config()).with_id("b"))
            .with_node(WorkflowNode::end("end").with_id("end"))
            .with_transition(WorkflowTransition::new(
                NodeId::new("start"),
                NodeId::new("a"),
            ))
            .with_transition(WorkflowTransition::new(NodeId::new("a"), NodeId::new("b")))
            .with_transition(WorkflowTransition::new(NodeId::new("b"), NodeId::new("a")))
            .with_transition(WorkflowTransition::new(NodeId::new("b"), NodeId::new("end")));
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("cycle of unconditional transitions"));
    }

    #[test]
    fn test_conditional_back_edge_compiles() {
        // the same shape, but the back-edge carries a condition —
        // rejection routing is allowed to loop
        let def = WorkflowDefinition::new("Reject route")
            .with_node(WorkflowNode::start("start").with_id("start"))
            .with_node(WorkflowNode::approve("a", "A", city_config()).with_id("a"))
            .with_node(WorkflowNode::approve("b", "B", city_config()).with_id("b"))
            .with_node(WorkflowNode::end("end").with_id("end"))
            .with_transition(WorkflowTransition::new(
                NodeId::new("start"),
                NodeId::new("a"),
            ))
            .with_transition(WorkflowTransition::new(NodeId::new("a"), NodeId::new("b")))
            .with_transition(WorkflowTransition::conditional(
                NodeId::new("b"),
                NodeId::new("a"),
                "condition.result == false",
            ))
            .with_transition(WorkflowTransition::new(NodeId::new("b"), NodeId::new("end")));
        assert!(compile(&def).is_ok());
    }

    #[test]
    fn test_node_without_outgoing() {
        let def = WorkflowDefinition::new("Dangling")
            .with_node(WorkflowNode::start("start").with_id("start"))
            .with_node(WorkflowNode::approve("a", "A", city_config()).with_id("a"))
            .with_node(WorkflowNode::end("end").with_id("end"))
            .with_transition(WorkflowTransition::new(
                NodeId::new("start"),
                NodeId::new("a"),
            ))
            .with_transition(WorkflowTransition::new(
                NodeId::new("start"),
                NodeId::new("end"),
            ));
        // start now has two outgoing, and `a` has none; start is checked first
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("exactly one outgoing"));
    }

    #[test]
    fn test_transition_to_unknown_node() {
        let def = linear_definition().with_transition(WorkflowTransition::new(
            NodeId::new("city"),
            NodeId::new("ghost"),
        ));
        let err = compile(&def).unwrap_err();
        assert!(err.reason.contains("unknown node"));
    }

    #[test]
    fn test_outgoing_sorted_by_priority() {
        let def = WorkflowDefinition::new("Branch")
            .with_node(WorkflowNode::start("start").with_id("start"))
            .with_node(WorkflowNode::condition("gate", "Gate", "amount > 100000").with_id("gate"))
            .with_node(WorkflowNode::approve("hi", "High", city_config()).with_id("hi"))
            .with_node(WorkflowNode::end("end").with_id("end"))
            .with_transition(WorkflowTransition::new(
                NodeId::new("start"),
                NodeId::new("gate"),
            ))
            .with_transition(
                WorkflowTransition::new(NodeId::new("gate"), NodeId::new("end")).with_sort_order(2),
            )
            .with_transition(
                WorkflowTransition::conditional(
                    NodeId::new("gate"),
                    NodeId::new("hi"),
                    "condition.result == true",
                )
                .with_sort_order(1),
            )
            .with_transition(WorkflowTransition::new(NodeId::new("hi"), NodeId::new("end")));

        let compiled = compile(&def).unwrap();
        let out = compiled.outgoing(&NodeId::new("gate"));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].target, NodeId::new("hi"));
        assert_eq!(out[1].target, NodeId::new("end"));
    }
}
