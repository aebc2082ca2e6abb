//! Approval engine: definition registry, instance state machine and the
//! operation surface the service layer binds to
//!
//! The engine composes the compiler, condition evaluator, approver
//! resolver and task ledger. It exclusively owns instance status and
//! position; it asks the ledger for every task mutation and only reads
//! aggregated outcomes back.
//!
//! Concurrency: the instance is the unit of serialization. Every
//! mutating operation takes that instance's entry in a lock map before
//! touching state, so concurrent countersign decisions are tallied one
//! at a time. Operations on different instances never contend beyond
//! the short map-level read/write locks; there is no global lock around
//! instance mutation.

use crate::compiler::{compile, CompiledWorkflow, NodeKind};
use crate::evaluator::{evaluate, EvalContext};
use crate::ledger::{TaskEvent, TaskLedger};
use crate::resolver::ApproverResolver;
use crate::traits::{ContractStore, OrgDirectory};
use approval_types::{
    ApprovalTask, ContractId, ContractSummary, Decision, GroupId, GroupOutcome, GroupTally,
    NodeId, Page, PageRequest, RejectTo, ResolveError, TaskId, UserId, WorkflowDefinition,
    WorkflowDefinitionId, WorkflowError, WorkflowInstance, WorkflowInstanceId, WorkflowResult,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// The approval workflow engine
pub struct ApprovalEngine<D: OrgDirectory, C: ContractStore> {
    directory: D,
    contracts: C,
    resolver: ApproverResolver,
    ledger: TaskLedger,
    /// Registration order; also the version tie-break
    definitions: RwLock<Vec<WorkflowDefinition>>,
    compiled: RwLock<HashMap<WorkflowDefinitionId, Arc<CompiledWorkflow>>>,
    instances: RwLock<HashMap<WorkflowInstanceId, WorkflowInstance>>,
    by_contract: RwLock<HashMap<ContractId, Vec<WorkflowInstanceId>>>,
    /// Per-instance mutual exclusion for mutating operations
    instance_locks: RwLock<HashMap<WorkflowInstanceId, Arc<Mutex<()>>>>,
}

impl<D: OrgDirectory, C: ContractStore> ApprovalEngine<D, C> {
    pub fn new(directory: D, contracts: C) -> Self {
        Self {
            directory,
            contracts,
            resolver: ApproverResolver::new(),
            ledger: TaskLedger::new(),
            definitions: RwLock::new(Vec::new()),
            compiled: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            by_contract: RwLock::new(HashMap::new()),
            instance_locks: RwLock::new(HashMap::new()),
        }
    }

    // ── Definition management ────────────────────────────────────────

    /// Compile and register a definition. A definition that fails to
    /// compile is rejected before any instance can use it.
    pub fn register_definition(
        &self,
        definition: WorkflowDefinition,
    ) -> WorkflowResult<WorkflowDefinitionId> {
        let compiled = compile(&definition)?;
        let id = definition.id.clone();

        {
            let mut cache = self
                .compiled
                .write()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            cache.insert(id.clone(), Arc::new(compiled));
        }
        {
            let mut definitions = self
                .definitions
                .write()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            definitions.push(definition);
        }

        tracing::info!(definition = %id, "workflow definition registered");
        Ok(id)
    }

    /// Publish an edited copy of `base` as its successor version.
    ///
    /// The base row is never mutated; running instances keep executing
    /// the version they were started with.
    pub fn register_new_version(
        &self,
        base: &WorkflowDefinitionId,
        mut edited: WorkflowDefinition,
    ) -> WorkflowResult<WorkflowDefinitionId> {
        let base_version = self.definition(base)?.version;
        edited.id = WorkflowDefinitionId::generate();
        edited.version = base_version + 1;
        self.register_definition(edited)
    }

    /// Enable or disable a definition. Only gates new starts; running
    /// instances are unaffected.
    pub fn set_definition_enabled(
        &self,
        id: &WorkflowDefinitionId,
        enabled: bool,
    ) -> WorkflowResult<()> {
        let mut definitions = self
            .definitions
            .write()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        let definition = definitions
            .iter_mut()
            .find(|d| &d.id == id)
            .ok_or_else(|| WorkflowError::DefinitionNotFound(id.clone()))?;
        definition.enabled = enabled;
        Ok(())
    }

    pub fn definition(&self, id: &WorkflowDefinitionId) -> WorkflowResult<WorkflowDefinition> {
        let definitions = self
            .definitions
            .read()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        definitions
            .iter()
            .find(|d| &d.id == id)
            .cloned()
            .ok_or_else(|| WorkflowError::DefinitionNotFound(id.clone()))
    }

    pub fn definitions(&self) -> WorkflowResult<Vec<WorkflowDefinition>> {
        let definitions = self
            .definitions
            .read()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        Ok(definitions.clone())
    }

    // ── Instance lifecycle ───────────────────────────────────────────

    /// Start an approval instance for a contract.
    ///
    /// Selects the applicable definition (enabled, contract type listed,
    /// gate expression satisfied; highest version wins), creates the
    /// instance at the start node's successor and performs node entry.
    pub fn start(
        &self,
        contract_id: &ContractId,
        initiator: &UserId,
    ) -> WorkflowResult<WorkflowInstance> {
        if !self.contracts.is_eligible_for_approval(contract_id)? {
            return Err(WorkflowError::ContractIneligible(contract_id.clone()));
        }
        let summary = self.contracts.contract_summary(contract_id)?;
        let org_level = self
            .directory
            .org_level_of(initiator)
            .map_err(ResolveError::from)?;

        let definition = self
            .select_definition(&summary, org_level)?
            .ok_or_else(|| WorkflowError::NoApplicableDefinition(contract_id.clone()))?;
        let compiled = self.compiled_for(&definition.id)?;

        let instance =
            WorkflowInstance::new(definition.id.clone(), contract_id.clone(), initiator.clone());
        let instance_id = instance.id.clone();

        // reservation: the duplicate check and the insertion are atomic
        {
            let mut instances = self
                .instances
                .write()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            let mut by_contract = self
                .by_contract
                .write()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            let ids = by_contract.entry(contract_id.clone()).or_default();
            if ids
                .iter()
                .filter_map(|id| instances.get(id))
                .any(|existing| existing.is_running())
            {
                return Err(WorkflowError::DuplicateInstance(contract_id.clone()));
            }
            ids.push(instance_id.clone());
            instances.insert(instance_id.clone(), instance.clone());
        }

        let lock = self.instance_lock(&instance_id)?;
        let _guard = lock.lock().map_err(|_| WorkflowError::LockPoisoned)?;

        let mut live = instance;
        live.advance_to(compiled.entry_target().clone());
        tracing::info!(
            instance = %instance_id,
            definition = %definition.id,
            contract = %contract_id,
            "workflow instance started"
        );

        match self.enter_node(&mut live, &compiled, &summary, org_level, initiator) {
            Ok(()) => {
                self.store_instance(live.clone())?;
                Ok(live)
            }
            Err(err) => {
                // node entry failed before any task row was written;
                // roll the reservation back so the caller can retry
                let mut instances = self
                    .instances
                    .write()
                    .map_err(|_| WorkflowError::LockPoisoned)?;
                instances.remove(&instance_id);
                let mut by_contract = self
                    .by_contract
                    .write()
                    .map_err(|_| WorkflowError::LockPoisoned)?;
                if let Some(ids) = by_contract.get_mut(contract_id) {
                    ids.retain(|id| id != &instance_id);
                }
                Err(err)
            }
        }
    }

    /// Record an approver's decision on a task and advance the instance
    /// as far as the decision resolves it.
    pub fn record_decision(
        &self,
        task_id: &TaskId,
        decision: Decision,
        opinion: Option<String>,
        actor: &UserId,
    ) -> WorkflowResult<ApprovalTask> {
        let task = self.ledger.task(task_id)?;
        let lock = self.instance_lock(&task.instance_id)?;
        let _guard = lock.lock().map_err(|_| WorkflowError::LockPoisoned)?;

        let mut instance = self.instance(&task.instance_id)?;
        if !instance.is_running() {
            return Err(WorkflowError::InvalidTransition(instance.id.clone()));
        }
        if instance.current_node.as_ref() != Some(&task.node_id) {
            return Err(WorkflowError::InvalidTaskState {
                task: task_id.clone(),
                reason: "task is not at the instance's current node".into(),
            });
        }

        let compiled = self.compiled_for(&instance.definition_id)?;
        let summary = self.contracts.contract_summary(&instance.contract_id)?;
        let org_level = self
            .directory
            .org_level_of(&instance.initiator_id)
            .map_err(ResolveError::from)?;

        let node = match compiled.node(&task.node_id) {
            Some(node) => node.clone(),
            None => {
                return Err(WorkflowError::InvalidTaskState {
                    task: task_id.clone(),
                    reason: "task node is missing from the compiled graph".into(),
                })
            }
        };

        let updated = self
            .ledger
            .decide(task_id, decision, opinion.clone(), actor)?;
        tracing::info!(
            task = %task_id,
            instance = %instance.id,
            decision = ?decision,
            "decision recorded"
        );

        match &node.kind {
            NodeKind::Approve { reject_to, .. } => {
                // first responder wins: close the sibling fan-out
                for sibling in
                    self.ledger
                        .pending_siblings(&instance.id, &task.node_id, task_id)?
                {
                    self.ledger
                        .supersede(&sibling, "resolved by another approver", actor)?;
                }
                match decision {
                    Decision::Approve => {
                        self.advance_from_current(
                            &mut instance,
                            &compiled,
                            &summary,
                            org_level,
                            None,
                            actor,
                        )?;
                    }
                    Decision::Reject => {
                        self.apply_rejection(
                            &mut instance,
                            &compiled,
                            *reject_to,
                            &node.node_code,
                            opinion,
                            &summary,
                            org_level,
                            actor,
                        )?;
                    }
                }
            }

            NodeKind::Countersign {
                rule, reject_to, ..
            } => {
                let group = match &task.parallel_group {
                    Some(group) => group.clone(),
                    None => {
                        return Err(WorkflowError::InvalidTaskState {
                            task: task_id.clone(),
                            reason: "countersign task has no parallel group".into(),
                        })
                    }
                };
                let tally = self.ledger.group_tally(&group)?;
                match tally.outcome(*rule) {
                    None => {
                        // group still open; the instance stays put
                    }
                    Some(GroupOutcome::Approved) => {
                        self.close_group_remainder(&instance.id, &task.node_id, actor)?;
                        self.advance_from_current(
                            &mut instance,
                            &compiled,
                            &summary,
                            org_level,
                            Some(tally),
                            actor,
                        )?;
                    }
                    Some(GroupOutcome::Rejected) => {
                        self.close_group_remainder(&instance.id, &task.node_id, actor)?;
                        self.apply_rejection(
                            &mut instance,
                            &compiled,
                            *reject_to,
                            &node.node_code,
                            opinion,
                            &summary,
                            org_level,
                            actor,
                        )?;
                    }
                }
            }

            // decisions only exist on approval-bearing nodes
            _ => {
                return Err(WorkflowError::InvalidTaskState {
                    task: task_id.clone(),
                    reason: "task node does not accept decisions".into(),
                })
            }
        }

        self.store_instance(instance)?;
        Ok(updated)
    }

    /// Hand a pending task to another approver
    pub fn transfer(
        &self,
        task_id: &TaskId,
        target: &UserId,
        reason: &str,
        actor: &UserId,
    ) -> WorkflowResult<ApprovalTask> {
        let task = self.ledger.task(task_id)?;
        let lock = self.instance_lock(&task.instance_id)?;
        let _guard = lock.lock().map_err(|_| WorkflowError::LockPoisoned)?;

        let instance = self.instance(&task.instance_id)?;
        if !instance.is_running() {
            return Err(WorkflowError::InvalidTransition(instance.id.clone()));
        }
        if instance.current_node.as_ref() != Some(&task.node_id) {
            return Err(WorkflowError::InvalidTaskState {
                task: task_id.clone(),
                reason: "task is not at the instance's current node".into(),
            });
        }

        let (_, successor) = self.ledger.transfer(task_id, target, reason, actor)?;
        tracing::info!(
            task = %task_id,
            successor = %successor.id,
            target = %target,
            "task transferred"
        );
        Ok(successor)
    }

    /// Add approvers to a countersign group, enlarging its denominator
    pub fn add_sign(
        &self,
        task_id: &TaskId,
        extra_users: &[UserId],
        reason: &str,
        actor: &UserId,
    ) -> WorkflowResult<Vec<ApprovalTask>> {
        let task = self.ledger.task(task_id)?;
        let lock = self.instance_lock(&task.instance_id)?;
        let _guard = lock.lock().map_err(|_| WorkflowError::LockPoisoned)?;

        let instance = self.instance(&task.instance_id)?;
        if !instance.is_running() {
            return Err(WorkflowError::InvalidTransition(instance.id.clone()));
        }
        if instance.current_node.as_ref() != Some(&task.node_id) {
            return Err(WorkflowError::InvalidTaskState {
                task: task_id.clone(),
                reason: "task is not at the instance's current node".into(),
            });
        }
        let group = match &task.parallel_group {
            Some(group) => group.clone(),
            None => {
                return Err(WorkflowError::InvalidTaskState {
                    task: task_id.clone(),
                    reason: "add-sign requires a countersign task".into(),
                })
            }
        };

        let members = self.ledger.group_members(&group)?;
        let mut created = Vec::new();
        for user in extra_users {
            if members.contains(user) || created.iter().any(|t: &ApprovalTask| &t.approver == user)
            {
                continue;
            }
            created.push(self.ledger.open(
                &instance.id,
                &task.node_id,
                user,
                Some(group.clone()),
                actor,
                Some(format!("add-sign: {}", reason)),
            )?);
        }
        tracing::info!(
            task = %task_id,
            added = created.len(),
            "countersign group enlarged"
        );
        Ok(created)
    }

    /// Terminate a running instance, closing its pending tasks
    pub fn terminate(
        &self,
        instance_id: &WorkflowInstanceId,
        reason: &str,
        actor: &UserId,
    ) -> WorkflowResult<WorkflowInstance> {
        let lock = self.instance_lock(instance_id)?;
        let _guard = lock.lock().map_err(|_| WorkflowError::LockPoisoned)?;

        let mut instance = self.instance(instance_id)?;
        if !instance.is_running() {
            return Err(WorkflowError::InvalidTransition(instance_id.clone()));
        }

        instance.terminate(reason);
        self.ledger.supersede_pending_for_instance(
            instance_id,
            &format!("instance terminated: {}", reason),
            actor,
        )?;
        self.store_instance(instance.clone())?;

        tracing::info!(instance = %instance_id, reason, "workflow instance terminated");
        Ok(instance)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn instance(&self, id: &WorkflowInstanceId) -> WorkflowResult<WorkflowInstance> {
        let instances = self
            .instances
            .read()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        instances
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::InstanceNotFound(id.clone()))
    }

    /// Full ordered task history of an instance
    pub fn instance_history(
        &self,
        id: &WorkflowInstanceId,
    ) -> WorkflowResult<Vec<ApprovalTask>> {
        self.instance(id)?;
        self.ledger.history(id)
    }

    /// The attributed event trail of an instance
    pub fn instance_events(&self, id: &WorkflowInstanceId) -> WorkflowResult<Vec<TaskEvent>> {
        self.instance(id)?;
        self.ledger.events_for(id)
    }

    pub fn instances_started_by(&self, user: &UserId) -> WorkflowResult<Vec<WorkflowInstance>> {
        let instances = self
            .instances
            .read()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        Ok(instances
            .values()
            .filter(|i| &i.initiator_id == user)
            .cloned()
            .collect())
    }

    pub fn running_instance_for_contract(
        &self,
        contract: &ContractId,
    ) -> WorkflowResult<Option<WorkflowInstance>> {
        let by_contract = self
            .by_contract
            .read()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        let instances = self
            .instances
            .read()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        Ok(by_contract
            .get(contract)
            .into_iter()
            .flatten()
            .filter_map(|id| instances.get(id))
            .find(|i| i.is_running())
            .cloned())
    }

    pub fn task(&self, id: &TaskId) -> WorkflowResult<ApprovalTask> {
        self.ledger.task(id)
    }

    pub fn pending_tasks(
        &self,
        user: &UserId,
        page: PageRequest,
    ) -> WorkflowResult<Page<ApprovalTask>> {
        self.ledger.pending_for(user, page)
    }

    pub fn completed_tasks(
        &self,
        user: &UserId,
        page: PageRequest,
    ) -> WorkflowResult<Page<ApprovalTask>> {
        self.ledger.completed_by(user, page)
    }

    pub fn group_tally(&self, group: &GroupId) -> WorkflowResult<GroupTally> {
        self.ledger.group_tally(group)
    }

    // ── Internal: node entry and advancement ─────────────────────────

    /// Process the instance's current node: fan out tasks, evaluate a
    /// condition, or finish. Loops through task-free nodes until the
    /// instance waits on approvers or reaches a terminal state.
    fn enter_node(
        &self,
        instance: &mut WorkflowInstance,
        compiled: &CompiledWorkflow,
        summary: &ContractSummary,
        org_level: Option<u32>,
        actor: &UserId,
    ) -> WorkflowResult<()> {
        loop {
            let node_id = match &instance.current_node {
                Some(node_id) => node_id.clone(),
                None => return Ok(()),
            };
            let node = match compiled.node(&node_id) {
                Some(node) => node,
                None => {
                    tracing::warn!(instance = %instance.id, node = %node_id, "current node missing from compiled graph");
                    instance.terminate("graph inconsistency: unknown node");
                    return Ok(());
                }
            };

            match &node.kind {
                NodeKind::End => {
                    instance.complete();
                    tracing::info!(instance = %instance.id, "workflow instance completed");
                    return Ok(());
                }

                NodeKind::Start => {
                    // no transition may target START; treat as a dead end
                    tracing::warn!(instance = %instance.id, "instance routed back into START");
                    instance.terminate("no transition matched");
                    return Ok(());
                }

                NodeKind::Condition { expression } => {
                    let mut ctx = EvalContext::new(summary);
                    if let Some(level) = org_level {
                        ctx = ctx.with_org_level(level);
                    }
                    let branch = match evaluate(expression, &ctx) {
                        Ok(result) => result,
                        Err(err) => {
                            tracing::warn!(
                                instance = %instance.id,
                                node = %node.node_code,
                                error = %err,
                                "condition expression failed; treating as false"
                            );
                            false
                        }
                    };
                    let ctx = ctx.with_condition_result(branch);
                    match self.select_transition(compiled, &node_id, &ctx) {
                        Some(target) => {
                            instance.advance_to(target);
                            continue;
                        }
                        None => {
                            instance.terminate("no transition matched");
                            return Ok(());
                        }
                    }
                }

                NodeKind::Approve { approvers, .. } => {
                    let resolved =
                        self.resolver
                            .resolve(&self.directory, approvers, &instance.initiator_id);
                    return self.fan_out(instance, &node_id, &node.node_code, resolved, None, actor);
                }

                NodeKind::Countersign { approvers, .. } => {
                    let resolved =
                        self.resolver
                            .resolve(&self.directory, approvers, &instance.initiator_id);
                    let group = GroupId::generate();
                    return self.fan_out(
                        instance,
                        &node_id,
                        &node.node_code,
                        resolved,
                        Some(group),
                        actor,
                    );
                }
            }
        }
    }

    /// Open one pending task per resolved approver. An empty resolution
    /// terminates the instance with a machine-readable reason rather
    /// than leaving it stuck; a directory failure surfaces to the
    /// caller.
    fn fan_out(
        &self,
        instance: &mut WorkflowInstance,
        node_id: &NodeId,
        node_code: &str,
        resolved: Result<Vec<UserId>, ResolveError>,
        group: Option<GroupId>,
        actor: &UserId,
    ) -> WorkflowResult<()> {
        match resolved {
            Ok(users) => {
                for user in &users {
                    self.ledger
                        .open(&instance.id, node_id, user, group.clone(), actor, None)?;
                }
                tracing::info!(
                    instance = %instance.id,
                    node = %node_code,
                    approvers = users.len(),
                    countersign = group.is_some(),
                    "approval tasks dispatched"
                );
                Ok(())
            }
            Err(ResolveError::NoApprover(detail)) => {
                tracing::warn!(
                    instance = %instance.id,
                    node = %node_code,
                    detail = %detail,
                    "no approver resolvable; terminating instance"
                );
                instance.terminate(format!("no approver for node '{}': {}", node_code, detail));
                Ok(())
            }
            Err(err @ ResolveError::Directory(_)) => Err(err.into()),
        }
    }

    /// Leave the current node along the first satisfied outgoing
    /// transition; a dead end terminates the instance.
    #[allow(clippy::too_many_arguments)]
    fn advance_from_current(
        &self,
        instance: &mut WorkflowInstance,
        compiled: &CompiledWorkflow,
        summary: &ContractSummary,
        org_level: Option<u32>,
        tally: Option<GroupTally>,
        actor: &UserId,
    ) -> WorkflowResult<()> {
        let current = match &instance.current_node {
            Some(node_id) => node_id.clone(),
            None => return Ok(()),
        };
        let mut ctx = EvalContext::new(summary);
        if let Some(level) = org_level {
            ctx = ctx.with_org_level(level);
        }
        if let Some(tally) = tally {
            ctx = ctx.with_tally(tally);
        }
        match self.select_transition(compiled, &current, &ctx) {
            Some(target) => {
                instance.advance_to(target);
                self.enter_node(instance, compiled, summary, org_level, actor)
            }
            None => {
                tracing::warn!(instance = %instance.id, node = %current, "no outgoing transition matched");
                instance.terminate("no transition matched");
                Ok(())
            }
        }
    }

    /// First outgoing transition, ascending `sort_order`, whose
    /// condition is satisfied or absent. A condition that fails to
    /// evaluate is logged and treated as not satisfied.
    fn select_transition(
        &self,
        compiled: &CompiledWorkflow,
        from: &NodeId,
        ctx: &EvalContext<'_>,
    ) -> Option<NodeId> {
        for transition in compiled.outgoing(from) {
            match &transition.condition {
                None => return Some(transition.target.clone()),
                Some(expression) => match evaluate(expression, ctx) {
                    Ok(true) => return Some(transition.target.clone()),
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!(
                            transition = %transition.id,
                            error = %err,
                            "transition condition failed; treating as not satisfied"
                        );
                    }
                },
            }
        }
        None
    }

    /// Apply a node rejection according to its reject-to policy
    #[allow(clippy::too_many_arguments)]
    fn apply_rejection(
        &self,
        instance: &mut WorkflowInstance,
        compiled: &CompiledWorkflow,
        reject_to: RejectTo,
        node_code: &str,
        opinion: Option<String>,
        summary: &ContractSummary,
        org_level: Option<u32>,
        actor: &UserId,
    ) -> WorkflowResult<()> {
        match reject_to {
            RejectTo::Initiator => {
                let reason =
                    opinion.unwrap_or_else(|| format!("rejected at node '{}'", node_code));
                instance.reject(reason);
                tracing::info!(instance = %instance.id, node = %node_code, "instance rejected to initiator");
                Ok(())
            }
            RejectTo::Previous => loop {
                match instance.step_back() {
                    Some(previous) => {
                        let reopenable = matches!(
                            compiled.node(&previous).map(|n| &n.kind),
                            Some(NodeKind::Approve { .. }) | Some(NodeKind::Countersign { .. })
                        );
                        // routing nodes are stepped through: re-entering a
                        // condition node would only route forward again
                        if !reopenable {
                            continue;
                        }
                        tracing::info!(
                            instance = %instance.id,
                            node = %node_code,
                            reopened = %previous,
                            "rejection re-opened previous node"
                        );
                        // fresh approver resolution; stale tasks are never reused
                        return self.enter_node(instance, compiled, summary, org_level, actor);
                    }
                    None => {
                        // no prior approval step to re-open
                        let reason = opinion
                            .unwrap_or_else(|| format!("rejected at node '{}'", node_code));
                        instance.reject(reason);
                        return Ok(());
                    }
                }
            },
        }
    }

    /// Supersede the still-pending tasks at a resolved countersign node
    fn close_group_remainder(
        &self,
        instance_id: &WorkflowInstanceId,
        node_id: &NodeId,
        actor: &UserId,
    ) -> WorkflowResult<()> {
        let pending = self.ledger.pending_for_instance(instance_id)?;
        for task_id in pending {
            let task = self.ledger.task(&task_id)?;
            if &task.node_id == node_id {
                self.ledger
                    .supersede(&task_id, "countersign group resolved", actor)?;
            }
        }
        Ok(())
    }

    // ── Internal: state plumbing ─────────────────────────────────────

    fn instance_lock(&self, id: &WorkflowInstanceId) -> WorkflowResult<Arc<Mutex<()>>> {
        let mut locks = self
            .instance_locks
            .write()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        Ok(locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    fn store_instance(&self, instance: WorkflowInstance) -> WorkflowResult<()> {
        let mut instances = self
            .instances
            .write()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        instances.insert(instance.id.clone(), instance);
        Ok(())
    }

    fn compiled_for(&self, id: &WorkflowDefinitionId) -> WorkflowResult<Arc<CompiledWorkflow>> {
        {
            let cache = self
                .compiled
                .read()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            if let Some(compiled) = cache.get(id) {
                return Ok(compiled.clone());
            }
        }
        // cache miss: compile from the stored definition
        let definition = self.definition(id)?;
        let compiled = Arc::new(compile(&definition)?);
        let mut cache = self
            .compiled
            .write()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        Ok(cache.entry(id.clone()).or_insert(compiled).clone())
    }

    /// Applicable definition for a contract: enabled, contract type
    /// listed, gate satisfied. Highest version wins; a gate that fails
    /// to evaluate disqualifies only that definition.
    fn select_definition(
        &self,
        summary: &ContractSummary,
        org_level: Option<u32>,
    ) -> WorkflowResult<Option<WorkflowDefinition>> {
        let definitions = self
            .definitions
            .read()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        let mut best: Option<&WorkflowDefinition> = None;
        for definition in definitions.iter().filter(|d| d.enabled) {
            if !definition
                .applicable_contract_types
                .iter()
                .any(|t| t == &summary.contract_type)
            {
                continue;
            }
            let applies = match &definition.condition_expression {
                None => true,
                Some(expression) => {
                    let mut ctx = EvalContext::new(summary);
                    if let Some(level) = org_level {
                        ctx = ctx.with_org_level(level);
                    }
                    match evaluate(expression, &ctx) {
                        Ok(result) => result,
                        Err(err) => {
                            tracing::warn!(
                                definition = %definition.id,
                                error = %err,
                                "applicability gate failed to evaluate; skipping definition"
                            );
                            false
                        }
                    }
                }
            };
            if !applies {
                continue;
            }
            match best {
                None => best = Some(definition),
                Some(current) if definition.version > current.version => {
                    best = Some(definition)
                }
                _ => {}
            }
        }
        Ok(best.cloned())
    }
}
