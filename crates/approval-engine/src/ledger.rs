//! Task ledger: the append-only record of every approval task
//!
//! The ledger exclusively owns task creation and status writes. Nothing
//! is ever deleted: a transferred task spawns a successor, a cancelled
//! task is closed as superseded with its reason, and every mutation is
//! attributed to an actor, timestamped, and mirrored into a per-instance
//! event trail — the forensic record behind instance history views.

use approval_types::{
    ApprovalTask, Decision, GroupId, GroupTally, NodeId, Page, PageRequest, TaskId, TaskStatus,
    UserId, WorkflowError, WorkflowInstanceId, WorkflowResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

// ── Event trail ──────────────────────────────────────────────────────

/// What happened to a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAction {
    Opened,
    Approved,
    Rejected,
    Transferred,
    Superseded,
}

/// One entry in an instance's task event trail
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    /// Monotonically increasing within the instance
    pub seq: u64,
    pub task_id: TaskId,
    pub action: TaskAction,
    pub actor: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

// ── Ledger ───────────────────────────────────────────────────────────

/// Append-only store of approval tasks, indexed for the queries the
/// engine and the task-list views need
#[derive(Debug, Default)]
pub struct TaskLedger {
    tasks: RwLock<HashMap<TaskId, ApprovalTask>>,
    /// Creation order per instance
    by_instance: RwLock<HashMap<WorkflowInstanceId, Vec<TaskId>>>,
    by_approver: RwLock<HashMap<UserId, Vec<TaskId>>>,
    by_group: RwLock<HashMap<GroupId, Vec<TaskId>>>,
    events: RwLock<HashMap<WorkflowInstanceId, Vec<TaskEvent>>>,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Open a new pending task
    pub fn open(
        &self,
        instance: &WorkflowInstanceId,
        node: &NodeId,
        approver: &UserId,
        group: Option<GroupId>,
        actor: &UserId,
        detail: Option<String>,
    ) -> WorkflowResult<ApprovalTask> {
        let task = ApprovalTask::new(
            instance.clone(),
            node.clone(),
            approver.clone(),
            group.clone(),
        );
        let task_id = task.id.clone();

        {
            let mut tasks = self
                .tasks
                .write()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            tasks.insert(task_id.clone(), task.clone());
        }
        {
            let mut by_instance = self
                .by_instance
                .write()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            by_instance
                .entry(instance.clone())
                .or_default()
                .push(task_id.clone());
        }
        {
            let mut by_approver = self
                .by_approver
                .write()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            by_approver
                .entry(approver.clone())
                .or_default()
                .push(task_id.clone());
        }
        if let Some(group) = &group {
            let mut by_group = self
                .by_group
                .write()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            by_group
                .entry(group.clone())
                .or_default()
                .push(task_id.clone());
        }

        self.record_event(instance, &task_id, TaskAction::Opened, actor, detail)?;
        tracing::trace!(task = %task_id, approver = %approver, "task opened");
        Ok(task)
    }

    /// Record an approver's decision on a pending task
    pub fn decide(
        &self,
        task_id: &TaskId,
        decision: Decision,
        opinion: Option<String>,
        actor: &UserId,
    ) -> WorkflowResult<ApprovalTask> {
        let (updated, instance) = {
            let mut tasks = self
                .tasks
                .write()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            let task = tasks
                .get_mut(task_id)
                .ok_or_else(|| WorkflowError::TaskNotFound(task_id.clone()))?;
            if !task.is_pending() {
                return Err(WorkflowError::InvalidTaskState {
                    task: task_id.clone(),
                    reason: format!("expected PENDING, found {:?}", task.status),
                });
            }
            if &task.approver != actor {
                return Err(WorkflowError::NotTaskApprover {
                    task: task_id.clone(),
                    actor: actor.clone(),
                });
            }
            task.status = match decision {
                Decision::Approve => TaskStatus::Approved,
                Decision::Reject => TaskStatus::Rejected,
            };
            task.opinion = opinion.clone();
            task.decided_at = Some(Utc::now());
            (task.clone(), task.instance_id.clone())
        };

        let action = match decision {
            Decision::Approve => TaskAction::Approved,
            Decision::Reject => TaskAction::Rejected,
        };
        self.record_event(&instance, task_id, action, actor, opinion)?;
        Ok(updated)
    }

    /// Close a pending task as transferred and open its successor on the
    /// same node, preserving the parallel group
    pub fn transfer(
        &self,
        task_id: &TaskId,
        target: &UserId,
        reason: &str,
        actor: &UserId,
    ) -> WorkflowResult<(ApprovalTask, ApprovalTask)> {
        let original = {
            let mut tasks = self
                .tasks
                .write()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            let task = tasks
                .get_mut(task_id)
                .ok_or_else(|| WorkflowError::TaskNotFound(task_id.clone()))?;
            if !task.is_pending() {
                return Err(WorkflowError::InvalidTaskState {
                    task: task_id.clone(),
                    reason: format!("expected PENDING, found {:?}", task.status),
                });
            }
            task.status = TaskStatus::Transferred;
            task.note = Some(format!("transferred to '{}': {}", target, reason));
            task.decided_at = Some(Utc::now());
            task.clone()
        };

        self.record_event(
            &original.instance_id,
            task_id,
            TaskAction::Transferred,
            actor,
            Some(format!("to '{}': {}", target, reason)),
        )?;

        let successor = self.open(
            &original.instance_id,
            &original.node_id,
            target,
            original.parallel_group.clone(),
            actor,
            Some(format!("received by transfer from '{}'", original.approver)),
        )?;

        Ok((original, successor))
    }

    /// Close a pending task without a decision
    pub fn supersede(
        &self,
        task_id: &TaskId,
        reason: &str,
        actor: &UserId,
    ) -> WorkflowResult<ApprovalTask> {
        let updated = {
            let mut tasks = self
                .tasks
                .write()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            let task = tasks
                .get_mut(task_id)
                .ok_or_else(|| WorkflowError::TaskNotFound(task_id.clone()))?;
            if !task.is_pending() {
                return Err(WorkflowError::InvalidTaskState {
                    task: task_id.clone(),
                    reason: format!("expected PENDING, found {:?}", task.status),
                });
            }
            task.status = TaskStatus::Superseded;
            task.note = Some(reason.to_string());
            task.decided_at = Some(Utc::now());
            task.clone()
        };

        self.record_event(
            &updated.instance_id,
            task_id,
            TaskAction::Superseded,
            actor,
            Some(reason.to_string()),
        )?;
        Ok(updated)
    }

    /// Close every still-pending task of an instance; returns their ids
    pub fn supersede_pending_for_instance(
        &self,
        instance: &WorkflowInstanceId,
        reason: &str,
        actor: &UserId,
    ) -> WorkflowResult<Vec<TaskId>> {
        let pending = self.pending_for_instance(instance)?;
        for task_id in &pending {
            self.supersede(task_id, reason, actor)?;
        }
        Ok(pending)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn task(&self, task_id: &TaskId) -> WorkflowResult<ApprovalTask> {
        let tasks = self.tasks.read().map_err(|_| WorkflowError::LockPoisoned)?;
        tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| WorkflowError::TaskNotFound(task_id.clone()))
    }

    /// Ids of all still-pending tasks of an instance, creation order
    pub fn pending_for_instance(
        &self,
        instance: &WorkflowInstanceId,
    ) -> WorkflowResult<Vec<TaskId>> {
        let ids = self.instance_task_ids(instance)?;
        let tasks = self.tasks.read().map_err(|_| WorkflowError::LockPoisoned)?;
        Ok(ids
            .into_iter()
            .filter(|id| tasks.get(id).map(|t| t.is_pending()).unwrap_or(false))
            .collect())
    }

    /// Pending tasks of an instance at one node, excluding one task
    pub fn pending_siblings(
        &self,
        instance: &WorkflowInstanceId,
        node: &NodeId,
        except: &TaskId,
    ) -> WorkflowResult<Vec<TaskId>> {
        let ids = self.instance_task_ids(instance)?;
        let tasks = self.tasks.read().map_err(|_| WorkflowError::LockPoisoned)?;
        Ok(ids
            .into_iter()
            .filter(|id| {
                id != except
                    && tasks
                        .get(id)
                        .map(|t| t.is_pending() && &t.node_id == node)
                        .unwrap_or(false)
            })
            .collect())
    }

    /// Pending tasks of a user, newest first
    pub fn pending_for(
        &self,
        user: &UserId,
        page: PageRequest,
    ) -> WorkflowResult<Page<ApprovalTask>> {
        self.page_for(user, page, |task| task.is_pending(), |task| task.created_at)
    }

    /// Tasks a user has acted on (approved, rejected or transferred
    /// away), newest decision first
    pub fn completed_by(
        &self,
        user: &UserId,
        page: PageRequest,
    ) -> WorkflowResult<Page<ApprovalTask>> {
        self.page_for(
            user,
            page,
            |task| {
                matches!(
                    task.status,
                    TaskStatus::Approved | TaskStatus::Rejected | TaskStatus::Transferred
                )
            },
            |task| task.decided_at.unwrap_or(task.created_at),
        )
    }

    /// Full ordered task history of an instance (creation order)
    pub fn history(&self, instance: &WorkflowInstanceId) -> WorkflowResult<Vec<ApprovalTask>> {
        let ids = self.instance_task_ids(instance)?;
        let tasks = self.tasks.read().map_err(|_| WorkflowError::LockPoisoned)?;
        Ok(ids.iter().filter_map(|id| tasks.get(id).cloned()).collect())
    }

    /// The attributed event trail of an instance
    pub fn events_for(&self, instance: &WorkflowInstanceId) -> WorkflowResult<Vec<TaskEvent>> {
        let events = self
            .events
            .read()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        Ok(events.get(instance).cloned().unwrap_or_default())
    }

    /// Vote tally of a parallel group. Transferred and superseded tasks
    /// are not voters; a transfer's successor carries the vote instead.
    pub fn group_tally(&self, group: &GroupId) -> WorkflowResult<GroupTally> {
        let ids = {
            let by_group = self
                .by_group
                .read()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            by_group.get(group).cloned().unwrap_or_default()
        };
        let tasks = self.tasks.read().map_err(|_| WorkflowError::LockPoisoned)?;
        let mut tally = GroupTally::default();
        for id in &ids {
            if let Some(task) = tasks.get(id) {
                match task.status {
                    TaskStatus::Approved => tally.approved += 1,
                    TaskStatus::Rejected => tally.rejected += 1,
                    TaskStatus::Pending => tally.pending += 1,
                    TaskStatus::Transferred | TaskStatus::Superseded => {}
                }
            }
        }
        Ok(tally)
    }

    /// Every user who ever held a task in the group, any status
    pub fn group_members(&self, group: &GroupId) -> WorkflowResult<Vec<UserId>> {
        let ids = {
            let by_group = self
                .by_group
                .read()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            by_group.get(group).cloned().unwrap_or_default()
        };
        let tasks = self.tasks.read().map_err(|_| WorkflowError::LockPoisoned)?;
        let mut members = Vec::new();
        for id in &ids {
            if let Some(task) = tasks.get(id) {
                if !members.contains(&task.approver) {
                    members.push(task.approver.clone());
                }
            }
        }
        Ok(members)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn instance_task_ids(&self, instance: &WorkflowInstanceId) -> WorkflowResult<Vec<TaskId>> {
        let by_instance = self
            .by_instance
            .read()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        Ok(by_instance.get(instance).cloned().unwrap_or_default())
    }

    fn page_for(
        &self,
        user: &UserId,
        page: PageRequest,
        keep: impl Fn(&ApprovalTask) -> bool,
        sort_key: impl Fn(&ApprovalTask) -> DateTime<Utc>,
    ) -> WorkflowResult<Page<ApprovalTask>> {
        let ids = {
            let by_approver = self
                .by_approver
                .read()
                .map_err(|_| WorkflowError::LockPoisoned)?;
            by_approver.get(user).cloned().unwrap_or_default()
        };
        let tasks = self.tasks.read().map_err(|_| WorkflowError::LockPoisoned)?;
        let mut matching: Vec<ApprovalTask> = ids
            .iter()
            .filter_map(|id| tasks.get(id))
            .filter(|t| keep(t))
            .cloned()
            .collect();
        matching.sort_by_key(|t| std::cmp::Reverse(sort_key(t)));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset())
            .take(page.page_size as usize)
            .collect();
        Ok(Page::new(items, total, page))
    }

    fn record_event(
        &self,
        instance: &WorkflowInstanceId,
        task_id: &TaskId,
        action: TaskAction,
        actor: &UserId,
        detail: Option<String>,
    ) -> WorkflowResult<()> {
        let mut events = self
            .events
            .write()
            .map_err(|_| WorkflowError::LockPoisoned)?;
        let trail = events.entry(instance.clone()).or_default();
        trail.push(TaskEvent {
            seq: trail.len() as u64,
            task_id: task_id.clone(),
            action,
            actor: actor.clone(),
            detail,
            at: Utc::now(),
        });
        Ok(())
    }
}
