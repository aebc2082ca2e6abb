//! Approval tasks: one approver's unit of work at a node visit
//!
//! Tasks created together at a countersign or add-sign fan-out share a
//! `GroupId` and are tallied jointly; `GroupTally` holds the threshold
//! arithmetic for resolving such a group.

use crate::{CountersignRule, NodeId, UserId, WorkflowInstanceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for an approval task
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier shared by tasks created together at a parallel fan-out
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Status and decisions ─────────────────────────────────────────────

/// Status of an approval task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting for the approver to act
    Pending,
    Approved,
    Rejected,
    /// Handed to another approver; a successor task carries the work on
    Transferred,
    /// Closed without a decision: the node resolved without this task or
    /// the instance was cancelled out from under it. Distinct from
    /// `Rejected` so the audit trail can tell the two apart.
    Superseded,
}

impl TaskStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }
}

/// An approver's verdict on a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

// ── Approval Task ────────────────────────────────────────────────────

/// One approver's unit of work at a node visit
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalTask {
    pub id: TaskId,
    pub instance_id: WorkflowInstanceId,
    pub node_id: NodeId,
    #[serde(rename = "approverId")]
    pub approver: UserId,
    pub status: TaskStatus,
    #[serde(rename = "parallelGroupId", skip_serializing_if = "Option::is_none")]
    pub parallel_group: Option<GroupId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opinion: Option<String>,
    /// System annotation: transfer target, supersede reason, and similar
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "approvalTime", skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl ApprovalTask {
    pub fn new(
        instance_id: WorkflowInstanceId,
        node_id: NodeId,
        approver: UserId,
        parallel_group: Option<GroupId>,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            instance_id,
            node_id,
            approver,
            status: TaskStatus::Pending,
            parallel_group,
            opinion: None,
            note: None,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }
}

// ── Group tally ──────────────────────────────────────────────────────

/// Aggregated vote state of a parallel group
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTally {
    pub approved: u32,
    pub rejected: u32,
    pub pending: u32,
}

/// The single outcome a resolved parallel group collapses to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupOutcome {
    Approved,
    Rejected,
}

impl GroupTally {
    pub fn new(approved: u32, rejected: u32, pending: u32) -> Self {
        Self {
            approved,
            rejected,
            pending,
        }
    }

    /// Total voters, including add-signed members
    pub fn total(&self) -> u32 {
        self.approved + self.rejected + self.pending
    }

    /// Resolve the group under `rule`, or `None` while still undecided.
    ///
    /// `All`: one rejection rejects immediately; approval requires every
    /// vote in. `Majority`: approved once approvals strictly exceed half
    /// of the voters; rejected as soon as a majority has become
    /// impossible, whichever threshold is crossed first.
    pub fn outcome(&self, rule: CountersignRule) -> Option<GroupOutcome> {
        match rule {
            CountersignRule::All => {
                if self.rejected > 0 {
                    Some(GroupOutcome::Rejected)
                } else if self.pending == 0 {
                    Some(GroupOutcome::Approved)
                } else {
                    None
                }
            }
            CountersignRule::Majority => {
                let total = self.total();
                if self.approved * 2 > total {
                    Some(GroupOutcome::Approved)
                } else if (self.approved + self.pending) * 2 <= total {
                    Some(GroupOutcome::Rejected)
                } else {
                    None
                }
            }
        }
    }
}

// ── Pagination ───────────────────────────────────────────────────────

/// A page request for task listings
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.page_size as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

/// One page of results plus the total count
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending() {
        let task = ApprovalTask::new(
            WorkflowInstanceId::new("inst-1"),
            NodeId::new("city"),
            UserId::new("u-1"),
            None,
        );
        assert!(task.is_pending());
        assert!(task.parallel_group.is_none());
        assert!(task.decided_at.is_none());
    }

    #[test]
    fn test_all_rule_requires_every_vote() {
        // two of three in, nothing rejected: still open
        let tally = GroupTally::new(2, 0, 1);
        assert_eq!(tally.outcome(CountersignRule::All), None);

        // all in
        let tally = GroupTally::new(3, 0, 0);
        assert_eq!(
            tally.outcome(CountersignRule::All),
            Some(GroupOutcome::Approved)
        );
    }

    #[test]
    fn test_all_rule_rejects_on_first_rejection() {
        // one rejection with siblings still pending
        let tally = GroupTally::new(1, 1, 1);
        assert_eq!(
            tally.outcome(CountersignRule::All),
            Some(GroupOutcome::Rejected)
        );
    }

    #[test]
    fn test_majority_approves_past_half() {
        // 2 of 3 approved
        let tally = GroupTally::new(2, 0, 1);
        assert_eq!(
            tally.outcome(CountersignRule::Majority),
            Some(GroupOutcome::Approved)
        );

        // 2 of 4 approved is not a strict majority
        let tally = GroupTally::new(2, 0, 2);
        assert_eq!(tally.outcome(CountersignRule::Majority), None);
    }

    #[test]
    fn test_majority_rejects_when_impossible() {
        // 3 voters, two rejections: the third vote cannot matter
        let tally = GroupTally::new(0, 2, 1);
        assert_eq!(
            tally.outcome(CountersignRule::Majority),
            Some(GroupOutcome::Rejected)
        );

        // one rejection of three leaves it open
        let tally = GroupTally::new(0, 1, 2);
        assert_eq!(tally.outcome(CountersignRule::Majority), None);
    }

    #[test]
    fn test_add_sign_enlarges_denominator() {
        // 2 of 3 would be a majority...
        let before = GroupTally::new(2, 0, 1);
        assert_eq!(
            before.outcome(CountersignRule::Majority),
            Some(GroupOutcome::Approved)
        );

        // ...but with two add-signed members the same approvals are short
        let after = GroupTally::new(2, 0, 3);
        assert_eq!(after.outcome(CountersignRule::Majority), None);
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(PageRequest::new(1, 20).offset(), 0);
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
        // page 0 is clamped rather than underflowing
        assert_eq!(PageRequest::new(0, 10).offset(), 0);
    }
}
