//! Error types for the approval workflow engine

use crate::{ContractId, NodeId, TaskId, UserId, WorkflowDefinitionId, WorkflowInstanceId};

/// A workflow definition failed to compile.
///
/// Reports the first violation found; no partial compilation is
/// attempted.
#[derive(Clone, Debug, thiserror::Error)]
#[error("invalid workflow definition: {reason}")]
pub struct CompileError {
    pub reason: String,
    /// The offending node, when the violation is node-scoped
    pub node: Option<NodeId>,
}

impl CompileError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            node: None,
        }
    }

    pub fn at_node(node: NodeId, reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            node: Some(node),
        }
    }
}

/// A condition expression could not be evaluated.
///
/// On a secondary condition (one of several candidate transitions, or a
/// definition applicability gate) the engine absorbs this as "not
/// satisfied" and logs it; it never aborts an instance for it.
#[derive(Clone, Debug, thiserror::Error)]
#[error("condition expression error: {0}")]
pub struct EvalError(pub String);

/// The organization directory could not answer a lookup
#[derive(Clone, Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user not found in directory: {0}")]
    UserNotFound(UserId),

    #[error("directory lookup failed: {0}")]
    Unavailable(String),
}

/// Approver resolution failed
#[derive(Clone, Debug, thiserror::Error)]
pub enum ResolveError {
    /// The strategy produced nobody; fatal for the affected node entry
    #[error("no approver found: {0}")]
    NoApprover(String),

    #[error("organization directory error: {0}")]
    Directory(#[from] DirectoryError),
}

/// The contract store could not answer a lookup
#[derive(Clone, Debug, thiserror::Error)]
pub enum ContractStoreError {
    #[error("contract not found: {0}")]
    NotFound(ContractId),

    #[error("contract store lookup failed: {0}")]
    Unavailable(String),
}

/// Errors surfaced by engine operations
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow definition not found: {0}")]
    DefinitionNotFound(WorkflowDefinitionId),

    #[error("workflow instance not found: {0}")]
    InstanceNotFound(WorkflowInstanceId),

    #[error("approval task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("a running instance already exists for contract {0}")]
    DuplicateInstance(ContractId),

    #[error("no applicable workflow definition for contract {0}")]
    NoApplicableDefinition(ContractId),

    #[error("contract {0} is not eligible for approval")]
    ContractIneligible(ContractId),

    /// Attempted action on a task not in the required status
    #[error("invalid task state for {task}: {reason}")]
    InvalidTaskState { task: TaskId, reason: String },

    /// The actor does not own the task being decided
    #[error("user {actor} is not the approver of task {task}")]
    NotTaskApprover { task: TaskId, actor: UserId },

    /// Attempted action on a non-running instance
    #[error("instance {0} is not running")]
    InvalidTransition(WorkflowInstanceId),

    #[error("internal lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    ContractStore(#[from] ContractStoreError),
}

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display() {
        let err = CompileError::at_node(NodeId::new("n-1"), "countersign node missing rule");
        assert!(err.to_string().contains("countersign node missing rule"));
        assert_eq!(err.node, Some(NodeId::new("n-1")));
    }

    #[test]
    fn test_resolve_error_from_directory() {
        let err: ResolveError = DirectoryError::Unavailable("timeout".into()).into();
        assert!(matches!(err, ResolveError::Directory(_)));
    }

    #[test]
    fn test_workflow_error_wraps_leaves() {
        let err: WorkflowError = CompileError::new("no start node").into();
        assert!(matches!(err, WorkflowError::Compile(_)));

        let err: WorkflowError = ResolveError::NoApprover("empty chain".into()).into();
        assert!(matches!(err, WorkflowError::Resolve(_)));
    }
}
