//! Contract approval workflow engine
//!
//! The engine compiles workflow definitions into executable graphs,
//! advances instances through them as approval tasks complete, resolves
//! "who must approve next" against an organizational hierarchy, and
//! maintains the full audit trail of every instance.
//!
//! # Architecture
//!
//! [`ApprovalEngine`] composes specialized components:
//!
//! - [`compiler`] — validates a definition and produces a
//!   [`CompiledWorkflow`] with closed per-type node forms
//! - [`evaluator`] — the condition expression language over contract
//!   attributes, instance metadata and countersign tallies
//! - [`ApproverResolver`] — reporting-chain and role-based approver
//!   resolution against the [`OrgDirectory`] collaborator
//! - [`TaskLedger`] — the append-only, attributed record of every task
//! - [`ApprovalEngine`] — the instance state machine and the operation
//!   surface a service layer binds to
//!
//! # Key Principle
//!
//! The engine orchestrates approval of a contract-shaped payload it
//! never authors: contract data and the organizational hierarchy are
//! read through collaborator traits, and every engine decision is
//! recorded with its actor and reason.
//!
//! # Example
//!
//! ```rust
//! use approval_engine::{ApprovalEngine, InMemoryContracts, InMemoryDirectory};
//! use approval_types::*;
//!
//! let mut directory = InMemoryDirectory::new();
//! directory
//!     .add_user(UserId::new("emp"), DeptId::new("county"))
//!     .add_user(UserId::new("mgr"), DeptId::new("county"))
//!     .grant_role(UserId::new("mgr"), RoleId::new("CITY_MANAGER"));
//!
//! let mut contracts = InMemoryContracts::new();
//! contracts.add_contract(
//!     ContractId::new("c-1"),
//!     ContractSummary::new("MAINTENANCE_SERVICE", 50_000.0),
//! );
//!
//! let engine = ApprovalEngine::new(directory, contracts);
//! let definition = WorkflowDefinition::new("Simple approval")
//!     .applicable_to("MAINTENANCE_SERVICE")
//!     .with_node(WorkflowNode::start("start").with_id("start"))
//!     .with_node(
//!         WorkflowNode::approve(
//!             "review",
//!             "Manager review",
//!             NodeConfig::specific_role(RoleId::new("CITY_MANAGER"))
//!                 .with_reject_to(RejectTo::Initiator),
//!         )
//!         .with_id("review"),
//!     )
//!     .with_node(WorkflowNode::end("end").with_id("end"))
//!     .with_transition(WorkflowTransition::new(NodeId::new("start"), NodeId::new("review")))
//!     .with_transition(WorkflowTransition::new(NodeId::new("review"), NodeId::new("end")));
//! engine.register_definition(definition).unwrap();
//!
//! let instance = engine.start(&ContractId::new("c-1"), &UserId::new("emp")).unwrap();
//! assert!(instance.is_running());
//! ```

#![deny(unsafe_code)]

pub mod compiler;
pub mod engine;
pub mod evaluator;
pub mod ledger;
pub mod resolver;
pub mod traits;

// Re-export main types
pub use compiler::{compile, ApproverSpec, CompiledWorkflow, NodeKind};
pub use engine::ApprovalEngine;
pub use evaluator::{evaluate, EvalContext};
pub use ledger::{TaskAction, TaskEvent, TaskLedger};
pub use resolver::{ApproverResolver, MAX_REPORT_HOPS};
pub use traits::{ContractStore, InMemoryContracts, InMemoryDirectory, OrgDirectory};
