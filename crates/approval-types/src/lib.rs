//! Domain types for the contract approval workflow engine
//!
//! An approval workflow is a directed graph of typed nodes (start,
//! approve, countersign, condition, end) connected by conditional
//! transitions. A definition is the template; an instance is one live
//! run of it against one contract; tasks are the per-approver units of
//! work the engine fans out at each node visit.
//!
//! # Key Concepts
//!
//! - **WorkflowDefinition**: The graph template, versioned and gated by
//!   an applicability condition.
//! - **WorkflowInstance**: One live approval run per contract, tracking
//!   its forward path so rejections can step back.
//! - **ApprovalTask**: One approver's unit of work at a node visit;
//!   countersign tasks share a parallel group and are tallied jointly.
//! - **GroupTally**: The ALL / MAJORITY threshold arithmetic for a
//!   parallel group.
//! - **ContractSummary**: The read-only contract snapshot conditions are
//!   evaluated against.
//!
//! # Design Principles
//!
//! 1. Builders never validate; the definition compiler is the single
//!    judge of well-formedness.
//! 2. Tasks are append-only history: a terminal task is never edited,
//!    a transferred task spawns a successor.
//! 3. Every terminal state carries its reason.

#![deny(unsafe_code)]

mod contract;
mod definition;
mod errors;
mod ids;
mod instance;
mod node;
mod task;
mod transition;

pub use contract::*;
pub use definition::*;
pub use errors::*;
pub use ids::*;
pub use instance::*;
pub use node::*;
pub use task::*;
pub use transition::*;
