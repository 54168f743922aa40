//! Approval workflow engine
//!
//! Routes a leave request through ordered approval levels. Each level is a
//! node guarded by one or more approvers combined with an `any`/`all` rule.
//! Node and request statuses are derived from recorded decisions, and
//! [`ApprovalRequest::apply_action`] is the only way to record one.
//!
//! The engine is pure and synchronous: locking and persistence belong to
//! the caller (see [`crate::service`]).

pub mod approver;
pub mod error;
pub mod node;
pub mod request;
pub mod template;

pub use approver::{Approver, CombinationRule};
pub use error::{WorkflowError, WorkflowResult};
pub use node::{ApprovalNode, ApprovalStatus, Decision, DecisionRecord};
pub use request::{derive_request_status, ApprovalRequest, NewLeaveRequest};
pub use template::{LevelTemplate, TemplateRegistry, WorkflowTemplate};
