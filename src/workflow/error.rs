//! Errors returned by the approval workflow engine

use thiserror::Error;
use uuid::Uuid;

use super::ApprovalStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Approval request {0} not found")]
    RequestNotFound(Uuid),

    #[error("Node {node_id} not found on request {request_id}")]
    NodeNotFound { request_id: Uuid, node_id: Uuid },

    #[error("Approver {approver_id} is not listed on node {node_id}")]
    NotEligible { node_id: Uuid, approver_id: String },

    #[error("Node {node_id} is already {status}")]
    NodeFinalized { node_id: Uuid, status: ApprovalStatus },

    #[error("Request {request_id} is already {status}")]
    RequestFinalized {
        request_id: Uuid,
        status: ApprovalStatus,
    },

    #[error("Node {node_id} (level {level}) is waiting on level {blocking_level}")]
    NodeNotActionable {
        node_id: Uuid,
        level: u32,
        blocking_level: u32,
    },

    #[error("Approver {approver_id} has already decided on node {node_id}")]
    DuplicateDecision { node_id: Uuid, approver_id: String },

    #[error("Invalid workflow template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl WorkflowError {
    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::RequestNotFound(_) | WorkflowError::NodeNotFound { .. } => "not_found",
            WorkflowError::NotEligible { .. } => "not_eligible",
            WorkflowError::NodeFinalized { .. } => "node_finalized",
            WorkflowError::RequestFinalized { .. } => "request_finalized",
            WorkflowError::NodeNotActionable { .. } => "node_not_actionable",
            WorkflowError::DuplicateDecision { .. } => "duplicate_decision",
            WorkflowError::InvalidTemplate(_) => "invalid_template",
            WorkflowError::InvalidRequest(_) => "invalid_request",
        }
    }
}

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;
