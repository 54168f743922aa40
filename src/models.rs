//! Request payloads for the HTTP API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::Decision;

/// Body of `POST /api/requests/:id/actions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub node_id: Uuid,
    pub approver_id: String,
    pub decision: Decision,
}

/// Body of `POST /api/approve`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub request_id: Uuid,
    pub node_id: Uuid,
    pub approver_id: String,
    /// `approve` or `reject`
    pub action: Decision,
}

/// Query string of `GET /api/requests`
#[derive(Debug, Default, Deserialize)]
pub struct RequestFilter {
    /// Only requests this approver can act on now
    pub approver_id: Option<String>,
}
