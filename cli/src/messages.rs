//! HTTP payload types for the approval API
//!
//! These types mirror the server's JSON. Some fields may not be used
//! directly by the CLI but are part of the complete payload.

#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person who may act on approval nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approver {
    pub id: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationRule {
    Any,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision: Decision,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalNode {
    pub id: Uuid,
    pub level: u32,
    pub approvers: Vec<Approver>,
    pub combination_rule: CombinationRule,
    #[serde(default)]
    pub decisions: BTreeMap<String, DecisionRecord>,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub approved_by: Option<Approver>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_by: Option<Approver>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub employee_id: String,
    pub employee_name: String,
    pub request_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: ApprovalStatus,
    pub nodes: Vec<ApprovalNode>,
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/requests`
#[derive(Debug, Clone, Serialize)]
pub struct NewLeaveRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    pub employee_name: String,
    pub request_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

/// Body of `POST /api/requests/:id/actions`
#[derive(Debug, Clone, Serialize)]
pub struct ActionRequest {
    pub node_id: Uuid,
    pub approver_id: String,
    pub decision: Decision,
}

/// Error body returned by the server
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_request_serialization() {
        let msg = ActionRequest {
            node_id: Uuid::nil(),
            approver_id: "3".to_string(),
            decision: Decision::Rejected,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"decision\":\"rejected\""));
        assert!(json.contains("\"approver_id\":\"3\""));
    }

    #[test]
    fn test_approval_request_deserialization() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000000",
            "employee_id": "7",
            "employee_name": "Sam Lee",
            "request_type": "vacation",
            "start_date": "2026-11-02",
            "end_date": "2026-11-06",
            "reason": "Trip",
            "status": "pending",
            "version": 1,
            "created_at": "2026-10-16T09:00:00Z",
            "nodes": [{
                "id": "00000000-0000-0000-0000-000000000001",
                "level": 1,
                "approvers": [{"id": "1", "name": "Jane Smith", "role": "Team Lead"}],
                "combination_rule": "any",
                "decisions": {"1": {"decision": "approved", "decided_at": "2026-10-16T10:00:00Z"}},
                "status": "approved",
                "approved_by": {"id": "1", "name": "Jane Smith", "role": "Team Lead"},
                "approved_at": "2026-10-16T10:00:00Z"
            }]
        }"#;
        let request: ApprovalRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.status, ApprovalStatus::Pending);
        assert_eq!(request.nodes[0].status, ApprovalStatus::Approved);
        assert_eq!(request.nodes[0].decisions["1"].decision, Decision::Approved);
        assert!(request.nodes[0].rejected_at.is_none());
    }

    #[test]
    fn test_error_body_deserialization() {
        let json = r#"{"error": "Node is already approved", "kind": "node_finalized"}"#;
        let body: ErrorBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.kind.as_deref(), Some("node_finalized"));
    }
}
