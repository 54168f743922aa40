//! Approval nodes and their state machine
//!
//! A node is one gate in the approval chain. Its status is derived from the
//! decisions recorded on it and never set directly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::approver::{Approver, CombinationRule};
use super::error::{WorkflowError, WorkflowResult};

/// Status of a node or of a whole request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
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

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            _ => Err(format!("Invalid approval status: {}", s)),
        }
    }
}

/// A single approver's action on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    #[serde(alias = "approve")]
    Approved,
    #[serde(alias = "reject")]
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" | "approve" => Ok(Decision::Approved),
            "rejected" | "reject" => Ok(Decision::Rejected),
            _ => Err(format!("Invalid decision: {}", s)),
        }
    }
}

/// A recorded decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision: Decision,
    pub decided_at: DateTime<Utc>,
}

/// One level of an approval chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalNode {
    pub id: Uuid,
    pub level: u32,
    pub approvers: Vec<Approver>,
    pub combination_rule: CombinationRule,
    /// Approver id -> decision
    #[serde(default)]
    pub decisions: BTreeMap<String, DecisionRecord>,
    pub status: ApprovalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<Approver>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<Approver>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl ApprovalNode {
    /// Create a pending node
    pub fn new(level: u32, approvers: Vec<Approver>, combination_rule: CombinationRule) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            approvers,
            combination_rule,
            decisions: BTreeMap::new(),
            status: ApprovalStatus::Pending,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
        }
    }

    /// Whether the approver is listed on this node
    pub fn is_eligible(&self, approver_id: &str) -> bool {
        self.approvers.iter().any(|a| a.id == approver_id)
    }

    pub fn decision_of(&self, approver_id: &str) -> Option<Decision> {
        self.decisions.get(approver_id).map(|r| r.decision)
    }

    /// Record one approver's decision and re-evaluate the node.
    ///
    /// Nothing is mutated unless the decision is accepted. A rejection
    /// finalizes the node regardless of the combination rule.
    pub fn record_decision(
        &mut self,
        approver_id: &str,
        decision: Decision,
    ) -> WorkflowResult<ApprovalStatus> {
        let approver = self
            .approvers
            .iter()
            .find(|a| a.id == approver_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotEligible {
                node_id: self.id,
                approver_id: approver_id.to_string(),
            })?;

        if self.status.is_terminal() {
            return Err(WorkflowError::NodeFinalized {
                node_id: self.id,
                status: self.status,
            });
        }

        if self.decisions.contains_key(approver_id) {
            return Err(WorkflowError::DuplicateDecision {
                node_id: self.id,
                approver_id: approver_id.to_string(),
            });
        }

        let now = Utc::now();
        self.decisions.insert(
            approver.id.clone(),
            DecisionRecord {
                decision,
                decided_at: now,
            },
        );

        match decision {
            Decision::Rejected => {
                self.status = ApprovalStatus::Rejected;
                self.rejected_by = Some(approver);
                self.rejected_at = Some(now);
            }
            Decision::Approved => {
                if self.approvals_satisfied() {
                    self.status = ApprovalStatus::Approved;
                    self.approved_by = Some(approver);
                    self.approved_at = Some(now);
                }
            }
        }

        Ok(self.status)
    }

    fn approvals_satisfied(&self) -> bool {
        match self.combination_rule {
            CombinationRule::Any => self
                .decisions
                .values()
                .any(|r| r.decision == Decision::Approved),
            CombinationRule::All => self
                .approvers
                .iter()
                .all(|a| self.decision_of(&a.id) == Some(Decision::Approved)),
        }
    }
}
