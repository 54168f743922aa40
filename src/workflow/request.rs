//! Approval requests: request-level status and the action applier

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{WorkflowError, WorkflowResult};
use super::node::{ApprovalNode, ApprovalStatus, Decision};
use super::template::WorkflowTemplate;

/// Intake data for a new leave request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLeaveRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    pub employee_name: String,
    pub request_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

impl NewLeaveRequest {
    pub fn validate(&self) -> WorkflowResult<()> {
        let required = [
            ("employee_name", &self.employee_name),
            ("request_type", &self.request_type),
            ("reason", &self.reason),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(WorkflowError::InvalidRequest(format!("{} is required", field)));
            }
        }

        if self.start_date > self.end_date {
            return Err(WorkflowError::InvalidRequest(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }

        Ok(())
    }
}

/// A leave request and its approval chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub employee_id: String,
    pub employee_name: String,
    pub request_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: ApprovalStatus,
    /// Ordered by level
    pub nodes: Vec<ApprovalNode>,
    /// Persistence concurrency token, untouched by the engine
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// Request status from its node statuses
pub fn derive_request_status(nodes: &[ApprovalNode]) -> ApprovalStatus {
    if nodes.iter().any(|n| n.status == ApprovalStatus::Rejected) {
        ApprovalStatus::Rejected
    } else if nodes.iter().all(|n| n.status == ApprovalStatus::Approved) {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Pending
    }
}

impl ApprovalRequest {
    /// Create a pending request with one pending node per template level
    pub fn create(intake: NewLeaveRequest, template: &WorkflowTemplate) -> WorkflowResult<Self> {
        intake.validate()?;
        let nodes = template.build_nodes()?;

        Ok(Self {
            id: Uuid::new_v4(),
            employee_id: intake
                .employee_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            employee_name: intake.employee_name,
            request_type: intake.request_type,
            start_date: intake.start_date,
            end_date: intake.end_date,
            reason: intake.reason,
            status: ApprovalStatus::Pending,
            nodes,
            version: 0,
            created_at: Utc::now(),
        })
    }

    pub fn node(&self, node_id: Uuid) -> Option<&ApprovalNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    pub fn derive_status(&self) -> ApprovalStatus {
        derive_request_status(&self.nodes)
    }

    /// Lowest level below `node` that is not yet approved
    fn blocking_level(&self, node: &ApprovalNode) -> Option<u32> {
        self.nodes
            .iter()
            .filter(|n| n.level < node.level && n.status != ApprovalStatus::Approved)
            .map(|n| n.level)
            .min()
    }

    /// True when the node is pending and every lower level is approved
    pub fn is_actionable(&self, node_id: Uuid) -> bool {
        self.node(node_id).is_some_and(|node| {
            node.status == ApprovalStatus::Pending && self.blocking_level(node).is_none()
        })
    }

    /// Nodes the approver may act on right now
    pub fn actionable_nodes_for(&self, approver_id: &str) -> Vec<&ApprovalNode> {
        if self.derive_status() != ApprovalStatus::Pending {
            return Vec::new();
        }
        self.nodes
            .iter()
            .filter(|n| n.is_eligible(approver_id) && n.decision_of(approver_id).is_none())
            .filter(|n| self.is_actionable(n.id))
            .collect()
    }

    /// Validate and apply one approver action.
    ///
    /// This is the only operation that mutates decisions and statuses. On
    /// error the request is left exactly as it was.
    pub fn apply_action(
        &mut self,
        node_id: Uuid,
        approver_id: &str,
        decision: Decision,
    ) -> WorkflowResult<&ApprovalRequest> {
        let node = self.node(node_id).ok_or(WorkflowError::NodeNotFound {
            request_id: self.id,
            node_id,
        })?;

        let status = self.derive_status();
        if status.is_terminal() {
            return Err(WorkflowError::RequestFinalized {
                request_id: self.id,
                status,
            });
        }

        if node.status.is_terminal() {
            return Err(WorkflowError::NodeFinalized {
                node_id,
                status: node.status,
            });
        }

        // Rejections are gated like approvals: a level is only decided once reached
        if let Some(blocking_level) = self.blocking_level(node) {
            return Err(WorkflowError::NodeNotActionable {
                node_id,
                level: node.level,
                blocking_level,
            });
        }

        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or(WorkflowError::NodeNotFound {
                request_id: self.id,
                node_id,
            })?;
        node.record_decision(approver_id, decision)?;

        self.status = self.derive_status();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{Approver, CombinationRule, LevelTemplate, TemplateRegistry};

    fn intake() -> NewLeaveRequest {
        NewLeaveRequest {
            employee_id: Some("emp-7".to_string()),
            employee_name: "Sam Lee".to_string(),
            request_type: "vacation".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 11, 6).unwrap(),
            reason: "Family trip".to_string(),
        }
    }

    fn builtin_request() -> ApprovalRequest {
        ApprovalRequest::create(intake(), &TemplateRegistry::builtin().default).unwrap()
    }

    #[test]
    fn test_create_request_assigns_levels_in_order() {
        let request = builtin_request();

        assert_eq!(request.status, ApprovalStatus::Pending);
        assert_eq!(request.employee_id, "emp-7");
        assert_eq!(request.version, 0);
        let levels: Vec<u32> = request.nodes.iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![1, 2]);
    }

    #[test]
    fn test_create_request_generates_employee_id() {
        let mut data = intake();
        data.employee_id = None;
        let request = ApprovalRequest::create(data, &TemplateRegistry::builtin().default).unwrap();
        assert!(!request.employee_id.is_empty());
    }

    #[test]
    fn test_create_request_validates_intake() {
        let template = TemplateRegistry::builtin().default;

        let mut data = intake();
        data.end_date = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        assert!(matches!(
            ApprovalRequest::create(data, &template),
            Err(WorkflowError::InvalidRequest(_))
        ));

        let mut data = intake();
        data.employee_name = "   ".to_string();
        let err = ApprovalRequest::create(data, &template).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::InvalidRequest("employee_name is required".to_string())
        );
    }

    #[test]
    fn test_single_day_request_is_valid() {
        let mut data = intake();
        data.end_date = data.start_date;
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_derive_request_status() {
        let mut request = builtin_request();
        assert_eq!(derive_request_status(&request.nodes), ApprovalStatus::Pending);

        request.nodes[1].status = ApprovalStatus::Rejected;
        assert_eq!(derive_request_status(&request.nodes), ApprovalStatus::Rejected);

        request.nodes[0].status = ApprovalStatus::Approved;
        request.nodes[1].status = ApprovalStatus::Approved;
        assert_eq!(derive_request_status(&request.nodes), ApprovalStatus::Approved);
    }

    #[test]
    fn test_is_actionable_follows_levels() {
        let mut request = builtin_request();
        let (first, second) = (request.nodes[0].id, request.nodes[1].id);

        assert!(request.is_actionable(first));
        assert!(!request.is_actionable(second));
        assert!(!request.is_actionable(Uuid::new_v4()));

        request.apply_action(first, "1", Decision::Approved).unwrap();
        assert!(!request.is_actionable(first));
        assert!(request.is_actionable(second));
    }

    #[test]
    fn test_gating_uses_level_not_position() {
        let mut request = builtin_request();
        request.nodes.reverse();
        let level_two = request.nodes[0].id;
        let level_one = request.nodes[1].id;

        assert!(!request.is_actionable(level_two));
        assert!(request.is_actionable(level_one));
    }

    #[test]
    fn test_apply_action_unknown_node() {
        let mut request = builtin_request();
        let missing = Uuid::new_v4();
        let err = request
            .apply_action(missing, "1", Decision::Approved)
            .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::NodeNotFound {
                request_id: request.id,
                node_id: missing
            }
        );
    }

    #[test]
    fn test_apply_action_blocked_by_lower_level() {
        let mut request = builtin_request();
        let before = request.clone();
        let second = request.nodes[1].id;

        for decision in [Decision::Approved, Decision::Rejected] {
            let err = request.apply_action(second, "3", decision).unwrap_err();
            assert_eq!(
                err,
                WorkflowError::NodeNotActionable {
                    node_id: second,
                    level: 2,
                    blocking_level: 1
                }
            );
        }
        assert_eq!(request, before);
    }

    #[test]
    fn test_rejection_on_gated_level_is_refused() {
        let mut request = builtin_request();
        let (first, second) = (request.nodes[0].id, request.nodes[1].id);

        let err = request.apply_action(second, "3", Decision::Rejected).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::NodeNotActionable {
                node_id: second,
                level: 2,
                blocking_level: 1
            }
        );
        assert!(request.nodes[1].decisions.is_empty());
        assert_eq!(request.status, ApprovalStatus::Pending);

        // Once level 1 is approved the same rejection lands and finalizes the request
        request.apply_action(first, "1", Decision::Approved).unwrap();
        request.apply_action(second, "3", Decision::Rejected).unwrap();
        assert_eq!(request.nodes[1].status, ApprovalStatus::Rejected);
        assert_eq!(request.status, ApprovalStatus::Rejected);
    }

    #[test]
    fn test_apply_action_on_finalized_request() {
        let mut request = builtin_request();
        let (first, second) = (request.nodes[0].id, request.nodes[1].id);
        request.apply_action(first, "2", Decision::Rejected).unwrap();

        let err = request.apply_action(second, "3", Decision::Approved).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::RequestFinalized {
                request_id: request.id,
                status: ApprovalStatus::Rejected
            }
        );
    }

    #[test]
    fn test_apply_action_on_finalized_node() {
        let mut request = builtin_request();
        let first = request.nodes[0].id;
        request.apply_action(first, "1", Decision::Approved).unwrap();

        let err = request.apply_action(first, "2", Decision::Approved).unwrap_err();
        assert!(matches!(err, WorkflowError::NodeFinalized { .. }));
    }

    #[test]
    fn test_apply_action_propagates_node_errors() {
        let mut request = builtin_request();
        let first = request.nodes[0].id;

        let err = request.apply_action(first, "3", Decision::Approved).unwrap_err();
        assert!(matches!(err, WorkflowError::NotEligible { .. }));
        assert!(request.nodes[0].decisions.is_empty());
    }

    #[test]
    fn test_actionable_nodes_for_approver() {
        let mut request = builtin_request();
        let first = request.nodes[0].id;

        assert_eq!(request.actionable_nodes_for("1").len(), 1);
        assert!(request.actionable_nodes_for("3").is_empty());

        request.apply_action(first, "1", Decision::Approved).unwrap();
        assert!(request.actionable_nodes_for("1").is_empty());
        assert!(request.actionable_nodes_for("2").is_empty());
        assert_eq!(request.actionable_nodes_for("3")[0].level, 2);
    }

    #[test]
    fn test_actionable_nodes_skip_own_partial_decision() {
        let template = WorkflowTemplate::new(vec![LevelTemplate::new(
            vec![Approver::new("a", "A", "Lead"), Approver::new("b", "B", "Lead")],
            CombinationRule::All,
        )]);
        let mut request = ApprovalRequest::create(intake(), &template).unwrap();
        let node = request.nodes[0].id;

        request.apply_action(node, "a", Decision::Approved).unwrap();
        assert!(request.actionable_nodes_for("a").is_empty());
        assert_eq!(request.actionable_nodes_for("b").len(), 1);
    }
}
