//! Approval service: the write path around the workflow engine
//!
//! The service owns the per-request mutual exclusion. An action locks its
//! request id, loads the snapshot, applies the engine, and persists the
//! result before the lock is released. Different requests never share a
//! lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::Result;
use crate::store::Store;
use crate::workflow::{
    ApprovalRequest, ApprovalStatus, Approver, Decision, NewLeaveRequest, TemplateRegistry,
};

/// Registry of per-request locks
#[derive(Default)]
struct RequestLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl RequestLocks {
    async fn acquire(&self, request_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries nobody else holds are idle
            locks.retain(|id, lock| *id == request_id || Arc::strong_count(lock) > 1);
            locks.entry(request_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

/// Approval workflow service
pub struct ApprovalService {
    store: Store,
    templates: TemplateRegistry,
    locks: RequestLocks,
}

impl ApprovalService {
    pub fn new(store: Store, templates: TemplateRegistry) -> Self {
        Self {
            store,
            templates,
            locks: RequestLocks::default(),
        }
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Seed the approver directory from the configured templates
    pub async fn seed_users(&self) -> Result<()> {
        let approvers = self.templates.approvers();
        self.store.upsert_users(&approvers).await?;
        tracing::debug!("Seeded {} approvers", approvers.len());
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<Approver>> {
        self.store.list_users().await
    }

    /// Create a request from the template for its request type
    pub async fn create_request(&self, intake: NewLeaveRequest) -> Result<ApprovalRequest> {
        let template = self.templates.for_request_type(&intake.request_type);
        let request = ApprovalRequest::create(intake, template)?;
        self.store.create_request(&request).await?;

        tracing::info!(
            request_id = %request.id,
            employee = %request.employee_name,
            request_type = %request.request_type,
            levels = request.nodes.len(),
            "Created approval request"
        );
        Ok(request)
    }

    pub async fn get_request(&self, id: Uuid) -> Result<ApprovalRequest> {
        self.store.get_request(id).await
    }

    pub async fn list_requests(&self) -> Result<Vec<ApprovalRequest>> {
        self.store.list_requests().await
    }

    /// Requests with at least one node the approver can act on now
    pub async fn actionable_requests(&self, approver_id: &str) -> Result<Vec<ApprovalRequest>> {
        let requests = self.store.list_requests().await?;
        Ok(requests
            .into_iter()
            .filter(|r| !r.actionable_nodes_for(approver_id).is_empty())
            .collect())
    }

    /// Apply one approver action and persist the resulting snapshot
    pub async fn apply_action(
        &self,
        request_id: Uuid,
        node_id: Uuid,
        approver_id: &str,
        decision: Decision,
    ) -> Result<ApprovalRequest> {
        let _guard = self.locks.acquire(request_id).await;

        let mut request = self.store.get_request(request_id).await?;
        if let Err(e) = request.apply_action(node_id, approver_id, decision) {
            tracing::warn!(
                %request_id,
                %node_id,
                approver_id,
                decision = decision.as_str(),
                "Action refused: {}",
                e
            );
            return Err(e.into());
        }

        let saved = self.store.save_request(&request).await?;

        tracing::info!(
            %request_id,
            %node_id,
            approver_id,
            decision = decision.as_str(),
            status = saved.status.as_str(),
            "Applied approval action"
        );
        if saved.status != ApprovalStatus::Pending {
            tracing::info!(%request_id, status = saved.status.as_str(), "Request finalized");
        }

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::store;
    use crate::workflow::WorkflowError;
    use chrono::NaiveDate;

    async fn setup_service() -> Arc<ApprovalService> {
        let pool = store::connect("sqlite::memory:", 1).await.unwrap();
        let store = Store::new(pool);
        store.migrate().await.unwrap();
        let service = ApprovalService::new(store, TemplateRegistry::builtin());
        service.seed_users().await.unwrap();
        Arc::new(service)
    }

    fn intake() -> NewLeaveRequest {
        NewLeaveRequest {
            employee_id: None,
            employee_name: "Sam Lee".to_string(),
            request_type: "vacation".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 10, 23).unwrap(),
            reason: "Moving house".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_approve_through_service() {
        let service = setup_service().await;
        let request = service.create_request(intake()).await.unwrap();
        let (first, second) = (request.nodes[0].id, request.nodes[1].id);

        let updated = service
            .apply_action(request.id, first, "1", Decision::Approved)
            .await
            .unwrap();
        assert_eq!(updated.status, ApprovalStatus::Pending);
        assert_eq!(updated.version, 1);

        let updated = service
            .apply_action(request.id, second, "3", Decision::Approved)
            .await
            .unwrap();
        assert_eq!(updated.status, ApprovalStatus::Approved);

        let stored = service.get_request(request.id).await.unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_apply_action_unknown_request() {
        let service = setup_service().await;
        let err = service
            .apply_action(Uuid::new_v4(), Uuid::new_v4(), "1", Decision::Approved)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Workflow(WorkflowError::RequestNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_refused_action_persists_nothing() {
        let service = setup_service().await;
        let request = service.create_request(intake()).await.unwrap();
        let second = request.nodes[1].id;

        let err = service
            .apply_action(request.id, second, "3", Decision::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Workflow(WorkflowError::NodeNotActionable { .. })
        ));

        let stored = service.get_request(request.id).await.unwrap();
        assert_eq!(stored.version, 0);
        assert!(stored.nodes.iter().all(|n| n.decisions.is_empty()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_approvals_on_any_node() {
        let service = setup_service().await;
        let request = service.create_request(intake()).await.unwrap();
        let (request_id, node_id) = (request.id, request.nodes[0].id);

        let handles: Vec<_> = ["1", "2"]
            .into_iter()
            .map(|approver| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .apply_action(request_id, node_id, approver, Decision::Approved)
                        .await
                })
            })
            .collect();

        let results: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        let failure = results.into_iter().find_map(|r| r.err()).unwrap();
        assert!(matches!(
            failure,
            AppError::Workflow(WorkflowError::NodeFinalized { .. })
        ));

        let stored = service.get_request(request.id).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.nodes[0].status, ApprovalStatus::Approved);
        assert_eq!(stored.nodes[0].decisions.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_approvals_on_all_node_lose_nothing() {
        let pool = store::connect("sqlite::memory:", 1).await.unwrap();
        let store = Store::new(pool);
        store.migrate().await.unwrap();
        let templates = TemplateRegistry::from_json(
            r#"{"default": [{"approvers": [
                {"id": "a", "name": "A", "role": "Lead"},
                {"id": "b", "name": "B", "role": "Lead"},
                {"id": "c", "name": "C", "role": "Lead"}
            ], "combination_rule": "all"}]}"#,
        )
        .unwrap();
        let service = Arc::new(ApprovalService::new(store, templates));
        let request = service.create_request(intake()).await.unwrap();
        let (request_id, node_id) = (request.id, request.nodes[0].id);

        let handles: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|approver| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .apply_action(request_id, node_id, approver, Decision::Approved)
                        .await
                })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            assert!(result.unwrap().is_ok());
        }

        let stored = service.get_request(request.id).await.unwrap();
        assert_eq!(stored.version, 3);
        assert_eq!(stored.nodes[0].decisions.len(), 3);
        assert_eq!(stored.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn test_actionable_requests_filter() {
        let service = setup_service().await;
        let request = service.create_request(intake()).await.unwrap();

        assert_eq!(service.actionable_requests("1").await.unwrap().len(), 1);
        assert!(service.actionable_requests("3").await.unwrap().is_empty());

        service
            .apply_action(request.id, request.nodes[0].id, "2", Decision::Approved)
            .await
            .unwrap();

        assert!(service.actionable_requests("1").await.unwrap().is_empty());
        assert_eq!(service.actionable_requests("3").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let locks = RequestLocks::default();
        for _ in 0..5 {
            let _guard = locks.acquire(Uuid::new_v4()).await;
        }
        let _guard = locks.acquire(Uuid::new_v4()).await;
        assert_eq!(locks.len().await, 1);
    }
}
