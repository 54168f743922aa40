//! HTTP client for the approval server

use anyhow::{anyhow, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::messages::{
    ActionRequest, ApprovalRequest, Approver, Decision, ErrorBody, NewLeaveRequest,
};

/// Client for the approval REST API
pub struct ApprovalClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApprovalClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list_users(&self) -> Result<Vec<Approver>> {
        let response = self.http.get(self.url("/api/users")).send().await?;
        parse(response).await
    }

    /// List requests, optionally only those the approver can act on
    pub async fn list_requests(&self, approver_id: Option<&str>) -> Result<Vec<ApprovalRequest>> {
        let mut request = self.http.get(self.url("/api/requests"));
        if let Some(approver_id) = approver_id {
            request = request.query(&[("approver_id", approver_id)]);
        }
        parse(request.send().await?).await
    }

    pub async fn get_request(&self, id: Uuid) -> Result<ApprovalRequest> {
        let response = self
            .http
            .get(self.url(&format!("/api/requests/{}", id)))
            .send()
            .await?;
        parse(response).await
    }

    pub async fn create_request(&self, body: &NewLeaveRequest) -> Result<ApprovalRequest> {
        let response = self
            .http
            .post(self.url("/api/requests"))
            .json(body)
            .send()
            .await?;
        parse(response).await
    }

    pub async fn apply_action(
        &self,
        request_id: Uuid,
        node_id: Uuid,
        approver_id: &str,
        decision: Decision,
    ) -> Result<ApprovalRequest> {
        tracing::debug!("Sending {:?} for node {} by {}", decision, node_id, approver_id);
        let body = ActionRequest {
            node_id,
            approver_id: approver_id.to_string(),
            decision,
        };
        let response = self
            .http
            .post(self.url(&format!("/api/requests/{}/actions", request_id)))
            .json(&body)
            .send()
            .await?;
        parse(response).await
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let text = response.text().await.unwrap_or_default();
    Err(anyhow!(error_message(status, &text)))
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error,
            kind: Some(kind),
        }) => format!("{} ({}): {}", status, kind, error),
        Ok(ErrorBody { error, kind: None }) => format!("{}: {}", status, error),
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => format!("{}: {}", status, body),
    }
}
