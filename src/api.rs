//! HTTP/JSON binding of the approval workflow

use std::sync::Arc;

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{ActionRequest, ApproveRequest, RequestFilter};
use crate::workflow::{ApprovalRequest, Approver, NewLeaveRequest};
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", get(list_users))
        .route("/api/requests", get(list_requests).post(create_request))
        .route("/api/requests/:id", get(get_request))
        .route("/api/requests/:id/actions", post(apply_action))
        .route("/api/approve", post(approve))
        .fallback(not_found)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Approver>>> {
    Ok(Json(state.service.list_users().await?))
}

async fn list_requests(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RequestFilter>,
) -> Result<Json<Vec<ApprovalRequest>>> {
    let requests = match filter.approver_id {
        Some(approver_id) => state.service.actionable_requests(&approver_id).await?,
        None => state.service.list_requests().await?,
    };
    Ok(Json(requests))
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    intake: std::result::Result<Json<NewLeaveRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(intake) = intake?;
    let request = state.service.create_request(intake).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    id: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ApprovalRequest>> {
    let Path(id) = id?;
    Ok(Json(state.service.get_request(id).await?))
}

async fn apply_action(
    State(state): State<Arc<AppState>>,
    id: std::result::Result<Path<Uuid>, PathRejection>,
    action: std::result::Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ApprovalRequest>> {
    let (Path(id), Json(action)) = (id?, action?);
    let request = state
        .service
        .apply_action(id, action.node_id, &action.approver_id, action.decision)
        .await?;
    Ok(Json(request))
}

/// Single endpoint form carrying the request id in the body
async fn approve(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ApproveRequest>, JsonRejection>,
) -> Result<Json<ApprovalRequest>> {
    let Json(body) = body?;
    let request = state
        .service
        .apply_action(body.request_id, body.node_id, &body.approver_id, body.action)
        .await?;
    Ok(Json(request))
}
