//! Leave approval server - multi-level approval workflow engine

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod store;
pub mod workflow;

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::workflow::TemplateRegistry;

/// Application state shared across handlers
pub struct AppState {
    pub service: service::ApprovalService,
}

impl AppState {
    pub fn new(pool: SqlitePool, templates: TemplateRegistry) -> Arc<Self> {
        Arc::new(Self {
            service: service::ApprovalService::new(store::Store::new(pool), templates),
        })
    }
}
