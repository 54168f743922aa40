//! Server configuration from command-line flags and environment

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::workflow::{TemplateRegistry, WorkflowResult};

#[derive(Parser, Debug, Clone)]
#[command(name = "leave-approvals")]
#[command(about = "Leave approval workflow server")]
#[command(version)]
pub struct ServerConfig {
    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:approvals.db?mode=rwc")]
    pub database_url: String,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Database pool size
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// JSON file with workflow templates per request type
    #[arg(long, env = "WORKFLOW_TEMPLATES")]
    pub templates: Option<PathBuf>,
}

impl ServerConfig {
    /// Configured templates, or the built-in two-level chain
    pub fn load_templates(&self) -> WorkflowResult<TemplateRegistry> {
        match &self.templates {
            Some(path) => TemplateRegistry::load(path),
            None => Ok(TemplateRegistry::builtin()),
        }
    }
}
