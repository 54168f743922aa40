//! Approvals CLI - command-line client for the leave approval server

mod client;
mod messages;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::client::ApprovalClient;
use crate::messages::{ApprovalRequest, Decision, NewLeaveRequest};

#[derive(Parser)]
#[command(name = "approvals")]
#[command(about = "CLI client for the leave approval server")]
#[command(version)]
struct Cli {
    /// Server URL
    #[arg(short, long, env = "APPROVALS_SERVER", default_value = "http://localhost:3000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the approver directory
    Users,

    /// List requests
    List {
        /// Only requests this approver can act on now
        #[arg(short, long)]
        approver: Option<String>,
    },

    /// Show one request with its approval chain
    Show {
        /// Request ID
        id: Uuid,
    },

    /// Submit a new leave request
    Submit {
        #[arg(short = 'n', long)]
        employee_name: String,

        #[arg(short, long)]
        employee_id: Option<String>,

        /// e.g. vacation, sick leave
        #[arg(short = 't', long, default_value = "vacation")]
        request_type: String,

        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: NaiveDate,

        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end: NaiveDate,

        #[arg(short, long)]
        reason: String,
    },

    /// Approve a node
    Approve {
        #[arg(short, long)]
        request: Uuid,

        /// Node ID; defaults to the node the approver can act on now
        #[arg(long)]
        node: Option<Uuid>,

        #[arg(short, long)]
        approver: String,
    },

    /// Reject a node
    Reject {
        #[arg(short, long)]
        request: Uuid,

        /// Node ID; defaults to the node the approver can act on now
        #[arg(long)]
        node: Option<Uuid>,

        #[arg(short, long)]
        approver: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "approvals_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let client = ApprovalClient::new(&cli.server);

    match cli.command {
        Commands::Users => run_users(&client).await,
        Commands::List { approver } => run_list(&client, approver.as_deref()).await,
        Commands::Show { id } => {
            let request = client.get_request(id).await?;
            print_request(&request);
            Ok(())
        }
        Commands::Submit {
            employee_name,
            employee_id,
            request_type,
            start,
            end,
            reason,
        } => {
            let body = NewLeaveRequest {
                employee_id,
                employee_name,
                request_type,
                start_date: start,
                end_date: end,
                reason,
            };
            let request = client.create_request(&body).await?;
            println!("Created request {}", request.id);
            print_request(&request);
            Ok(())
        }
        Commands::Approve {
            request,
            node,
            approver,
        } => run_action(&client, request, node, &approver, Decision::Approved).await,
        Commands::Reject {
            request,
            node,
            approver,
        } => run_action(&client, request, node, &approver, Decision::Rejected).await,
    }
}

async fn run_users(client: &ApprovalClient) -> Result<()> {
    let users = client.list_users().await?;
    println!("Approvers:");
    println!("{:─<60}", "");
    for user in users {
        println!("  {:<6} {:<20} {}", user.id, user.name, user.role);
    }
    Ok(())
}

async fn run_list(client: &ApprovalClient, approver: Option<&str>) -> Result<()> {
    let requests = client.list_requests(approver).await?;

    if requests.is_empty() {
        println!("No requests found.");
        return Ok(());
    }

    println!("Requests:");
    println!("{:─<60}", "");
    for request in requests {
        println!(
            "  {} - {} {} {}..{} [{}]",
            request.id,
            request.employee_name,
            request.request_type,
            request.start_date,
            request.end_date,
            request.status.as_str()
        );
    }
    Ok(())
}

async fn run_action(
    client: &ApprovalClient,
    request_id: Uuid,
    node: Option<Uuid>,
    approver: &str,
    decision: Decision,
) -> Result<()> {
    let node_id = match node {
        Some(id) => id,
        None => {
            let request = client.get_request(request_id).await?;
            next_node_for(&request, approver)
                .ok_or_else(|| anyhow!("No node of request {} awaits {}", request_id, approver))?
        }
    };

    let request = client
        .apply_action(request_id, node_id, approver, decision)
        .await?;
    print_request(&request);
    Ok(())
}

/// Lowest pending level listing the approver, when every lower level is
/// approved and the approver has not decided on it yet
fn next_node_for(request: &ApprovalRequest, approver: &str) -> Option<Uuid> {
    use crate::messages::ApprovalStatus;

    let mut nodes: Vec<_> = request.nodes.iter().collect();
    nodes.sort_by_key(|n| n.level);
    let pending = nodes
        .into_iter()
        .find(|n| n.status != ApprovalStatus::Approved)?;
    let eligible = pending.status == ApprovalStatus::Pending
        && pending.approvers.iter().any(|a| a.id == approver)
        && !pending.decisions.contains_key(approver);
    eligible.then_some(pending.id)
}

fn print_request(request: &ApprovalRequest) {
    println!(
        "{} ({}) {} {}..{}: {}",
        request.employee_name,
        request.employee_id,
        request.request_type,
        request.start_date,
        request.end_date,
        request.status.as_str()
    );
    println!("  reason: {}", request.reason);
    for node in &request.nodes {
        let names: Vec<&str> = node.approvers.iter().map(|a| a.name.as_str()).collect();
        println!(
            "  level {} [{:?}] {} - {}",
            node.level,
            node.combination_rule,
            names.join(", "),
            node.status.as_str()
        );
        for (approver_id, record) in &node.decisions {
            println!(
                "      {} {:?} at {}",
                approver_id,
                record.decision,
                record.decided_at.format("%Y-%m-%d %H:%M")
            );
        }
        println!("      node: {}", node.id);
    }
}
