//! Database store for approval requests
//!
//! Every multi-row write runs in a single transaction. Saves are guarded by
//! the request's `version` column so a stale snapshot can never overwrite a
//! newer one.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::workflow::{
    ApprovalNode, ApprovalRequest, Approver, DecisionRecord, WorkflowError,
};

/// Open a connection pool
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Database store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // User operations

    /// Insert approvers, refreshing name and role of known ids
    pub async fn upsert_users(&self, users: &[Approver]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for user in users {
            sqlx::query(
                r#"
                INSERT INTO users (id, name, role) VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET name = excluded.name, role = excluded.role
                "#,
            )
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.role)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<Approver>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT id, name, role FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Approver::from).collect())
    }

    // Request operations

    /// Insert a request with its nodes, approvers and decisions
    pub async fn create_request(&self, request: &ApprovalRequest) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO approval_requests
                (id, employee_id, employee_name, request_type, start_date, end_date, reason, status, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.id.to_string())
        .bind(&request.employee_id)
        .bind(&request.employee_name)
        .bind(&request.request_type)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(&request.reason)
        .bind(request.status.as_str())
        .bind(request.version)
        .bind(request.created_at)
        .bind(request.created_at)
        .execute(&mut *tx)
        .await?;

        for node in &request.nodes {
            sqlx::query(
                r#"
                INSERT INTO approval_nodes
                    (id, request_id, level, combination_rule, status, approved_by_id, approved_at, rejected_by_id, rejected_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(node.id.to_string())
            .bind(request.id.to_string())
            .bind(i64::from(node.level))
            .bind(node.combination_rule.as_str())
            .bind(node.status.as_str())
            .bind(node.approved_by.as_ref().map(|a| a.id.clone()))
            .bind(node.approved_at)
            .bind(node.rejected_by.as_ref().map(|a| a.id.clone()))
            .bind(node.rejected_at)
            .execute(&mut *tx)
            .await?;

            for (position, approver) in node.approvers.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO node_approvers (node_id, approver_id, approver_name, approver_role, position)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(node.id.to_string())
                .bind(&approver.id)
                .bind(&approver.name)
                .bind(&approver.role)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
            }

            for (approver_id, record) in &node.decisions {
                insert_decision(&mut tx, node.id, approver_id, record).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_request(&self, id: Uuid) -> Result<ApprovalRequest> {
        let row = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT id, employee_id, employee_name, request_type, start_date, end_date, reason, status, version, created_at
            FROM approval_requests
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(WorkflowError::RequestNotFound(id))?;

        let nodes = self.load_nodes(&row.id).await?;
        row.into_request(nodes)
    }

    /// All requests, newest first
    pub async fn list_requests(&self) -> Result<Vec<ApprovalRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT id, employee_id, employee_name, request_type, start_date, end_date, reason, status, version, created_at
            FROM approval_requests
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut requests = Vec::with_capacity(rows.len());
        for row in rows {
            let nodes = self.load_nodes(&row.id).await?;
            requests.push(row.into_request(nodes)?);
        }
        Ok(requests)
    }

    /// Persist a mutated snapshot.
    ///
    /// Fails with `Conflict` when the stored version no longer matches
    /// `request.version`. Returns the snapshot with its new version.
    pub async fn save_request(&self, request: &ApprovalRequest) -> Result<ApprovalRequest> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE approval_requests
            SET status = ?, version = version + 1, updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(request.status.as_str())
        .bind(now)
        .bind(request.id.to_string())
        .bind(request.version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let current: Option<(i64,)> =
                sqlx::query_as("SELECT version FROM approval_requests WHERE id = ?")
                    .bind(request.id.to_string())
                    .fetch_optional(&mut *tx)
                    .await?;

            return Err(match current {
                None => WorkflowError::RequestNotFound(request.id).into(),
                Some((version,)) => AppError::Conflict(format!(
                    "Request {} was modified concurrently (expected version {}, found {})",
                    request.id, request.version, version
                )),
            });
        }

        for node in &request.nodes {
            sqlx::query(
                r#"
                UPDATE approval_nodes
                SET status = ?, approved_by_id = ?, approved_at = ?, rejected_by_id = ?, rejected_at = ?
                WHERE id = ? AND request_id = ?
                "#,
            )
            .bind(node.status.as_str())
            .bind(node.approved_by.as_ref().map(|a| a.id.clone()))
            .bind(node.approved_at)
            .bind(node.rejected_by.as_ref().map(|a| a.id.clone()))
            .bind(node.rejected_at)
            .bind(node.id.to_string())
            .bind(request.id.to_string())
            .execute(&mut *tx)
            .await?;

            // Decisions are append-only
            for (approver_id, record) in &node.decisions {
                insert_decision(&mut tx, node.id, approver_id, record).await?;
            }
        }

        tx.commit().await?;

        let mut saved = request.clone();
        saved.version += 1;
        Ok(saved)
    }

    async fn load_nodes(&self, request_id: &str) -> Result<Vec<ApprovalNode>> {
        let node_rows = sqlx::query_as::<_, NodeRow>(
            r#"
            SELECT id, level, combination_rule, status, approved_by_id, approved_at, rejected_by_id, rejected_at
            FROM approval_nodes
            WHERE request_id = ?
            ORDER BY level ASC
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        let approver_rows = sqlx::query_as::<_, ApproverRow>(
            r#"
            SELECT na.node_id, na.approver_id, na.approver_name, na.approver_role
            FROM node_approvers na
            JOIN approval_nodes n ON n.id = na.node_id
            WHERE n.request_id = ?
            ORDER BY na.node_id, na.position ASC
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        let decision_rows = sqlx::query_as::<_, DecisionRow>(
            r#"
            SELECT d.node_id, d.approver_id, d.decision, d.decided_at
            FROM node_decisions d
            JOIN approval_nodes n ON n.id = d.node_id
            WHERE n.request_id = ?
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        let mut approvers: HashMap<String, Vec<Approver>> = HashMap::new();
        for row in approver_rows {
            approvers.entry(row.node_id).or_default().push(Approver {
                id: row.approver_id,
                name: row.approver_name,
                role: row.approver_role,
            });
        }

        let mut decisions: HashMap<String, Vec<DecisionRow>> = HashMap::new();
        for row in decision_rows {
            decisions.entry(row.node_id.clone()).or_default().push(row);
        }

        node_rows
            .into_iter()
            .map(|row| {
                let node_approvers = approvers.remove(&row.id).unwrap_or_default();
                let node_decisions = decisions.remove(&row.id).unwrap_or_default();
                row.into_node(node_approvers, node_decisions)
            })
            .collect()
    }
}

async fn insert_decision(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    node_id: Uuid,
    approver_id: &str,
    record: &DecisionRecord,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO node_decisions (node_id, approver_id, decision, decided_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(node_id.to_string())
    .bind(approver_id)
    .bind(record.decision.as_str())
    .bind(record.decided_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| AppError::Internal(format!("Invalid {} UUID: {}", what, e)))
}

// Internal row types for sqlx

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    role: String,
}

impl From<UserRow> for Approver {
    fn from(row: UserRow) -> Self {
        Approver {
            id: row.id,
            name: row.name,
            role: row.role,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: String,
    employee_id: String,
    employee_name: String,
    request_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: String,
    status: String,
    version: i64,
    created_at: DateTime<Utc>,
}

impl RequestRow {
    fn into_request(self, nodes: Vec<ApprovalNode>) -> Result<ApprovalRequest> {
        Ok(ApprovalRequest {
            id: parse_uuid(&self.id, "request")?,
            employee_id: self.employee_id,
            employee_name: self.employee_name,
            request_type: self.request_type,
            start_date: self.start_date,
            end_date: self.end_date,
            reason: self.reason,
            status: self
                .status
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid status: {}", e)))?,
            nodes,
            version: self.version,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NodeRow {
    id: String,
    level: i64,
    combination_rule: String,
    status: String,
    approved_by_id: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    rejected_by_id: Option<String>,
    rejected_at: Option<DateTime<Utc>>,
}

impl NodeRow {
    fn into_node(
        self,
        approvers: Vec<Approver>,
        decision_rows: Vec<DecisionRow>,
    ) -> Result<ApprovalNode> {
        let resolve = |approver_id: Option<String>| -> Result<Option<Approver>> {
            approver_id
                .map(|id| {
                    approvers.iter().find(|a| a.id == id).cloned().ok_or_else(|| {
                        AppError::Internal(format!(
                            "Node {} references unknown approver {}",
                            self.id, id
                        ))
                    })
                })
                .transpose()
        };
        let approved_by = resolve(self.approved_by_id.clone())?;
        let rejected_by = resolve(self.rejected_by_id.clone())?;

        let mut decisions = std::collections::BTreeMap::new();
        for row in decision_rows {
            let decision = row
                .decision
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid decision: {}", e)))?;
            decisions.insert(
                row.approver_id,
                DecisionRecord {
                    decision,
                    decided_at: row.decided_at,
                },
            );
        }

        Ok(ApprovalNode {
            id: parse_uuid(&self.id, "node")?,
            level: u32::try_from(self.level)
                .map_err(|e| AppError::Internal(format!("Invalid level {}: {}", self.level, e)))?,
            approvers,
            combination_rule: self
                .combination_rule
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid combination rule: {}", e)))?,
            decisions,
            status: self
                .status
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid status: {}", e)))?,
            approved_by,
            approved_at: self.approved_at,
            rejected_by,
            rejected_at: self.rejected_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ApproverRow {
    node_id: String,
    approver_id: String,
    approver_name: String,
    approver_role: String,
}

#[derive(sqlx::FromRow)]
struct DecisionRow {
    node_id: String,
    approver_id: String,
    decision: String,
    decided_at: DateTime<Utc>,
}
