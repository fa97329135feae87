//! SQLite storage backend.
//!
//! Bootstrap (pool, migrations, connect-with-retry) plus the gateway
//! implementations used in production.

pub mod pool;
pub mod pull_requests;
pub mod teams;
pub mod transactor;
pub mod users;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub use pull_requests::PullRequestRepository;
pub use teams::TeamRepository;
pub use transactor::{SqliteTransactor, SqliteTx};
pub use users::UserRepository;

use crate::repository::Storage;

/// Database-related errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Initialize the database: create the file if needed and run migrations.
pub async fn initialize(db_path: &Path) -> Result<pool::DbPool, DbError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            DbError::Migration(format!("Failed to create database directory: {}", e))
        })?;
    }

    let pool = pool::create_pool(db_path).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Initialize the database, retrying up to `attempts` times.
///
/// Sleeps `backoff` between attempts and returns the last error once the
/// attempts are used up.
pub async fn connect_with_retry(
    db_path: &Path,
    attempts: u32,
    backoff: Duration,
) -> Result<pool::DbPool, DbError> {
    let attempts = attempts.max(1);
    let mut remaining = attempts;

    loop {
        match initialize(db_path).await {
            Ok(pool) => {
                log::info!("[db] connected to {}", db_path.display());
                return Ok(pool);
            }
            Err(e) => {
                remaining -= 1;
                if remaining == 0 {
                    log::error!("[db] giving up after {} attempts: {}", attempts, e);
                    return Err(e);
                }
                log::warn!(
                    "[db] connection failed ({}), {} attempts left",
                    e,
                    remaining
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Transactor and gateways backed by `pool`.
pub fn sqlite_storage(pool: pool::DbPool) -> Storage<SqliteTx> {
    Storage {
        transactor: Arc::new(SqliteTransactor::new(pool.clone())),
        teams: Arc::new(TeamRepository::new(pool.clone())),
        users: Arc::new(UserRepository::new(pool.clone())),
        pull_requests: Arc::new(PullRequestRepository::new(pool)),
    }
}

/// Apply the schema migration once; later runs are no-ops.
async fn run_migrations(pool: &pool::DbPool) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    let applied: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM _migrations WHERE name = '0001_initial_schema'",
    )
    .fetch_optional(&mut *tx)
    .await?;

    if applied.is_none() {
        let migration_sql = include_str!("migrations/0001_initial_schema.sql");

        for statement in parse_sql_statements(migration_sql) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| DbError::Migration(format!("{}: {}", statement, e)))?;
        }
        log::info!("[db] applied migration 0001_initial_schema");

        sqlx::query("INSERT INTO _migrations (name) VALUES ('0001_initial_schema')")
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Parse SQL statements from a migration file.
///
/// This handles:
/// - Comments (lines starting with --)
/// - Semicolons inside parentheses (e.g., `strftime('%s', 'now')`)
/// - Multi-line statements
fn parse_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current_statement = String::new();
    let mut paren_depth: i32 = 0;

    for line in sql.lines() {
        let trimmed = line.trim();

        // Skip comment-only lines
        if trimmed.starts_with("--") {
            continue;
        }

        // Remove inline comments
        let line_without_comment = if let Some(idx) = line.find("--") {
            &line[..idx]
        } else {
            line
        };

        for ch in line_without_comment.chars() {
            match ch {
                '(' => {
                    paren_depth += 1;
                    current_statement.push(ch);
                }
                ')' => {
                    paren_depth = paren_depth.saturating_sub(1);
                    current_statement.push(ch);
                }
                ';' if paren_depth == 0 => {
                    // End of statement
                    let stmt = current_statement.trim().to_string();
                    if !stmt.is_empty() {
                        statements.push(stmt);
                    }
                    current_statement.clear();
                }
                _ => {
                    current_statement.push(ch);
                }
            }
        }

        // Add a space between lines to preserve formatting
        if !current_statement.is_empty() {
            current_statement.push(' ');
        }
    }

    // Handle any remaining statement without trailing semicolon
    let final_stmt = current_statement.trim().to_string();
    if !final_stmt.is_empty() {
        statements.push(final_stmt);
    }

    statements
}
