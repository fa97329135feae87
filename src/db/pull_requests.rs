//! Pull request and reviewer-link queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use super::pool::DbPool;
use super::transactor::{acquire, op_err, SqliteTx};
use crate::error::AppError;
use crate::models::{PullRequest, PullRequestStatus, User};
use crate::repository::{PullRequestGateway, Scope};

const SELECT_PULL_REQUEST: &str =
    "SELECT id, name, author_id, status, created_at, merged_at FROM pull_requests";

/// Raw `pull_requests` row; reviewers are loaded separately.
#[derive(Debug, FromRow)]
struct PullRequestRow {
    id: String,
    name: String,
    author_id: String,
    status: String,
    created_at: i64,
    merged_at: Option<i64>,
}

impl PullRequestRow {
    fn into_model(self, reviewers: Vec<User>) -> Result<PullRequest, AppError> {
        let status = self
            .status
            .parse::<PullRequestStatus>()
            .map_err(AppError::internal)?;

        Ok(PullRequest {
            created_at: from_unix(self.created_at)?,
            merged_at: self.merged_at.map(from_unix).transpose()?,
            id: self.id,
            name: self.name,
            author_id: self.author_id,
            status,
            reviewers,
        })
    }
}

fn from_unix(secs: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| AppError::internal(format!("timestamp out of range: {secs}")))
}

async fn fetch_reviewers(conn: &mut SqliteConnection, pr_id: &str) -> Result<Vec<User>, AppError> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.team_name, u.is_active
        FROM pr_reviewers r
        JOIN users u ON u.id = r.reviewer_id
        WHERE r.pr_id = ?
        ORDER BY r.rowid
        "#,
    )
    .bind(pr_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(op_err("pull_requests.get_reviewers"))
}

async fn fetch_pull_request(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<PullRequest, AppError> {
    let row = sqlx::query_as::<_, PullRequestRow>(&format!("{SELECT_PULL_REQUEST} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(op_err("pull_requests.get_by_id"))?
        .ok_or_else(|| AppError::not_found_with_id("pull request", id))?;

    let reviewers = fetch_reviewers(conn, id).await?;
    row.into_model(reviewers)
}

async fn insert_reviewers(
    conn: &mut SqliteConnection,
    pr_id: &str,
    reviewer_ids: &[String],
    operation: &'static str,
) -> Result<(), AppError> {
    if reviewer_ids.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO pr_reviewers (pr_id, reviewer_id) ");
    builder.push_values(reviewer_ids, |mut row, reviewer_id| {
        row.push_bind(pr_id.to_string())
            .push_bind(reviewer_id.clone());
    });

    builder
        .build()
        .execute(&mut *conn)
        .await
        .map_err(op_err(operation))?;

    Ok(())
}

/// SQLite gateway for pull requests and `pr_reviewers`.
#[derive(Clone)]
pub struct PullRequestRepository {
    pool: DbPool,
}

impl PullRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PullRequestGateway for PullRequestRepository {
    type Tx = SqliteTx;

    async fn create(&self, scope: &mut Scope<SqliteTx>, pr: &PullRequest) -> Result<(), AppError> {
        let mut conn = acquire(&self.pool, scope).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO pull_requests (id, name, author_id, status, created_at, merged_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&pr.id)
        .bind(&pr.name)
        .bind(&pr.author_id)
        .bind(pr.status.as_str())
        .bind(pr.created_at.timestamp())
        .bind(pr.merged_at.map(|t| t.timestamp()))
        .execute(&mut *conn)
        .await;

        match result {
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(AppError::pr_exists(&pr.id));
            }
            other => {
                other.map_err(op_err("pull_requests.create"))?;
            }
        }

        insert_reviewers(
            &mut conn,
            &pr.id,
            &pr.reviewer_ids(),
            "pull_requests.create (reviewers)",
        )
        .await
    }

    async fn get_by_id(
        &self,
        scope: &mut Scope<SqliteTx>,
        id: &str,
    ) -> Result<PullRequest, AppError> {
        let mut conn = acquire(&self.pool, scope).await?;
        fetch_pull_request(&mut conn, id).await
    }

    async fn update_status(
        &self,
        scope: &mut Scope<SqliteTx>,
        id: &str,
        status: PullRequestStatus,
    ) -> Result<PullRequest, AppError> {
        let mut conn = acquire(&self.pool, scope).await?;

        let query = match status {
            PullRequestStatus::Merged => {
                "UPDATE pull_requests SET status = ?, merged_at = CAST(strftime('%s', 'now') AS INTEGER) WHERE id = ?"
            }
            PullRequestStatus::Open => "UPDATE pull_requests SET status = ? WHERE id = ?",
        };

        let updated = sqlx::query(query)
            .bind(status.as_str())
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(op_err("pull_requests.update_status"))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::not_found_with_id("pull request", id));
        }

        fetch_pull_request(&mut conn, id).await
    }

    async fn set_reviewers(
        &self,
        scope: &mut Scope<SqliteTx>,
        pr_id: &str,
        reviewer_ids: &[String],
    ) -> Result<(), AppError> {
        let mut conn = acquire(&self.pool, scope).await?;

        sqlx::query("DELETE FROM pr_reviewers WHERE pr_id = ?")
            .bind(pr_id)
            .execute(&mut *conn)
            .await
            .map_err(op_err("pull_requests.set_reviewers"))?;

        insert_reviewers(&mut conn, pr_id, reviewer_ids, "pull_requests.set_reviewers").await
    }

    async fn get_reviews_by_user_id(
        &self,
        scope: &mut Scope<SqliteTx>,
        user_id: &str,
    ) -> Result<Vec<PullRequest>, AppError> {
        let mut conn = acquire(&self.pool, scope).await?;

        let rows = sqlx::query_as::<_, PullRequestRow>(
            r#"
            SELECT p.id, p.name, p.author_id, p.status, p.created_at, p.merged_at
            FROM pull_requests p
            JOIN pr_reviewers r ON r.pr_id = p.id
            WHERE r.reviewer_id = ?
            ORDER BY p.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(op_err("pull_requests.get_reviews_by_user_id"))?;

        let mut reviews = Vec::with_capacity(rows.len());
        for row in rows {
            let reviewers = fetch_reviewers(&mut conn, &row.id).await?;
            reviews.push(row.into_model(reviewers)?);
        }
        Ok(reviews)
    }

    async fn get_reviewers_by_pr_id(
        &self,
        scope: &mut Scope<SqliteTx>,
        pr_id: &str,
    ) -> Result<Vec<User>, AppError> {
        let mut conn = acquire(&self.pool, scope).await?;
        fetch_reviewers(&mut conn, pr_id).await
    }
}
