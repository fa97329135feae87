//! Team queries.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite};

use super::pool::DbPool;
use super::transactor::{acquire, op_err, SqliteTx};
use crate::error::AppError;
use crate::models::{Team, TeamMember};
use crate::repository::{Scope, TeamGateway};

/// SQLite gateway for the `teams` table.
#[derive(Clone)]
pub struct TeamRepository {
    pool: DbPool,
}

impl TeamRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamGateway for TeamRepository {
    type Tx = SqliteTx;

    async fn create(
        &self,
        scope: &mut Scope<SqliteTx>,
        team: &Team,
        members: &[TeamMember],
    ) -> Result<(), AppError> {
        let mut conn = acquire(&self.pool, scope).await?;

        let inserted = sqlx::query("INSERT INTO teams (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(&team.team_name)
            .execute(&mut *conn)
            .await
            .map_err(op_err("teams.create"))?;

        if inserted.rows_affected() == 0 {
            return Err(AppError::team_exists(&team.team_name));
        }

        if members.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO users (id, username, team_name, is_active) ");
        builder.push_values(members, |mut row, member| {
            row.push_bind(member.user_id.clone())
                .push_bind(member.username.clone())
                .push_bind(team.team_name.clone())
                .push_bind(member.is_active);
        });

        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(op_err("teams.create (members)"))?;

        Ok(())
    }

    async fn get_by_name(&self, scope: &mut Scope<SqliteTx>, name: &str) -> Result<Team, AppError> {
        let mut conn = acquire(&self.pool, scope).await?;

        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM teams WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(op_err("teams.get_by_name"))?;

        row.map(|(name,)| Team::new(name))
            .ok_or_else(|| AppError::not_found_with_id("team", name))
    }
}
