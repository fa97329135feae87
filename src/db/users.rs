//! User queries.

use async_trait::async_trait;

use super::pool::DbPool;
use super::transactor::{acquire, op_err, SqliteTx};
use crate::error::AppError;
use crate::models::User;
use crate::repository::{Scope, UserGateway};

/// SQLite gateway for the `users` table.
#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserGateway for UserRepository {
    type Tx = SqliteTx;

    async fn get_by_id(&self, scope: &mut Scope<SqliteTx>, id: &str) -> Result<User, AppError> {
        let mut conn = acquire(&self.pool, scope).await?;

        sqlx::query_as::<_, User>(
            "SELECT id, username, team_name, is_active FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(op_err("users.get_by_id"))?
        .ok_or_else(|| AppError::not_found_with_id("user", id))
    }

    async fn create(&self, scope: &mut Scope<SqliteTx>, user: &User) -> Result<(), AppError> {
        let mut conn = acquire(&self.pool, scope).await?;

        sqlx::query("INSERT INTO users (id, username, team_name, is_active) VALUES (?, ?, ?, ?)")
            .bind(&user.user_id)
            .bind(&user.username)
            .bind(&user.team_name)
            .bind(user.is_active)
            .execute(&mut *conn)
            .await
            .map_err(op_err("users.create"))?;

        Ok(())
    }

    async fn get_active_candidates_by_team(
        &self,
        scope: &mut Scope<SqliteTx>,
        team_name: &str,
        exclude_user_id: &str,
    ) -> Result<Vec<User>, AppError> {
        let mut conn = acquire(&self.pool, scope).await?;

        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, team_name, is_active
            FROM users
            WHERE team_name = ? AND is_active = 1 AND id != ?
            ORDER BY id
            "#,
        )
        .bind(team_name)
        .bind(exclude_user_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(op_err("users.get_active_candidates_by_team"))
    }

    async fn set_active(
        &self,
        scope: &mut Scope<SqliteTx>,
        id: &str,
        is_active: bool,
    ) -> Result<User, AppError> {
        let mut conn = acquire(&self.pool, scope).await?;

        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET is_active = ?
            WHERE id = ?
            RETURNING id, username, team_name, is_active
            "#,
        )
        .bind(is_active)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(op_err("users.set_active"))?
        .ok_or_else(|| AppError::not_found_with_id("user", id))
    }

    async fn list_by_team(
        &self,
        scope: &mut Scope<SqliteTx>,
        team_name: &str,
    ) -> Result<Vec<User>, AppError> {
        let mut conn = acquire(&self.pool, scope).await?;

        sqlx::query_as::<_, User>(
            "SELECT id, username, team_name, is_active FROM users WHERE team_name = ? ORDER BY id",
        )
        .bind(team_name)
        .fetch_all(&mut *conn)
        .await
        .map_err(op_err("users.list_by_team"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{initialize, TeamRepository};
    use crate::models::{Team, TeamMember};
    use crate::repository::TeamGateway;
    use tempfile::{tempdir, TempDir};

    async fn setup() -> (TempDir, UserRepository) {
        let dir = tempdir().unwrap();
        let pool = initialize(&dir.path().join("test.db")).await.unwrap();

        let members: Vec<TeamMember> = [("u1", true), ("u2", true), ("u3", false), ("u4", true)]
            .iter()
            .map(|(id, is_active)| TeamMember {
                user_id: id.to_string(),
                username: format!("user-{id}"),
                is_active: *is_active,
            })
            .collect();
        TeamRepository::new(pool.clone())
            .create(&mut Scope::new(), &Team::new("backend"), &members)
            .await
            .unwrap();

        (dir, UserRepository::new(pool))
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let (_dir, repo) = setup().await;
        let mut scope = Scope::new();

        let user = repo.get_by_id(&mut scope, "u3").await.unwrap();
        assert_eq!(user.username, "user-u3");
        assert_eq!(user.team_name, "backend");
        assert!(!user.is_active);

        let err = repo.get_by_id(&mut scope, "u9").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_candidates_exclude_inactive_and_excluded_user() {
        let (_dir, repo) = setup().await;
        let mut scope = Scope::new();

        let candidates = repo
            .get_active_candidates_by_team(&mut scope, "backend", "u2")
            .await
            .unwrap();

        let ids: Vec<_> = candidates.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u4"]);
    }

    #[tokio::test]
    async fn test_set_active_returns_updated_user() {
        let (_dir, repo) = setup().await;
        let mut scope = Scope::new();

        let user = repo.set_active(&mut scope, "u3", true).await.unwrap();
        assert!(user.is_active);
        assert!(repo.get_by_id(&mut scope, "u3").await.unwrap().is_active);

        let err = repo.set_active(&mut scope, "u9", true).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id_and_unknown_team() {
        let (_dir, repo) = setup().await;
        let mut scope = Scope::new();

        let mut user = User {
            user_id: "u5".to_string(),
            username: "eve".to_string(),
            team_name: "backend".to_string(),
            is_active: true,
        };
        repo.create(&mut scope, &user).await.unwrap();
        assert_eq!(repo.list_by_team(&mut scope, "backend").await.unwrap().len(), 5);

        let err = repo.create(&mut scope, &user).await.unwrap_err();
        assert!(matches!(err, AppError::Database { .. }));

        user.user_id = "u6".to_string();
        user.team_name = "frontend".to_string();
        let err = repo.create(&mut scope, &user).await.unwrap_err();
        assert!(matches!(err, AppError::Database { .. }));
    }
}
