//! In-memory implementation of the storage gateways.
//!
//! All tables live in one map set behind an async mutex. A transaction
//! holds the lock for its whole lifetime together with a snapshot of the
//! tables; dropping it uncommitted puts the snapshot back. Uniqueness and
//! reference rules mirror the SQLite schema so workflows behave the same on
//! both backends. Each gateway call behaves like a single SQL statement:
//! it either applies completely or not at all.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{PullRequestGateway, Scope, Storage, TeamGateway, Transactor, UserGateway};
use crate::error::AppError;
use crate::models::{PullRequest, PullRequestStatus, Team, TeamMember, User};

#[derive(Debug, Clone)]
struct PullRequestRecord {
    name: String,
    author_id: String,
    status: PullRequestStatus,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    teams: BTreeSet<String>,
    users: BTreeMap<String, User>,
    pull_requests: BTreeMap<String, PullRequestRecord>,
    /// pr_id -> reviewer IDs in assignment order.
    reviewers: BTreeMap<String, Vec<String>>,
}

impl Tables {
    fn assemble(&self, id: &str, record: &PullRequestRecord) -> PullRequest {
        PullRequest {
            id: id.to_string(),
            name: record.name.clone(),
            author_id: record.author_id.clone(),
            status: record.status,
            reviewers: self.reviewers_of(id),
            created_at: record.created_at,
            merged_at: record.merged_at,
        }
    }

    fn reviewers_of(&self, pr_id: &str) -> Vec<User> {
        self.reviewers
            .get(pr_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.users.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn load(&self, id: &str) -> Result<PullRequest, AppError> {
        self.pull_requests
            .get(id)
            .map(|record| self.assemble(id, record))
            .ok_or_else(|| AppError::not_found_with_id("pull request", id))
    }

    /// Validate a reviewer batch the way the `pr_reviewers` keys would.
    fn check_reviewer_batch(&self, pr_id: &str, reviewer_ids: &[String]) -> Result<(), AppError> {
        if !self.pull_requests.contains_key(pr_id) {
            return Err(foreign_key_violation());
        }

        let mut seen = HashSet::new();
        for id in reviewer_ids {
            if !self.users.contains_key(id) {
                return Err(foreign_key_violation());
            }
            if !seen.insert(id.as_str()) {
                return Err(AppError::database(
                    "UNIQUE constraint failed: pr_reviewers.pr_id, pr_reviewers.reviewer_id",
                ));
            }
        }
        Ok(())
    }
}

fn foreign_key_violation() -> AppError {
    AppError::database("FOREIGN KEY constraint failed")
}

/// Transaction over a [`MemoryStore`].
///
/// Holds the table lock until committed or dropped.
pub struct MemoryTx {
    tables: OwnedMutexGuard<Tables>,
    snapshot: Option<Tables>,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.tables = snapshot;
        }
    }
}

/// In-memory storage backend.
///
/// Cloning yields another handle to the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transactor and gateways backed by this store.
    pub fn storage(&self) -> Storage<MemoryTx> {
        Storage {
            transactor: Arc::new(self.clone()),
            teams: Arc::new(self.clone()),
            users: Arc::new(self.clone()),
            pull_requests: Arc::new(self.clone()),
        }
    }

    /// Run `f` against the scope's transaction, or under a short-lived lock.
    async fn with_tables<R, F>(&self, scope: &mut Scope<MemoryTx>, f: F) -> R
    where
        F: FnOnce(&mut Tables) -> R,
    {
        match scope.handle() {
            Some(tx) => f(&mut *tx.tables),
            None => {
                let mut tables = self.tables.lock().await;
                f(&mut *tables)
            }
        }
    }
}

#[async_trait]
impl Transactor for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, AppError> {
        let tables = self.tables.clone().lock_owned().await;
        let snapshot = tables.clone();
        Ok(MemoryTx {
            tables,
            snapshot: Some(snapshot),
        })
    }

    async fn commit(&self, mut tx: MemoryTx) -> Result<(), AppError> {
        tx.snapshot = None;
        Ok(())
    }
}

#[async_trait]
impl TeamGateway for MemoryStore {
    type Tx = MemoryTx;

    async fn create(
        &self,
        scope: &mut Scope<MemoryTx>,
        team: &Team,
        members: &[TeamMember],
    ) -> Result<(), AppError> {
        self.with_tables(scope, |tables| {
            if tables.teams.contains(&team.team_name) {
                return Err(AppError::team_exists(&team.team_name));
            }

            // Validate the whole member batch before anything is written.
            let mut seen = HashSet::new();
            for member in members {
                if tables.users.contains_key(&member.user_id) || !seen.insert(&member.user_id) {
                    return Err(AppError::database_with_op(
                        "UNIQUE constraint failed: users.id",
                        "teams.create (members)",
                    ));
                }
            }

            tables.teams.insert(team.team_name.clone());
            for member in members {
                let user = member.clone().into_user(&team.team_name);
                tables.users.insert(user.user_id.clone(), user);
            }
            Ok(())
        })
        .await
    }

    async fn get_by_name(&self, scope: &mut Scope<MemoryTx>, name: &str) -> Result<Team, AppError> {
        self.with_tables(scope, |tables| {
            tables
                .teams
                .get(name)
                .map(|name| Team::new(name.clone()))
                .ok_or_else(|| AppError::not_found_with_id("team", name))
        })
        .await
    }
}

#[async_trait]
impl UserGateway for MemoryStore {
    type Tx = MemoryTx;

    async fn get_by_id(&self, scope: &mut Scope<MemoryTx>, id: &str) -> Result<User, AppError> {
        self.with_tables(scope, |tables| {
            tables
                .users
                .get(id)
                .cloned()
                .ok_or_else(|| AppError::not_found_with_id("user", id))
        })
        .await
    }

    async fn create(&self, scope: &mut Scope<MemoryTx>, user: &User) -> Result<(), AppError> {
        self.with_tables(scope, |tables| {
            if !tables.teams.contains(&user.team_name) {
                return Err(foreign_key_violation());
            }
            if tables.users.contains_key(&user.user_id) {
                return Err(AppError::database_with_op(
                    "UNIQUE constraint failed: users.id",
                    "users.create",
                ));
            }
            tables.users.insert(user.user_id.clone(), user.clone());
            Ok(())
        })
        .await
    }

    async fn get_active_candidates_by_team(
        &self,
        scope: &mut Scope<MemoryTx>,
        team_name: &str,
        exclude_user_id: &str,
    ) -> Result<Vec<User>, AppError> {
        self.with_tables(scope, |tables| {
            Ok(tables
                .users
                .values()
                .filter(|u| u.team_name == team_name && u.is_active && u.user_id != exclude_user_id)
                .cloned()
                .collect())
        })
        .await
    }

    async fn set_active(
        &self,
        scope: &mut Scope<MemoryTx>,
        id: &str,
        is_active: bool,
    ) -> Result<User, AppError> {
        self.with_tables(scope, |tables| match tables.users.get_mut(id) {
            Some(user) => {
                user.is_active = is_active;
                Ok(user.clone())
            }
            None => Err(AppError::not_found_with_id("user", id)),
        })
        .await
    }

    async fn list_by_team(
        &self,
        scope: &mut Scope<MemoryTx>,
        team_name: &str,
    ) -> Result<Vec<User>, AppError> {
        self.with_tables(scope, |tables| {
            Ok(tables
                .users
                .values()
                .filter(|u| u.team_name == team_name)
                .cloned()
                .collect())
        })
        .await
    }
}

#[async_trait]
impl PullRequestGateway for MemoryStore {
    type Tx = MemoryTx;

    async fn create(&self, scope: &mut Scope<MemoryTx>, pr: &PullRequest) -> Result<(), AppError> {
        self.with_tables(scope, |tables| {
            if tables.pull_requests.contains_key(&pr.id) {
                return Err(AppError::pr_exists(&pr.id));
            }
            if !tables.users.contains_key(&pr.author_id) {
                return Err(foreign_key_violation());
            }

            tables.pull_requests.insert(
                pr.id.clone(),
                PullRequestRecord {
                    name: pr.name.clone(),
                    author_id: pr.author_id.clone(),
                    status: pr.status,
                    created_at: pr.created_at,
                    merged_at: pr.merged_at,
                },
            );

            if !pr.reviewers.is_empty() {
                let ids = pr.reviewer_ids();
                tables
                    .check_reviewer_batch(&pr.id, &ids)
                    .map_err(|e| e.with_operation("pull_requests.create (reviewers)"))?;
                tables.reviewers.insert(pr.id.clone(), ids);
            }
            Ok(())
        })
        .await
    }

    async fn get_by_id(
        &self,
        scope: &mut Scope<MemoryTx>,
        id: &str,
    ) -> Result<PullRequest, AppError> {
        self.with_tables(scope, |tables| tables.load(id)).await
    }

    async fn update_status(
        &self,
        scope: &mut Scope<MemoryTx>,
        id: &str,
        status: PullRequestStatus,
    ) -> Result<PullRequest, AppError> {
        self.with_tables(scope, |tables| {
            let record = tables
                .pull_requests
                .get_mut(id)
                .ok_or_else(|| AppError::not_found_with_id("pull request", id))?;

            record.status = status;
            if status == PullRequestStatus::Merged {
                record.merged_at = Some(Utc::now());
            }
            tables.load(id)
        })
        .await
    }

    async fn set_reviewers(
        &self,
        scope: &mut Scope<MemoryTx>,
        pr_id: &str,
        reviewer_ids: &[String],
    ) -> Result<(), AppError> {
        self.with_tables(scope, |tables| {
            if reviewer_ids.is_empty() {
                tables.reviewers.remove(pr_id);
                return Ok(());
            }

            tables
                .check_reviewer_batch(pr_id, reviewer_ids)
                .map_err(|e| e.with_operation("pull_requests.set_reviewers"))?;
            tables
                .reviewers
                .insert(pr_id.to_string(), reviewer_ids.to_vec());
            Ok(())
        })
        .await
    }

    async fn get_reviews_by_user_id(
        &self,
        scope: &mut Scope<MemoryTx>,
        user_id: &str,
    ) -> Result<Vec<PullRequest>, AppError> {
        self.with_tables(scope, |tables| {
            Ok(tables
                .pull_requests
                .iter()
                .filter(|(id, _)| {
                    tables
                        .reviewers
                        .get(id.as_str())
                        .is_some_and(|ids| ids.iter().any(|r| r == user_id))
                })
                .map(|(id, record)| tables.assemble(id, record))
                .collect())
        })
        .await
    }

    async fn get_reviewers_by_pr_id(
        &self,
        scope: &mut Scope<MemoryTx>,
        pr_id: &str,
    ) -> Result<Vec<User>, AppError> {
        self.with_tables(scope, |tables| Ok(tables.reviewers_of(pr_id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::UnitOfWork;

    fn member(id: &str, is_active: bool) -> TeamMember {
        TeamMember {
            user_id: id.to_string(),
            username: format!("user-{id}"),
            is_active,
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let mut scope = Scope::new();
        TeamGateway::create(
            &store,
            &mut scope,
            &Team::new("backend"),
            &[member("u1", true), member("u2", true), member("u3", false)],
        )
        .await
        .unwrap();
        store
    }

    #[tokio::test]
    async fn test_duplicate_team_is_rejected() {
        let store = seeded().await;
        let mut scope = Scope::new();

        let err = TeamGateway::create(&store, &mut scope, &Team::new("backend"), &[member("u9", true)])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TeamExists { .. }));
        let err = UserGateway::get_by_id(&store, &mut scope, "u9").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_rejected_member_batch_leaves_no_team() {
        let store = seeded().await;
        let mut scope = Scope::new();

        let err = TeamGateway::create(
            &store,
            &mut scope,
            &Team::new("frontend"),
            &[member("f1", true), member("u1", true)],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Database { .. }));

        let err = TeamGateway::get_by_name(&store, &mut scope, "frontend")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        let err = UserGateway::get_by_id(&store, &mut scope, "f1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_candidates_are_active_teammates_only() {
        let store = seeded().await;
        let mut scope = Scope::new();

        let candidates = store
            .get_active_candidates_by_team(&mut scope, "backend", "u1")
            .await
            .unwrap();

        let ids: Vec<_> = candidates.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u2"]);
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_is_rolled_back() {
        let store = seeded().await;
        let mut scope = Scope::new();

        {
            let mut uow = UnitOfWork::enter(&store, &mut scope).await.unwrap();
            store.set_active(uow.scope(), "u3", true).await.unwrap();
            TeamGateway::create(&store, uow.scope(), &Team::new("frontend"), &[])
                .await
                .unwrap();
        }

        let u3 = UserGateway::get_by_id(&store, &mut scope, "u3").await.unwrap();
        assert!(!u3.is_active);
        assert!(store.get_by_name(&mut scope, "frontend").await.is_err());
    }

    #[tokio::test]
    async fn test_committed_transaction_is_kept() {
        let store = seeded().await;
        let mut scope = Scope::new();

        let mut uow = UnitOfWork::enter(&store, &mut scope).await.unwrap();
        store.set_active(uow.scope(), "u3", true).await.unwrap();
        uow.commit().await.unwrap();

        let u3 = UserGateway::get_by_id(&store, &mut scope, "u3").await.unwrap();
        assert!(u3.is_active);
    }

    #[tokio::test]
    async fn test_pull_request_lifecycle() {
        let store = seeded().await;
        let mut scope = Scope::new();
        let u2 = UserGateway::get_by_id(&store, &mut scope, "u2").await.unwrap();

        let pr = PullRequest::open("pr-1", "Add search", "u1", vec![u2], Utc::now());
        PullRequestGateway::create(&store, &mut scope, &pr).await.unwrap();

        let err = PullRequestGateway::create(&store, &mut scope, &pr)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PrExists { .. }));

        let reviews = store.get_reviews_by_user_id(&mut scope, "u2").await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].id, "pr-1");

        let merged = store
            .update_status(&mut scope, "pr-1", PullRequestStatus::Merged)
            .await
            .unwrap();
        assert!(merged.is_merged());
        assert!(merged.merged_at.is_some());
        assert_eq!(merged.reviewer_ids(), vec!["u2".to_string()]);
    }

    #[tokio::test]
    async fn test_set_reviewers_replaces_whole_list() {
        let store = seeded().await;
        let mut scope = Scope::new();
        let u2 = UserGateway::get_by_id(&store, &mut scope, "u2").await.unwrap();
        let pr = PullRequest::open("pr-1", "x", "u1", vec![u2], Utc::now());
        PullRequestGateway::create(&store, &mut scope, &pr).await.unwrap();

        store
            .set_reviewers(&mut scope, "pr-1", &["u3".to_string()])
            .await
            .unwrap();
        let reviewers = store.get_reviewers_by_pr_id(&mut scope, "pr-1").await.unwrap();
        assert_eq!(reviewers.len(), 1);
        assert_eq!(reviewers[0].user_id, "u3");

        let err = store
            .set_reviewers(&mut scope, "pr-1", &["u2".to_string(), "u2".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database { .. }));
    }
}
