//! Storage abstraction for teams, users and pull requests.
//!
//! Workflows only talk to storage through the gateway traits defined here.
//! Every gateway call takes the caller's [`Scope`], so the same gateway code
//! runs inside a unit of work or directly on the default connection.
//! Implementations: SQLite (`crate::db`) and in-memory ([`MemoryStore`]).

pub mod memory;
pub mod scope;

pub use memory::{MemoryStore, MemoryTx};
pub use scope::{Scope, Transactor, UnitOfWork};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{PullRequest, PullRequestStatus, Team, TeamMember, User};

/// Persistence for teams.
#[async_trait]
pub trait TeamGateway: Send + Sync {
    type Tx: Send + 'static;

    /// Create a team and insert its initial members as one batch.
    ///
    /// Fails with `TeamExists` (and writes nothing) if the name is taken.
    async fn create(
        &self,
        scope: &mut Scope<Self::Tx>,
        team: &Team,
        members: &[TeamMember],
    ) -> Result<(), AppError>;

    async fn get_by_name(&self, scope: &mut Scope<Self::Tx>, name: &str)
        -> Result<Team, AppError>;
}

/// Persistence for users.
#[async_trait]
pub trait UserGateway: Send + Sync {
    type Tx: Send + 'static;

    async fn get_by_id(&self, scope: &mut Scope<Self::Tx>, id: &str) -> Result<User, AppError>;

    async fn create(&self, scope: &mut Scope<Self::Tx>, user: &User) -> Result<(), AppError>;

    /// Active members of `team_name` other than `exclude_user_id`, ordered by ID.
    async fn get_active_candidates_by_team(
        &self,
        scope: &mut Scope<Self::Tx>,
        team_name: &str,
        exclude_user_id: &str,
    ) -> Result<Vec<User>, AppError>;

    /// Overwrite the active flag and return the updated user.
    async fn set_active(
        &self,
        scope: &mut Scope<Self::Tx>,
        id: &str,
        is_active: bool,
    ) -> Result<User, AppError>;

    /// All members of `team_name`, ordered by ID.
    async fn list_by_team(
        &self,
        scope: &mut Scope<Self::Tx>,
        team_name: &str,
    ) -> Result<Vec<User>, AppError>;
}

/// Persistence for pull requests and their reviewer links.
#[async_trait]
pub trait PullRequestGateway: Send + Sync {
    type Tx: Send + 'static;

    /// Insert the pull request, then its reviewer links.
    ///
    /// Fails with `PrExists` if the ID is taken.
    async fn create(&self, scope: &mut Scope<Self::Tx>, pr: &PullRequest)
        -> Result<(), AppError>;

    /// Load a pull request with its reviewers.
    async fn get_by_id(
        &self,
        scope: &mut Scope<Self::Tx>,
        id: &str,
    ) -> Result<PullRequest, AppError>;

    /// Set the status; `Merged` also stamps `merged_at` with the store's clock.
    async fn update_status(
        &self,
        scope: &mut Scope<Self::Tx>,
        id: &str,
        status: PullRequestStatus,
    ) -> Result<PullRequest, AppError>;

    /// Replace the whole reviewer list (delete, then insert).
    async fn set_reviewers(
        &self,
        scope: &mut Scope<Self::Tx>,
        pr_id: &str,
        reviewer_ids: &[String],
    ) -> Result<(), AppError>;

    /// Pull requests, in any status, where `user_id` is a current reviewer.
    async fn get_reviews_by_user_id(
        &self,
        scope: &mut Scope<Self::Tx>,
        user_id: &str,
    ) -> Result<Vec<PullRequest>, AppError>;

    async fn get_reviewers_by_pr_id(
        &self,
        scope: &mut Scope<Self::Tx>,
        pr_id: &str,
    ) -> Result<Vec<User>, AppError>;
}

/// The transactor and gateways of one storage backend.
pub struct Storage<T: Send + 'static> {
    pub transactor: Arc<dyn Transactor<Tx = T>>,
    pub teams: Arc<dyn TeamGateway<Tx = T>>,
    pub users: Arc<dyn UserGateway<Tx = T>>,
    pub pull_requests: Arc<dyn PullRequestGateway<Tx = T>>,
}

impl<T: Send + 'static> Clone for Storage<T> {
    fn clone(&self) -> Self {
        Self {
            transactor: self.transactor.clone(),
            teams: self.teams.clone(),
            users: self.users.clone(),
            pull_requests: self.pull_requests.clone(),
        }
    }
}
