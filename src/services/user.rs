//! User workflow.

use crate::error::AppError;
use crate::models::{PullRequest, User};
use crate::repository::{Scope, Storage, UnitOfWork};

/// User activation, review lookup and direct user creation.
pub struct UserService<T: Send + 'static> {
    storage: Storage<T>,
}

impl<T: Send + 'static> Clone for UserService<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<T: Send + 'static> UserService<T> {
    pub fn new(storage: Storage<T>) -> Self {
        Self { storage }
    }

    /// Overwrite a user's active flag. Existing assignments are untouched.
    pub async fn set_active(&self, user_id: &str, is_active: bool) -> Result<User, AppError> {
        self.set_active_in(&mut Scope::new(), user_id, is_active)
            .await
    }

    pub async fn set_active_in(
        &self,
        scope: &mut Scope<T>,
        user_id: &str,
        is_active: bool,
    ) -> Result<User, AppError> {
        let user = self
            .storage
            .users
            .set_active(scope, user_id, is_active)
            .await?;
        log::info!("[user] {} is_active={}", user.user_id, user.is_active);
        Ok(user)
    }

    /// Pull requests, open or merged, on which the user is a current reviewer.
    pub async fn get_reviews(&self, user_id: &str) -> Result<Vec<PullRequest>, AppError> {
        self.get_reviews_in(&mut Scope::new(), user_id).await
    }

    pub async fn get_reviews_in(
        &self,
        scope: &mut Scope<T>,
        user_id: &str,
    ) -> Result<Vec<PullRequest>, AppError> {
        self.storage.users.get_by_id(scope, user_id).await?;
        self.storage
            .pull_requests
            .get_reviews_by_user_id(scope, user_id)
            .await
    }

    /// Add a single user to an existing team.
    pub async fn create_user(&self, user: &User) -> Result<User, AppError> {
        self.create_user_in(&mut Scope::new(), user).await
    }

    pub async fn create_user_in(&self, scope: &mut Scope<T>, user: &User) -> Result<User, AppError> {
        let mut uow = UnitOfWork::enter(&*self.storage.transactor, scope).await?;
        self.storage
            .teams
            .get_by_name(uow.scope(), &user.team_name)
            .await?;
        self.storage.users.create(uow.scope(), user).await?;
        uow.commit().await?;

        log::info!("[user] created {} in {}", user.user_id, user.team_name);
        Ok(user.clone())
    }
}
