//! Pull request workflow: creation, merge and reviewer reassignment.
//!
//! `OPEN` is the initial status and `MERGED` is terminal. Reviewers are set
//! once at creation by the selector and afterwards only change through a
//! single-reviewer swap on an open pull request.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{SubsecRound, Utc};

use super::ReviewerSelector;
use crate::error::AppError;
use crate::models::{PullRequest, PullRequestStatus, Reassignment};
use crate::repository::{Scope, Storage, UnitOfWork};

/// Number of reviewers assigned to a new pull request.
pub const REVIEWERS_PER_PULL_REQUEST: usize = 2;

pub struct PullRequestService<T: Send + 'static> {
    storage: Storage<T>,
    selector: Arc<ReviewerSelector>,
}

impl<T: Send + 'static> Clone for PullRequestService<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            selector: self.selector.clone(),
        }
    }
}

impl<T: Send + 'static> PullRequestService<T> {
    pub fn new(storage: Storage<T>, selector: Arc<ReviewerSelector>) -> Self {
        Self { storage, selector }
    }

    /// Open a pull request and assign up to two active teammates of the author.
    ///
    /// Fewer reviewers (even none) is a valid outcome when the team is small.
    pub async fn create(
        &self,
        pr_id: &str,
        name: &str,
        author_id: &str,
    ) -> Result<PullRequest, AppError> {
        self.create_in(&mut Scope::new(), pr_id, name, author_id)
            .await
    }

    pub async fn create_in(
        &self,
        scope: &mut Scope<T>,
        pr_id: &str,
        name: &str,
        author_id: &str,
    ) -> Result<PullRequest, AppError> {
        let mut uow = UnitOfWork::enter(&*self.storage.transactor, scope).await?;

        let author = match self.storage.users.get_by_id(uow.scope(), author_id).await {
            Err(AppError::NotFound { .. }) => {
                return Err(AppError::not_found_with_id("author", author_id))
            }
            other => other?,
        };

        let candidates = self
            .storage
            .users
            .get_active_candidates_by_team(uow.scope(), &author.team_name, &author.user_id)
            .await?;
        let reviewers = self.selector.select(&candidates, REVIEWERS_PER_PULL_REQUEST);

        let pr = PullRequest::open(
            pr_id,
            name,
            author_id,
            reviewers,
            Utc::now().trunc_subsecs(0),
        );
        self.storage.pull_requests.create(uow.scope(), &pr).await?;
        uow.commit().await?;

        log::info!(
            "[pr] created {} by {} with reviewers {:?}",
            pr.id,
            pr.author_id,
            pr.reviewer_ids()
        );
        Ok(pr)
    }

    /// Mark a pull request as merged. Merging a merged pull request is a no-op.
    ///
    /// The status update and the reviewer reload are separate storage calls
    /// and do not share a transaction.
    pub async fn merge(&self, pr_id: &str) -> Result<PullRequest, AppError> {
        self.merge_in(&mut Scope::new(), pr_id).await
    }

    pub async fn merge_in(&self, scope: &mut Scope<T>, pr_id: &str) -> Result<PullRequest, AppError> {
        let pr = self.storage.pull_requests.get_by_id(scope, pr_id).await?;
        if pr.is_merged() {
            log::debug!("[pr] {} already merged", pr_id);
            return Ok(pr);
        }

        let mut merged = self
            .storage
            .pull_requests
            .update_status(scope, pr_id, PullRequestStatus::Merged)
            .await?;
        merged.reviewers = self
            .storage
            .pull_requests
            .get_reviewers_by_pr_id(scope, pr_id)
            .await?;

        log::info!("[pr] merged {}", pr_id);
        Ok(merged)
    }

    /// Replace `old_reviewer_id` with a random active teammate of that reviewer.
    ///
    /// Fails with `PrMerged` on a merged pull request, `NotAssigned` if the
    /// user is not a current reviewer, and `NoCandidate` if nobody eligible is
    /// left. The reviewer list is unchanged on every failure.
    pub async fn reassign(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<Reassignment, AppError> {
        self.reassign_in(&mut Scope::new(), pr_id, old_reviewer_id)
            .await
    }

    pub async fn reassign_in(
        &self,
        scope: &mut Scope<T>,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<Reassignment, AppError> {
        let mut uow = UnitOfWork::enter(&*self.storage.transactor, scope).await?;

        let pr = self
            .storage
            .pull_requests
            .get_by_id(uow.scope(), pr_id)
            .await?;
        if pr.is_merged() {
            return Err(AppError::pr_merged(pr_id));
        }

        let old_reviewer = pr
            .find_reviewer(old_reviewer_id)
            .ok_or_else(|| AppError::not_assigned(pr_id, old_reviewer_id))?;

        // Current reviewers and the author are never eligible.
        let mut excluded: HashSet<&str> = pr.reviewers.iter().map(|r| r.user_id.as_str()).collect();
        excluded.insert(pr.author_id.as_str());

        let candidates: Vec<_> = self
            .storage
            .users
            .get_active_candidates_by_team(uow.scope(), &old_reviewer.team_name, old_reviewer_id)
            .await?
            .into_iter()
            .filter(|c| !excluded.contains(c.user_id.as_str()))
            .collect();

        let new_reviewer = self
            .selector
            .select(&candidates, 1)
            .into_iter()
            .next()
            .ok_or_else(|| AppError::no_candidate(pr_id))?;

        let mut reviewer_ids: Vec<String> = pr
            .reviewers
            .iter()
            .filter(|r| r.user_id != old_reviewer_id)
            .map(|r| r.user_id.clone())
            .collect();
        reviewer_ids.push(new_reviewer.user_id.clone());

        self.storage
            .pull_requests
            .set_reviewers(uow.scope(), pr_id, &reviewer_ids)
            .await?;
        let pull_request = self
            .storage
            .pull_requests
            .get_by_id(uow.scope(), pr_id)
            .await?;
        uow.commit().await?;

        log::info!(
            "[pr] {}: reviewer {} replaced by {}",
            pr_id,
            old_reviewer_id,
            new_reviewer.user_id
        );
        Ok(Reassignment {
            pull_request,
            replaced_by: new_reviewer.user_id,
        })
    }
}
