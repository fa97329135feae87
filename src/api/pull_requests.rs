//! Pull request routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{require, ApiErr, AppState};
use crate::models::{PullRequest, Reassignment};

#[derive(Deserialize)]
struct CreatePrRequest {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
}

#[derive(Deserialize)]
struct MergePrRequest {
    pull_request_id: String,
}

#[derive(Deserialize)]
struct ReassignRequest {
    pull_request_id: String,
    old_reviewer_id: String,
}

#[derive(Serialize)]
struct PrResponse {
    pr: PullRequest,
}

pub(super) fn routes<T: Send + 'static>() -> Router<AppState<T>> {
    Router::new()
        .route("/pullRequest/create", post(create_pr::<T>))
        .route("/pullRequest/merge", post(merge_pr::<T>))
        .route("/pullRequest/reassign", post(reassign_reviewer::<T>))
}

/// POST /pullRequest/create: Open a pull request and assign reviewers.
async fn create_pr<T: Send + 'static>(
    State(state): State<AppState<T>>,
    payload: Result<Json<CreatePrRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PrResponse>), ApiErr> {
    let Json(req) = payload?;
    let pr_id = require("pull_request_id", Some(&req.pull_request_id))?;
    let author_id = require("author_id", Some(&req.author_id))?;

    let pr = state
        .pull_requests
        .create(pr_id, &req.pull_request_name, author_id)
        .await?;
    Ok((StatusCode::CREATED, Json(PrResponse { pr })))
}

/// POST /pullRequest/merge: Idempotent.
async fn merge_pr<T: Send + 'static>(
    State(state): State<AppState<T>>,
    payload: Result<Json<MergePrRequest>, JsonRejection>,
) -> Result<Json<PullRequest>, ApiErr> {
    let Json(req) = payload?;
    let pr_id = require("pull_request_id", Some(&req.pull_request_id))?;

    Ok(Json(state.pull_requests.merge(pr_id).await?))
}

/// POST /pullRequest/reassign
async fn reassign_reviewer<T: Send + 'static>(
    State(state): State<AppState<T>>,
    payload: Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<Reassignment>, ApiErr> {
    let Json(req) = payload?;
    let pr_id = require("pull_request_id", Some(&req.pull_request_id))?;
    let old_reviewer_id = require("old_reviewer_id", Some(&req.old_reviewer_id))?;

    Ok(Json(
        state
            .pull_requests
            .reassign(pr_id, old_reviewer_id)
            .await?,
    ))
}
