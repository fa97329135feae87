//! User routes.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{require, ApiErr, AppState};
use crate::models::{PullRequest, User};

#[derive(Deserialize)]
struct SetIsActiveRequest {
    user_id: String,
    is_active: bool,
}

#[derive(Serialize)]
struct UserResponse {
    user: User,
}

#[derive(Deserialize)]
struct ReviewQuery {
    user_id: Option<String>,
}

#[derive(Serialize)]
struct ReviewsResponse {
    user_id: String,
    pull_requests: Vec<PullRequest>,
}

pub(super) fn routes<T: Send + 'static>() -> Router<AppState<T>> {
    Router::new()
        .route("/users/add", post(add_user::<T>))
        .route("/users/setIsActive", post(set_is_active::<T>))
        .route("/users/getReview", get(get_review::<T>))
}

/// POST /users/add: Add one user to an existing team.
async fn add_user<T: Send + 'static>(
    State(state): State<AppState<T>>,
    payload: Result<Json<User>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiErr> {
    let Json(user) = payload?;
    require("user_id", Some(&user.user_id))?;
    require("team_name", Some(&user.team_name))?;

    let user = state.users.create_user(&user).await?;
    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

/// POST /users/setIsActive
async fn set_is_active<T: Send + 'static>(
    State(state): State<AppState<T>>,
    payload: Result<Json<SetIsActiveRequest>, JsonRejection>,
) -> Result<Json<User>, ApiErr> {
    let Json(req) = payload?;
    let user_id = require("user_id", Some(&req.user_id))?;

    Ok(Json(state.users.set_active(user_id, req.is_active).await?))
}

/// GET /users/getReview?user_id=X: Pull requests the user reviews.
async fn get_review<T: Send + 'static>(
    State(state): State<AppState<T>>,
    query: Result<Query<ReviewQuery>, QueryRejection>,
) -> Result<Json<ReviewsResponse>, ApiErr> {
    let Query(query) = query?;
    let user_id = require("user_id", query.user_id.as_deref())?;

    let pull_requests = state.users.get_reviews(user_id).await?;
    Ok(Json(ReviewsResponse {
        user_id: user_id.to_owned(),
        pull_requests,
    }))
}
