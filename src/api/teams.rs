//! Team routes.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{require, ApiErr, AppState};
use crate::models::{Team, TeamMember, TeamWithMembers};

#[derive(Deserialize)]
struct AddTeamRequest {
    team_name: String,
    #[serde(default)]
    members: Vec<TeamMember>,
}

#[derive(Serialize)]
struct TeamResponse {
    team: TeamWithMembers,
}

#[derive(Deserialize)]
struct TeamQuery {
    team_name: Option<String>,
}

pub(super) fn routes<T: Send + 'static>() -> Router<AppState<T>> {
    Router::new()
        .route("/team/add", post(add_team::<T>))
        .route("/team/get", get(get_team::<T>))
}

/// POST /team/add: Create a team with its members.
async fn add_team<T: Send + 'static>(
    State(state): State<AppState<T>>,
    payload: Result<Json<AddTeamRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TeamResponse>), ApiErr> {
    let Json(req) = payload?;
    let team_name = require("team_name", Some(&req.team_name))?;

    let team = state
        .teams
        .create_team_with_users(&Team::new(team_name), &req.members)
        .await?;

    Ok((StatusCode::CREATED, Json(TeamResponse { team })))
}

/// GET /team/get?team_name=X
async fn get_team<T: Send + 'static>(
    State(state): State<AppState<T>>,
    query: Result<Query<TeamQuery>, QueryRejection>,
) -> Result<Json<TeamWithMembers>, ApiErr> {
    let Query(query) = query?;
    let team_name = require("team_name", query.team_name.as_deref())?;

    Ok(Json(state.teams.get_team(team_name).await?))
}
