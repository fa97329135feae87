//! HTTP API.
//!
//! JSON request/response handlers over the services, the error envelope
//! clients see, and the middleware stack shared by every route.

mod pull_requests;
mod teams;
mod users;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use crate::error::AppError;
use crate::repository::Storage;
use crate::services::{PullRequestService, ReviewerSelector, TeamService, UserService};

// ── State ────────────────────────────────────────────────────────────────────

/// Services shared by all handlers.
pub struct AppState<T: Send + 'static> {
    pub teams: TeamService<T>,
    pub users: UserService<T>,
    pub pull_requests: PullRequestService<T>,
}

impl<T: Send + 'static> AppState<T> {
    pub fn new(storage: Storage<T>, selector: Arc<ReviewerSelector>) -> Self {
        Self {
            teams: TeamService::new(storage.clone()),
            users: UserService::new(storage.clone()),
            pull_requests: PullRequestService::new(storage, selector),
        }
    }
}

impl<T: Send + 'static> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            teams: self.teams.clone(),
            users: self.users.clone(),
            pull_requests: self.pull_requests.clone(),
        }
    }
}

// ── Error handling ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(AppError);

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::NotFound { .. } | AppError::NoCandidate { .. } => StatusCode::NOT_FOUND,
            AppError::TeamExists { .. }
            | AppError::PrExists { .. }
            | AppError::PrMerged { .. }
            | AppError::NotAssigned { .. } => StatusCode::CONFLICT,
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::Database { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Storage details stay in the log.
        let message = if self.0.is_domain() {
            self.0.to_string()
        } else {
            log::error!("[http] request failed: {}", self.0);
            "Internal server error".to_string()
        };

        let body = ErrorEnvelope {
            error: ErrorBody {
                code: self.0.code(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        log::debug!("[http] rejected body: {}", rejection.body_text());
        Self(AppError::invalid_input("Invalid JSON body"))
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

/// Reject a missing or blank identifier.
fn require<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, ApiErr> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiErr(AppError::invalid_input_field(
            format!("{field} is required"),
            field,
        ))),
    }
}

// ── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
///
/// Every request carries an `x-request-id`, generated when absent and
/// echoed on the response. Handlers running past `timeout` are cut off.
pub fn router<T: Send + 'static>(state: AppState<T>, timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(teams::routes::<T>())
        .merge(users::routes::<T>())
        .merge(pull_requests::routes::<T>())
        .with_state(state)
        .layer(middleware::from_fn(log_request))
        .layer(TimeoutLayer::new(timeout))
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// GET /health
async fn health() -> StatusCode {
    StatusCode::OK
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "[http] {} {} -> {} in {}ms (request {})",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis(),
        request_id
    );
    response
}
