//! User model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A team member who can author and review pull requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user ID.
    #[sqlx(rename = "id")]
    pub user_id: String,

    /// Display name.
    pub username: String,

    /// Name of the owning team.
    pub team_name: String,

    /// Only active users are eligible as reviewers.
    pub is_active: bool,
}
