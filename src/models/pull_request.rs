//! Pull request model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// Lifecycle status of a pull request.
///
/// `Open` is the initial state and `Merged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }
}

impl std::str::FromStr for PullRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "MERGED" => Ok(Self::Merged),
            other => Err(format!("unknown pull request status: {other}")),
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pull request and its assigned reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    #[serde(rename = "pull_request_id")]
    pub id: String,

    #[serde(rename = "pull_request_name")]
    pub name: String,

    /// Author's user ID. Never part of `reviewers`.
    pub author_id: String,

    pub status: PullRequestStatus,

    /// Assigned reviewers: distinct users, frozen once merged.
    #[serde(rename = "assigned_reviewers")]
    pub reviewers: Vec<User>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "mergedAt", skip_serializing_if = "Option::is_none", default)]
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// A freshly opened pull request.
    pub fn open(
        id: impl Into<String>,
        name: impl Into<String>,
        author_id: impl Into<String>,
        reviewers: Vec<User>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            author_id: author_id.into(),
            status: PullRequestStatus::Open,
            reviewers,
            created_at,
            merged_at: None,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.status == PullRequestStatus::Merged
    }

    pub fn reviewer_ids(&self) -> Vec<String> {
        self.reviewers.iter().map(|r| r.user_id.clone()).collect()
    }

    pub fn find_reviewer(&self, user_id: &str) -> Option<&User> {
        self.reviewers.iter().find(|r| r.user_id == user_id)
    }
}

/// Outcome of swapping one reviewer for another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reassignment {
    pub pull_request: PullRequest,

    /// ID of the newly assigned reviewer.
    pub replaced_by: String,
}
