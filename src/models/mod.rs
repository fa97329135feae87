//! Data models for the application.
//!
//! These models represent the core entities persisted by the storage
//! gateways and returned over HTTP.

pub mod pull_request;
pub mod team;
pub mod user;

// Re-exports for convenient access
pub use pull_request::{PullRequest, PullRequestStatus, Reassignment};
pub use team::{Team, TeamMember, TeamWithMembers};
pub use user::User;
