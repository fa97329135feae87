//! Business logic services.
//!
//! Each service owns the [`Storage`](crate::repository::Storage) of one
//! backend and runs its operations as units of work over it. Services are
//! generic over the backend transaction type, so the same code runs on
//! SQLite and on the in-memory store.

pub mod pull_request;
pub mod reviewer_selector;
pub mod team;
pub mod user;

pub use pull_request::PullRequestService;
pub use reviewer_selector::ReviewerSelector;
pub use team::TeamService;
pub use user::UserService;
