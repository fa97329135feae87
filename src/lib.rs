//! Reviewer Assigner - pull-request reviewer assignment service.
//!
//! Teams own users; pull requests get up to two random active teammates of
//! the author as reviewers, who can later be swapped one at a time. The
//! workflows in [`services`] run over the storage gateways in
//! [`repository`], backed by SQLite ([`db`]) in production and by an
//! in-memory store in tests, and are exposed over HTTP by [`api`].

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod server;
pub mod services;

pub use error::AppError;
