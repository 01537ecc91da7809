//! Watchlist: a personal show tracker.
//!
//! Each user registers with a username and password, logs in for a bearer
//! token, and keeps their own list of shows (title, seasons, episodes,
//! watched). Everything is persisted as JSON files under one data directory.
//!
//! - [`auth`]: accounts, password hashing, signed tokens
//! - [`list`]: per-user item operations
//! - [`storage`]: JSON-file and in-memory backends
//! - [`gateway`]: the axum HTTP API and embedded UI
//! - [`config`]: `config.toml` + environment overrides

pub mod auth;
pub mod config;
pub mod gateway;
pub mod list;
pub mod storage;

pub use config::Config;
