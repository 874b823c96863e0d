//! Multi-mount file host.
//!
//! Serves a configured set of local directories over HTTP with directory
//! listings, downloads, uploads and per-operation Basic-Auth gating. The
//! configuration file is hot-reloaded by a polling watcher; every request
//! works against one atomically-swapped snapshot of it.

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod mounts;
pub mod resolve;
pub mod routes;
pub mod watcher;

use config::ConfigStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
}
