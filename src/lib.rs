//! # httpdelta
//!
//! Authoring backend for HTTP request templates. Templates live in
//! workspaces; a delta entry inherits from a base template and overrides
//! individual fields and child rows. Every change is pushed to connected
//! clients over per-family sync streams.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! httpdelta = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use httpdelta::config::ServerConfig;
//! use httpdelta::events::Streams;
//! use httpdelta::server::{AppState, create_router};
//! use httpdelta::service::Service;
//! use httpdelta::store::SqliteStore;
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let streams = Arc::new(Streams::new(&config.stream));
//! let service = Arc::new(Service::new(Arc::new(store), streams));
//! let router = create_router(Arc::new(AppState::new(service, config.stream).unwrap()));
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `httpdelta` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod patch;
pub mod pubsub;
pub mod resolve;
pub mod server;
pub mod service;
pub mod store;
pub mod stream;
pub mod types;
pub mod wire;
