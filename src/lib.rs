//! Profile directory client library.
//!
//! Keeps a local, live-updating view of a remote profile directory. It
//! handles:
//! - Session management (register, login, logout, own-profile updates)
//! - The initial REST load of the profile collection
//! - A WebSocket feed of profile changes with unconditional reconnection
//! - Merging both sources into one collection keyed by profile identity
//!
//! # Architecture
//!
//! - `api`: REST client behind the `DirectoryApi` seam
//! - `feed`: event decoding, transport seam and the reconnecting supervisor
//! - `store`: the profile collection
//! - `controller`: single owner of the application state, view projection
//! - `bus`: change notifications and batching for renderers
//! - `config`: `ClientConfig`, loaded from the environment
//! - `model`: wire types

pub mod api;
pub mod bus;
pub mod config;
pub mod controller;
pub mod error;
pub mod feed;
pub mod model;
pub mod store;

pub use api::{DirectoryApi, HttpDirectoryApi};
pub use bus::{BusEvent, EventBatcher, EventBus};
pub use config::{ClientConfig, MergePolicy};
pub use controller::{DirectoryController, DirectoryHandle, DirectoryView, Route};
pub use error::{ApiError, ConfigError, FeedError};
pub use feed::{FeedClient, FeedHandle, FeedState, FeedStatus, ReconnectPolicy, WsTransport};
pub use model::{Profile, ProfileId, Session, UserId};
pub use store::ProfileStore;

const DEFAULT_LOG_FILTER: &str = "profile_directory=debug,info";

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
