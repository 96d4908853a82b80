//! Common test utilities for feed and controller integration tests.
#![allow(dead_code)]

pub mod mock_api;
pub mod mock_feed;

pub use mock_api::{profile, FakeDirectory};
pub use mock_feed::{FeedServer, ScriptedTransport};
