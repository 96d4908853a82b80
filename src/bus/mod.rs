//! Change notifications for renderers.
//!
//! The event bus provides:
//! - Publish-subscribe of every directory state change
//! - Event batching so a renderer redraws once per burst of feed updates
//!
//! # Architecture
//!
//! Events flow from controller → EventBus → EventBatcher → renderer:
//! - `EventBus`: In-memory broadcast channel for immediate distribution
//! - `EventBatcher`: Buffers profile upserts (100ms/50 events) before delivery

mod batcher;
mod event_bus;
pub mod event_types;

pub use batcher::EventBatcher;
pub use event_bus::{BusEvent, EventBus};
