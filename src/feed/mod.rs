//! Live profile feed.
//!
//! - `event`: decoding of server-pushed notifications
//! - `transport`: connection seam and the WebSocket implementation
//! - `client`: the reconnecting supervisor and its status

pub mod client;
pub mod event;
pub mod transport;

pub use client::{FeedClient, FeedHandle, FeedState, FeedStatus, ReconnectPolicy};
pub use event::{parse_feed_event, FeedEvent};
pub use transport::{FeedConnection, FeedFrame, FeedTransport, WsTransport};
