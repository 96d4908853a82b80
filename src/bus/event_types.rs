//! Event type and category constants and flush policy.
//!
//! Single source of truth for which events are "immediate" (delivered to
//! renderers without batching) vs batched.

use super::event_bus::BusEvent;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

pub const CATEGORY_SESSION: &str = "session";
pub const CATEGORY_PROFILE: &str = "profile";
pub const CATEGORY_FEED: &str = "feed";
pub const CATEGORY_REQUEST: &str = "request";
pub const CATEGORY_FORM: &str = "form";

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

pub const EVENT_SESSION_STARTED: &str = "session.started";
pub const EVENT_SESSION_ENDED: &str = "session.ended";
pub const EVENT_SESSION_PROFILE_UPDATED: &str = "session.profile_updated";

pub const EVENT_PROFILES_REQUESTED: &str = "profile.list_requested";
pub const EVENT_PROFILES_LOADED: &str = "profile.list_loaded";
pub const EVENT_PROFILE_UPSERTED: &str = "profile.upserted";
pub const EVENT_PROFILE_STALE: &str = "profile.stale_ignored";

pub const EVENT_FEED_STATUS_CHANGED: &str = "feed.status_changed";

pub const EVENT_REQUEST_STARTED: &str = "request.started";
pub const EVENT_REQUEST_FAILED: &str = "request.failed";

pub const EVENT_FORM_EDITED: &str = "form.edited";

// ---------------------------------------------------------------------------
// Flush policy
// ---------------------------------------------------------------------------

/// Returns true if this event should reach renderers immediately instead of
/// being buffered. Profile upserts from the feed are the only high-volume
/// stream, so everything else is immediate.
pub fn should_flush_immediately(event: &BusEvent) -> bool {
    match event.category.as_str() {
        CATEGORY_SESSION | CATEGORY_FEED | CATEGORY_REQUEST | CATEGORY_FORM => true,
        CATEGORY_PROFILE => event.event_type == EVENT_PROFILES_LOADED,
        _ => false,
    }
}
