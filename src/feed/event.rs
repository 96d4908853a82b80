use serde::Deserialize;

use crate::error::FeedError;
use crate::model::Profile;

/// Notification pushed by the server. Creation and update share the one
/// variant; the client replaces its cached copy either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Profile(Profile),
}

pub const EVENT_TYPE_PROFILE: &str = "Profile";

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode one text frame.
pub fn parse_feed_event(text: &str) -> Result<FeedEvent, FeedError> {
    let raw: RawEvent =
        serde_json::from_str(text).map_err(|e| FeedError::Decode(e.to_string()))?;

    match raw.event_type.as_str() {
        EVENT_TYPE_PROFILE => {
            let profile: Profile = serde_json::from_value(raw.data)
                .map_err(|e| FeedError::Decode(format!("bad profile payload: {e}")))?;
            Ok(FeedEvent::Profile(profile))
        }
        other => Err(FeedError::UnknownEvent(other.to_string())),
    }
}
