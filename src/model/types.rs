//! Wire types shared by the REST client, the event feed and the store.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque profile identity. Transmitted as a JSON number but always kept as
/// a 64-bit integer so large ids never pass through floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub i64);

/// Opaque identity of the user owning a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub user_id: UserId,
    pub display_name: String,
    pub bio: Option<String>,
    pub updated_at: String,
}

impl Profile {
    /// Parse `updated_at`. The server emits either RFC 3339 or SQLite's
    /// `YYYY-MM-DD HH:MM:SS` (implicitly UTC).
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.updated_at)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// The authenticated client's view of itself, as returned by login and
/// register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Partial profile update. `None` means "leave unchanged", never "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.bio.is_none()
    }
}

/// Either half of the sign-in form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequest {
    Login(LoginRequest),
    Register(RegisterRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_ids_survive_values_beyond_f64_precision() {
        let raw = json!({
            "id": 9_007_199_254_740_993_i64,
            "user_id": 1,
            "display_name": "Ann",
            "bio": null,
            "updated_at": "2024-01-01T00:00:00Z"
        });
        let profile: Profile = serde_json::from_value(raw).unwrap();
        assert_eq!(profile.id, ProfileId(9_007_199_254_740_993));
        assert_eq!(
            serde_json::to_string(&profile.id).unwrap(),
            "9007199254740993"
        );
    }

    #[test]
    fn update_request_omits_unset_fields() {
        let request = UpdateProfileRequest {
            display_name: None,
            bio: Some("hi".to_string()),
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({ "bio": "hi" }));
        assert!(UpdateProfileRequest::default().is_empty());
    }

    #[test]
    fn timestamps_parse_in_both_server_formats() {
        let rfc = parse_timestamp("2024-01-01T10:00:00Z").unwrap();
        let sqlite = parse_timestamp("2024-01-01 10:00:00").unwrap();
        assert_eq!(rfc, sqlite);
        assert!(parse_timestamp("yesterday").is_none());
    }
}
