//! Data model for the profile directory.
//!
//! ## Structure
//!
//! - `types`: profiles, sessions, request bodies and identities

pub mod types;

pub use types::{
    parse_timestamp, AuthRequest, HealthStatus, LoginRequest, Profile, ProfileId,
    RegisterRequest, Session, UpdateProfileRequest, UserId,
};
