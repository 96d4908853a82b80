//! REST collaborator: authentication and profile CRUD.
//!
//! [`DirectoryApi`] is the seam the controller talks to; [`HttpDirectoryApi`]
//! is the reqwest implementation.

mod client;


use async_trait::async_trait;

use crate::error::ApiError;
use crate::model::{
    HealthStatus, LoginRequest, Profile, ProfileId, RegisterRequest, Session,
    UpdateProfileRequest,
};

pub use client::HttpDirectoryApi;

#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// `POST /api/auth/register`
    async fn register(&self, request: &RegisterRequest) -> Result<Session, ApiError>;

    /// `POST /api/auth/login`
    async fn login(&self, request: &LoginRequest) -> Result<Session, ApiError>;

    /// `POST /api/auth/logout`
    async fn logout(&self) -> Result<(), ApiError>;

    /// `GET /api/profiles`
    async fn list_profiles(&self) -> Result<Vec<Profile>, ApiError>;

    /// `GET /api/profiles/{id}`
    async fn get_profile(&self, id: ProfileId) -> Result<Profile, ApiError>;

    /// `PATCH /api/profiles/{id}`
    async fn update_profile(
        &self,
        id: ProfileId,
        request: &UpdateProfileRequest,
    ) -> Result<Profile, ApiError>;

    /// `GET /health`
    async fn health(&self) -> Result<HealthStatus, ApiError>;
}
