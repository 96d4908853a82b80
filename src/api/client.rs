use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::DirectoryApi;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::model::{
    HealthStatus, LoginRequest, Profile, ProfileId, RegisterRequest, Session,
    UpdateProfileRequest,
};

/// JSON-over-HTTP client. Keeps the session cookie set by login/register in
/// its own cookie store, so every later request is credentialed.
pub struct HttpDirectoryApi {
    config: ClientConfig,
    client: reqwest::Client,
}

impl HttpDirectoryApi {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.config.api_url(path))
            .json(body)
            .send()
            .await?;
        handle_response(response, path).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.client.get(self.config.api_url(path)).send().await?;
        handle_response(response, path).await
    }
}

async fn ensure_success(
    response: reqwest::Response,
    path: &str,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = ApiError::from_response_body(status.as_u16(), &body);
    tracing::debug!(%path, status = status.as_u16(), "request failed: {err}");
    Err(err)
}

async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> Result<T, ApiError> {
    let response = ensure_success(response, path).await?;
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| ApiError::InvalidResponse(format!("{path} parse failed: {e}")))
}

#[async_trait]
impl DirectoryApi for HttpDirectoryApi {
    async fn register(&self, request: &RegisterRequest) -> Result<Session, ApiError> {
        self.post_json("/api/auth/register", request).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<Session, ApiError> {
        self.post_json("/api/auth/login", request).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let path = "/api/auth/logout";
        let response = self.client.post(self.config.api_url(path)).send().await?;
        ensure_success(response, path).await?;
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, ApiError> {
        self.get_json("/api/profiles").await
    }

    async fn get_profile(&self, id: ProfileId) -> Result<Profile, ApiError> {
        self.get_json(&format!("/api/profiles/{id}")).await
    }

    async fn update_profile(
        &self,
        id: ProfileId,
        request: &UpdateProfileRequest,
    ) -> Result<Profile, ApiError> {
        let path = format!("/api/profiles/{id}");
        let response = self
            .client
            .patch(self.config.api_url(&path))
            .json(request)
            .send()
            .await?;
        handle_response(response, &path).await
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get_json("/health").await
    }
}
