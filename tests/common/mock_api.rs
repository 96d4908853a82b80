//! In-memory directory server behind the `DirectoryApi` seam.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use profile_directory::api::DirectoryApi;
use profile_directory::error::ApiError;
use profile_directory::model::{
    HealthStatus, LoginRequest, Profile, ProfileId, RegisterRequest, Session,
    UpdateProfileRequest, UserId,
};

const UPDATED_AT: &str = "2024-01-01T00:00:00Z";

struct Account {
    password: String,
    user_id: UserId,
    profile_id: ProfileId,
}

#[derive(Default)]
struct Directory {
    accounts: HashMap<String, Account>,
    profiles: Vec<Profile>,
    signed_in: Option<String>,
    next_id: i64,
    updates: Vec<UpdateProfileRequest>,
    fail_next_update: Option<(u16, String)>,
    fail_next_logout: Option<(u16, String)>,
}

pub struct FakeDirectory {
    inner: Mutex<Directory>,
    stalled: AtomicBool,
}

pub fn profile(id: i64, display_name: &str) -> Profile {
    Profile {
        id: ProfileId(id),
        user_id: UserId(id),
        display_name: display_name.to_string(),
        bio: None,
        updated_at: UPDATED_AT.to_string(),
    }
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::with_profiles(Vec::new())
    }

    pub fn with_profiles(profiles: Vec<Profile>) -> Self {
        let next_id = profiles.iter().map(|p| p.id.0).max().unwrap_or(0) + 1;
        Self {
            inner: Mutex::new(Directory {
                profiles,
                next_id,
                ..Directory::default()
            }),
            stalled: AtomicBool::new(false),
        }
    }

    /// While stalled, every call hangs until cancelled.
    pub fn stall(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn fail_next_update(&self, status: u16, message: &str) {
        self.inner.lock().unwrap().fail_next_update = Some((status, message.to_string()));
    }

    pub fn fail_next_logout(&self, status: u16, message: &str) {
        self.inner.lock().unwrap().fail_next_logout = Some((status, message.to_string()));
    }

    /// Update bodies received so far.
    pub fn updates(&self) -> Vec<UpdateProfileRequest> {
        self.inner.lock().unwrap().updates.clone()
    }

    pub fn stored_profile(&self, id: ProfileId) -> Option<Profile> {
        let inner = self.inner.lock().unwrap();
        inner.profiles.iter().find(|p| p.id == id).cloned()
    }

    async fn gate(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

fn status(status: u16, message: &str) -> ApiError {
    ApiError::Status {
        status,
        message: message.to_string(),
    }
}

fn session_for(directory: &Directory, email: &str) -> Result<Session, ApiError> {
    let account = directory
        .accounts
        .get(email)
        .ok_or_else(|| status(401, "Invalid credentials"))?;
    let profile = directory
        .profiles
        .iter()
        .find(|p| p.id == account.profile_id)
        .cloned()
        .ok_or_else(|| status(500, "profile missing"))?;
    Ok(Session {
        user_id: account.user_id,
        email: email.to_string(),
        profile,
    })
}

#[async_trait]
impl DirectoryApi for FakeDirectory {
    async fn register(&self, request: &RegisterRequest) -> Result<Session, ApiError> {
        self.gate().await;
        let mut inner = self.inner.lock().unwrap();
        if inner.accounts.contains_key(&request.email) {
            return Err(status(409, "Email already registered"));
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.profiles.push(profile(id, &request.display_name));
        inner.accounts.insert(
            request.email.clone(),
            Account {
                password: request.password.clone(),
                user_id: UserId(id),
                profile_id: ProfileId(id),
            },
        );
        inner.signed_in = Some(request.email.clone());
        session_for(&inner, &request.email)
    }

    async fn login(&self, request: &LoginRequest) -> Result<Session, ApiError> {
        self.gate().await;
        let mut inner = self.inner.lock().unwrap();
        match inner.accounts.get(&request.email) {
            Some(account) if account.password == request.password => {}
            _ => return Err(status(401, "Invalid credentials")),
        }
        inner.signed_in = Some(request.email.clone());
        session_for(&inner, &request.email)
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.gate().await;
        let mut inner = self.inner.lock().unwrap();
        if let Some((code, message)) = inner.fail_next_logout.take() {
            return Err(status(code, &message));
        }
        inner.signed_in = None;
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, ApiError> {
        self.gate().await;
        Ok(self.inner.lock().unwrap().profiles.clone())
    }

    async fn get_profile(&self, id: ProfileId) -> Result<Profile, ApiError> {
        self.gate().await;
        self.stored_profile(id)
            .ok_or_else(|| status(404, "Profile not found"))
    }

    async fn update_profile(
        &self,
        id: ProfileId,
        request: &UpdateProfileRequest,
    ) -> Result<Profile, ApiError> {
        self.gate().await;
        let mut inner = self.inner.lock().unwrap();
        inner.updates.push(request.clone());
        if let Some((code, message)) = inner.fail_next_update.take() {
            return Err(status(code, &message));
        }
        let email = inner
            .signed_in
            .clone()
            .ok_or_else(|| status(401, "Not authenticated"))?;
        let owner = inner.accounts.get(&email).map(|a| a.profile_id);
        if owner != Some(id) {
            return Err(status(403, "Forbidden"));
        }
        let stored = inner
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| status(404, "Profile not found"))?;
        if let Some(display_name) = &request.display_name {
            stored.display_name = display_name.clone();
        }
        if let Some(bio) = &request.bio {
            stored.bio = Some(bio.clone());
        }
        stored.updated_at = "2024-01-02T00:00:00Z".to_string();
        Ok(stored.clone())
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        Ok(HealthStatus {
            status: "healthy".to_string(),
            version: "test".to_string(),
        })
    }
}
