//! Application state and its single update dispatcher.
//!
//! Everything the views show lives in [`AppState`]. The controller task is
//! its only owner and mutates it exclusively through [`update`], one message
//! at a time.

use serde_json::json;

use crate::bus::event_types::*;
use crate::config::MergePolicy;
use crate::feed::FeedStatus;
use crate::model::{
    AuthRequest, LoginRequest, Profile, RegisterRequest, Session, UpdateProfileRequest,
};
use crate::store::{Placement, ProfileStore, Upsert};

pub const PROFILE_SAVED_NOTICE: &str = "Profile updated successfully";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    SignIn,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Email,
    Password,
    DisplayName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    DisplayName,
    Bio,
}

/// Sign-in / registration form inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub submitting: bool,
    pub error: Option<String>,
}

impl LoginForm {
    /// Build the request for the current mode, rejecting empty required
    /// fields.
    pub fn to_request(&self) -> Result<AuthRequest, String> {
        let email = self.email.trim();
        if email.is_empty() || self.password.is_empty() {
            return Err("Email and password are required".to_string());
        }
        match self.mode {
            AuthMode::SignIn => Ok(AuthRequest::Login(LoginRequest {
                email: email.to_string(),
                password: self.password.clone(),
            })),
            AuthMode::Register => {
                let display_name = self.display_name.trim();
                if display_name.is_empty() {
                    return Err("Display name is required".to_string());
                }
                Ok(AuthRequest::Register(RegisterRequest {
                    email: email.to_string(),
                    password: self.password.clone(),
                    display_name: display_name.to_string(),
                }))
            }
        }
    }
}

/// Own-profile edit form, seeded from the session profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileForm {
    pub display_name: String,
    pub bio: String,
    pub submitting: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl ProfileForm {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            display_name: profile.display_name.clone(),
            bio: profile.bio.clone().unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Only fields that differ from `current` are sent; an absent bio
    /// compares equal to an empty one.
    pub fn to_update(&self, current: &Profile) -> UpdateProfileRequest {
        let current_bio = current.bio.as_deref().unwrap_or_default();
        UpdateProfileRequest {
            display_name: (self.display_name != current.display_name)
                .then(|| self.display_name.clone()),
            bio: (self.bio != current_bio).then(|| self.bio.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub session: Option<Session>,
    pub profiles: ProfileStore,
    pub list: LoadState,
    pub feed: FeedStatus,
    pub login_form: LoginForm,
    pub profile_form: ProfileForm,
}

impl AppState {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            profiles: ProfileStore::new(policy),
            ..Self::default()
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }
}

/// Everything that can change [`AppState`].
#[derive(Debug, Clone)]
pub enum Msg {
    ProfilesRequested,
    ProfilesLoaded(Vec<Profile>),
    ProfilesFailed(String),
    ProfileFetched(Profile),
    FeedProfile(Profile),
    FeedStatusChanged(FeedStatus),
    AuthSubmitted,
    SessionStarted(Session),
    AuthFailed(String),
    LoggedOut,
    ProfileSubmitted,
    OwnProfileUpdated(Profile),
    ProfileUpdateFailed(String),
    LoginFormEdited(LoginField, String),
    AuthModeToggled,
    ProfileFormEdited(ProfileField, String),
}

/// Description of an applied change, published on the event bus.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub category: &'static str,
    pub event_type: &'static str,
    pub payload: serde_json::Value,
}

impl StateChange {
    fn new(category: &'static str, event_type: &'static str, payload: serde_json::Value) -> Self {
        Self {
            category,
            event_type,
            payload,
        }
    }
}

/// Apply one message. Returns `None` when the message changed nothing.
pub fn update(msg: Msg, state: &mut AppState) -> Option<StateChange> {
    match msg {
        Msg::ProfilesRequested => {
            if state.list != LoadState::Loaded {
                state.list = LoadState::Loading;
            }
            Some(StateChange::new(
                CATEGORY_PROFILE,
                EVENT_PROFILES_REQUESTED,
                json!({}),
            ))
        }
        Msg::ProfilesLoaded(profiles) => {
            let received = profiles.len();
            let applied = state.profiles.upsert_all(profiles);
            state.list = LoadState::Loaded;
            Some(StateChange::new(
                CATEGORY_PROFILE,
                EVENT_PROFILES_LOADED,
                json!({ "received": received, "applied": applied, "total": state.profiles.len() }),
            ))
        }
        Msg::ProfilesFailed(message) => {
            // Keep showing what we have if an earlier load succeeded.
            if state.list != LoadState::Loaded {
                state.list = LoadState::Failed(message.clone());
            }
            Some(request_failed("list_profiles", &message))
        }
        Msg::ProfileFetched(profile) => Some(upsert(state, profile, Placement::Back)),
        Msg::FeedProfile(profile) => Some(upsert(state, profile, Placement::Front)),
        Msg::FeedStatusChanged(status) => {
            if state.feed == status {
                return None;
            }
            state.feed = status;
            Some(StateChange::new(
                CATEGORY_FEED,
                EVENT_FEED_STATUS_CHANGED,
                json!({
                    "state": state.feed.state.to_string(),
                    "error": state.feed.error,
                    "reconnects": state.feed.reconnects,
                }),
            ))
        }
        Msg::AuthSubmitted => {
            state.login_form.submitting = true;
            state.login_form.error = None;
            Some(StateChange::new(
                CATEGORY_REQUEST,
                EVENT_REQUEST_STARTED,
                json!({ "operation": "authenticate" }),
            ))
        }
        Msg::SessionStarted(session) => {
            state.login_form = LoginForm::default();
            state.profile_form = ProfileForm::from_profile(&session.profile);
            let payload = json!({
                "user_id": session.user_id,
                "email": session.email,
                "profile_id": session.profile.id,
            });
            state.session = Some(session);
            Some(StateChange::new(
                CATEGORY_SESSION,
                EVENT_SESSION_STARTED,
                payload,
            ))
        }
        Msg::AuthFailed(message) => {
            state.login_form.submitting = false;
            state.login_form.error = Some(message.clone());
            Some(request_failed("authenticate", &message))
        }
        Msg::LoggedOut => {
            let ended = state.session.take()?;
            state.profile_form = ProfileForm::default();
            state.login_form = LoginForm::default();
            Some(StateChange::new(
                CATEGORY_SESSION,
                EVENT_SESSION_ENDED,
                json!({ "user_id": ended.user_id }),
            ))
        }
        Msg::ProfileSubmitted => {
            state.profile_form.submitting = true;
            state.profile_form.error = None;
            state.profile_form.notice = None;
            Some(StateChange::new(
                CATEGORY_REQUEST,
                EVENT_REQUEST_STARTED,
                json!({ "operation": "update_profile" }),
            ))
        }
        Msg::OwnProfileUpdated(profile) => {
            let session = state.session.as_mut()?;
            // A reply for a previous session's profile must not leak into this one.
            if session.profile.id != profile.id {
                tracing::debug!(profile_id = %profile.id, "discarding update for another session");
                return None;
            }
            state.profile_form = ProfileForm::from_profile(&profile);
            state.profile_form.notice = Some(PROFILE_SAVED_NOTICE.to_string());
            let payload = json!({
                "profile_id": profile.id,
                "display_name": profile.display_name,
                "bio": profile.bio,
            });
            session.profile = profile;
            Some(StateChange::new(
                CATEGORY_SESSION,
                EVENT_SESSION_PROFILE_UPDATED,
                payload,
            ))
        }
        Msg::ProfileUpdateFailed(message) => {
            state.profile_form.submitting = false;
            state.profile_form.error = Some(message.clone());
            Some(request_failed("update_profile", &message))
        }
        Msg::LoginFormEdited(field, value) => {
            let form = &mut state.login_form;
            match field {
                LoginField::Email => form.email = value,
                LoginField::Password => form.password = value,
                LoginField::DisplayName => form.display_name = value,
            }
            Some(form_edited("login", field_name_login(field)))
        }
        Msg::AuthModeToggled => {
            let form = &mut state.login_form;
            form.mode = match form.mode {
                AuthMode::SignIn => AuthMode::Register,
                AuthMode::Register => AuthMode::SignIn,
            };
            form.error = None;
            Some(form_edited("login", "mode"))
        }
        Msg::ProfileFormEdited(field, value) => {
            let form = &mut state.profile_form;
            match field {
                ProfileField::DisplayName => form.display_name = value,
                ProfileField::Bio => form.bio = value,
            }
            Some(form_edited(
                "profile",
                match field {
                    ProfileField::DisplayName => "display_name",
                    ProfileField::Bio => "bio",
                },
            ))
        }
    }
}

fn upsert(state: &mut AppState, profile: Profile, placement: Placement) -> StateChange {
    let id = profile.id;
    let outcome = state.profiles.upsert(profile, placement);
    let event_type = match outcome {
        Upsert::Stale => EVENT_PROFILE_STALE,
        Upsert::Inserted | Upsert::Replaced => EVENT_PROFILE_UPSERTED,
    };
    StateChange::new(
        CATEGORY_PROFILE,
        event_type,
        json!({ "profile_id": id, "inserted": outcome == Upsert::Inserted }),
    )
}

fn request_failed(operation: &str, message: &str) -> StateChange {
    StateChange::new(
        CATEGORY_REQUEST,
        EVENT_REQUEST_FAILED,
        json!({ "operation": operation, "error": message }),
    )
}

fn form_edited(form: &str, field: &str) -> StateChange {
    StateChange::new(
        CATEGORY_FORM,
        EVENT_FORM_EDITED,
        json!({ "form": form, "field": field }),
    )
}

fn field_name_login(field: LoginField) -> &'static str {
    match field {
        LoginField::Email => "email",
        LoginField::Password => "password",
        LoginField::DisplayName => "display_name",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::feed::FeedState;
    use crate::model::{ProfileId, UserId};

    fn profile(id: i64, name: &str, bio: Option<&str>) -> Profile {
        Profile {
            id: ProfileId(id),
            user_id: UserId(id),
            display_name: name.to_string(),
            bio: bio.map(str::to_string),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn session(id: i64, name: &str) -> Session {
        Session {
            user_id: UserId(id),
            email: format!("user{id}@x.com"),
            profile: profile(id, name, None),
        }
    }

    #[test]
    fn rest_list_then_feed_event_replaces_entry() {
        let mut state = AppState::default();
        update(Msg::ProfilesRequested, &mut state);
        update(Msg::ProfilesLoaded(vec![profile(1, "Ann", None)]), &mut state);
        update(Msg::FeedProfile(profile(1, "Ann B.", None)), &mut state);

        assert_eq!(state.list, LoadState::Loaded);
        assert_eq!(state.profiles.len(), 1);
        assert_eq!(state.profiles.get(ProfileId(1)).unwrap().display_name, "Ann B.");
    }

    #[test]
    fn session_start_discards_form_inputs() {
        let mut state = AppState::default();
        update(Msg::LoginFormEdited(LoginField::Email, "a@x.com".into()), &mut state);
        update(Msg::LoginFormEdited(LoginField::Password, "p".into()), &mut state);
        update(Msg::AuthSubmitted, &mut state);

        let change = update(Msg::SessionStarted(session(1, "A")), &mut state).unwrap();

        assert_eq!(change.event_type, EVENT_SESSION_STARTED);
        assert_eq!(state.login_form, LoginForm::default());
        assert_eq!(state.profile_form.display_name, "A");
        assert_eq!(state.session.as_ref().unwrap().profile.display_name, "A");
    }

    #[test]
    fn own_update_touches_session_but_not_collection() {
        let mut state = AppState::default();
        update(Msg::ProfilesLoaded(vec![profile(1, "A", None)]), &mut state);
        update(Msg::SessionStarted(session(1, "A")), &mut state);

        update(Msg::OwnProfileUpdated(profile(1, "A", Some("hi"))), &mut state);

        let own = &state.session.as_ref().unwrap().profile;
        assert_eq!(own.display_name, "A");
        assert_eq!(own.bio.as_deref(), Some("hi"));
        assert_eq!(state.profiles.get(ProfileId(1)).unwrap().bio, None);
        assert_eq!(state.profile_form.notice.as_deref(), Some(PROFILE_SAVED_NOTICE));
        assert_eq!(state.profile_form.bio, "hi");
    }

    #[test]
    fn failed_update_leaves_session_untouched() {
        let mut state = AppState::default();
        update(Msg::SessionStarted(session(1, "A")), &mut state);
        let before = state.session.clone();

        update(Msg::ProfileSubmitted, &mut state);
        update(Msg::ProfileUpdateFailed("email taken".into()), &mut state);

        assert_eq!(state.session, before);
        assert_eq!(state.profile_form.error.as_deref(), Some("email taken"));
        assert!(!state.profile_form.submitting);
    }

    #[test]
    fn update_for_previous_session_is_discarded() {
        let mut state = AppState::default();
        update(Msg::SessionStarted(session(2, "B")), &mut state);

        assert!(update(Msg::OwnProfileUpdated(profile(1, "A", None)), &mut state).is_none());
        assert_eq!(state.session.as_ref().unwrap().profile.display_name, "B");

        update(Msg::LoggedOut, &mut state);
        assert!(update(Msg::OwnProfileUpdated(profile(2, "B", None)), &mut state).is_none());
        assert!(state.session.is_none());
    }

    #[test]
    fn profile_form_sends_only_changed_fields() {
        let current = profile(1, "A", None);
        let mut form = ProfileForm::from_profile(&current);
        assert!(form.to_update(&current).is_empty());

        form.bio = "hi".to_string();
        assert_eq!(
            form.to_update(&current),
            UpdateProfileRequest {
                display_name: None,
                bio: Some("hi".to_string()),
            }
        );

        form.display_name = "Anna".to_string();
        form.bio = String::new();
        assert_eq!(
            form.to_update(&current),
            UpdateProfileRequest {
                display_name: Some("Anna".to_string()),
                bio: None,
            }
        );
    }

    #[test]
    fn login_form_validates_required_fields_per_mode() {
        let mut state = AppState::default();
        assert!(state.login_form.to_request().is_err());

        update(Msg::LoginFormEdited(LoginField::Email, " a@x.com ".into()), &mut state);
        update(Msg::LoginFormEdited(LoginField::Password, "p".into()), &mut state);
        assert_eq!(
            state.login_form.to_request(),
            Ok(AuthRequest::Login(LoginRequest {
                email: "a@x.com".into(),
                password: "p".into(),
            }))
        );

        update(Msg::AuthModeToggled, &mut state);
        assert_eq!(state.login_form.mode, AuthMode::Register);
        assert!(state.login_form.to_request().is_err());

        update(Msg::LoginFormEdited(LoginField::DisplayName, "A".into()), &mut state);
        assert!(matches!(
            state.login_form.to_request(),
            Ok(AuthRequest::Register(RegisterRequest { ref display_name, .. })) if display_name == "A"
        ));
    }

    #[test]
    fn auth_failure_keeps_inputs_and_shows_message() {
        let mut state = AppState::default();
        update(Msg::LoginFormEdited(LoginField::Email, "a@x.com".into()), &mut state);
        update(Msg::AuthSubmitted, &mut state);
        update(Msg::AuthFailed("Unauthorized".into()), &mut state);

        assert_eq!(state.login_form.email, "a@x.com");
        assert_eq!(state.login_form.error.as_deref(), Some("Unauthorized"));
        assert!(!state.login_form.submitting);
        assert!(state.session.is_none());
    }

    #[test]
    fn identical_feed_status_is_not_a_change() {
        let mut state = AppState::default();
        let status = FeedStatus {
            state: FeedState::Connected,
            error: None,
            reconnects: 0,
        };
        assert!(update(Msg::FeedStatusChanged(status.clone()), &mut state).is_some());
        assert!(update(Msg::FeedStatusChanged(status), &mut state).is_none());
    }

    #[test]
    fn list_failure_after_success_keeps_loaded_state() {
        let mut state = AppState::default();
        update(Msg::ProfilesFailed("HTTP 500".into()), &mut state);
        assert_eq!(state.list, LoadState::Failed("HTTP 500".into()));

        update(Msg::ProfilesLoaded(vec![profile(1, "A", None)]), &mut state);
        update(Msg::ProfilesFailed("HTTP 503".into()), &mut state);
        assert_eq!(state.list, LoadState::Loaded);
    }
}
