//! Pure projection of [`AppState`] into what a renderer shows.

use serde::Serialize;

use super::state::{AppState, AuthMode, LoadState, LoginForm, ProfileForm};
use crate::model::{Profile, ProfileId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Login,
    Profiles,
    /// The signed-in user's own profile editor.
    Profile,
}

/// Apply the route guards: signed-out users only ever see `Login`, signed-in
/// users asking for `Login` land on `Profiles`.
pub fn resolve_route(requested: Route, signed_in: bool) -> Route {
    match (requested, signed_in) {
        (_, false) => Route::Login,
        (Route::Login, true) => Route::Profiles,
        (route, true) => route,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionIndicator {
    Live,
    Connecting,
}

impl ConnectionIndicator {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Live => "Live",
            Self::Connecting => "Connecting...",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileCard {
    pub id: ProfileId,
    pub display_name: String,
    pub bio: Option<String>,
    /// `Updated YYYY-MM-DD`, or the raw timestamp when it does not parse.
    pub updated: String,
}

impl ProfileCard {
    pub fn from_profile(profile: &Profile) -> Self {
        let updated = profile
            .updated_at_utc()
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| profile.updated_at.clone());
        Self {
            id: profile.id,
            display_name: profile.display_name.clone(),
            bio: profile.bio.clone().filter(|bio| !bio.is_empty()),
            updated: format!("Updated {updated}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Page {
    Login {
        registering: bool,
        email: String,
        display_name: String,
        submitting: bool,
        error: Option<String>,
    },
    Profiles {
        loading: bool,
        error: Option<String>,
        cards: Vec<ProfileCard>,
    },
    Profile {
        email: String,
        display_name: String,
        bio: String,
        submitting: bool,
        error: Option<String>,
        notice: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryView {
    pub route: Route,
    /// Display name of the signed-in user.
    pub signed_in_as: Option<String>,
    pub connection: ConnectionIndicator,
    pub page: Page,
}

pub fn project(state: &AppState, requested: Route) -> DirectoryView {
    let route = resolve_route(requested, state.is_signed_in());
    let connection = if state.feed.is_connected() {
        ConnectionIndicator::Live
    } else {
        ConnectionIndicator::Connecting
    };

    let page = match (route, state.session.as_ref()) {
        (Route::Profiles, Some(_)) => profiles_page(state),
        (Route::Profile, Some(session)) => profile_page(&session.email, &state.profile_form),
        _ => login_page(&state.login_form),
    };

    DirectoryView {
        route,
        signed_in_as: state
            .session
            .as_ref()
            .map(|session| session.profile.display_name.clone()),
        connection,
        page,
    }
}

fn login_page(form: &LoginForm) -> Page {
    Page::Login {
        registering: form.mode == AuthMode::Register,
        email: form.email.clone(),
        display_name: form.display_name.clone(),
        submitting: form.submitting,
        error: form.error.clone(),
    }
}

fn profiles_page(state: &AppState) -> Page {
    let (loading, error) = match &state.list {
        LoadState::Idle | LoadState::Loading => (state.profiles.is_empty(), None),
        LoadState::Loaded => (false, None),
        LoadState::Failed(message) => (false, Some(message.clone())),
    };
    Page::Profiles {
        loading,
        error,
        cards: state.profiles.iter().map(ProfileCard::from_profile).collect(),
    }
}

fn profile_page(email: &str, form: &ProfileForm) -> Page {
    Page::Profile {
        email: email.to_string(),
        display_name: form.display_name.clone(),
        bio: form.bio.clone(),
        submitting: form.submitting,
        error: form.error.clone(),
        notice: form.notice.clone(),
    }
}
