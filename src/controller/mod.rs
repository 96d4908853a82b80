//! Session/view controller.
//!
//! The controller is the single owner of [`AppState`]. It runs as one task
//! that processes, one at a time and in arrival order:
//! - commands from [`DirectoryHandle`]s
//! - completions of REST calls it spawned
//! - profiles and status changes from the event feed
//!
//! # Sub-modules
//!
//! - `state`: `AppState`, form state and the `update` dispatcher
//! - `view`: route guards and the pure view projection
//!
//! Every applied change is published on a `watch` channel (latest state) and
//! on the [`EventBus`] (change notifications).

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::api::DirectoryApi;
use crate::bus::{BusEvent, EventBus};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::feed::{FeedClient, FeedHandle, FeedStatus, FeedTransport, ReconnectPolicy};
use crate::model::{
    AuthRequest, LoginRequest, Profile, ProfileId, RegisterRequest, Session,
    UpdateProfileRequest,
};

pub mod state;
pub mod view;

pub use state::{
    update, AppState, AuthMode, LoadState, LoginField, LoginForm, Msg, ProfileField,
    ProfileForm, StateChange, PROFILE_SAVED_NOTICE,
};
pub use view::{
    project, resolve_route, ConnectionIndicator, DirectoryView, Page, ProfileCard, Route,
};

type Reply<T> = oneshot::Sender<Result<T, ApiError>>;

enum Command {
    Authenticate {
        request: AuthRequest,
        reply: Reply<Session>,
    },
    SubmitLoginForm {
        reply: Reply<Session>,
    },
    Logout {
        reply: Reply<()>,
    },
    /// `None` submits the profile form.
    UpdateProfile {
        request: Option<UpdateProfileRequest>,
        reply: Reply<Profile>,
    },
    RefreshProfiles {
        reply: Reply<usize>,
    },
    FetchProfile {
        id: ProfileId,
        reply: Reply<Profile>,
    },
    Dispatch(Msg),
    Teardown {
        done: oneshot::Sender<()>,
    },
}

/// Result of a spawned REST call, delivered back to the controller task.
enum Completion {
    Authenticated {
        result: Result<Session, ApiError>,
        reply: Reply<Session>,
    },
    LoggedOut {
        result: Result<(), ApiError>,
        reply: Reply<()>,
    },
    ProfileUpdated {
        result: Result<Profile, ApiError>,
        reply: Reply<Profile>,
    },
    ProfilesListed {
        result: Result<Vec<Profile>, ApiError>,
        reply: Option<Reply<usize>>,
    },
    ProfileFetched {
        result: Result<Profile, ApiError>,
        reply: Reply<Profile>,
    },
}

impl Completion {
    /// Drop the result without touching state; the caller sees `Cancelled`.
    fn discard(self) {
        match self {
            Completion::Authenticated { reply, .. } => {
                let _ = reply.send(Err(ApiError::Cancelled));
            }
            Completion::LoggedOut { reply, .. } => {
                let _ = reply.send(Err(ApiError::Cancelled));
            }
            Completion::ProfileUpdated { reply, .. } | Completion::ProfileFetched { reply, .. } => {
                let _ = reply.send(Err(ApiError::Cancelled));
            }
            Completion::ProfilesListed { reply, .. } => {
                if let Some(reply) = reply {
                    let _ = reply.send(Err(ApiError::Cancelled));
                }
            }
        }
    }
}

pub struct DirectoryController;

impl DirectoryController {
    /// Spawn the controller and its feed, and start the initial profile list
    /// load. Must be called from within a tokio runtime.
    pub fn start(
        config: &ClientConfig,
        api: Arc<dyn DirectoryApi>,
        transport: Arc<dyn FeedTransport>,
        bus: Arc<EventBus>,
    ) -> DirectoryHandle {
        let state = AppState::new(config.merge_policy);
        let (state_tx, state_rx) = watch::channel(state.clone());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let (cancel_tx, _) = watch::channel(false);

        let feed = FeedClient::start(transport, ReconnectPolicy::from_config(config), move |profile| {
            // The controller may already be gone during teardown.
            let _ = feed_tx.send(profile);
        });

        let runtime = Runtime {
            state,
            api,
            bus: bus.clone(),
            state_tx,
            completions_tx,
            cancel: cancel_tx,
            requests: JoinSet::new(),
        };
        tokio::spawn(runtime.run(commands_rx, completions_rx, feed, feed_rx));

        DirectoryHandle {
            commands: commands_tx,
            state: state_rx,
            bus,
        }
    }
}

struct Runtime {
    state: AppState,
    api: Arc<dyn DirectoryApi>,
    bus: Arc<EventBus>,
    state_tx: watch::Sender<AppState>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    cancel: watch::Sender<bool>,
    requests: JoinSet<()>,
}

impl Runtime {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        mut feed: FeedHandle,
        mut feed_profiles: mpsc::UnboundedReceiver<Profile>,
    ) {
        let mut feed_status = feed.status();
        let mut feed_live = true;
        self.load_profiles(None);

        let done = loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Teardown { done }) => break Some(done),
                    Some(command) => self.handle_command(command),
                    None => break None,
                },
                Some(completion) = completions.recv() => self.handle_completion(completion),
                Some(profile) = feed_profiles.recv() => self.apply(Msg::FeedProfile(profile)),
                changed = feed_status.changed(), if feed_live => match changed {
                    Ok(()) => {
                        let status = feed_status.borrow_and_update().clone();
                        self.apply(Msg::FeedStatusChanged(status));
                    }
                    Err(_) => feed_live = false,
                },
                Some(joined) = self.requests.join_next(), if !self.requests.is_empty() => {
                    if let Err(e) = joined {
                        warn!("request task ended abnormally: {e}");
                    }
                }
            }
        };

        info!("tearing down directory controller");
        self.cancel.send_replace(true);
        feed.teardown().await;
        self.apply(Msg::FeedStatusChanged(feed.current()));

        while self.requests.join_next().await.is_some() {}
        drop(self.completions_tx);
        while let Some(completion) = completions.recv().await {
            completion.discard();
        }
        // Profiles delivered after teardown began are not applied.
        feed_profiles.close();

        if let Some(done) = done {
            let _ = done.send(());
        }
        debug!("directory controller stopped");
    }

    /// Run `update` and publish the change, if any.
    fn apply(&mut self, msg: Msg) {
        if let Some(change) = update(msg, &mut self.state) {
            self.state_tx.send_replace(self.state.clone());
            self.bus.emit(change.category, change.event_type, change.payload);
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Authenticate { request, reply } => self.authenticate(request, reply),
            Command::SubmitLoginForm { reply } => match self.state.login_form.to_request() {
                Ok(request) => self.authenticate(request, reply),
                Err(message) => {
                    self.apply(Msg::AuthFailed(message.clone()));
                    let _ = reply.send(Err(ApiError::Validation(message)));
                }
            },
            Command::Logout { reply } => {
                let api = self.api.clone();
                self.spawn_request(
                    async move { api.logout().await },
                    |result| Completion::LoggedOut { result, reply },
                );
            }
            Command::UpdateProfile { request, reply } => self.update_profile(request, reply),
            Command::RefreshProfiles { reply } => self.load_profiles(Some(reply)),
            Command::FetchProfile { id, reply } => {
                let api = self.api.clone();
                self.spawn_request(
                    async move { api.get_profile(id).await },
                    |result| Completion::ProfileFetched { result, reply },
                );
            }
            Command::Dispatch(msg) => self.apply(msg),
            Command::Teardown { .. } => {}
        }
    }

    fn authenticate(&mut self, request: AuthRequest, reply: Reply<Session>) {
        self.apply(Msg::AuthSubmitted);
        let api = self.api.clone();
        self.spawn_request(
            async move {
                match request {
                    AuthRequest::Login(request) => api.login(&request).await,
                    AuthRequest::Register(request) => api.register(&request).await,
                }
            },
            |result| Completion::Authenticated { result, reply },
        );
    }

    fn update_profile(&mut self, request: Option<UpdateProfileRequest>, reply: Reply<Profile>) {
        let Some(session) = self.state.session.as_ref() else {
            let _ = reply.send(Err(ApiError::NotAuthenticated));
            return;
        };
        let id = session.profile.id;
        let request = match request {
            Some(request) => request,
            None => {
                let diff = self.state.profile_form.to_update(&session.profile);
                if diff.is_empty() {
                    debug!("profile form unchanged, nothing to submit");
                    let _ = reply.send(Ok(session.profile.clone()));
                    return;
                }
                diff
            }
        };

        self.apply(Msg::ProfileSubmitted);
        let api = self.api.clone();
        self.spawn_request(
            async move { api.update_profile(id, &request).await },
            |result| Completion::ProfileUpdated { result, reply },
        );
    }

    fn load_profiles(&mut self, reply: Option<Reply<usize>>) {
        self.apply(Msg::ProfilesRequested);
        let api = self.api.clone();
        self.spawn_request(
            async move { api.list_profiles().await },
            |result| Completion::ProfilesListed { result, reply },
        );
    }

    /// Run a REST call as its own task, bound to the cancellation signal.
    fn spawn_request<T, Fut, C>(&mut self, request: Fut, complete: C)
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        C: FnOnce(Result<T, ApiError>) -> Completion + Send + 'static,
    {
        let mut cancel = self.cancel.subscribe();
        let completions = self.completions_tx.clone();
        self.requests.spawn(async move {
            let result = tokio::select! {
                _ = cancel.wait_for(|cancelled| *cancelled) => Err(ApiError::Cancelled),
                result = request => result,
            };
            // A closed channel drops the reply, which the caller sees as `Closed`.
            let _ = completions.send(complete(result));
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Authenticated { result, reply } => {
                let result = match result {
                    Ok(session) => {
                        info!(user_id = %session.user_id, "signed in");
                        self.apply(Msg::SessionStarted(session.clone()));
                        Ok(session)
                    }
                    Err(e) if e.is_cancelled() => Err(e),
                    Err(e) => {
                        warn!("authentication failed: {e}");
                        self.apply(Msg::AuthFailed(e.to_string()));
                        Err(e)
                    }
                };
                let _ = reply.send(result);
            }
            Completion::LoggedOut { result, reply } => {
                match &result {
                    Err(e) if e.is_cancelled() => {}
                    Ok(()) => {
                        info!("signed out");
                        self.apply(Msg::LoggedOut);
                    }
                    Err(e) => {
                        warn!("logout request failed, clearing session anyway: {e}");
                        self.apply(Msg::LoggedOut);
                    }
                }
                let _ = reply.send(result);
            }
            Completion::ProfileUpdated { result, reply } => {
                let result = match result {
                    Ok(profile) => {
                        self.apply(Msg::OwnProfileUpdated(profile.clone()));
                        Ok(profile)
                    }
                    Err(e) if e.is_cancelled() => Err(e),
                    Err(e) => {
                        warn!("profile update failed: {e}");
                        self.apply(Msg::ProfileUpdateFailed(e.to_string()));
                        Err(e)
                    }
                };
                let _ = reply.send(result);
            }
            Completion::ProfilesListed { result, reply } => {
                let result = match result {
                    Ok(profiles) => {
                        let count = profiles.len();
                        debug!(count, "profile list loaded");
                        self.apply(Msg::ProfilesLoaded(profiles));
                        Ok(count)
                    }
                    Err(e) if e.is_cancelled() => Err(e),
                    Err(e) => {
                        warn!("profile list failed: {e}");
                        self.apply(Msg::ProfilesFailed(e.to_string()));
                        Err(e)
                    }
                };
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Completion::ProfileFetched { result, reply } => {
                match &result {
                    Ok(profile) => self.apply(Msg::ProfileFetched(profile.clone())),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => warn!("profile fetch failed: {e}"),
                }
                let _ = reply.send(result);
            }
        }
    }
}

/// Cloneable entry point into a running controller.
#[derive(Clone)]
pub struct DirectoryHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<AppState>,
    bus: Arc<EventBus>,
}

impl DirectoryHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, ApiError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| ApiError::Closed)?;
        rx.await.map_err(|_| ApiError::Closed)?
    }

    fn dispatch(&self, msg: Msg) -> Result<(), ApiError> {
        self.commands
            .send(Command::Dispatch(msg))
            .map_err(|_| ApiError::Closed)
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<Session, ApiError> {
        self.request(|reply| Command::Authenticate {
            request: AuthRequest::Register(request),
            reply,
        })
        .await
    }

    pub async fn login(&self, request: LoginRequest) -> Result<Session, ApiError> {
        self.request(|reply| Command::Authenticate {
            request: AuthRequest::Login(request),
            reply,
        })
        .await
    }

    /// Sign out. The session is cleared even when the request fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.request(|reply| Command::Logout { reply }).await
    }

    pub async fn update_profile(&self, request: UpdateProfileRequest) -> Result<Profile, ApiError> {
        self.request(|reply| Command::UpdateProfile {
            request: Some(request),
            reply,
        })
        .await
    }

    pub async fn submit_login_form(&self) -> Result<Session, ApiError> {
        self.request(|reply| Command::SubmitLoginForm { reply }).await
    }

    /// Send the fields of the profile form that differ from the session
    /// profile. Nothing is sent when the form is unchanged.
    pub async fn submit_profile_form(&self) -> Result<Profile, ApiError> {
        self.request(|reply| Command::UpdateProfile {
            request: None,
            reply,
        })
        .await
    }

    /// Re-fetch the profile list. Returns the number of profiles received.
    pub async fn refresh_profiles(&self) -> Result<usize, ApiError> {
        self.request(|reply| Command::RefreshProfiles { reply }).await
    }

    pub async fn fetch_profile(&self, id: ProfileId) -> Result<Profile, ApiError> {
        self.request(|reply| Command::FetchProfile { id, reply })
            .await
    }

    pub fn edit_login_form(&self, field: LoginField, value: impl Into<String>) -> Result<(), ApiError> {
        self.dispatch(Msg::LoginFormEdited(field, value.into()))
    }

    pub fn toggle_auth_mode(&self) -> Result<(), ApiError> {
        self.dispatch(Msg::AuthModeToggled)
    }

    pub fn edit_profile_form(
        &self,
        field: ProfileField,
        value: impl Into<String>,
    ) -> Result<(), ApiError> {
        self.dispatch(Msg::ProfileFormEdited(field, value.into()))
    }

    /// Latest published state.
    pub fn state(&self) -> AppState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<AppState> {
        self.state.clone()
    }

    pub fn feed_status(&self) -> FeedStatus {
        self.state.borrow().feed.clone()
    }

    pub fn view(&self, route: Route) -> DirectoryView {
        project(&self.state.borrow(), route)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.bus.subscribe()
    }

    /// Stop the feed, cancel every in-flight request and stop the controller.
    /// Idempotent; returns once everything has shut down.
    pub async fn teardown(&self) {
        let (done, rx) = oneshot::channel();
        if self.commands.send(Command::Teardown { done }).is_err() {
            return;
        }
        let _ = rx.await;
    }
}
