//! Reconnecting event-feed client.
//!
//! One supervised task owns the connection and loops
//! `connect → read until close → wait reconnect interval` until torn down.
//! Every close (including a failed connect) schedules exactly one
//! reconnection attempt; there is no retry cap and no backoff.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::event::{parse_feed_event, FeedEvent};
use super::transport::{FeedConnection, FeedFrame, FeedTransport};
use crate::config::ClientConfig;
use crate::model::Profile;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
    /// Absorbing: no further connection attempts happen.
    TornDown,
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedState::Disconnected => write!(f, "disconnected"),
            FeedState::Connecting => write!(f, "connecting"),
            FeedState::Connected => write!(f, "connected"),
            FeedState::TornDown => write!(f, "torn down"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedStatus {
    pub state: FeedState,
    /// Last transport error. Cleared when a connection opens.
    pub error: Option<String>,
    /// Reconnection attempts scheduled so far.
    pub reconnects: u64,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self {
            state: FeedState::Disconnected,
            error: None,
            reconnects: 0,
        }
    }
}

impl FeedStatus {
    pub fn is_connected(&self) -> bool {
        self.state == FeedState::Connected
    }
}

/// Delay between a close and the next connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub interval: Duration,
    /// Uniform random extra delay in `[0, jitter]`.
    pub jitter: Duration,
}

impl ReconnectPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            jitter: Duration::ZERO,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            interval: config.reconnect_interval(),
            jitter: config.reconnect_jitter(),
        }
    }

    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }
        let extra = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
        self.interval + Duration::from_millis(extra)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(3000))
    }
}

pub struct FeedClient;

impl FeedClient {
    /// Spawn the supervisor. `on_profile` is the single callback invoked for
    /// every "profile changed" event, in arrival order.
    pub fn start<F>(
        transport: Arc<dyn FeedTransport>,
        policy: ReconnectPolicy,
        on_profile: F,
    ) -> FeedHandle
    where
        F: Fn(Profile) + Send + Sync + 'static,
    {
        let (status_tx, status_rx) = watch::channel(FeedStatus::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervise(
            transport,
            policy,
            on_profile,
            status_tx,
            shutdown_rx,
        ));
        FeedHandle {
            status: status_rx,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }
}

/// Owner of a running feed. Dropping it tears the feed down.
pub struct FeedHandle {
    status: watch::Receiver<FeedStatus>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl FeedHandle {
    pub fn status(&self) -> watch::Receiver<FeedStatus> {
        self.status.clone()
    }

    pub fn current(&self) -> FeedStatus {
        self.status.borrow().clone()
    }

    /// Cancel any pending reconnect, close the open connection and wait for
    /// the supervisor to finish.
    pub async fn teardown(&mut self) {
        self.shutdown.send_replace(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("feed supervisor ended abnormally: {e}");
            }
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender counts as shutdown.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn supervise<F>(
    transport: Arc<dyn FeedTransport>,
    policy: ReconnectPolicy,
    on_profile: F,
    status: watch::Sender<FeedStatus>,
    mut shutdown: watch::Receiver<bool>,
) where
    F: Fn(Profile) + Send + Sync + 'static,
{
    loop {
        status.send_modify(|s| s.state = FeedState::Connecting);

        let connected = tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            result = transport.connect() => result,
        };

        match connected {
            Ok(mut connection) => {
                status.send_modify(|s| {
                    s.state = FeedState::Connected;
                    s.error = None;
                });
                let stopped = pump(connection.as_mut(), &on_profile, &status, &mut shutdown).await;
                if stopped {
                    connection.close().await;
                    break;
                }
                info!("feed connection closed");
            }
            Err(e) => {
                warn!("feed connect failed: {e}");
                status.send_modify(|s| s.error = Some(e.to_string()));
            }
        }

        status.send_modify(|s| s.state = FeedState::Disconnected);
        if *shutdown.borrow() {
            break;
        }

        let delay = policy.next_delay();
        status.send_modify(|s| s.reconnects += 1);
        debug!(delay_ms = delay.as_millis() as u64, "scheduling feed reconnect");

        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            _ = sleep(delay) => {}
        }
    }

    status.send_modify(|s| s.state = FeedState::TornDown);
    debug!("feed supervisor stopped");
}

/// Read frames until the connection closes (`false`) or shutdown is
/// requested (`true`).
async fn pump<F>(
    connection: &mut dyn FeedConnection,
    on_profile: &F,
    status: &watch::Sender<FeedStatus>,
    shutdown: &mut watch::Receiver<bool>,
) -> bool
where
    F: Fn(Profile),
{
    loop {
        let frame = tokio::select! {
            _ = wait_for_shutdown(shutdown) => return true,
            frame = connection.next_frame() => frame,
        };

        match frame {
            None => return false,
            Some(Ok(FeedFrame::Text(text))) => match parse_feed_event(&text) {
                Ok(FeedEvent::Profile(profile)) => {
                    debug!(profile_id = %profile.id, "feed profile event");
                    on_profile(profile);
                }
                Err(e) => warn!("dropping feed message: {e}"),
            },
            Some(Ok(FeedFrame::Binary(data))) => {
                warn!(bytes = data.len(), "dropping binary feed frame");
            }
            Some(Err(e)) => {
                warn!("{e}");
                status.send_modify(|s| s.error = Some(e.to_string()));
            }
        }
    }
}
