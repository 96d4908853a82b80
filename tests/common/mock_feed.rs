//! Scripted feed transport for driving the reconnecting feed client.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use profile_directory::error::FeedError;
use profile_directory::feed::{FeedConnection, FeedFrame, FeedTransport};
use profile_directory::model::Profile;

enum Step {
    Refuse(String),
    Open(mpsc::UnboundedReceiver<Result<FeedFrame, FeedError>>),
}

/// Each `connect` consumes the next scripted step. Once the script runs out,
/// `connect` never completes, so the client stays in `Connecting`.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    attempts: Mutex<Vec<Instant>>,
    attempt_count: watch::Sender<usize>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            attempts: Mutex::new(Vec::new()),
            attempt_count: watch::channel(0).0,
            closed: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Next attempt fails to connect.
    pub fn push_refused(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Step::Refuse(message.to_string()));
    }

    /// Next attempt connects and the server closes right away.
    pub fn push_closed(&self) {
        let (_, rx) = mpsc::unbounded_channel();
        self.script.lock().unwrap().push_back(Step::Open(rx));
    }

    /// Next attempt connects; the returned handle plays the server side.
    pub fn push_open(&self) -> FeedServer {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().unwrap().push_back(Step::Open(rx));
        FeedServer { tx }
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        *self.attempt_count.borrow()
    }

    /// Resolve once at least `n` connection attempts were made.
    pub async fn wait_for_attempts(&self, n: usize) {
        let mut rx = self.attempt_count.subscribe();
        rx.wait_for(|count| *count >= n)
            .await
            .expect("attempt counter alive");
    }

    /// Connections closed from the client side.
    pub fn client_closes(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn connect(&self) -> Result<Box<dyn FeedConnection>, FeedError> {
        self.attempts.lock().unwrap().push(Instant::now());
        self.attempt_count.send_modify(|count| *count += 1);

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Refuse(message)) => Err(FeedError::Connect(message)),
            Some(Step::Open(frames)) => Ok(Box::new(ScriptedConnection {
                frames,
                closed: self.closed.clone(),
            })),
            None => std::future::pending().await,
        }
    }
}

struct ScriptedConnection {
    frames: mpsc::UnboundedReceiver<Result<FeedFrame, FeedError>>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl FeedConnection for ScriptedConnection {
    async fn next_frame(&mut self) -> Option<Result<FeedFrame, FeedError>> {
        self.frames.recv().await
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.frames.close();
    }
}

/// Server end of a scripted connection. Dropping it closes the connection.
pub struct FeedServer {
    tx: mpsc::UnboundedSender<Result<FeedFrame, FeedError>>,
}

impl FeedServer {
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.tx.send(Ok(FeedFrame::Text(text.into())));
    }

    pub fn send_profile(&self, profile: &Profile) {
        self.send_text(json!({ "type": "Profile", "data": profile }).to_string());
    }

    pub fn send_binary(&self, data: Vec<u8>) {
        let _ = self.tx.send(Ok(FeedFrame::Binary(data)));
    }

    pub fn send_error(&self, message: &str) {
        let _ = self.tx.send(Err(FeedError::Transport(message.to_string())));
    }

    pub fn close(self) {}
}
