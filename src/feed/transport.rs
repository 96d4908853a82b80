//! Feed transport abstraction.
//!
//! The feed client only needs "open a connection" and "read the next frame";
//! [`WsTransport`] provides both over a WebSocket, tests provide scripted
//! implementations.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ConfigError, FeedError};

/// A data frame received from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFrame {
    Text(String),
    Binary(Vec<u8>),
}

#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Open a new connection. A failure is treated like an immediate close.
    async fn connect(&self) -> Result<Box<dyn FeedConnection>, FeedError>;
}

#[async_trait]
pub trait FeedConnection: Send {
    /// Next frame, `Some(Err(_))` for a transport error, `None` once the
    /// connection is closed. After an error the connection must eventually
    /// yield `None`. Must be cancel safe.
    async fn next_frame(&mut self) -> Option<Result<FeedFrame, FeedError>>;

    /// Close from our side. Idempotent.
    async fn close(&mut self);
}

/// WebSocket transport for `GET /api/ws`.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.feed_url()?))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedTransport for WsTransport {
    async fn connect(&self) -> Result<Box<dyn FeedConnection>, FeedError> {
        let (stream, response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(FeedError::connect)?;
        info!(url = %self.url, status = %response.status(), "feed connected");
        Ok(Box::new(WsConnection {
            stream,
            finished: false,
        }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    finished: bool,
}

#[async_trait]
impl FeedConnection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<FeedFrame, FeedError>> {
        if self.finished {
            return None;
        }
        loop {
            match self.stream.next().await {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Ok(Message::Text(text))) => return Some(Ok(FeedFrame::Text(text))),
                Some(Ok(Message::Binary(data))) => return Some(Ok(FeedFrame::Binary(data))),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "feed closed by server");
                    self.finished = true;
                    return None;
                }
                // Ping/pong replies are handled by tungstenite.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(FeedError::transport(e)));
                }
            }
        }
    }

    async fn close(&mut self) {
        self.finished = true;
        if let Err(e) = self.stream.close(None).await {
            debug!("feed close handshake failed: {e}");
        }
        let _ = self.stream.flush().await;
    }
}
