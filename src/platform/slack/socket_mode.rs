// ABOUTME: Socket Mode transport: opens a WebSocket via apps.connections.open and yields envelopes
// ABOUTME: Skips hello frames, follows disconnect requests with a fresh connection, writes acks back

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use slack_morphism::prelude::*;
use slackbot_core::event::{Acknowledgement, EnvelopeKind, SocketModeEnvelope};
use slackbot_core::traits::EventTransport;
use std::sync::Arc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type WebSocketStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Produces the WebSocket URL for each new connection
#[async_trait]
pub trait ConnectionUrlSource: Send + Sync {
    async fn connection_url(&self) -> Result<String>;
}

/// Asks Slack for a fresh Socket Mode URL using the app-level token
pub struct AppsConnectionsOpen {
    client: Arc<SlackHyperClient>,
    /// App-level token (xapp-...) for Socket Mode connections
    app_token: SlackApiToken,
}

impl AppsConnectionsOpen {
    pub fn new(app_token: &str) -> Result<Self> {
        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new().context("Failed to create Slack HTTP connector")?,
        ));
        Ok(Self {
            client,
            app_token: SlackApiToken::new(SlackApiTokenValue(app_token.to_string())),
        })
    }
}

#[async_trait]
impl ConnectionUrlSource for AppsConnectionsOpen {
    async fn connection_url(&self) -> Result<String> {
        let session = self.client.open_session(&self.app_token);
        let resp = session
            .apps_connections_open(&SlackApiAppsConnectionOpenRequest::new())
            .await
            .context("Failed to call Slack apps.connections.open (check app_token)")?;
        Ok(resp.url.0.to_string())
    }
}

/// Always connects to the same URL
#[derive(Debug, Clone)]
pub struct FixedUrl(pub String);

#[async_trait]
impl ConnectionUrlSource for FixedUrl {
    async fn connection_url(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

pub struct SocketModeTransport<S> {
    source: S,
    stream: Option<WebSocketStream>,
    reconnect_on_disconnect: bool,
    connections: u32,
}

impl SocketModeTransport<AppsConnectionsOpen> {
    /// Transport for a real Slack app, authenticated with its app-level token
    pub fn for_app(app_token: &str) -> Result<Self> {
        Ok(Self::new(AppsConnectionsOpen::new(app_token)?))
    }
}

impl<S: ConnectionUrlSource> SocketModeTransport<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            stream: None,
            reconnect_on_disconnect: true,
            connections: 0,
        }
    }

    /// When false, a `disconnect` envelope ends the stream instead of reconnecting
    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect_on_disconnect = reconnect;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Number of WebSocket connections opened so far
    pub fn connections(&self) -> u32 {
        self.connections
    }

    async fn open(&mut self) -> Result<()> {
        let url = self.source.connection_url().await?;
        // Validate URL format
        let _ = url::Url::parse(&url).context("Invalid Socket Mode URL")?;

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .context("Failed to connect to Socket Mode")?;
        self.stream = Some(ws_stream);
        self.connections += 1;

        tracing::info!(connection = self.connections, "Socket Mode connected");
        Ok(())
    }
}

#[async_trait]
impl<S: ConnectionUrlSource> EventTransport for SocketModeTransport<S> {
    async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.open().await
    }

    async fn next_envelope(&mut self) -> Result<Option<SocketModeEnvelope>> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(None);
            };

            let Some(frame) = stream.next().await else {
                tracing::info!("Socket Mode stream ended");
                self.stream = None;
                return Ok(None);
            };

            match frame.context("Socket Mode read failed")? {
                Message::Text(text) => {
                    let envelope = match SocketModeEnvelope::from_json(&text) {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            tracing::warn!(error = %e, "Ignoring unparseable Socket Mode frame");
                            continue;
                        }
                    };

                    match envelope.kind() {
                        EnvelopeKind::Hello => {
                            tracing::debug!("Socket Mode hello received");
                        }
                        EnvelopeKind::Disconnect => {
                            tracing::info!(
                                reason = envelope.reason.as_deref().unwrap_or("unknown"),
                                "Slack requested disconnect"
                            );
                            self.close().await?;
                            if !self.reconnect_on_disconnect {
                                return Ok(None);
                            }
                            self.open().await?;
                        }
                        _ => return Ok(Some(envelope)),
                    }
                }
                Message::Close(frame) => {
                    tracing::info!(frame = ?frame, "Socket Mode connection closed");
                    self.stream = None;
                    return Ok(None);
                }
                _ => {} // Ignore pings, pongs, binary
            }
        }
    }

    async fn acknowledge(&mut self, ack: &Acknowledgement) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .context("Cannot acknowledge envelope: Socket Mode is not connected")?;
        stream
            .send(Message::Text(ack.to_json()))
            .await
            .context("Failed to send Socket Mode acknowledgement")?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                tracing::debug!(error = %e, "Socket Mode close handshake failed");
            }
            tracing::info!("Socket Mode disconnected");
        }
        Ok(())
    }
}
