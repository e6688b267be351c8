use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use mavbot_core::config::SocketConfig;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::{net::TcpStream, sync::watch, sync::Mutex};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::{
    api::SlackWebClient,
    events::{decode_event, EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("socket frame could not be decoded: {0}")]
    Decode(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SocketError {
    #[error("socket mode gave up after {attempts} connection attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&SocketConfig::default())
    }
}

impl From<&SocketConfig> for ReconnectPolicy {
    fn from(config: &SocketConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// A Socket Mode frame after decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: Option<String> },
    Envelope(SlackEnvelope),
}

#[derive(Debug, Deserialize)]
struct RawSocketFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    reason: Option<String>,
}

/// Decodes a text frame. `Ok(None)` means the frame is well formed but carries
/// nothing the bot acts on.
pub fn decode_socket_frame(text: &str) -> Result<Option<SocketFrame>, TransportError> {
    let raw: RawSocketFrame =
        serde_json::from_str(text).map_err(|error| TransportError::Decode(error.to_string()))?;

    let frame = match raw.frame_type.as_str() {
        "hello" => SocketFrame::Hello,
        "disconnect" => SocketFrame::Disconnect { reason: raw.reason },
        envelope_type @ ("events_api" | "slash_commands" | "interactive") => {
            let Some(envelope_id) = raw.envelope_id else {
                return Err(TransportError::Decode(format!(
                    "`{envelope_type}` frame has no envelope_id"
                )));
            };
            let event = decode_event(envelope_type, raw.payload.unwrap_or(Value::Null));
            SocketFrame::Envelope(SlackEnvelope { envelope_id, event })
        }
        other => {
            debug!(frame_type = other, "skipping socket frame");
            return Ok(None);
        }
    };

    Ok(Some(frame))
}

/// Acknowledgement body for an envelope, with an optional response payload.
pub fn acknowledgement(envelope_id: &str, payload: Option<&Value>) -> Value {
    match payload {
        Some(payload) => serde_json::json!({ "envelope_id": envelope_id, "payload": payload }),
        None => serde_json::json!({ "envelope_id": envelope_id }),
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// Next envelope; `Ok(None)` when the server closed or asked us to
    /// reconnect.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<&Value>,
    ) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode over a real WebSocket, opened through `apps.connections.open`.
pub struct WebSocketTransport {
    client: SlackWebClient,
    app_token: SecretString,
    stream: Mutex<Option<WsStream>>,
}

impl WebSocketTransport {
    pub fn new(client: SlackWebClient, app_token: SecretString) -> Self {
        Self { client, app_token, stream: Mutex::new(None) }
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .client
            .connections_open(&self.app_token)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream =
            guard.as_mut().ok_or_else(|| TransportError::Receive("not connected".to_owned()))?;

        while let Some(message) = stream.next().await {
            let message = message.map_err(|error| TransportError::Receive(error.to_string()))?;
            let text = match message {
                WsMessage::Text(text) => text,
                WsMessage::Close(frame) => {
                    info!(close_frame = ?frame, "slack closed the socket");
                    return Ok(None);
                }
                // tungstenite answers pings on its own
                _ => continue,
            };

            match decode_socket_frame(text.as_str()) {
                Ok(Some(SocketFrame::Hello)) => info!("socket mode hello received"),
                Ok(Some(SocketFrame::Disconnect { reason })) => {
                    info!(
                        reason = reason.as_deref().unwrap_or("unspecified"),
                        "slack requested reconnect"
                    );
                    return Ok(None);
                }
                Ok(Some(SocketFrame::Envelope(envelope))) => return Ok(Some(envelope)),
                Ok(None) => {}
                Err(error) => warn!(error = %error, "dropping undecodable socket frame"),
            }
        }

        Ok(None)
    }

    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<&Value>,
    ) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("not connected".to_owned()))?;

        let body = acknowledgement(envelope_id, payload).to_string();
        stream
            .send(WsMessage::Text(body.into()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        match stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(error) => Err(TransportError::Disconnect(error.to_string())),
        }
    }
}

enum ConnectionExit {
    Shutdown,
    Closed,
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Runs until `shutdown` flips to `true` (or its sender is dropped), or
    /// until connecting fails more than `max_retries` times in a row.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), SocketError> {
        let mut attempt: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("shutdown requested; socket mode runner exiting");
                return Ok(());
            }

            info!(attempt, "opening socket mode transport connection");
            let delay = match self.transport.connect().await {
                Ok(()) => {
                    info!(attempt, "socket mode transport connected");
                    attempt = 0;
                    match self.pump(&mut shutdown).await {
                        Ok(ConnectionExit::Shutdown) => return Ok(()),
                        Ok(ConnectionExit::Closed) => {}
                        Err(error) => {
                            warn!(error = %error, "socket mode connection dropped");
                            if let Err(error) = self.transport.disconnect().await {
                                debug!(error = %error, "ignoring disconnect failure");
                            }
                        }
                    }
                    self.reconnect_policy.backoff(0)
                }
                Err(error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted"
                        );
                        return Err(SocketError::RetriesExhausted {
                            attempts: attempt + 1,
                            source: error,
                        });
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    attempt += 1;
                    delay
                }
            };

            if delay.is_zero() {
                continue;
            }
            debug!(delay_ms = delay.as_millis() as u64, "waiting before reconnect");
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown requested during reconnect backoff");
                        return Ok(());
                    }
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn pump(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<ConnectionExit, TransportError> {
        loop {
            let next = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown requested; closing socket mode connection");
                        if let Err(error) = self.transport.disconnect().await {
                            warn!(error = %error, "failed to close socket mode connection");
                        }
                        return Ok(ConnectionExit::Shutdown);
                    }
                    continue;
                }
                next = self.transport.next_envelope() => next?,
            };

            let Some(envelope) = next else {
                info!("socket mode transport stream closed; reconnecting");
                self.transport.disconnect().await?;
                return Ok(ConnectionExit::Closed);
            };

            self.handle_envelope(&envelope).await;
        }
    }

    async fn handle_envelope(&self, envelope: &SlackEnvelope) {
        let context = EventContext::received_now(envelope.envelope_id.clone());
        let (channel_id, user_id) = correlation_fields(&envelope.event);

        info!(
            event_name = "ingress.slack.envelope_received",
            envelope_id = %envelope.envelope_id,
            event_type = ?envelope.event.event_type(),
            correlation_id = %context.correlation_id,
            channel_id = channel_id.unwrap_or("unknown"),
            user_id = user_id.unwrap_or("unknown"),
            "received slack envelope"
        );

        let early_ack = envelope.event.acknowledges_before_dispatch();
        if early_ack {
            self.acknowledge(envelope, None).await;
        }

        let reply = match self.dispatcher.dispatch(envelope, &context).await {
            Ok(HandlerResult::Acknowledge(message)) => match serde_json::to_value(&message) {
                Ok(value) => Some(value),
                Err(error) => {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        error = %error,
                        "could not serialize acknowledgement payload"
                    );
                    None
                }
            },
            Ok(result) => {
                debug!(
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %context.correlation_id,
                    result = ?result,
                    "slack envelope handled"
                );
                None
            }
            Err(error) => {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %context.correlation_id,
                    channel_id = channel_id.unwrap_or("unknown"),
                    user_id = user_id.unwrap_or("unknown"),
                    error = %error,
                    "event dispatch failed; continuing socket loop"
                );
                None
            }
        };

        if !early_ack {
            self.acknowledge(envelope, reply.as_ref()).await;
        }
    }

    async fn acknowledge(&self, envelope: &SlackEnvelope, payload: Option<&Value>) {
        match self.transport.acknowledge(&envelope.envelope_id, payload).await {
            Ok(()) => debug!(
                event_name = "ingress.slack.ack_sent",
                envelope_id = %envelope.envelope_id,
                with_payload = payload.is_some(),
                "acknowledged slack envelope"
            ),
            Err(error) => warn!(
                event_name = "ingress.slack.ack_sent",
                envelope_id = %envelope.envelope_id,
                error = %error,
                "failed to acknowledge slack envelope"
            ),
        }
    }
}

fn correlation_fields(event: &SlackEvent) -> (Option<&str>, Option<&str>) {
    match event {
        SlackEvent::AppMention(event) => (Some(&event.channel_id), Some(&event.user_id)),
        SlackEvent::SlashCommand(payload) => (Some(&payload.channel_id), Some(&payload.user_id)),
        SlackEvent::Interaction(event) => (event.channel_id.as_deref(), event.user_id.as_deref()),
        SlackEvent::Unsupported { .. } => (None, None),
    }
}
