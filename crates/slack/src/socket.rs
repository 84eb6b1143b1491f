//! Socket Mode transport and the serial dispatch loop.
//!
//! [`SocketTransport`] is the seam between the dispatch core and the real
//! connection; [`WebSocketTransport`] is the production implementation
//! (apps.connections.open → wss → frame parse → ack writes). The
//! [`DispatchLoop`] pulls envelopes one at a time, applies the
//! acknowledgment timing rules, routes through [`EventRouter`], and
//! reconnects with bounded exponential backoff when the connection fails.
//! Handler failures are classified by severity and never take the process
//! down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use secrecy::SecretString;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::client::{ChatClient, HttpSlackClient, UserDirectory};
use crate::events::{AckTiming, ErrorSeverity, EventRouter, SlackEnvelope};
use crate::wire::{self, SocketFrame};

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
}

impl TransportError {
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::RestartConnection
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// Yields the next envelope, or `None` when the stream ends and the
    /// caller should reconnect.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
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

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct WsConnection {
    write: SplitSink<WsStream, WsMessage>,
    read: SplitStream<WsStream>,
}

/// Production Socket Mode transport: obtains the WebSocket URL with the
/// app-level token, then reads frames and writes acks on the same socket.
pub struct WebSocketTransport {
    client: HttpSlackClient,
    app_token: SecretString,
    connection: tokio::sync::Mutex<Option<WsConnection>>,
}

impl WebSocketTransport {
    pub fn new(client: HttpSlackClient, app_token: SecretString) -> Self {
        Self { client, app_token, connection: tokio::sync::Mutex::new(None) }
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

        let (write, read) = stream.split();
        *self.connection.lock().await = Some(WsConnection { write, read });
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.connection.lock().await;
        let Some(connection) = guard.as_mut() else {
            return Err(TransportError::Receive("socket not connected".to_owned()));
        };

        loop {
            let Some(message) = connection.read.next().await else {
                info!("socket stream ended");
                return Ok(None);
            };
            let message =
                message.map_err(|error| TransportError::Receive(error.to_string()))?;

            match message {
                WsMessage::Text(text) => match wire::parse_frame(&text) {
                    Ok(Some(SocketFrame::Hello)) => {
                        info!("socket mode hello received, connection established");
                    }
                    Ok(Some(SocketFrame::Disconnect)) => {
                        info!("slack requested disconnect");
                        return Ok(None);
                    }
                    Ok(Some(SocketFrame::Envelope(envelope))) => return Ok(Some(envelope)),
                    Ok(None) => {}
                    Err(error) => {
                        warn!(error = %error, "unparseable socket frame, skipping");
                    }
                },
                WsMessage::Ping(data) => {
                    connection
                        .write
                        .send(WsMessage::Pong(data))
                        .await
                        .map_err(|error| TransportError::Receive(error.to_string()))?;
                }
                WsMessage::Close(_) => {
                    info!("socket close frame received");
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.connection.lock().await;
        let Some(connection) = guard.as_mut() else {
            return Err(TransportError::Acknowledge("socket not connected".to_owned()));
        };

        let ack = serde_json::json!({ "envelope_id": envelope_id });
        connection
            .write
            .send(WsMessage::Text(ack.to_string()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(mut connection) = self.connection.lock().await.take() {
            if let Err(error) = connection.write.close().await {
                debug!(error = %error, "socket close failed, connection dropped anyway");
            }
        }
        Ok(())
    }
}

enum PumpExit {
    StreamClosed,
    Shutdown,
}

/// The long-lived envelope consumer.
///
/// One envelope is fully handled, including its acknowledgment, before the
/// next is pulled. The shutdown signal is observed only between envelopes,
/// never inside an in-flight handler.
pub struct DispatchLoop<C, D> {
    transport: Arc<dyn SocketTransport>,
    router: EventRouter<C, D>,
    reconnect_policy: ReconnectPolicy,
}

impl<C, D> DispatchLoop<C, D>
where
    C: ChatClient,
    D: UserDirectory,
{
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        router: EventRouter<C, D>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, router, reconnect_policy }
    }

    /// Runs until the shutdown signal is set or reconnect attempts are
    /// exhausted. Exhaustion degrades gracefully: the loop returns `Ok` and
    /// the process decides what to do, it is never crashed from here.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            if *shutdown.borrow() {
                info!("shutdown requested, dispatch loop stopped");
                return Ok(());
            }

            match self.connect_and_pump(attempt, &mut shutdown).await {
                Ok(PumpExit::Shutdown) => {
                    info!("shutdown requested, dispatch loop stopped");
                    return Ok(());
                }
                Ok(PumpExit::StreamClosed) => {
                    info!(attempt, "socket stream closed, reconnecting");
                }
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );
                }
            }

            if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    max_retries = self.reconnect_policy.max_retries,
                    "socket mode retries exhausted; stopping dispatch loop without crash"
                );
                return Ok(());
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("shutdown during reconnect backoff, dispatch loop stopped");
                            return Ok(());
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<PumpExit, TransportError> {
        info!(attempt, "opening socket mode connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode connected");

        loop {
            let next = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown signal received, leaving dispatch loop");
                        self.transport.disconnect().await?;
                        return Ok(PumpExit::Shutdown);
                    }
                    continue;
                }
                next = self.transport.next_envelope() => next?,
            };

            let Some(envelope) = next else {
                self.transport.disconnect().await?;
                return Ok(PumpExit::StreamClosed);
            };

            self.handle_envelope(envelope).await?;
        }
    }

    /// Applies the acknowledgment gate: events API envelopes are acked
    /// before handling (the redelivery window is short and handling may be
    /// slow), everything else after the handler finishes, whatever its
    /// outcome.
    async fn handle_envelope(&self, envelope: SlackEnvelope) -> Result<(), TransportError> {
        debug!(
            envelope_id = %envelope.envelope_id,
            kind = envelope.event.kind(),
            "received envelope"
        );

        match envelope.event.ack_timing() {
            AckTiming::BeforeHandling => {
                self.transport.acknowledge(&envelope.envelope_id).await?;
                self.dispatch(&envelope).await;
            }
            AckTiming::AfterHandling => {
                self.dispatch(&envelope).await;
                self.transport.acknowledge(&envelope.envelope_id).await?;
            }
        }

        Ok(())
    }

    async fn dispatch(&self, envelope: &SlackEnvelope) {
        match self.router.route(envelope).await {
            Ok(outcome) => {
                debug!(
                    envelope_id = %envelope.envelope_id,
                    outcome = ?outcome,
                    "envelope handled"
                );
            }
            Err(error) => match error.severity() {
                ErrorSeverity::Ignorable => {
                    debug!(envelope_id = %envelope.envelope_id, error = %error, "dropped event");
                }
                ErrorSeverity::Logged => {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        error = %error,
                        "event handling failed; continuing dispatch loop"
                    );
                }
                ErrorSeverity::RestartConnection => {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        error = %error,
                        "event handling reported a connection-level failure"
                    );
                }
            },
        }
    }
}
