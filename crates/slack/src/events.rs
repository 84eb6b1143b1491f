//! Typed envelope/event model and the event router.
//!
//! Socket Mode delivers every inbound unit as an envelope with a type tag.
//! [`SlackEvent`] is the closed set of envelope payloads this bot handles;
//! adding a variant is a compile error until every match below handles it.
//! [`EventRouter`] narrows an envelope to the right handler and
//! [`AckTiming`] encodes when the envelope must be acknowledged relative to
//! that handling.

use thiserror::Error;
use tracing::warn;

use crate::client::{ChatClient, UserDirectory};
use crate::flows::FlowController;
use crate::mentions::{MentionError, MentionHandler};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    /// The request handle the transport needs back as an acknowledgment.
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    Interactive(InteractionCallback),
    EventsApi(CallbackEvent),
    Unsupported { envelope_type: String },
}

/// Inner kinds of an Events API envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackEvent {
    AppMention(AppMentionEvent),
    Unsupported { event_type: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppMentionEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionCallback {
    pub callback_id: String,
    pub channel_id: String,
    pub user_id: String,
    /// Selected option values, in action order. May be empty for payloads
    /// that carried no selection.
    pub selections: Vec<String>,
}

/// When an envelope must be acknowledged relative to its handler.
///
/// Events API handling may be slow or fallible while the platform's
/// redelivery window is short, so those envelopes are acknowledged first.
/// Slash commands and interactive callbacks are acknowledged only once the
/// handler has finished, success or failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckTiming {
    BeforeHandling,
    AfterHandling,
}

impl SlackEvent {
    pub fn ack_timing(&self) -> AckTiming {
        match self {
            Self::EventsApi(_) => AckTiming::BeforeHandling,
            Self::SlashCommand(_) | Self::Interactive(_) | Self::Unsupported { .. } => {
                AckTiming::AfterHandling
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SlashCommand(_) => "slash_command",
            Self::Interactive(_) => "interactive",
            Self::EventsApi(_) => "events_api",
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

/// How severely the dispatch loop should treat a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Expected noise; drop with a debug log.
    Ignorable,
    /// Worth an operator-visible warning, then continue with the next event.
    Logged,
    /// The connection is suspect; tear it down and reconnect.
    RestartConnection,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("unsupported events api event type: {0}")]
    UnsupportedEventType(String),
    #[error(transparent)]
    Mention(#[from] MentionError),
}

impl RouteError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnsupportedEventType(_) | Self::Mention(_) => ErrorSeverity::Logged,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// A reply was sent to the originating channel.
    Replied,
    /// The event was handled without a guaranteed reply (flow paths are
    /// best-effort senders).
    Processed,
    /// The event was recognized as noise and dropped.
    Ignored,
}

/// Narrows each envelope to its handler.
///
/// The match is exhaustive over [`SlackEvent`] and [`CallbackEvent`]: a new
/// event variant cannot be routed implicitly.
pub struct EventRouter<C, D> {
    mentions: MentionHandler<C, D>,
    flows: FlowController<C>,
}

impl<C, D> EventRouter<C, D>
where
    C: ChatClient,
    D: UserDirectory,
{
    pub fn new(mentions: MentionHandler<C, D>, flows: FlowController<C>) -> Self {
        Self { mentions, flows }
    }

    pub async fn route(&self, envelope: &SlackEnvelope) -> Result<HandlerOutcome, RouteError> {
        match &envelope.event {
            SlackEvent::SlashCommand(command) => {
                self.flows.start_flow(command).await;
                Ok(HandlerOutcome::Processed)
            }
            SlackEvent::Interactive(callback) => {
                self.flows.resolve_flow(callback).await;
                Ok(HandlerOutcome::Processed)
            }
            SlackEvent::EventsApi(inner) => match inner {
                CallbackEvent::AppMention(event) => {
                    self.mentions.handle(event).await?;
                    Ok(HandlerOutcome::Replied)
                }
                CallbackEvent::Unsupported { event_type } => {
                    Err(RouteError::UnsupportedEventType(event_type.clone()))
                }
            },
            SlackEvent::Unsupported { envelope_type } => {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    envelope_type = %envelope_type,
                    "unknown envelope type, dropping"
                );
                Ok(HandlerOutcome::Ignored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{
        AckTiming, AppMentionEvent, CallbackEvent, EventRouter, HandlerOutcome,
        InteractionCallback, RouteError, SlackEnvelope, SlackEvent, SlashCommandPayload,
    };
    use crate::blocks::MessageBody;
    use crate::client::{ChatClient, ClientError, UserDirectory};
    use crate::flows::FlowController;
    use crate::mentions::MentionHandler;

    #[derive(Default)]
    struct RecordingChat {
        sent: Mutex<Vec<(String, MessageBody)>>,
    }

    #[async_trait]
    impl ChatClient for RecordingChat {
        async fn post_message(
            &self,
            channel_id: &str,
            body: &MessageBody,
        ) -> Result<(), ClientError> {
            self.sent.lock().await.push((channel_id.to_owned(), body.clone()));
            Ok(())
        }
    }

    struct StaticDirectory;

    #[async_trait]
    impl UserDirectory for StaticDirectory {
        async fn display_name(&self, _user_id: &str) -> Result<String, ClientError> {
            Ok("Alice".to_owned())
        }
    }

    fn router(chat: Arc<RecordingChat>) -> EventRouter<RecordingChat, StaticDirectory> {
        EventRouter::new(
            MentionHandler::new(chat.clone(), Arc::new(StaticDirectory)),
            FlowController::new(chat, Duration::from_secs(60)),
        )
    }

    fn mention_envelope(text: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: "env-1".to_owned(),
            event: SlackEvent::EventsApi(CallbackEvent::AppMention(AppMentionEvent {
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned(),
                text: text.to_owned(),
            })),
        }
    }

    #[test]
    fn ack_timing_follows_the_rule_table() {
        let slash = SlackEvent::SlashCommand(SlashCommandPayload {
            command: "/huddle".to_owned(),
            text: String::new(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
        });
        let interactive = SlackEvent::Interactive(InteractionCallback {
            callback_id: "meeting_name".to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            selections: vec![],
        });
        let events_api =
            SlackEvent::EventsApi(CallbackEvent::Unsupported { event_type: "x".to_owned() });
        let unknown = SlackEvent::Unsupported { envelope_type: "pong".to_owned() };

        assert_eq!(slash.ack_timing(), AckTiming::AfterHandling);
        assert_eq!(interactive.ack_timing(), AckTiming::AfterHandling);
        assert_eq!(events_api.ack_timing(), AckTiming::BeforeHandling);
        assert_eq!(unknown.ack_timing(), AckTiming::AfterHandling);
    }

    #[tokio::test]
    async fn mention_routes_to_a_reply() {
        let chat = Arc::new(RecordingChat::default());
        let router = router(chat.clone());

        let outcome =
            router.route(&mention_envelope("hello there")).await.expect("mention should route");

        assert_eq!(outcome, HandlerOutcome::Replied);
        let sent = chat.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "C1");
        assert_eq!(sent[0].1.display_text(), "Hello Alice");
    }

    #[tokio::test]
    async fn non_mention_events_api_kind_is_an_unsupported_type_error() {
        let chat = Arc::new(RecordingChat::default());
        let router = router(chat.clone());

        let envelope = SlackEnvelope {
            envelope_id: "env-2".to_owned(),
            event: SlackEvent::EventsApi(CallbackEvent::Unsupported {
                event_type: "reaction_added".to_owned(),
            }),
        };

        let error = router.route(&envelope).await.expect_err("should be unsupported");
        assert_eq!(error, RouteError::UnsupportedEventType("reaction_added".to_owned()));
        assert!(chat.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_envelope_type_is_ignored_without_side_effects() {
        let chat = Arc::new(RecordingChat::default());
        let router = router(chat.clone());

        let envelope = SlackEnvelope {
            envelope_id: "env-3".to_owned(),
            event: SlackEvent::Unsupported { envelope_type: "mystery".to_owned() },
        };

        let outcome = router.route(&envelope).await.expect("unknown type should not error");
        assert_eq!(outcome, HandlerOutcome::Ignored);
        assert!(chat.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn slash_command_starts_a_flow_prompt() {
        let chat = Arc::new(RecordingChat::default());
        let router = router(chat.clone());

        let envelope = SlackEnvelope {
            envelope_id: "env-4".to_owned(),
            event: SlackEvent::SlashCommand(SlashCommandPayload {
                command: "/huddle".to_owned(),
                text: "plan".to_owned(),
                channel_id: "C9".to_owned(),
                user_id: "U1".to_owned(),
            }),
        };

        let outcome = router.route(&envelope).await.expect("slash command should route");
        assert_eq!(outcome, HandlerOutcome::Processed);
        let sent = chat.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "C9");
    }
}
