//! Wire-level parsing of Socket Mode frames.
//!
//! Slack delivers JSON frames over the WebSocket. System frames (`hello`,
//! `disconnect`) manage the connection; everything else that carries an
//! `envelope_id` is a business envelope. Payload shapes differ per envelope
//! type, so each gets its own serde struct and a conversion into the typed
//! [`SlackEvent`] model. A payload that fails to deserialize degrades into
//! `SlackEvent::Unsupported` so the envelope is still acknowledged and
//! dropped instead of being redelivered forever.

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::events::{
    AppMentionEvent, CallbackEvent, InteractionCallback, SlackEnvelope, SlackEvent,
    SlashCommandPayload,
};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed socket frame: {0}")]
    Frame(String),
}

/// A parsed Socket Mode frame.
#[derive(Debug)]
pub enum SocketFrame {
    /// Connection established; no action needed.
    Hello,
    /// Slack asks us to reconnect.
    Disconnect,
    /// A business envelope that needs acknowledgment and handling.
    Envelope(SlackEnvelope),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SlashCommandWire {
    command: String,
    #[serde(default)]
    text: String,
    channel_id: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct EventsApiWire {
    event: InnerEventWire,
}

#[derive(Debug, Deserialize)]
struct InnerEventWire {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InteractiveWire {
    #[serde(default)]
    callback_id: String,
    channel: ChannelRef,
    user: UserRef,
    #[serde(default)]
    actions: Vec<ActionWire>,
}

#[derive(Debug, Deserialize)]
struct ChannelRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ActionWire {
    #[serde(default)]
    selected_option: Option<SelectedOptionWire>,
}

#[derive(Debug, Deserialize)]
struct SelectedOptionWire {
    value: String,
}

/// Parses one raw text frame. Returns `None` for frames that need no
/// handling (unknown system frames, envelopes with no id to acknowledge).
pub fn parse_frame(text: &str) -> Result<Option<SocketFrame>, WireError> {
    let raw: RawFrame =
        serde_json::from_str(text).map_err(|error| WireError::Frame(error.to_string()))?;

    match raw.frame_type.as_str() {
        "hello" => Ok(Some(SocketFrame::Hello)),
        "disconnect" => Ok(Some(SocketFrame::Disconnect)),
        envelope_type => {
            let Some(envelope_id) = raw.envelope_id else {
                warn!(frame_type = envelope_type, "frame without envelope_id, skipping");
                return Ok(None);
            };

            let payload = raw.payload.unwrap_or(serde_json::Value::Null);
            let event = convert_payload(envelope_type, payload);
            Ok(Some(SocketFrame::Envelope(SlackEnvelope { envelope_id, event })))
        }
    }
}

fn convert_payload(envelope_type: &str, payload: serde_json::Value) -> SlackEvent {
    match envelope_type {
        "slash_commands" => match serde_json::from_value::<SlashCommandWire>(payload) {
            Ok(wire) => SlackEvent::SlashCommand(SlashCommandPayload {
                command: wire.command,
                text: wire.text,
                channel_id: wire.channel_id,
                user_id: wire.user_id,
            }),
            Err(error) => degraded(envelope_type, &error),
        },
        "events_api" => match serde_json::from_value::<EventsApiWire>(payload) {
            Ok(wire) => SlackEvent::EventsApi(convert_inner_event(wire.event)),
            Err(error) => degraded(envelope_type, &error),
        },
        "interactive" => match serde_json::from_value::<InteractiveWire>(payload) {
            Ok(wire) => SlackEvent::Interactive(InteractionCallback {
                callback_id: wire.callback_id,
                channel_id: wire.channel.id,
                user_id: wire.user.id,
                selections: wire
                    .actions
                    .into_iter()
                    .filter_map(|action| action.selected_option.map(|option| option.value))
                    .collect(),
            }),
            Err(error) => degraded(envelope_type, &error),
        },
        other => SlackEvent::Unsupported { envelope_type: other.to_owned() },
    }
}

fn convert_inner_event(inner: InnerEventWire) -> CallbackEvent {
    if inner.event_type != "app_mention" {
        return CallbackEvent::Unsupported { event_type: inner.event_type };
    }

    match (inner.channel, inner.user, inner.text) {
        (Some(channel_id), Some(user_id), Some(text)) => {
            CallbackEvent::AppMention(AppMentionEvent { channel_id, user_id, text })
        }
        _ => {
            warn!("app_mention event missing channel/user/text, treating as unsupported");
            CallbackEvent::Unsupported { event_type: "app_mention (incomplete)".to_owned() }
        }
    }
}

fn degraded(envelope_type: &str, error: &serde_json::Error) -> SlackEvent {
    warn!(envelope_type, error = %error, "payload failed to deserialize, degrading envelope");
    SlackEvent::Unsupported { envelope_type: envelope_type.to_owned() }
}

#[cfg(test)]
mod tests {
    use super::{parse_frame, SocketFrame};
    use crate::events::{CallbackEvent, SlackEvent};

    #[test]
    fn parses_hello_and_disconnect_frames() {
        assert!(matches!(
            parse_frame(r#"{"type":"hello","num_connections":1}"#).expect("parse"),
            Some(SocketFrame::Hello)
        ));
        assert!(matches!(
            parse_frame(r#"{"type":"disconnect","reason":"warning"}"#).expect("parse"),
            Some(SocketFrame::Disconnect)
        ));
    }

    #[test]
    fn parses_a_slash_command_envelope() {
        let frame = parse_frame(
            r#"{
                "envelope_id": "env-1",
                "type": "slash_commands",
                "payload": {"command": "/huddle", "text": "plan", "channel_id": "C1", "user_id": "U1"}
            }"#,
        )
        .expect("parse")
        .expect("frame");

        let SocketFrame::Envelope(envelope) = frame else { panic!("expected envelope") };
        assert_eq!(envelope.envelope_id, "env-1");
        let SlackEvent::SlashCommand(command) = envelope.event else {
            panic!("expected slash command")
        };
        assert_eq!(command.command, "/huddle");
        assert_eq!(command.text, "plan");
        assert_eq!(command.channel_id, "C1");
    }

    #[test]
    fn parses_an_app_mention_events_api_envelope() {
        let frame = parse_frame(
            r#"{
                "envelope_id": "env-2",
                "type": "events_api",
                "payload": {"event": {"type": "app_mention", "channel": "C2", "user": "U2", "text": "<@BOT> hello"}}
            }"#,
        )
        .expect("parse")
        .expect("frame");

        let SocketFrame::Envelope(envelope) = frame else { panic!("expected envelope") };
        let SlackEvent::EventsApi(CallbackEvent::AppMention(event)) = envelope.event else {
            panic!("expected app mention")
        };
        assert_eq!(event.channel_id, "C2");
        assert_eq!(event.user_id, "U2");
        assert!(event.text.contains("hello"));
    }

    #[test]
    fn non_mention_inner_kind_stays_typed_as_unsupported() {
        let frame = parse_frame(
            r#"{
                "envelope_id": "env-3",
                "type": "events_api",
                "payload": {"event": {"type": "reaction_added", "user": "U3"}}
            }"#,
        )
        .expect("parse")
        .expect("frame");

        let SocketFrame::Envelope(envelope) = frame else { panic!("expected envelope") };
        assert_eq!(
            envelope.event,
            SlackEvent::EventsApi(CallbackEvent::Unsupported {
                event_type: "reaction_added".to_owned()
            })
        );
    }

    #[test]
    fn parses_an_interactive_envelope_with_a_selection() {
        let frame = parse_frame(
            r#"{
                "envelope_id": "env-4",
                "type": "interactive",
                "payload": {
                    "callback_id": "meeting_name",
                    "channel": {"id": "C4"},
                    "user": {"id": "U4"},
                    "actions": [{"selected_option": {"value": "Meeting 2"}}]
                }
            }"#,
        )
        .expect("parse")
        .expect("frame");

        let SocketFrame::Envelope(envelope) = frame else { panic!("expected envelope") };
        let SlackEvent::Interactive(callback) = envelope.event else {
            panic!("expected interactive callback")
        };
        assert_eq!(callback.callback_id, "meeting_name");
        assert_eq!(callback.channel_id, "C4");
        assert_eq!(callback.selections, vec!["Meeting 2".to_owned()]);
    }

    #[test]
    fn interactive_without_selection_yields_empty_selections() {
        let frame = parse_frame(
            r#"{
                "envelope_id": "env-5",
                "type": "interactive",
                "payload": {
                    "callback_id": "meeting_name",
                    "channel": {"id": "C5"},
                    "user": {"id": "U5"},
                    "actions": [{"action_id": "noop"}]
                }
            }"#,
        )
        .expect("parse")
        .expect("frame");

        let SocketFrame::Envelope(envelope) = frame else { panic!("expected envelope") };
        let SlackEvent::Interactive(callback) = envelope.event else {
            panic!("expected interactive callback")
        };
        assert!(callback.selections.is_empty());
    }

    #[test]
    fn unknown_envelope_type_with_id_becomes_unsupported() {
        let frame = parse_frame(r#"{"envelope_id":"env-6","type":"mystery","payload":{}}"#)
            .expect("parse")
            .expect("frame");

        let SocketFrame::Envelope(envelope) = frame else { panic!("expected envelope") };
        assert_eq!(
            envelope.event,
            SlackEvent::Unsupported { envelope_type: "mystery".to_owned() }
        );
    }

    #[test]
    fn unknown_frame_without_envelope_id_is_skipped() {
        let parsed = parse_frame(r#"{"type":"pong"}"#).expect("parse");
        assert!(parsed.is_none());
    }

    #[test]
    fn malformed_payload_degrades_to_unsupported_instead_of_failing() {
        let frame = parse_frame(r#"{"envelope_id":"env-7","type":"slash_commands","payload":{}}"#)
            .expect("parse")
            .expect("frame");

        let SocketFrame::Envelope(envelope) = frame else { panic!("expected envelope") };
        assert_eq!(
            envelope.event,
            SlackEvent::Unsupported { envelope_type: "slash_commands".to_owned() }
        );
    }

    #[test]
    fn invalid_json_is_a_frame_error() {
        assert!(parse_frame("not json").is_err());
    }
}
