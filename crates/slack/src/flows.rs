//! Two-step interactive exchanges: prompt, then selection, then confirmation.
//!
//! A slash command starts a flow: the bot posts a set of selectable options
//! tagged with the flow's callback id. When the user picks one, the platform
//! round-trips that callback id back in an interactive envelope and
//! [`FlowController::resolve_flow`] posts the confirmation. Pending flows
//! live in an explicit [`FlowRegistry`] keyed by (kind, channel) and expire
//! after a TTL, so abandoned prompts are reclaimed deterministically.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::blocks::{self, MessageBody, OptionItem};
use crate::client::ChatClient;
use crate::events::{InteractionCallback, SlashCommandPayload};

/// The closed set of flow types this bot runs. A callback id that does not
/// parse into a variant is unrecognized by definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
    MeetingName,
}

impl FlowKind {
    pub fn callback_id(self) -> &'static str {
        match self {
            Self::MeetingName => "meeting_name",
        }
    }

    pub fn from_callback_id(callback_id: &str) -> Option<Self> {
        match callback_id {
            "meeting_name" => Some(Self::MeetingName),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowOption {
    pub label: String,
    pub value: String,
}

impl FlowOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}

/// One in-progress interactive exchange.
#[derive(Clone, Debug)]
pub struct Flow {
    pub kind: FlowKind,
    pub channel_id: String,
    pub options: Vec<FlowOption>,
    created_at: Instant,
}

impl Flow {
    pub fn meeting_name(channel_id: &str) -> Self {
        Self {
            kind: FlowKind::MeetingName,
            channel_id: channel_id.to_owned(),
            options: vec![
                FlowOption::new("Meeting 1", "Meeting 1"),
                FlowOption::new("Meeting 2", "Meeting 2"),
            ],
            created_at: Instant::now(),
        }
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct FlowKey {
    kind: FlowKind,
    channel_id: String,
}

/// Pending flows, keyed by (kind, channel) so prompts in different channels
/// never conflate. A second prompt of the same kind in the same channel
/// replaces the first.
pub struct FlowRegistry {
    entries: HashMap<FlowKey, Flow>,
    ttl: Duration,
}

impl FlowRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: HashMap::new(), ttl }
    }

    pub fn register(&mut self, flow: Flow) {
        self.evict_expired();
        let key = FlowKey { kind: flow.kind, channel_id: flow.channel_id.clone() };
        self.entries.insert(key, flow);
    }

    /// Removes and returns the pending flow for (kind, channel), if one is
    /// still fresh. Expired entries are dropped on the way.
    pub fn take(&mut self, kind: FlowKind, channel_id: &str) -> Option<Flow> {
        self.evict_expired();
        let key = FlowKey { kind, channel_id: channel_id.to_owned() };
        self.entries.remove(&key)
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    fn evict_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, flow| !flow.expired(ttl));
    }
}

/// The two entry points of an interactive exchange. Both are best-effort:
/// send failures are logged, never propagated.
pub struct FlowController<C> {
    chat: Arc<C>,
    registry: Mutex<FlowRegistry>,
}

impl<C> FlowController<C>
where
    C: ChatClient,
{
    pub fn new(chat: Arc<C>, flow_ttl: Duration) -> Self {
        Self { chat, registry: Mutex::new(FlowRegistry::new(flow_ttl)) }
    }

    /// Starts the meeting-name flow. Any slash command triggers the same
    /// flow; the command name and arguments are logged but not routed.
    pub async fn start_flow(&self, command: &SlashCommandPayload) {
        info!(
            command = %command.command,
            args = %command.text,
            channel_id = %command.channel_id,
            "received slash command, starting meeting flow"
        );

        let flow = Flow::meeting_name(&command.channel_id);
        let prompt = blocks::option_prompt(
            "Please enter a name for the meeting:",
            flow.kind.callback_id(),
            flow.options
                .iter()
                .map(|option| OptionItem::new(option.label.as_str(), option.value.as_str())),
        );
        self.registry.lock().await.register(flow);

        if let Err(error) = self.chat.post_message(&command.channel_id, &prompt).await {
            warn!(
                channel_id = %command.channel_id,
                error = %error,
                "failed to send the flow prompt"
            );
        }
    }

    /// Resolves a callback against its pending flow and confirms the
    /// selection. Unrecognized callback ids, expired flows, and empty
    /// selections are logged and dropped.
    pub async fn resolve_flow(&self, callback: &InteractionCallback) {
        let Some(kind) = FlowKind::from_callback_id(&callback.callback_id) else {
            warn!(callback_id = %callback.callback_id, "unknown callback id, ignoring");
            return;
        };

        let flow = self.registry.lock().await.take(kind, &callback.channel_id);
        if flow.is_none() {
            warn!(
                callback_id = %callback.callback_id,
                channel_id = %callback.channel_id,
                "callback without a pending flow (expired or never prompted), ignoring"
            );
            return;
        }

        let Some(selected) = callback.selections.first() else {
            warn!(
                callback_id = %callback.callback_id,
                channel_id = %callback.channel_id,
                "callback carried no selected option, ignoring"
            );
            return;
        };

        let confirmation = MessageBody::text(format!("You selected: {selected}"));
        if let Err(error) = self.chat.post_message(&callback.channel_id, &confirmation).await {
            warn!(
                channel_id = %callback.channel_id,
                error = %error,
                "failed to send the selection confirmation"
            );
        }
    }

    #[cfg(test)]
    async fn pending(&self) -> usize {
        self.registry.lock().await.pending()
    }
}
