//! Replies to `@huddle` mentions.
//!
//! Intent is keyword containment over the lowercased text with fixed
//! precedence: greeting, then weather, then the fallback. First match wins,
//! so "hi, what's the weather" is a greeting.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::blocks::MessageBody;
use crate::client::{ChatClient, ClientError, UserDirectory};
use crate::events::AppMentionEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MentionIntent {
    Greeting,
    Weather,
    Fallback,
}

pub fn classify_intent(text: &str) -> MentionIntent {
    let text = text.to_lowercase();
    if text.contains("hello") || text.contains("hi") {
        MentionIntent::Greeting
    } else if text.contains("weather") {
        MentionIntent::Weather
    } else {
        MentionIntent::Fallback
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MentionError {
    #[error("could not resolve user `{user_id}`: {source}")]
    UserResolution { user_id: String, source: ClientError },
    #[error("failed to post mention reply: {0}")]
    MessageSend(#[source] ClientError),
}

pub struct MentionHandler<C, D> {
    chat: Arc<C>,
    directory: Arc<D>,
}

impl<C, D> MentionHandler<C, D>
where
    C: ChatClient,
    D: UserDirectory,
{
    pub fn new(chat: Arc<C>, directory: Arc<D>) -> Self {
        Self { chat, directory }
    }

    /// Sends exactly one styled reply for the mention, or fails without
    /// sending anything when the user cannot be resolved.
    pub async fn handle(&self, event: &AppMentionEvent) -> Result<(), MentionError> {
        let name = self.directory.display_name(&event.user_id).await.map_err(|source| {
            MentionError::UserResolution { user_id: event.user_id.clone(), source }
        })?;

        let intent = classify_intent(&event.text);
        debug!(
            channel_id = %event.channel_id,
            user_id = %event.user_id,
            intent = ?intent,
            "replying to mention"
        );

        let reply = reply_for(intent, &name);
        self.chat
            .post_message(&event.channel_id, &reply)
            .await
            .map_err(MentionError::MessageSend)
    }
}

fn reply_for(intent: MentionIntent, name: &str) -> MessageBody {
    let text = match intent {
        MentionIntent::Greeting => format!("Hello {name}"),
        MentionIntent::Weather => format!("Weather is sunny today. {name}"),
        MentionIntent::Fallback => format!("I am good. How are you {name}?"),
    };
    MessageBody::styled(text)
}
