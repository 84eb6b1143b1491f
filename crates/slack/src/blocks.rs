use serde::Serialize;

/// Accent color applied to every styled bot reply.
pub const ACCENT_COLOR: &str = "#4af030";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionItem {
    pub text: String,
    pub value: String,
}

impl OptionItem {
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self { text: text.into(), value: value.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttachmentAction {
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub options: Vec<OptionItem>,
}

/// A styled message attachment: colored bar, text, and optionally a set of
/// selectable options correlated back to us through `callback_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub text: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AttachmentAction>,
}

impl Attachment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: ACCENT_COLOR.to_owned(),
            callback_id: None,
            actions: Vec::new(),
        }
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn callback_id(mut self, callback_id: impl Into<String>) -> Self {
        self.callback_id = Some(callback_id.into());
        self
    }

    pub fn options(
        mut self,
        name: impl Into<String>,
        options: impl IntoIterator<Item = OptionItem>,
    ) -> Self {
        self.actions.push(AttachmentAction {
            name: name.into(),
            action_type: "select".to_owned(),
            options: options.into_iter().collect(),
        });
        self
    }
}

/// An outbound message body for `chat.postMessage`: either bare text or a
/// single styled attachment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Styled(Attachment),
}

impl MessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn styled(text: impl Into<String>) -> Self {
        Self::Styled(Attachment::new(text))
    }

    /// The human-readable text of the body, whichever shape it takes.
    pub fn display_text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Styled(attachment) => &attachment.text,
        }
    }
}

/// Builds the prompt for a selectable-option exchange: the question plus the
/// option set, tagged with the flow's callback id.
pub fn option_prompt(
    prompt: impl Into<String>,
    callback_id: &str,
    options: impl IntoIterator<Item = OptionItem>,
) -> MessageBody {
    MessageBody::Styled(
        Attachment::new(prompt).callback_id(callback_id).options(callback_id, options),
    )
}

#[cfg(test)]
mod tests {
    use super::{option_prompt, Attachment, MessageBody, OptionItem, ACCENT_COLOR};

    #[test]
    fn attachment_defaults_to_accent_color() {
        let attachment = Attachment::new("Hello there");
        assert_eq!(attachment.color, ACCENT_COLOR);
        assert!(attachment.callback_id.is_none());
        assert!(attachment.actions.is_empty());
    }

    #[test]
    fn option_prompt_carries_callback_id_and_options() {
        let body = option_prompt(
            "Please enter a name for the meeting:",
            "meeting_name",
            vec![OptionItem::new("Meeting 1", "Meeting 1"), OptionItem::new("Meeting 2", "Meeting 2")],
        );

        let MessageBody::Styled(attachment) = body else {
            panic!("option prompt should be a styled attachment");
        };
        assert_eq!(attachment.callback_id.as_deref(), Some("meeting_name"));
        assert_eq!(attachment.actions.len(), 1);
        assert_eq!(attachment.actions[0].action_type, "select");
        assert_eq!(attachment.actions[0].options.len(), 2);
        assert_eq!(attachment.actions[0].options[1].value, "Meeting 2");
    }

    #[test]
    fn plain_attachment_serializes_without_empty_fields() {
        let attachment = Attachment::new("Hello Alice");
        let json = serde_json::to_value(&attachment).expect("serialize");

        assert_eq!(json["text"], "Hello Alice");
        assert_eq!(json["color"], ACCENT_COLOR);
        assert!(json.get("callback_id").is_none());
        assert!(json.get("actions").is_none());
    }

    #[test]
    fn display_text_reads_through_both_shapes() {
        assert_eq!(MessageBody::text("plain").display_text(), "plain");
        assert_eq!(MessageBody::styled("styled").display_text(), "styled");
    }
}
