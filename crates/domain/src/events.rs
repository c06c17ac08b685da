use crate::models::Attachment;

/// Metadata of a file attached to an inbound message. The bytes are only
/// downloaded when a command actually stores them, and never when `size` is
/// over the configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentMeta {
    pub size: u64,
}

/// A chat message as seen by the dispatcher, stripped of platform types.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub author_id: String,
    pub author_name: String,
    pub channel_name: String,
    pub text: String,
    pub attachments: Vec<AttachmentMeta>,
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub attachment: Option<Attachment>,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attachment: None,
        }
    }
}
