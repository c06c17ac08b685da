pub mod codec;
mod commands;
mod events;
mod models;
pub mod protocol;

pub use codec::{decode_attachment, encode_attachment, CodecError};
pub use commands::{CommandSyntax, Keyword, ParsedCommand, UsageError};
pub use events::{AttachmentMeta, InboundMessage, Reply};
pub use models::{
    Attachment, CommandRecord, FlairRecord, StoredResponse, Trigger, TriggerSummary,
};
