use anyhow::Result;
use async_trait::async_trait;
use domain::{Attachment, Reply};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;

/// A platform connection that feeds inbound messages to the dispatcher until
/// cancelled.
#[async_trait]
pub trait ChatDriver: Send + Sync {
    async fn run(&self, dispatcher: Arc<Dispatcher>, cancel_token: CancellationToken) -> Result<()>;
}

/// Where the replies to one inbound message go.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn send(&self, reply: Reply) -> Result<()>;

    /// Downloads the `index`-th attachment of the inbound message.
    async fn download(&self, index: usize) -> Result<Attachment>;
}
