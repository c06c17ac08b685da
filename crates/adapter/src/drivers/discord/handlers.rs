use anyhow::{anyhow, Result};
use async_trait::async_trait;
use domain::{Attachment, AttachmentMeta, InboundMessage, Reply};
use serenity::all::{
    Attachment as DiscordAttachment, Channel, ChannelId, Context, CreateAttachment, CreateMessage,
    EventHandler, Http, Message, Ready,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::traits::ReplyChannel;

/// One inbound message waiting for the dispatcher, plus the means to answer it.
pub(crate) struct MessageEnvelope {
    pub own_id: String,
    pub message: InboundMessage,
    pub channel: DiscordChannel,
}

pub(crate) struct DiscordChannel {
    http: Arc<Http>,
    channel_id: ChannelId,
    attachments: Vec<DiscordAttachment>,
}

#[async_trait]
impl ReplyChannel for DiscordChannel {
    async fn send(&self, reply: Reply) -> Result<()> {
        let mut builder = CreateMessage::new().content(reply.content);
        if let Some(file) = reply.attachment {
            // Discord 只根据扩展名决定是否预览图片
            builder = builder.add_file(CreateAttachment::bytes(file.data, file.name));
        }
        self.channel_id.send_message(&self.http, builder).await?;
        Ok(())
    }

    async fn download(&self, index: usize) -> Result<Attachment> {
        let source = self
            .attachments
            .get(index)
            .ok_or_else(|| anyhow!("message has no attachment #{}", index))?;
        let data = source.download().await?;
        Ok(Attachment::new(source.filename.clone(), data))
    }
}

/// Gateway event handler. Only converts and enqueues; the dispatcher worker
/// handles messages one at a time.
pub(crate) struct Handler {
    pub tx: mpsc::Sender<MessageEnvelope>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            "Logged in as {} ({} guilds)",
            ready.user.name,
            ready.guilds.len()
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let own_id = ctx.cache.current_user().id.to_string();
        let channel_name = resolve_channel_name(&ctx, msg.channel_id).await;

        let message = InboundMessage {
            author_id: msg.author.id.to_string(),
            author_name: msg.author.name.clone(),
            channel_name,
            text: msg.content.clone(),
            attachments: msg
                .attachments
                .iter()
                .map(|a| AttachmentMeta {
                    size: u64::from(a.size),
                })
                .collect(),
        };

        let envelope = MessageEnvelope {
            own_id,
            message,
            channel: DiscordChannel {
                http: ctx.http.clone(),
                channel_id: msg.channel_id,
                attachments: msg.attachments,
            },
        };

        if self.tx.send(envelope).await.is_err() {
            warn!("Dispatcher queue closed, dropping message {}", msg.id);
        }
    }
}

/// Guild channels resolve to their name; DMs and lookup failures to "".
async fn resolve_channel_name(ctx: &Context, channel_id: ChannelId) -> String {
    match channel_id.to_channel(ctx).await {
        Ok(Channel::Guild(channel)) => channel.name,
        Ok(_) => String::new(),
        Err(e) => {
            warn!("Failed to resolve channel {}: {:?}", channel_id, e);
            String::new()
        }
    }
}
