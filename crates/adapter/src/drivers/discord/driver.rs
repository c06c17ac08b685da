use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serenity::all::{Client, GatewayIntents};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::handlers::{Handler, MessageEnvelope};
use crate::dispatch::Dispatcher;
use crate::traits::ChatDriver;

/// Inbound messages buffered while the dispatcher is busy.
const QUEUE_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct DiscordConfig {
    pub token: String,
}

pub struct DiscordDriver {
    config: DiscordConfig,
}

impl DiscordDriver {
    pub fn new(config: DiscordConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ChatDriver for DiscordDriver {
    async fn run(
        &self,
        dispatcher: Arc<Dispatcher>,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<MessageEnvelope>(QUEUE_CAPACITY);

        // --- 1. 任务：串行处理消息 ---
        let worker_cancel = cancel_token.clone();
        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    envelope = rx.recv() => {
                        let Some(MessageEnvelope { own_id, message, channel }) = envelope else {
                            break;
                        };
                        match dispatcher.handle(&own_id, &message, &channel).await {
                            Ok(()) => {}
                            Err(e) if e.is_fatal() => {
                                error!("Dispatcher hit an unrecoverable error: {}", e);
                                worker_cancel.cancel();
                                return Err(anyhow::Error::new(e));
                            }
                            Err(e) => warn!(
                                "Message from {} in #{} not fully handled: {}",
                                message.author_name, message.channel_name, e
                            ),
                        }
                    },
                    _ = worker_cancel.cancelled() => break,
                }
            }
            Ok(())
        });

        // --- 2. Gateway ---
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;
        let mut client = Client::builder(&self.config.token, intents)
            .event_handler(Handler { tx })
            .await
            .context("Failed to build Discord client")?;

        let shard_manager = client.shard_manager.clone();
        let shutdown_cancel = cancel_token.clone();
        tokio::spawn(async move {
            shutdown_cancel.cancelled().await;
            info!("Shutting down Discord shards...");
            shard_manager.shutdown_all().await;
        });

        info!("Connecting to Discord gateway...");
        let gateway_result = client.start().await;

        // --- 3. 优雅退出 ---
        cancel_token.cancel();
        let worker_result = worker.await.context("Dispatcher worker panicked")?;
        gateway_result.context("Discord gateway stopped with an error")?;
        worker_result
    }
}
