mod dispatch;
mod drivers;
mod traits;

pub use dispatch::{
    DispatchConfig, DispatchError, Dispatcher, DEFAULT_ADMIN_CHANNEL, DEFAULT_MAX_ATTACHMENT_BYTES,
};
pub use drivers::discord::DiscordConfig;
pub use traits::{ChatDriver, ReplyChannel};

use drivers::discord::DiscordDriver;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone)]
pub enum PlatformConfig {
    Discord(DiscordConfig),
}

pub async fn start_with_cancel_token(
    config: PlatformConfig,
    dispatcher: Dispatcher,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    let driver: Box<dyn ChatDriver> = match config {
        PlatformConfig::Discord(discord_conf) => {
            info!("Initializing adapter for Discord...");
            Box::new(DiscordDriver::new(discord_conf))
        }
    };

    info!(
        "Admin commands accepted in #{} only",
        dispatcher.config().admin_channel
    );
    driver.run(Arc::new(dispatcher), cancel_token).await
}
