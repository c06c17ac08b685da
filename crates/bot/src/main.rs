mod config;

use anyhow::Context;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{Settings, ADMIN_CHANNEL_ENV_VAR};
use adapter::{DiscordConfig, Dispatcher, PlatformConfig, DEFAULT_ADMIN_CHANNEL};
use storage::Db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::new().context("Failed to load configuration")?;
    settings.validate()?;
    // 没有 token 直接退出，不打开数据库也不连接
    let token = settings.require_token()?.to_string();

    if settings.bot.admin_channel == DEFAULT_ADMIN_CHANNEL {
        info!(
            "Using the default admin channel ({}). To change it, set {}=<channel name>",
            DEFAULT_ADMIN_CHANNEL, ADMIN_CHANNEL_ENV_VAR
        );
    }
    info!(
        "Admin channel is '{}'. Only trigger lookups are answered elsewhere.",
        settings.bot.admin_channel
    );
    info!("Flair log channel is '{}'", settings.bot.log_channel);

    let db = Db::new(&settings.database.url)
        .await
        .with_context(|| format!("Failed to open database {}", settings.database.url))?;
    let dispatcher = Dispatcher::new(db.clone(), settings.dispatch_config());

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let result = adapter::start_with_cancel_token(
        PlatformConfig::Discord(DiscordConfig { token }),
        dispatcher,
        cancel_token,
    )
    .await;

    if let Err(e) = &result {
        error!("Bot stopped: {:#}", e);
    }
    db.close().await;
    info!("Bye.");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
