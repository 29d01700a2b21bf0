mod telegram;

use anyhow::Result;
use parley_core::RelayConfig;
use parley_core::runtime::{MessageHandlerConfig, run_message_handler};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use telegram::{setup_orchestrator, setup_telegram_channel, verify_bot, verify_bot_at_startup};

/// Run the relay until Ctrl+C or SIGTERM.
pub async fn run(config: RelayConfig) -> Result<()> {
    info!(
        "Starting relay for operator {} (model {}, history {})",
        config.operator_id, config.model, config.history_limit
    );
    if config.history_limit % 2 == 1 {
        warn!(
            "History limit {} is odd; trimming may leave a reply without its question",
            config.history_limit
        );
    }

    let channel = Arc::new(setup_telegram_channel(&config));
    verify_bot_at_startup(&channel).await?;

    let orchestrator = Arc::new(setup_orchestrator(&config, channel.clone()));
    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    println!("Parley running. Press Ctrl+C to stop.");

    let stats = run_message_handler(
        channel.clone(),
        orchestrator,
        MessageHandlerConfig::default(),
        shutdown,
    )
    .await;
    channel.stop_polling();

    println!(
        "Parley stopped ({} messages handled{})",
        stats.dispatched,
        if stats.abandoned > 0 {
            format!(", {} abandoned", stats.abandoned)
        } else {
            String::new()
        }
    );
    Ok(())
}

/// Validate the Telegram token without starting the relay.
pub async fn check(config: RelayConfig) -> Result<()> {
    let channel = setup_telegram_channel(&config);
    let name = verify_bot(&channel).await?;
    println!("Configuration OK");
    println!("  Bot:      @{}", name);
    println!("  Operator: {}", config.operator_id);
    println!("  Model:    {}", config.model);
    println!("  History:  {} turns", config.history_limit);
    Ok(())
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutting down, finishing in-flight exchanges");
    shutdown.cancel();
}
