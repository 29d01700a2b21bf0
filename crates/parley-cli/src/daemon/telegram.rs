use std::sync::Arc;

use anyhow::{Context, Result};
use parley_ai::OpenAIClient;
use parley_core::channel::{TelegramApiError, TelegramChannel, TelegramConfig};
use parley_core::runtime::OrchestratorConfig;
use parley_core::{
    AuthorizationGate, ConversationStore, LlmCompletionClient, MessageOrchestrator,
    PromptAssembler, RelayConfig,
};
use tracing::{info, warn};

pub fn setup_telegram_channel(config: &RelayConfig) -> TelegramChannel {
    TelegramChannel::new(
        TelegramConfig::new(&config.telegram_bot_token)
            .with_polling_timeout(config.polling_timeout_secs),
    )
}

pub fn setup_llm_client(config: &RelayConfig) -> OpenAIClient {
    let client = OpenAIClient::new(&config.openai_api_key)
        .with_model(&config.model)
        .with_request_timeout(config.request_timeout);
    match &config.openai_base_url {
        Some(url) => client.with_base_url(url),
        None => client,
    }
}

pub fn setup_orchestrator(
    config: &RelayConfig,
    channel: Arc<TelegramChannel>,
) -> MessageOrchestrator {
    let completion = LlmCompletionClient::new(Arc::new(setup_llm_client(config)));
    MessageOrchestrator::new(
        AuthorizationGate::new(config.operator_id),
        Arc::new(ConversationStore::new(config.history_limit)),
        PromptAssembler::new(&config.system_prompt),
        Arc::new(completion),
        channel,
    )
    .with_config(OrchestratorConfig {
        send_typing_indicator: config.send_typing_indicator,
    })
}

/// Call getMe so a bad token shows up before polling starts.
pub async fn verify_bot(channel: &TelegramChannel) -> Result<String> {
    let me = channel
        .test_connection()
        .await
        .context("Telegram getMe failed; check TELEGRAM_BOT_TOKEN")?;
    let name = me
        .username
        .or(me.first_name)
        .unwrap_or_else(|| me.id.to_string());
    info!("Connected to Telegram as @{}", name);
    Ok(name)
}

/// Startup variant of [`verify_bot`]: a token Telegram refuses is fatal,
/// anything else (network, 5xx) is logged and left to the polling loop.
pub async fn verify_bot_at_startup(channel: &TelegramChannel) -> Result<()> {
    match verify_bot(channel).await {
        Ok(_) => Ok(()),
        Err(e)
            if e.downcast_ref::<TelegramApiError>()
                .is_some_and(TelegramApiError::is_invalid_token) =>
        {
            Err(e)
        }
        Err(e) => {
            warn!("{:#}", e);
            Ok(())
        }
    }
}
