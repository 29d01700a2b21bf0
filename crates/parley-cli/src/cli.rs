use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use parley_core::RelaySettings;

#[derive(Parser)]
#[command(name = "parley")]
#[command(version, about = "Parley - private Telegram relay to an LLM")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to ~/.config/parley/config.toml)
    #[arg(long, global = true, env = "PARLEY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write logs to daily rolling files in this directory instead of stderr
    #[arg(long, global = true, env = "PARLEY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub relay: RelayArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the relay (default)
    Run,

    /// Validate configuration and the Telegram token, then exit
    Check,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Relay settings; each flag falls back to its environment variable.
#[derive(Args, Debug, Default)]
pub struct RelayArgs {
    /// Telegram bot token
    #[arg(long, global = true, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_token: Option<String>,

    /// OpenAI API key
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Telegram user ID of the operator
    #[arg(long, global = true, env = "ALLOWED_USER_ID")]
    pub allowed_user_id: Option<String>,

    /// Completion model
    #[arg(long, global = true, env = "OPENAI_MODEL")]
    pub model: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Turns of history kept per conversation
    #[arg(long, global = true, env = "PARLEY_HISTORY_LIMIT")]
    pub history_limit: Option<usize>,

    /// System instruction sent with every prompt
    #[arg(long, global = true, env = "PARLEY_SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// Do not show a typing indicator while waiting for the model
    #[arg(long, global = true)]
    pub no_typing: bool,
}

impl RelayArgs {
    pub fn to_settings(&self) -> RelaySettings {
        RelaySettings {
            telegram_bot_token: self.telegram_token.clone(),
            openai_api_key: self.openai_api_key.clone(),
            allowed_user_id: self.allowed_user_id.clone(),
            openai_model: self.model.clone(),
            openai_base_url: self.openai_base_url.clone(),
            history_limit: self.history_limit,
            system_prompt: self.system_prompt.clone(),
            send_typing_indicator: self.no_typing.then_some(false),
            ..Default::default()
        }
    }
}
