use colored::Colorize;
use parley_core::ConfigError;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(config_err) = err.downcast_ref::<ConfigError>() {
        let key = match config_err {
            ConfigError::Missing(key) | ConfigError::Invalid { key, .. } => *key,
        };
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Set {} in the environment, a .env file, or with a flag:", key);
        eprintln!("  {} export {}=<value>", "$".dimmed(), key);
        eprintln!("  {} parley --help", "$".dimmed());
    }

    let msg = format!("{:#}", err).to_lowercase();

    if msg.contains("getme failed") || msg.contains("unauthorized") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check the bot token from @BotFather and try again.");
    }

    if msg.contains("connection refused") || msg.contains("network") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check your internet connection and try again.");
    }

    std::process::exit(1);
}
