//! Channel Module - chat transport abstraction
//!
//! A [`Channel`] delivers outbound replies and yields inbound messages.
//! Telegram is the only transport; it is reached through long-polling.

mod chunk;
mod telegram;
mod traits;
mod types;

pub use chunk::{TELEGRAM_MAX_LEN, chunk_markdown, text_len};
pub use telegram::{TelegramApiError, TelegramChannel, TelegramConfig, TelegramUser};
pub use traits::{Channel, InboundStream};
pub use types::{ChannelType, InboundMessage, OutboundMessage, ParseMode};

#[cfg(test)]
pub use traits::mock;
