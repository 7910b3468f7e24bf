//! Chat transports that feed inbound lines to the dispatcher

pub mod telegram;

pub use telegram::TelegramClient;
