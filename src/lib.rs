pub mod commands;
pub mod config;
pub mod data;
pub mod handlers;
pub mod host;
pub mod logging;
pub mod plugin;
pub mod rules;
pub mod scheduler;
pub mod settings;
pub mod update;

// Crate name and tracing targets
pub const BOT_NAME: &str = "chat_autoreply";
pub const COMMAND_TARGET: &str = "chat_autoreply::command";
pub const ERROR_TARGET: &str = "chat_autoreply::error";
pub const EVENT_TARGET: &str = "chat_autoreply::handlers";
pub const REPLY_TARGET: &str = "chat_autoreply::reply";
pub const SCHEDULER_TARGET: &str = "chat_autoreply::scheduler";
pub const CONSOLE_TARGET: &str = "chat_autoreply";

pub use data::{Data, DataInner};
pub use plugin::{AutoReplyPlugin, ChatScope};
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
