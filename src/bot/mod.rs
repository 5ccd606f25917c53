//! Bot module for handling Telegram interactions
//!
//! - `message_handler`: routes inbound messages through the conversation state machine
//! - `commands`: slash commands and keyboard labels
//! - `ui_builder`: keyboards and reply texts
//! - `inbound` / `delivery`: transport-independent message types and the send/fetch seam
//! - `telegram`: the teloxide-backed [`Delivery`] implementation

pub mod commands;
pub mod delivery;
pub mod inbound;
pub mod message_handler;
pub mod telegram;
pub mod ui_builder;

pub use delivery::Delivery;
pub use inbound::{InboundMessage, MessageContent, PhotoVariant};
pub use message_handler::{HandlerSettings, RequestHandler};
pub use telegram::{inbound_from_telegram, TelegramDelivery};
pub use ui_builder::Keyboard;
