//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Handles `/start` links, open answers and unsupported messages
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `presenter`: Delivers poll effects to the chat
//! - `ui_builder`: Creates keyboards and formats messages

pub mod callback_handler;
pub mod message_handler;
pub mod presenter;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

pub use presenter::TelegramPresenter;
