//! Event handling module
//!
//! Narrows gateway events down to the closed set the bot reacts to.

pub mod inbound;

pub use inbound::{BotEvent, InboundMessage};
