//! Core contracts for the LINE link bot.
//!
//! This crate owns the pieces of webhook handling that do not touch the network: verifying the
//! `x-line-signature` header, decoding a delivery into typed [`InboundEvent`]s, and the message
//! shapes the bot sends back through the messaging API.
pub mod error;
pub mod event;
pub mod message;
pub mod signature;

pub use error::*;
pub use event::*;
pub use message::*;
pub use signature::*;
