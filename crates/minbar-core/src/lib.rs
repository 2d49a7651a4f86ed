//! Core domain + application logic for the minbar relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram / AssemblyAI /
//! OpenAI live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod lang;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod prompt;

pub use errors::{Error, Result};
