#![deny(missing_docs)]
//! TikTok Relay Bot - Rust implementation
//!
//! A Telegram bot that takes a short-form video link, resolves it to a
//! direct media URL through a mirror service driven by a headless browser,
//! and sends the video back — either immediately (direct message) or
//! lazily after the user commits to an inline suggestion.

/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// Browser-driven media resolution pipeline
pub mod resolver;
/// Shared helpers (fingerprinting, retries)
pub mod utils;
