/// Media delivery to the chat platform
pub mod delivery;
/// Command, message, and inline-query handlers
pub mod handlers;
/// Retrying Telegram send/edit helpers
pub mod resilient;
