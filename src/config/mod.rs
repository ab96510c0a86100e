/// Database configuration and connection management
pub mod database;

/// Refund policy and payment account loading from config.toml
pub mod settings;

/// Server settings from environment variables
pub mod server;
