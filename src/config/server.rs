//! Server settings loaded from environment variables.
//!
//! Secrets such as the webhook key stay in the environment (or `.env`) and are
//! never written to `config.toml`.

use crate::errors::{Error, Result};
use std::{env, net::SocketAddr};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Reads `name`, falling back to `default` when unset. A value that is not
/// valid unicode is an error rather than silently replaced.
fn var_or(name: &str, default: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) => Ok(value),
        Err(env::VarError::NotPresent) => Ok(default.to_string()),
        Err(e) => Err(e.into()),
    }
}

/// Process-level settings for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Address the HTTP listener binds to
    pub bind_address: SocketAddr,
    /// Shared secret the payment gateway must present, if configured
    pub webhook_api_key: Option<String>,
    /// Location of the policy/payment configuration file
    pub config_path: String,
}

impl ServerSettings {
    /// Reads `BIND_ADDRESS`, `WEBHOOK_API_KEY` and `CONFIG_PATH`.
    pub fn from_env() -> Result<Self> {
        let raw_address = var_or("BIND_ADDRESS", DEFAULT_BIND_ADDRESS)?;
        let bind_address = raw_address.parse().map_err(|e| Error::Config {
            message: format!("Invalid BIND_ADDRESS {raw_address:?}: {e}"),
        })?;

        let webhook_api_key = Some(var_or("WEBHOOK_API_KEY", "")?)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let config_path = var_or("CONFIG_PATH", DEFAULT_CONFIG_PATH)?;

        Ok(Self {
            bind_address,
            webhook_api_key,
            config_path,
        })
    }
}
