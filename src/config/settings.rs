//! Policy and payment configuration loading from config.toml
//!
//! The refund tiers are business figures, so they are always read from the
//! configuration file and validated before the server starts.
//!
//! ```toml
//! [[refund_tiers]]
//! min_days = 7
//! percentage = 100
//!
//! [payment]
//! bank_name = "MBBank"
//! account_number = "0123456789"
//! account_name = "TOUR COMPANY"
//! ```

use crate::core::refund::{RefundPolicy, RefundTier};
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Day thresholds of the cancellation refund policy
    pub refund_tiers: Vec<RefundTier>,
    /// Receiving bank account shown to customers
    pub payment: PaymentAccount,
}

/// Bank account customers transfer to.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentAccount {
    /// Bank short name
    pub bank_name: String,
    /// Receiving account number
    pub account_number: String,
    /// Account holder name
    pub account_name: String,
    /// Base URL of a QR image service, e.g. `https://qr.sepay.vn/img`
    #[serde(default)]
    pub qr_base_url: Option<String>,
}

impl Config {
    /// Builds the validated refund policy from the configured tiers.
    pub fn refund_policy(&self) -> Result<RefundPolicy> {
        RefundPolicy::new(self.refund_tiers.clone())
    }
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}
