//! Runtime configuration from environment variables.

use std::env;
use std::path::PathBuf;
use tracing::warn;

use crate::Amount;
use crate::pricing::StoreConfig;

pub const STORE_DIR_VAR: &str = "CART_STORE_DIR";
pub const DELIVERY_FEE_VAR: &str = "CART_DELIVERY_FEE";
pub const FREE_DELIVERY_MIN_VAR: &str = "CART_FREE_DELIVERY_MIN";
pub const API_URL_VAR: &str = "CART_API_URL";

const DEFAULT_STORE_DIR: &str = ".cart-store";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Directory backing the file store.
    pub store_dir: PathBuf,
    /// Delivery settings used when no backend is configured or reachable.
    pub store: StoreConfig,
    /// Base URL of the storefront backend.
    pub api_url: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any variable source. Invalid values fall back to
    /// defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let store_dir = lookup(STORE_DIR_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));

        let delivery_fee = lookup(DELIVERY_FEE_VAR)
            .and_then(|v| parse_amount(DELIVERY_FEE_VAR, &v))
            .unwrap_or_default();

        let min_order_free_delivery = lookup(FREE_DELIVERY_MIN_VAR)
            .and_then(|v| parse_amount(FREE_DELIVERY_MIN_VAR, &v));

        let api_url = lookup(API_URL_VAR).filter(|v| !v.trim().is_empty());

        Self {
            store_dir,
            store: StoreConfig::new(delivery_fee, min_order_free_delivery),
            api_url,
        }
    }
}

fn parse_amount(var: &str, value: &str) -> Option<Amount> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(Amount::from_float(v)),
        _ => {
            warn!(var, value, "ignoring invalid amount");
            None
        }
    }
}
