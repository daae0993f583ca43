use std::time::Duration;

use log::*;
use recon_common::Secret;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ShippingConfig {
    /// The provider's API root, e.g. `https://apiv2.shipping.example/v1/external`
    pub base_url: String,
    pub api_token: Secret<String>,
    /// The warehouse nickname registered with the provider
    pub pickup_location: String,
    pub timeout: Duration,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8370/v1/external".to_string(),
            api_token: Secret::default(),
            pickup_location: "Primary".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ShippingConfig {
    pub fn new_from_env_or_default() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("RECON_SHIPPING_API_URL").unwrap_or_else(|_| {
            warn!("🚚️ RECON_SHIPPING_API_URL not set, using {}", defaults.base_url);
            defaults.base_url.clone()
        });
        let api_token = Secret::new(std::env::var("RECON_SHIPPING_API_TOKEN").unwrap_or_else(|_| {
            warn!("🚚️ RECON_SHIPPING_API_TOKEN not set, using (probably useless) default");
            "0000000000".to_string()
        }));
        let pickup_location = std::env::var("RECON_SHIPPING_PICKUP_LOCATION").unwrap_or_else(|_| {
            info!("🚚️ RECON_SHIPPING_PICKUP_LOCATION not set, using {}", defaults.pickup_location);
            defaults.pickup_location.clone()
        });
        let timeout = std::env::var("RECON_EXTERNAL_CALL_TIMEOUT")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🚚️ Invalid value for RECON_EXTERNAL_CALL_TIMEOUT: {s}. {e}"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        Self { base_url: base_url.trim_end_matches('/').to_string(), api_token, pickup_location, timeout }
    }
}
