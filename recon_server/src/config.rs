use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use recon_common::{helpers::parse_boolean_flag, Secret};
use recon_engine::fulfillment_objects::FulfillmentConfig;
use shipping_tools::ShippingConfig;

const DEFAULT_RECON_HOST: &str = "127.0.0.1";
const DEFAULT_RECON_PORT: u16 = 8360;
const DEFAULT_OUTBOX_GRACE_PERIOD: Duration = Duration::minutes(5);
const DEFAULT_OUTBOX_INTERVAL: StdDuration = StdDuration::from_secs(60);
const DEFAULT_OUTBOX_LEASE: Duration = Duration::minutes(5);
const DEFAULT_EXTERNAL_CALL_TIMEOUT: StdDuration = StdDuration::from_secs(10);
const DEFAULT_WEIGHT_TOLERANCE_GRAMS: i64 = 50;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Signs the body of every payment gateway webhook
    pub gateway_webhook_secret: Secret<String>,
    /// The gateway's key secret. Signs `order_id|payment_id` in buyer confirmations.
    pub confirmation_secret: Secret<String>,
    /// Signs the body of checkout intent submissions from the storefront
    pub checkout_secret: Secret<String>,
    /// Signs the body of every shipment provider callback
    pub shipping_webhook_secret: Secret<String>,
    /// If false, inbound signatures are not checked. **DANGER**
    pub hmac_checks: bool,
    pub shipping: ShippingConfig,
    /// Where notifications are delivered. If `None`, notifications are only logged.
    pub notification_url: Option<String>,
    /// Where cache invalidations are sent. If `None`, there is no cache to invalidate.
    pub cache_invalidation_url: Option<String>,
    pub fulfillment: FulfillmentConfig,
    /// Paid orders whose fulfillment has not been dispatched after this long are re-dispatched.
    pub outbox_grace_period: Duration,
    pub outbox_interval: StdDuration,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RECON_HOST.to_string(),
            port: DEFAULT_RECON_PORT,
            database_url: String::default(),
            gateway_webhook_secret: Secret::default(),
            confirmation_secret: Secret::default(),
            checkout_secret: Secret::default(),
            shipping_webhook_secret: Secret::default(),
            hmac_checks: true,
            shipping: ShippingConfig::default(),
            notification_url: None,
            cache_invalidation_url: None,
            fulfillment: FulfillmentConfig::default(),
            outbox_grace_period: DEFAULT_OUTBOX_GRACE_PERIOD,
            outbox_interval: DEFAULT_OUTBOX_INTERVAL,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("RECON_HOST").ok().unwrap_or_else(|| DEFAULT_RECON_HOST.into());
        let port = env::var("RECON_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for RECON_PORT. {e} Using the default, {DEFAULT_RECON_PORT}, \
                         instead."
                    );
                    DEFAULT_RECON_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_RECON_PORT);
        let database_url = env::var("RECON_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ RECON_DATABASE_URL is not set. Please set it to the URL for the reconciliation database.");
            String::default()
        });
        let gateway_webhook_secret = required_secret("RECON_GATEWAY_WEBHOOK_SECRET", "the gateway webhook secret");
        let confirmation_secret = required_secret("RECON_GATEWAY_KEY_SECRET", "the gateway key secret");
        let checkout_secret = required_secret("RECON_CHECKOUT_SECRET", "the storefront checkout secret");
        let shipping_webhook_secret =
            required_secret("RECON_SHIPPING_WEBHOOK_SECRET", "the shipment provider webhook secret");
        let hmac_checks = parse_boolean_flag(env::var("RECON_GATEWAY_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️🚨️🚨️ Signature checks on inbound webhooks are DISABLED. Never run production like this. 🚨️🚨️🚨️");
        }
        let shipping = ShippingConfig::new_from_env_or_default();
        let notification_url = optional_url("RECON_NOTIFICATION_URL", "Notifications will only be logged.");
        let cache_invalidation_url =
            optional_url("RECON_CACHE_INVALIDATION_URL", "Catalog cache invalidation is disabled.");
        let call_timeout = env_seconds("RECON_EXTERNAL_CALL_TIMEOUT", DEFAULT_EXTERNAL_CALL_TIMEOUT.as_secs());
        let weight_tolerance_grams = env::var("RECON_WEIGHT_TOLERANCE_GRAMS")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for RECON_WEIGHT_TOLERANCE_GRAMS. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_WEIGHT_TOLERANCE_GRAMS);
        #[allow(clippy::cast_possible_wrap)]
        let outbox_lease =
            Duration::seconds(env_seconds("RECON_OUTBOX_LEASE", DEFAULT_OUTBOX_LEASE.num_seconds() as u64) as i64);
        let fulfillment = FulfillmentConfig {
            call_timeout: StdDuration::from_secs(call_timeout),
            weight_tolerance_grams,
            outbox_lease,
            ..FulfillmentConfig::default()
        };
        #[allow(clippy::cast_possible_wrap)]
        let outbox_grace_period = Duration::seconds(
            env_seconds("RECON_OUTBOX_GRACE_PERIOD", DEFAULT_OUTBOX_GRACE_PERIOD.num_seconds() as u64) as i64,
        );
        let outbox_interval =
            StdDuration::from_secs(env_seconds("RECON_OUTBOX_INTERVAL", DEFAULT_OUTBOX_INTERVAL.as_secs()).max(1));
        let use_x_forwarded_for = parse_boolean_flag(env::var("RECON_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("RECON_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            gateway_webhook_secret,
            confirmation_secret,
            checkout_secret,
            shipping_webhook_secret,
            hmac_checks,
            shipping,
            notification_url,
            cache_invalidation_url,
            fulfillment,
            outbox_grace_period,
            outbox_interval,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

fn required_secret(name: &str, what: &str) -> Secret<String> {
    let value = env::var(name).ok().unwrap_or_else(|| {
        error!("🪛️ {name} is not set. Please set it to {what}. Requests signed with it will be rejected.");
        String::default()
    });
    Secret::new(value)
}

fn optional_url(name: &str, fallback: &str) -> Option<String> {
    match env::var(name).ok().filter(|s| !s.trim().is_empty()) {
        Some(url) => {
            info!("🪛️ {name} is {url}");
            Some(url)
        },
        None => {
            info!("🪛️ {name} is not set. {fallback}");
            None
        },
    }
}

fn env_seconds(name: &str, default: u64) -> u64 {
    env::var(name)
        .map_err(|_| info!("🪛️ {name} is not set. Using the default value of {default}s."))
        .and_then(|s| s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}")))
        .ok()
        .unwrap_or(default)
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
