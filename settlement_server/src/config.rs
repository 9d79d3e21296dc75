use std::{env, net::IpAddr, time::Duration};

use gateway_tools::GatewayConfig;
use log::*;
use mps_common::{
    helpers::{parse_boolean_flag, parse_numeric_setting},
    Secret,
};
use settlement_engine::{DEFAULT_BANK_ACCOUNT_DIGITS, DEFAULT_FEE_RATE_BPS, DEFAULT_PAYMENT_WINDOW};

const DEFAULT_MPS_HOST: &str = "127.0.0.1";
const DEFAULT_MPS_PORT: u16 = 8460;
pub const DEFAULT_WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// How long an order may sit in `pending_payment` before it expires.
    pub payment_window: Duration,
    /// The platform commission, in basis points of the gross amount.
    pub fee_rate_bps: i64,
    /// Stores are only paid out into bank accounts with exactly this many digits.
    pub bank_account_digits: usize,
    /// Expire orders whose payment window lapsed while the server was down.
    pub sweep_stale_orders: bool,
    pub webhooks: WebhookConfig,
    pub gateway: GatewayConfig,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    /// If supplied, webhook and administrative requests are only accepted from these addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
    /// Shared secret that the gateway sends in `secret_header`. An empty secret disables the check.
    pub secret: Secret<String>,
    pub secret_header: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { whitelist: None, secret: Secret::default(), secret_header: DEFAULT_WEBHOOK_SECRET_HEADER.to_string() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPS_HOST.to_string(),
            port: DEFAULT_MPS_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            payment_window: DEFAULT_PAYMENT_WINDOW,
            fee_rate_bps: DEFAULT_FEE_RATE_BPS,
            bank_account_digits: DEFAULT_BANK_ACCOUNT_DIGITS,
            sweep_stale_orders: false,
            webhooks: WebhookConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPS_HOST").ok().unwrap_or_else(|| DEFAULT_MPS_HOST.into());
        let port = env::var("MPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MPS_PORT. {e} Using the default, {DEFAULT_MPS_PORT}, instead."
                    );
                    DEFAULT_MPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MPS_PORT);
        let database_url = env::var("MPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MPS_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("MPS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("MPS_USE_FORWARDED").ok(), false);
        let sweep_stale_orders = parse_boolean_flag(env::var("MPS_SWEEP_STALE_ORDERS").ok(), false);
        let payment_window = numeric_setting::<u64>("MPS_PAYMENT_WINDOW_SECS")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PAYMENT_WINDOW);
        let fee_rate_bps = match numeric_setting::<i64>("MPS_FEE_RATE_BPS") {
            Some(bps) if (0..=10_000).contains(&bps) => bps,
            Some(bps) => {
                warn!("🪛️ MPS_FEE_RATE_BPS must be between 0 and 10000, not {bps}. Using {DEFAULT_FEE_RATE_BPS}.");
                DEFAULT_FEE_RATE_BPS
            },
            None => DEFAULT_FEE_RATE_BPS,
        };
        let bank_account_digits =
            numeric_setting::<usize>("MPS_BANK_ACCOUNT_DIGITS").unwrap_or(DEFAULT_BANK_ACCOUNT_DIGITS);
        let webhooks = WebhookConfig::from_env_or_defaults();
        let gateway = GatewayConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            payment_window,
            fee_rate_bps,
            bank_account_digits,
            sweep_stale_orders,
            webhooks,
            gateway,
        }
    }
}

impl WebhookConfig {
    pub fn from_env_or_defaults() -> Self {
        let secret = env::var("MPS_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            warn!(
                "🚨️ MPS_WEBHOOK_SECRET is not set. Webhook and administrative requests will not be checked for the \
                 shared secret."
            );
            String::default()
        });
        let secret = Secret::new(secret);
        let secret_header =
            env::var("MPS_WEBHOOK_SECRET_HEADER").ok().unwrap_or_else(|| DEFAULT_WEBHOOK_SECRET_HEADER.to_string());
        let whitelist = env::var("MPS_WEBHOOK_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The webhook IP whitelist was configured, but is empty.  The server will run, but won't \
                     authorise any incoming webhooks."
                );
            },
            None => {
                info!("🪛️ No webhook IP whitelist is set. Only the shared secret will be checked.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Webhook IP whitelist: {addrs}");
            },
        }
        Self { whitelist, secret, secret_header }
    }
}

fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0"].contains(&s.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ Webhook IP whitelist is disabled. If this is not what you want, set MPS_WEBHOOK_IP_WHITELIST to a \
             comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let ip_addrs = s
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            s.parse::<IpAddr>()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in MPS_WEBHOOK_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

fn numeric_setting<T>(var: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match parse_numeric_setting::<T>(env::var(var).ok()) {
        Ok(Some(v)) => Some(v),
        Ok(None) => {
            debug!("🪛️ {var} is not set. Using the default value.");
            None
        },
        Err(e) => {
            warn!("🪛️ Invalid configuration value for {var}. {e} Using the default value.");
            None
        },
    }
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
