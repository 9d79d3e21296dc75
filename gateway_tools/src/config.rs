use log::*;
use mps_common::Secret;

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Base URL of the merchant API, without a trailing slash
    pub base_url: String,
    pub api_key: Secret<String>,
    pub timeout_secs: u64,
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("MPS_GATEWAY_URL").unwrap_or_else(|_| {
            warn!("MPS_GATEWAY_URL not set, using (probably useless) default");
            "https://gateway.example.com/api/v1".to_string()
        });
        let api_key = Secret::new(std::env::var("MPS_GATEWAY_API_KEY").unwrap_or_else(|_| {
            warn!("MPS_GATEWAY_API_KEY not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        let timeout_secs = std::env::var("MPS_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("Invalid value for MPS_GATEWAY_TIMEOUT_SECS ({s}). {e}. Using the default."))
                    .ok()
            })
            .unwrap_or(30);
        Self { base_url: base_url.trim_end_matches('/').to_string(), api_key, timeout_secs }
    }
}
