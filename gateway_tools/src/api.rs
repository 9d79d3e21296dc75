use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::GatewayConfig,
    data_objects::{ChargeBody, GatewayReply, OtpBody, PayoutBody, RateReply},
    GatewayApiError,
};

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let token = format!("Bearer {}", config.api_key.reveal());
        let val = HeaderValue::from_str(&token).map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("Sending gateway request: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| GatewayApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("Gateway request successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    pub async fn request_otp(&self, body: &OtpBody) -> Result<GatewayReply, GatewayApiError> {
        debug!("Requesting OTP for order {}", body.order_id);
        self.rest_query(Method::POST, "/otp", Some(body)).await
    }

    pub async fn charge(&self, body: &ChargeBody) -> Result<GatewayReply, GatewayApiError> {
        debug!("Charging {} for order {}", body.amount, body.order_id);
        let reply: GatewayReply = self.rest_query(Method::POST, "/charges", Some(body)).await?;
        info!("Charge for order {} answered with code {}", body.order_id, reply.code);
        Ok(reply)
    }

    pub async fn reference_rate(&self) -> Result<RateReply, GatewayApiError> {
        self.rest_query::<RateReply, ()>(Method::GET, "/rates/reference", None).await
    }

    pub async fn payout(&self, body: &PayoutBody) -> Result<GatewayReply, GatewayApiError> {
        debug!("Sending payout {} of {} to {} account(s)", body.reference, body.total, body.lines.len());
        let reply: GatewayReply = self.rest_query(Method::POST, "/payouts", Some(body)).await?;
        info!("Payout {} answered with code {}", body.reference, reply.code);
        Ok(reply)
    }
}
