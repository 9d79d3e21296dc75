//! Connects the settlement engine to the payment gateway's merchant API.
//!
//! [`HttpGateway`] implements the engine's [`ChargeGateway`] and [`PayoutGateway`] traits on top of
//! [`GatewayApi`]. The gateway sometimes reports business rejections with a non-2xx status and the usual
//! `{ "code", "message" }` body. Those are passed on to the engine as rejections, not transport errors.
use async_trait::async_trait;
use chrono::Utc;
use gateway_tools::{
    helpers::{gateway_amount, parse_gateway_amount},
    ChargeBody,
    GatewayApi,
    GatewayApiError,
    GatewayConfig,
    GatewayReply,
    OtpBody,
    PayoutBody,
    PayoutLine,
    RateReply,
};
use log::*;
use settlement_engine::{
    traits::{ChargeRequest, GatewayResponse, OtpRequest, PayoutBatch, ReferenceRate},
    ChargeGateway,
    GatewayError,
    PayoutGateway,
};

use crate::errors::ServerError;

#[derive(Clone)]
pub struct HttpGateway {
    api: GatewayApi,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let api = GatewayApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }
}

#[async_trait]
impl ChargeGateway for HttpGateway {
    async fn request_otp(&self, request: &OtpRequest) -> Result<GatewayResponse, GatewayError> {
        let body = otp_body(request);
        into_response(self.api.request_otp(&body).await)
    }

    async fn synchronous_charge(&self, request: &ChargeRequest) -> Result<GatewayResponse, GatewayError> {
        let body = charge_body(request);
        into_response(self.api.charge(&body).await)
    }

    async fn lookup_reference_rate(&self) -> Result<ReferenceRate, GatewayError> {
        let reply = self.api.reference_rate().await.map_err(into_gateway_error)?;
        into_reference_rate(reply)
    }
}

#[async_trait]
impl PayoutGateway for HttpGateway {
    async fn payout_batch(&self, batch: &PayoutBatch) -> Result<GatewayResponse, GatewayError> {
        let body = payout_body(batch);
        into_response(self.api.payout(&body).await)
    }
}

fn otp_body(request: &OtpRequest) -> OtpBody {
    OtpBody {
        order_id: request.order_id.to_string(),
        identity: request.identity.clone(),
        bank_code: request.bank_code.clone(),
        phone: request.phone.clone(),
        amount: gateway_amount(request.amount),
    }
}

fn charge_body(request: &ChargeRequest) -> ChargeBody {
    ChargeBody {
        order_id: request.order_id.to_string(),
        identity: request.identity.clone(),
        bank_code: request.bank_code.clone(),
        phone: request.phone.clone(),
        otp: request.otp.clone(),
        amount: gateway_amount(request.amount),
    }
}

fn payout_body(batch: &PayoutBatch) -> PayoutBody {
    let lines = batch
        .items
        .iter()
        .map(|item| PayoutLine {
            account: item.bank_account.clone(),
            amount: gateway_amount(item.amount),
            beneficiary: item.store_id.to_string(),
        })
        .collect();
    PayoutBody { reference: batch.reference.clone(), total: gateway_amount(batch.total), lines }
}

fn into_response(result: Result<GatewayReply, GatewayApiError>) -> Result<GatewayResponse, GatewayError> {
    match result {
        Ok(reply) => Ok(GatewayResponse { code: reply.code, message: reply.message, reference: reply.reference }),
        Err(GatewayApiError::QueryError { status, message }) => match serde_json::from_str::<GatewayReply>(&message) {
            Ok(reply) => {
                debug!("🌐️ Gateway answered HTTP {status} with code {}", reply.code);
                Ok(GatewayResponse { code: reply.code, message: reply.message, reference: reply.reference })
            },
            Err(_) => Err(GatewayError::Transport(format!("HTTP {status}. {message}"))),
        },
        Err(e) => Err(into_gateway_error(e)),
    }
}

fn into_gateway_error(e: GatewayApiError) -> GatewayError {
    match e {
        GatewayApiError::JsonError(s) => GatewayError::InvalidResponse(s),
        GatewayApiError::InvalidCurrencyAmount(s) => GatewayError::InvalidResponse(s),
        e => GatewayError::Transport(e.to_string()),
    }
}

fn into_reference_rate(reply: RateReply) -> Result<ReferenceRate, GatewayError> {
    let local_per_reference = parse_gateway_amount(&reply.rate).map_err(into_gateway_error)?;
    Ok(ReferenceRate { local_per_reference, as_of: reply.date.unwrap_or_else(Utc::now) })
}
