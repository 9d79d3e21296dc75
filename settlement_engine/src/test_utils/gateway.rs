use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use log::*;

use crate::{
    db_types::{Cents, OrderId},
    traits::{
        ChargeGateway,
        ChargeRequest,
        GatewayError,
        GatewayResponse,
        OtpRequest,
        PayoutBatch,
        PayoutGateway,
        ReferenceRate,
    },
};

/// A record of one call made to a [`ScriptedGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Otp { order_id: OrderId, amount: Cents },
    Charge { order_id: OrderId, amount: Cents },
    Payout { reference: String, total: Cents, items: usize },
    Rate,
}

#[derive(Default)]
struct Script {
    otp: VecDeque<Result<GatewayResponse, GatewayError>>,
    charges: VecDeque<Result<GatewayResponse, GatewayError>>,
    payouts: VecDeque<Result<GatewayResponse, GatewayError>>,
    rate: Option<Cents>,
    charge_delay: Option<Duration>,
    calls: Vec<GatewayCall>,
}

/// An in-memory gateway. Each call pops the next queued response for its kind; when the queue is empty the call is
/// approved. Every call is recorded so tests can assert on exactly what reached the gateway.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("gateway script lock poisoned")
    }

    pub fn queue_otp(&self, response: Result<GatewayResponse, GatewayError>) -> &Self {
        self.script().otp.push_back(response);
        self
    }

    pub fn queue_charge(&self, response: Result<GatewayResponse, GatewayError>) -> &Self {
        self.script().charges.push_back(response);
        self
    }

    pub fn queue_payout(&self, response: Result<GatewayResponse, GatewayError>) -> &Self {
        self.script().payouts.push_back(response);
        self
    }

    pub fn set_rate(&self, local_per_reference: Cents) -> &Self {
        self.script().rate = Some(local_per_reference);
        self
    }

    /// Holds every charge for `delay` before answering, to widen race windows in tests.
    pub fn set_charge_delay(&self, delay: Duration) -> &Self {
        self.script().charge_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.script().calls.clone()
    }

    pub fn charge_count(&self) -> usize {
        self.script().calls.iter().filter(|c| matches!(c, GatewayCall::Charge { .. })).count()
    }

    pub fn payout_count(&self) -> usize {
        self.script().calls.iter().filter(|c| matches!(c, GatewayCall::Payout { .. })).count()
    }
}

fn approved(prefix: &str, count: usize) -> Result<GatewayResponse, GatewayError> {
    Ok(GatewayResponse::approved(format!("{prefix}-{count:04}")))
}

#[async_trait]
impl ChargeGateway for ScriptedGateway {
    async fn request_otp(&self, request: &OtpRequest) -> Result<GatewayResponse, GatewayError> {
        let mut script = self.script();
        script.calls.push(GatewayCall::Otp { order_id: request.order_id.clone(), amount: request.amount });
        let n = script.calls.len();
        script.otp.pop_front().unwrap_or_else(|| approved("OTP", n))
    }

    async fn synchronous_charge(&self, request: &ChargeRequest) -> Result<GatewayResponse, GatewayError> {
        let (response, delay) = {
            let mut script = self.script();
            script.calls.push(GatewayCall::Charge { order_id: request.order_id.clone(), amount: request.amount });
            let n = script.calls.len();
            let response = script.charges.pop_front().unwrap_or_else(|| approved("CHG", n));
            (response, script.charge_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        trace!("🧪️ Scripted charge for {} answered with {response:?}", request.order_id);
        response
    }

    async fn lookup_reference_rate(&self) -> Result<ReferenceRate, GatewayError> {
        let mut script = self.script();
        script.calls.push(GatewayCall::Rate);
        match script.rate {
            Some(rate) => Ok(ReferenceRate::new(rate)),
            None => Err(GatewayError::Transport("no rate scripted".into())),
        }
    }
}

#[async_trait]
impl PayoutGateway for ScriptedGateway {
    async fn payout_batch(&self, batch: &PayoutBatch) -> Result<GatewayResponse, GatewayError> {
        let mut script = self.script();
        script.calls.push(GatewayCall::Payout {
            reference: batch.reference.clone(),
            total: batch.total,
            items: batch.items.len(),
        });
        let n = script.calls.len();
        script.payouts.pop_front().unwrap_or_else(|| approved("PAY", n))
    }
}
