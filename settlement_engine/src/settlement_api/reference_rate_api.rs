use std::{fmt::Debug, sync::Arc};

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::Cents,
    settlement_api::errors::OrderFlowError,
    traits::{ChargeGateway, GatewayError, ReferenceRate},
};

/// An amount in the reference currency and its local equivalent at `rate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedAmount {
    #[serde(with = "mps_common::decimal_amount")]
    pub reference: Cents,
    #[serde(with = "mps_common::decimal_amount")]
    pub local: Cents,
    pub rate: ReferenceRate,
}

/// Prices orders that are quoted in the reference currency, using the gateway's published exchange rate.
pub struct ReferenceRateApi<G> {
    gateway: Arc<G>,
}

impl<G> Debug for ReferenceRateApi<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReferenceRateApi")
    }
}

impl<G> Clone for ReferenceRateApi<G> {
    fn clone(&self) -> Self {
        Self { gateway: Arc::clone(&self.gateway) }
    }
}

impl<G> ReferenceRateApi<G>
where G: ChargeGateway
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub async fn current_rate(&self) -> Result<ReferenceRate, GatewayError> {
        let rate = self.gateway.lookup_reference_rate().await?;
        if !rate.local_per_reference.is_positive() {
            let msg = format!("Exchange rate {} is not positive", rate.local_per_reference);
            return Err(GatewayError::InvalidResponse(msg));
        }
        trace!("💱️ Reference rate is {} as of {}", rate.local_per_reference, rate.as_of);
        Ok(rate)
    }

    /// The local amount for `reference`, at the current rate.
    pub async fn price(&self, reference: Cents) -> Result<PricedAmount, OrderFlowError> {
        let rate = self.current_rate().await?;
        let local = rate.to_local(reference).map_err(|e| OrderFlowError::InvalidOrder(e.to_string()))?;
        debug!("💱️ {reference} priced at {local} (rate {})", rate.local_per_reference);
        Ok(PricedAmount { reference, local, rate })
    }
}
