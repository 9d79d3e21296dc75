//! Fee split and balance bookkeeping for settled orders.
//!
//! For every settled order the platform keeps a commission and owes the rest to the store:
//!
//! * `fee = round(gross × rate, 2)`, rounding half away from zero
//! * `net = gross − fee`
//!
//! The store balance and the platform `accounting` balance (money held for stores until dispersal) grow by `net`; the
//! platform `available` balance (revenue) grows by `fee`. Finally one audit row is appended.
//!
//! The accountant runs after money has already moved, so it never returns an error. Each write is attempted on its
//! own and any failure is logged with enough context for an operator to repair the books by hand.
use std::sync::Arc;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Cents, NewPaymentTransaction, OrderId, PlatformAccount, PlatformBalances, StoreBalance, StoreId},
    traits::{LedgerManagement, SettlementDatabaseError},
};

/// 6.8%
pub const DEFAULT_FEE_RATE_BPS: i64 = 680;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    #[serde(with = "mps_common::decimal_amount")]
    pub gross: Cents,
    pub fee_rate_bps: i64,
    #[serde(with = "mps_common::decimal_amount")]
    pub fee: Cents,
    #[serde(with = "mps_common::decimal_amount")]
    pub net: Cents,
}

impl FeeSplit {
    pub fn compute(gross: Cents, fee_rate_bps: i64) -> Self {
        let fee = gross.apply_bps(fee_rate_bps);
        Self { gross, fee_rate_bps, fee, net: gross - fee }
    }
}

/// Which of the ledger writes for a settlement succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerOutcome {
    pub split: FeeSplit,
    pub store_credited: bool,
    pub revenue_credited: bool,
    pub float_credited: bool,
    pub audit_recorded: bool,
}

impl LedgerOutcome {
    pub fn is_complete(&self) -> bool {
        self.store_credited && self.revenue_credited && self.float_credited && self.audit_recorded
    }
}

pub struct LedgerAccountant<B> {
    db: Arc<B>,
    fee_rate_bps: i64,
}

impl<B> Clone for LedgerAccountant<B> {
    fn clone(&self) -> Self {
        Self { db: Arc::clone(&self.db), fee_rate_bps: self.fee_rate_bps }
    }
}

impl<B> std::fmt::Debug for LedgerAccountant<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerAccountant({} bps)", self.fee_rate_bps)
    }
}

impl<B> LedgerAccountant<B> {
    pub fn new(db: Arc<B>, fee_rate_bps: i64) -> Self {
        Self { db, fee_rate_bps }
    }

    pub fn fee_rate_bps(&self) -> i64 {
        self.fee_rate_bps
    }

    pub fn split(&self, gross: Cents) -> FeeSplit {
        FeeSplit::compute(gross, self.fee_rate_bps)
    }
}

impl<B> LedgerAccountant<B>
where B: LedgerManagement
{
    /// The store's balance record, or `None` if the store has never sold anything or registered a bank account.
    pub async fn store_balance(&self, store_id: &StoreId) -> Result<Option<StoreBalance>, SettlementDatabaseError> {
        self.db.fetch_store_balance(store_id).await
    }

    pub async fn platform_balances(&self) -> Result<PlatformBalances, SettlementDatabaseError> {
        self.db.fetch_platform_balances().await
    }

    /// Credits the store and the platform for a settled order and appends the audit record.
    pub async fn apply_settlement(
        &self,
        order_id: &OrderId,
        store_id: &StoreId,
        gross: Cents,
        reference: Option<&str>,
    ) -> LedgerOutcome {
        let split = self.split(gross);
        let reference_str = reference.unwrap_or("<none>");
        debug!(
            "📒️ Settling order {order_id} (ref {reference_str}): gross {}, fee {}, net {} for store {store_id}",
            split.gross, split.fee, split.net
        );

        let store_credited = match self.db.increment_store_balance(store_id, split.net).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "📒️ LEDGER INCOMPLETE. Could not credit {} to store {store_id} for order {order_id} (ref \
                     {reference_str}). {e}",
                    split.net
                );
                false
            },
        };
        let revenue_credited = match self.db.increment_platform_balance(PlatformAccount::Available, split.fee).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "📒️ LEDGER INCOMPLETE. Could not credit fee {} to the platform for order {order_id} (ref \
                     {reference_str}). {e}",
                    split.fee
                );
                false
            },
        };
        let float_credited = match self.db.increment_platform_balance(PlatformAccount::Accounting, split.net).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "📒️ LEDGER INCOMPLETE. Could not add {} to the platform float for order {order_id} (ref \
                     {reference_str}). {e}",
                    split.net
                );
                false
            },
        };
        let tx = NewPaymentTransaction {
            order_id: order_id.clone(),
            store_id: store_id.clone(),
            reference: reference.map(String::from),
            gross: split.gross,
            fee_rate_bps: split.fee_rate_bps,
            fee: split.fee,
            net: split.net,
        };
        let audit_recorded = match self.db.insert_payment_transaction(tx).await {
            Ok(tx) => {
                trace!("📒️ Payment transaction {} recorded for order {order_id}", tx.id);
                true
            },
            Err(e) => {
                error!(
                    "📒️ LEDGER INCOMPLETE. Could not record the payment transaction for order {order_id} (ref \
                     {reference_str}). {e}"
                );
                false
            },
        };
        let outcome = LedgerOutcome { split, store_credited, revenue_credited, float_credited, audit_recorded };
        if outcome.is_complete() {
            info!("📒️ Ledger updated for order {order_id}. Store {store_id} credited {}", split.net);
        }
        outcome
    }
}
