//! Paying stores what they are owed.
//!
//! A dispersal is a single gateway payout batch covering every store with a positive balance and a valid bank
//! account. The amounts are frozen into dispersal items *before* the gateway is called, so sales that settle while the
//! payout is in flight are not swept into it, and only the frozen amounts are deducted afterwards.
use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::{DispersalBatch, DispersalStatus, NewDispersalItem, PlatformAccount, StoreId},
    settlement_api::{
        errors::DispersalError,
        order_objects::{DispersalOutcome, DispersalPreview, EligibleStore},
    },
    traits::{DispersalManagement, LedgerManagement, PayoutBatch, PayoutGateway, SettlementDatabaseError},
};

/// Length of a national bank account number.
pub const DEFAULT_BANK_ACCOUNT_DIGITS: usize = 20;

/// `true` if `account` consists of exactly `digits` decimal digits.
pub fn is_valid_bank_account(account: &str, digits: usize) -> bool {
    account.len() == digits && account.bytes().all(|b| b.is_ascii_digit())
}

pub struct DispersalApi<B, P> {
    db: Arc<B>,
    gateway: Arc<P>,
    account_digits: usize,
}

impl<B, P> Debug for DispersalApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DispersalApi")
    }
}

impl<B, P> Clone for DispersalApi<B, P> {
    fn clone(&self) -> Self {
        Self { db: Arc::clone(&self.db), gateway: Arc::clone(&self.gateway), account_digits: self.account_digits }
    }
}

impl<B, P> DispersalApi<B, P> {
    pub fn new(db: Arc<B>, gateway: Arc<P>, account_digits: usize) -> Self {
        Self { db, gateway, account_digits }
    }
}

impl<B, P> DispersalApi<B, P>
where
    B: DispersalManagement + LedgerManagement,
    P: PayoutGateway,
{
    /// The stores that would be paid, and how much, if a dispersal ran now.
    pub async fn preview(&self) -> Result<DispersalPreview, DispersalError> {
        let balances = self.db.fetch_stores_with_balance().await?;
        let stores = balances
            .into_iter()
            .filter(|b| b.balance.is_positive())
            .filter_map(|b| match b.bank_account {
                Some(account) if is_valid_bank_account(&account, self.account_digits) => {
                    Some(EligibleStore { store_id: b.store_id, bank_account: account, amount: b.balance })
                },
                _ => {
                    debug!("💸️ Store {} has {} but no valid bank account. Skipping", b.store_id, b.balance);
                    None
                },
            })
            .collect::<Vec<_>>();
        Ok(DispersalPreview::new(stores))
    }

    /// Pays every eligible store in one gateway batch.
    ///
    /// The batch is recorded as `pending` before the gateway is called. If the gateway accepts it, each store (and the
    /// platform float) is debited by the frozen amount and the dispersal is marked `success`. If the gateway rejects
    /// it or cannot be reached, the dispersal is marked `failed` and no balance changes.
    ///
    /// Only one dispersal runs at a time. While a batch is `pending`, a second call fails with
    /// [`DispersalError::DispersalInProgress`] and pays nothing. The batch stays pending until its balances are
    /// debited, so the next dispersal never sees balances that have already been paid.
    pub async fn execute(&self, reference: &str) -> Result<DispersalOutcome, DispersalError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(DispersalError::MissingReference);
        }
        let preview = self.preview().await?;
        if preview.is_empty() {
            return Err(DispersalError::NoEligibleStores);
        }
        let items = preview
            .stores
            .into_iter()
            .map(|s| NewDispersalItem { store_id: s.store_id, bank_account: s.bank_account, amount: s.amount })
            .collect::<Vec<_>>();
        let batch = self.db.create_dispersal(reference, &items).await.map_err(|e| match e {
            SettlementDatabaseError::DispersalInProgress => {
                warn!("💸️ Dispersal {reference} refused. Another dispersal is still pending");
                DispersalError::DispersalInProgress
            },
            SettlementDatabaseError::BalanceChanged(store_id) => {
                warn!("💸️ Dispersal {reference} refused. The balance of store {store_id} has changed");
                DispersalError::BalanceChanged(store_id)
            },
            e => DispersalError::DatabaseError(e),
        })?;
        let id = batch.dispersal.id;
        let total = batch.dispersal.total;
        info!("💸️ Dispersal #{id} ({reference}) created for {} store(s), {total}", batch.items.len());

        let payout = PayoutBatch::new(reference, &batch.items, total);
        match self.gateway.payout_batch(&payout).await {
            Ok(response) if response.is_success() => {
                self.debit_balances(&batch).await;
                let batch = self.finalize(batch, DispersalStatus::Success, None).await;
                info!("💸️ Dispersal #{id} paid out");
                Ok(DispersalOutcome::Completed { batch })
            },
            Ok(response) => {
                let message =
                    response.message.clone().unwrap_or_else(|| format!("Rejected with code {}", response.code));
                warn!("💸️ Dispersal #{id} rejected by the gateway. {message}");
                let batch = self.finalize(batch, DispersalStatus::Failed, Some(message.clone())).await;
                Ok(DispersalOutcome::Rejected { batch, code: response.code, message })
            },
            Err(e) => {
                error!("💸️ Dispersal #{id} could not be sent to the gateway. {e}");
                self.finalize(batch, DispersalStatus::Failed, Some(e.to_string())).await;
                Err(DispersalError::GatewayError(e))
            },
        }
    }

    /// Registers the account that `store_id` is paid into. The account must have exactly the configured number of
    /// digits.
    pub async fn register_bank_account(&self, store_id: &StoreId, account: &str) -> Result<(), DispersalError> {
        let account = account.trim();
        if !is_valid_bank_account(account, self.account_digits) {
            return Err(DispersalError::InvalidBankAccount(account.to_string()));
        }
        self.db.set_store_bank_account(store_id, account).await?;
        info!("💸️ Bank account for store {store_id} registered");
        Ok(())
    }

    pub async fn fetch_dispersal(&self, id: i64) -> Result<DispersalBatch, DispersalError> {
        self.db.fetch_dispersal(id).await?.ok_or(DispersalError::DispersalNotFound(id))
    }

    async fn finalize(&self, batch: DispersalBatch, status: DispersalStatus, error: Option<String>) -> DispersalBatch {
        let id = batch.dispersal.id;
        match self.db.finalize_dispersal(id, status, error).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                error!("💸️ Dispersal #{id} had already been finalised. Could not mark it {status}");
                batch
            },
            Err(e) => {
                error!("💸️ Could not mark dispersal #{id} as {status}. {e}");
                batch
            },
        }
    }

    /// The gateway has paid the stores; from here on failures are logged, never returned.
    async fn debit_balances(&self, batch: &DispersalBatch) {
        let id = batch.dispersal.id;
        for item in &batch.items {
            if let Err(e) = self.db.decrement_store_balance(&item.store_id, item.amount).await {
                error!(
                    "💸️ LEDGER INCOMPLETE. Dispersal #{id} paid {} to store {}, but its balance could not be debited. \
                     {e}",
                    item.amount, item.store_id
                );
            }
        }
        let total = batch.dispersal.total;
        if let Err(e) = self.db.decrement_platform_balance(PlatformAccount::Accounting, total).await {
            error!("💸️ LEDGER INCOMPLETE. Dispersal #{id} paid {total}, but the platform float was not debited. {e}");
        }
    }
}
