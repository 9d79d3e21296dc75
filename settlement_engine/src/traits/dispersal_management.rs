use async_trait::async_trait;

use crate::{
    db_types::{DispersalBatch, DispersalStatus, NewDispersalItem, StoreBalance, StoreId},
    traits::SettlementDatabaseError,
};

#[async_trait]
pub trait DispersalManagement: Send + Sync {
    /// Stores with a positive balance and a registered bank account, ordered by store id.
    async fn fetch_stores_with_balance(&self) -> Result<Vec<StoreBalance>, SettlementDatabaseError>;

    /// Registers (or replaces) the bank account that dispersals for this store are paid into.
    async fn set_store_bank_account(&self, store_id: &StoreId, account: &str) -> Result<(), SettlementDatabaseError>;

    /// Creates a `pending` dispersal and its items in a single database transaction. The item amounts are frozen from
    /// this point on.
    async fn create_dispersal(
        &self,
        reference: &str,
        items: &[NewDispersalItem],
    ) -> Result<DispersalBatch, SettlementDatabaseError>;

    /// Moves a `pending` dispersal to its final status. Returns `None` if the dispersal had already been finalised.
    async fn finalize_dispersal(
        &self,
        id: i64,
        status: DispersalStatus,
        error: Option<String>,
    ) -> Result<Option<DispersalBatch>, SettlementDatabaseError>;

    async fn fetch_dispersal(&self, id: i64) -> Result<Option<DispersalBatch>, SettlementDatabaseError>;
}
