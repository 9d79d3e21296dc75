use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;
use settlement_engine::{
    db_types::{
        Cents,
        DispersalBatch,
        DispersalStatus,
        NewDispersalItem,
        NewOrder,
        NewPaymentTransaction,
        Order,
        OrderId,
        OrderStatusType,
        PaymentMethod,
        PaymentTransaction,
        PlatformAccount,
        PlatformBalances,
        SettlementDetails,
        StoreBalance,
        StoreId,
    },
    DispersalManagement,
    LedgerManagement,
    OrderManagement,
    SettlementDatabaseError,
};

mock! {
    pub SettlementBackend {}

    #[async_trait]
    impl OrderManagement for SettlementBackend {
        async fn insert_order(&self, order: NewOrder) -> Result<Order, SettlementDatabaseError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementDatabaseError>;
        async fn transition_order_status(
            &self,
            order_id: &OrderId,
            from: &[OrderStatusType],
            to: OrderStatusType,
        ) -> Result<Option<Order>, SettlementDatabaseError>;
        async fn record_settlement(
            &self,
            order_id: &OrderId,
            details: &SettlementDetails,
        ) -> Result<Order, SettlementDatabaseError>;
        async fn fetch_reconciliation_candidates(
            &self,
            status: OrderStatusType,
            method: PaymentMethod,
            payer_identity: &str,
        ) -> Result<Vec<Order>, SettlementDatabaseError>;
        async fn fetch_stale_orders(
            &self,
            status: OrderStatusType,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<Order>, SettlementDatabaseError>;
        async fn fetch_orders_for_store(&self, store_id: &StoreId) -> Result<Vec<Order>, SettlementDatabaseError>;
    }

    #[async_trait]
    impl LedgerManagement for SettlementBackend {
        async fn increment_store_balance(
            &self,
            store_id: &StoreId,
            amount: Cents,
        ) -> Result<(), SettlementDatabaseError>;
        async fn decrement_store_balance(
            &self,
            store_id: &StoreId,
            amount: Cents,
        ) -> Result<(), SettlementDatabaseError>;
        async fn increment_platform_balance(
            &self,
            account: PlatformAccount,
            amount: Cents,
        ) -> Result<(), SettlementDatabaseError>;
        async fn decrement_platform_balance(
            &self,
            account: PlatformAccount,
            amount: Cents,
        ) -> Result<(), SettlementDatabaseError>;
        async fn insert_payment_transaction(
            &self,
            tx: NewPaymentTransaction,
        ) -> Result<PaymentTransaction, SettlementDatabaseError>;
        async fn fetch_store_balance(
            &self,
            store_id: &StoreId,
        ) -> Result<Option<StoreBalance>, SettlementDatabaseError>;
        async fn fetch_platform_balances(&self) -> Result<PlatformBalances, SettlementDatabaseError>;
        async fn fetch_payment_transactions(
            &self,
            order_id: &OrderId,
        ) -> Result<Vec<PaymentTransaction>, SettlementDatabaseError>;
    }

    #[async_trait]
    impl DispersalManagement for SettlementBackend {
        async fn fetch_stores_with_balance(&self) -> Result<Vec<StoreBalance>, SettlementDatabaseError>;
        async fn set_store_bank_account(
            &self,
            store_id: &StoreId,
            account: &str,
        ) -> Result<(), SettlementDatabaseError>;
        async fn create_dispersal(
            &self,
            reference: &str,
            items: &[NewDispersalItem],
        ) -> Result<DispersalBatch, SettlementDatabaseError>;
        async fn finalize_dispersal(
            &self,
            id: i64,
            status: DispersalStatus,
            error: Option<String>,
        ) -> Result<Option<DispersalBatch>, SettlementDatabaseError>;
        async fn fetch_dispersal(&self, id: i64) -> Result<Option<DispersalBatch>, SettlementDatabaseError>;
    }
}
