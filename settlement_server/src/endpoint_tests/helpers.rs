use std::sync::Arc;

use actix_web::{http::StatusCode, test, test::TestRequest, App};
use chrono::{TimeZone, Utc};
use log::debug;
use settlement_engine::{
    db_types::{Cents, Order, OrderId, OrderStatusType, PaymentMethod, PaymentTransaction, PlatformAccount, StoreId},
    events::EventProducers,
    test_utils::ScriptedGateway,
};

use super::mocks::MockSettlementBackend;
use crate::{
    config::{ServerConfig, ServerOptions, WebhookConfig},
    server::{configure_app, SettlementServices},
};

pub type TestServices = SettlementServices<MockSettlementBackend, ScriptedGateway>;

pub const WEBHOOK_SECRET: &str = "open-sesame";

pub fn services(db: MockSettlementBackend, gateway: &ScriptedGateway) -> TestServices {
    let config = ServerConfig::default();
    SettlementServices::new(Arc::new(db), Arc::new(gateway.clone()), &config, EventProducers::default())
}

/// A webhook configuration with a shared secret and no IP whitelist.
pub fn webhook_config() -> WebhookConfig {
    WebhookConfig { secret: WEBHOOK_SECRET.to_string().into(), ..Default::default() }
}

/// Sends `req` to a freshly configured app and returns the status and body. Requests that are refused by middleware
/// are returned as the error's response, just as the server would send them.
pub async fn send_request(req: TestRequest, services: &TestServices, webhooks: &WebhookConfig) -> (StatusCode, String) {
    let app = App::new().configure(|cfg| configure_app(cfg, services, webhooks, ServerOptions::default()));
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            (res.status(), e.to_string())
        },
    }
}

pub fn sample_order(order_id: &str, status: OrderStatusType, amount: i64) -> Order {
    let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 15, 30, 0).unwrap();
    Order {
        id: 1,
        order_id: OrderId::new(order_id),
        store_id: StoreId::from("store-a"),
        status,
        payment_method: PaymentMethod::MobileTransfer,
        payer_identity: "V12345678".to_string(),
        amount_local: Cents::from(amount),
        amount_reference: Cents::from(2500),
        payment_reference: None,
        payer_bank: None,
        payer_phone: None,
        paid_at: None,
        created_at,
        updated_at: created_at,
    }
}

/// The same order, in a new state.
pub fn with_status(order: &Order, status: OrderStatusType) -> Order {
    Order { status, ..order.clone() }
}

/// Expects a settled order for `store-a` to credit the store, the platform revenue and float accounts, and to write an
/// audit record.
pub fn expect_ledger_credit(db: &mut MockSettlementBackend, gross: i64, fee: i64) {
    let net = Cents::from(gross - fee);
    let fee = Cents::from(fee);
    db.expect_increment_store_balance()
        .withf(move |store_id, amount| store_id.as_str() == "store-a" && *amount == net)
        .times(1)
        .returning(|_, _| Ok(()));
    db.expect_increment_platform_balance()
        .withf(move |account, amount| *account == PlatformAccount::Available && *amount == fee)
        .times(1)
        .returning(|_, _| Ok(()));
    db.expect_increment_platform_balance()
        .withf(move |account, amount| *account == PlatformAccount::Accounting && *amount == net)
        .times(1)
        .returning(|_, _| Ok(()));
    db.expect_insert_payment_transaction().times(1).returning(|tx| {
        Ok(PaymentTransaction {
            id: 1,
            order_id: tx.order_id,
            store_id: tx.store_id,
            reference: tx.reference,
            gross: tx.gross,
            fee_rate_bps: tx.fee_rate_bps,
            fee: tx.fee,
            net: tx.net,
            created_at: Utc::now(),
        })
    });
}
