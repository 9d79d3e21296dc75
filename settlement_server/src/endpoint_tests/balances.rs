use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use serde_json::json;
use settlement_engine::{
    db_types::{
        Cents,
        Dispersal,
        DispersalBatch,
        DispersalItem,
        DispersalStatus,
        NewDispersalItem,
        PlatformBalances,
        StoreBalance,
        StoreId,
    },
    order_objects::{DispersalOutcome, DispersalPreview},
    test_utils::ScriptedGateway,
    traits::GatewayResponse,
};

use super::{
    helpers::{send_request, services, webhook_config, WEBHOOK_SECRET},
    mocks::MockSettlementBackend,
};
use crate::config::DEFAULT_WEBHOOK_SECRET_HEADER;

const ACCOUNT_A: &str = "01020304050607080910";

fn admin_get(path: &str) -> TestRequest {
    TestRequest::get().uri(path).insert_header((DEFAULT_WEBHOOK_SECRET_HEADER, WEBHOOK_SECRET))
}

fn admin_post(path: &str, body: serde_json::Value) -> TestRequest {
    TestRequest::post().uri(path).insert_header((DEFAULT_WEBHOOK_SECRET_HEADER, WEBHOOK_SECRET)).set_json(body)
}

fn store_balance(store_id: &str, balance: i64, account: Option<&str>) -> StoreBalance {
    StoreBalance {
        store_id: StoreId::from(store_id),
        balance: Cents::from(balance),
        bank_account: account.map(String::from),
        updated_at: Utc::now(),
    }
}

fn batch(
    reference: &str,
    status: DispersalStatus,
    items: &[NewDispersalItem],
    error: Option<String>,
) -> DispersalBatch {
    let now = Utc::now();
    let items = items
        .iter()
        .enumerate()
        .map(|(i, item)| DispersalItem {
            id: i as i64 + 1,
            dispersal_id: 7,
            store_id: item.store_id.clone(),
            bank_account: item.bank_account.clone(),
            amount: item.amount,
            created_at: now,
        })
        .collect::<Vec<_>>();
    let dispersal = Dispersal {
        id: 7,
        reference: reference.to_string(),
        status,
        total: items.iter().map(|i| i.amount).sum(),
        store_count: items.len() as i64,
        error,
        created_at: now,
        updated_at: now,
    };
    DispersalBatch { dispersal, items }
}

#[actix_web::test]
async fn platform_balances() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_platform_balances()
        .times(1)
        .returning(|| Ok(PlatformBalances { available: Cents::from(10_200), accounting: Cents::from(139_800) }));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let (status, body) = send_request(admin_get("/api/balances/platform"), &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"available":"102.00","accounting":"1398.00"}"#);
}

#[actix_web::test]
async fn balances_need_the_shared_secret() {
    let _ = env_logger::try_init().ok();
    let db = MockSettlementBackend::new();
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = TestRequest::get().uri("/api/balances/platform");
    let (status, _) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = TestRequest::get().uri("/api/dispersals/preview");
    let (status, _) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn store_without_sales() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_store_balance().times(1).returning(|_| Ok(None));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let (status, _) = send_request(admin_get("/api/balances/store/store-z"), &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn register_bank_account() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    db.expect_set_store_bank_account()
        .withf(|store_id, account| store_id.as_str() == "store-a" && account == ACCOUNT_A)
        .times(1)
        .returning(|_, _| Ok(()));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);

    let body = json!({ "account": "0102-0304" });
    let req = admin_post("/api/balances/store/store-a/bank_account", body);
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("is not a valid bank account number"), "{body}");

    let body = json!({ "account": format!(" {ACCOUNT_A} ") });
    let req = admin_post("/api/balances/store/store-a/bank_account", body);
    let (status, _) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn dispersal_preview_skips_stores_without_an_account() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_stores_with_balance().times(1).returning(|| {
        Ok(vec![
            store_balance("store-a", 139_800, Some(ACCOUNT_A)),
            store_balance("store-b", 50_000, None),
            store_balance("store-c", 20_000, Some("12345")),
        ])
    });
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let (status, body) = send_request(admin_get("/api/dispersals/preview"), &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    let preview: DispersalPreview = serde_json::from_str(&body).expect("Response was not a dispersal preview");
    assert_eq!(preview.stores.len(), 1);
    assert_eq!(preview.stores[0].store_id, StoreId::from("store-a"));
    assert_eq!(preview.total, Cents::from(139_800));
}

#[actix_web::test]
async fn dispersal_with_nothing_to_pay() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_stores_with_balance().times(1).returning(|| Ok(vec![store_balance("store-b", 50_000, None)]));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = admin_post("/api/dispersals", json!({ "reference": "DSP-2024-03-01" }));
    let (status, _) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(gateway.payout_count(), 0);
}

#[actix_web::test]
async fn rejected_dispersal_is_recorded_as_failed() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_stores_with_balance()
        .times(1)
        .returning(|| Ok(vec![store_balance("store-a", 139_800, Some(ACCOUNT_A))]));
    db.expect_create_dispersal()
        .withf(|reference, items| reference == "DSP-2024-03-01" && items.len() == 1)
        .times(1)
        .returning(|reference, items| Ok(batch(reference, DispersalStatus::Pending, items, None)));
    db.expect_finalize_dispersal()
        .withf(|id, status, error| {
            *id == 7 && *status == DispersalStatus::Failed && error.as_deref() == Some("Cuenta bloqueada")
        })
        .times(1)
        .returning(|_, status, error| {
            let items = [NewDispersalItem {
                store_id: StoreId::from("store-a"),
                bank_account: ACCOUNT_A.to_string(),
                amount: Cents::from(139_800),
            }];
            Ok(Some(batch("DSP-2024-03-01", status, &items, error)))
        });
    let gateway = ScriptedGateway::new();
    gateway.queue_payout(Ok(GatewayResponse::rejected("41", Some("Cuenta bloqueada".into()))));
    let services = services(db, &gateway);
    let req = admin_post("/api/dispersals", json!({ "reference": "DSP-2024-03-01" }));
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    let outcome: DispersalOutcome = serde_json::from_str(&body).expect("Response was not a dispersal outcome");
    match outcome {
        DispersalOutcome::Rejected { batch, code, message } => {
            assert_eq!(code, "41");
            assert_eq!(message, "Cuenta bloqueada");
            assert_eq!(batch.dispersal.status, DispersalStatus::Failed);
        },
        DispersalOutcome::Completed { .. } => panic!("Expected the dispersal to be rejected"),
    }
    assert_eq!(gateway.payout_count(), 1);
}

#[actix_web::test]
async fn unknown_dispersal() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_dispersal().times(1).returning(|_| Ok(None));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let (status, _) = send_request(admin_get("/api/dispersals/42"), &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
