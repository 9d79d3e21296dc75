use std::net::IpAddr;

use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;
use settlement_engine::{
    db_types::{OrderId, OrderStatusType, PaymentMethod},
    order_objects::ReconciliationAck,
    test_utils::ScriptedGateway,
};

use super::{
    helpers::{
        expect_ledger_credit,
        sample_order,
        send_request,
        services,
        webhook_config,
        with_status,
        WEBHOOK_SECRET,
    },
    mocks::MockSettlementBackend,
};
use crate::config::{WebhookConfig, DEFAULT_WEBHOOK_SECRET_HEADER};

fn claim() -> serde_json::Value {
    json!({
        "identity": "V12345678",
        "amount": "1500.00",
        "reference": "TRF-778899",
        "payer_bank": "0102",
        "payer_phone": "04141234567",
    })
}

fn webhook(path: &str, body: String) -> TestRequest {
    TestRequest::post().uri(path).insert_header((DEFAULT_WEBHOOK_SECRET_HEADER, WEBHOOK_SECRET)).set_payload(body)
}

fn ack(body: &str) -> ReconciliationAck {
    serde_json::from_str(body).expect("Response was not a webhook acknowledgment")
}

#[actix_web::test]
async fn authorize_matches_a_pending_transfer() {
    let _ = env_logger::try_init().ok();
    let order = sample_order("1001", OrderStatusType::PendingPayment, 150_000);
    let authorized = with_status(&order, OrderStatusType::Authorized);
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_reconciliation_candidates()
        .withf(|status, method, identity| {
            *status == OrderStatusType::PendingPayment
                && *method == PaymentMethod::MobileTransfer
                && identity == "V12345678"
        })
        .times(1)
        .returning(move |_, _, _| Ok(vec![order.clone()]));
    db.expect_transition_order_status()
        .withf(|id, from, to| {
            id.as_str() == "1001" && from == [OrderStatusType::PendingPayment] && *to == OrderStatusType::Authorized
        })
        .times(1)
        .returning(move |_, _, _| Ok(Some(authorized.clone())));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = webhook("/webhooks/authorize", claim().to_string());
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    let ack = ack(&body);
    assert!(ack.success);
    assert_eq!(ack.order_id, Some(OrderId::new("1001")));
}

#[actix_web::test]
async fn authorize_picks_the_oldest_of_several_matches() {
    let _ = env_logger::try_init().ok();
    let oldest = sample_order("1001", OrderStatusType::PendingPayment, 150_000);
    let mut newer = sample_order("1002", OrderStatusType::PendingPayment, 150_000);
    newer.id = 2;
    let other_amount = sample_order("1003", OrderStatusType::PendingPayment, 90_000);
    let authorized = with_status(&oldest, OrderStatusType::Authorized);
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_reconciliation_candidates()
        .times(1)
        .returning(move |_, _, _| Ok(vec![other_amount.clone(), oldest.clone(), newer.clone()]));
    db.expect_transition_order_status()
        .withf(|id, _, _| id.as_str() == "1001")
        .times(1)
        .returning(move |_, _, _| Ok(Some(authorized.clone())));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = webhook("/webhooks/authorize", claim().to_string());
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack(&body).order_id, Some(OrderId::new("1001")));
}

#[actix_web::test]
async fn settle_accepts_an_authorized_order() {
    let _ = env_logger::try_init().ok();
    let order = sample_order("1001", OrderStatusType::Authorized, 150_000);
    let accepted = with_status(&order, OrderStatusType::Accepted);
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_reconciliation_candidates()
        .withf(|status, _, _| *status == OrderStatusType::Authorized)
        .times(1)
        .returning(move |_, _, _| Ok(vec![order.clone()]));
    let transitioned = accepted.clone();
    db.expect_transition_order_status()
        .withf(|_, from, to| from == [OrderStatusType::Authorized] && *to == OrderStatusType::Accepted)
        .times(1)
        .returning(move |_, _, _| Ok(Some(transitioned.clone())));
    db.expect_record_settlement()
        .withf(|_, details| {
            details.reference == "TRF-778899"
                && details.payer_bank.as_deref() == Some("0102")
                && details.payer_phone.as_deref() == Some("04141234567")
        })
        .times(1)
        .returning(move |_, _| Ok(accepted.clone()));
    expect_ledger_credit(&mut db, 150_000, 10_200);
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = webhook("/webhooks/settle", claim().to_string());
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    let ack = ack(&body);
    assert!(ack.success);
    assert_eq!(ack.message, "Order settled");
}

#[actix_web::test]
async fn unmatched_transfer_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_reconciliation_candidates().times(1).returning(|_, _, _| Ok(vec![]));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = webhook("/webhooks/authorize", claim().to_string());
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    let ack = ack(&body);
    assert!(!ack.success);
    assert_eq!(ack.order_id, None);
}

#[actix_web::test]
async fn malformed_webhook_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let db = MockSettlementBackend::new();
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = webhook("/webhooks/settle", r#"{"identity": "V12345678", "amount": "lots"}"#.to_string());
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    let ack = ack(&body);
    assert!(!ack.success);
    assert!(ack.message.starts_with("Invalid payload."), "{}", ack.message);
}

#[actix_web::test]
async fn webhook_without_the_shared_secret() {
    let _ = env_logger::try_init().ok();
    let db = MockSettlementBackend::new();
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = TestRequest::post().uri("/webhooks/authorize").set_payload(claim().to_string());
    let (status, _) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::post()
        .uri("/webhooks/authorize")
        .insert_header((DEFAULT_WEBHOOK_SECRET_HEADER, "open-sesamE"))
        .set_payload(claim().to_string());
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Invalid or missing webhook secret.");
}

#[actix_web::test]
async fn webhook_from_outside_the_whitelist() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_reconciliation_candidates().times(1).returning(|_, _, _| Ok(vec![]));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let gateway_ip = "10.0.0.1".parse::<IpAddr>().unwrap();
    let webhooks = WebhookConfig { whitelist: Some(vec![gateway_ip]), ..webhook_config() };

    let req = webhook("/webhooks/authorize", claim().to_string()).peer_addr("192.168.1.5:40000".parse().unwrap());
    let (status, body) = send_request(req, &services, &webhooks).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Unauthorized access.");

    let req = webhook("/webhooks/authorize", claim().to_string()).peer_addr("10.0.0.1:40000".parse().unwrap());
    let (status, body) = send_request(req, &services, &webhooks).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!ack(&body).success);
}
