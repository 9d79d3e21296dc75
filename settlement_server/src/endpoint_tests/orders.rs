use actix_web::{
    http::{header, StatusCode},
    test,
    test::TestRequest,
    App,
};
use serde_json::json;
use settlement_engine::{
    db_types::{Cents, Order, OrderId, OrderStatusType, SettlementDetails},
    order_objects::GatewayResult,
    test_utils::{GatewayCall, ScriptedGateway},
    traits::GatewayResponse,
    SettlementDatabaseError,
};

use super::{
    helpers::{expect_ledger_credit, sample_order, send_request, services, webhook_config, with_status},
    mocks::MockSettlementBackend,
};
use crate::{config::ServerOptions, server::configure_app};

fn new_order_body() -> serde_json::Value {
    json!({
        "order_id": "1001",
        "store_id": "store-a",
        "payment_method": "mobile_transfer",
        "payer_identity": "V12345678",
    })
}

fn insert_as_pending(db: &mut MockSettlementBackend) {
    db.expect_insert_order().times(1).returning(|new_order| {
        let mut order = sample_order(new_order.order_id.as_str(), OrderStatusType::Pending, 0);
        order.amount_local = new_order.amount_local;
        order.amount_reference = new_order.amount_reference;
        Ok(order)
    });
}

#[actix_web::test]
async fn create_order_with_local_amount() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    insert_as_pending(&mut db);
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let mut body = new_order_body();
    body["amount"] = json!("1500.00");
    let req = TestRequest::post().uri("/api/orders").set_json(body);
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::CREATED);
    let order: Order = serde_json::from_str(&body).expect("Response was not an order");
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.amount_local, Cents::from(150_000));
    assert_eq!(order.amount_reference, Cents::default());
    assert!(gateway.calls().is_empty(), "No rate lookup is needed when the local amount is given");
}

#[actix_web::test]
async fn create_order_priced_in_reference_currency() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    insert_as_pending(&mut db);
    let gateway = ScriptedGateway::new();
    gateway.set_rate(Cents::from(36_500));
    let services = services(db, &gateway);
    let mut body = new_order_body();
    body["reference_amount"] = json!("25.00");
    let req = TestRequest::post().uri("/api/orders").set_json(body);
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::CREATED);
    let order: Order = serde_json::from_str(&body).expect("Response was not an order");
    assert_eq!(order.amount_local, Cents::from(912_500));
    assert_eq!(order.amount_reference, Cents::from(2500));
    assert_eq!(gateway.calls(), vec![GatewayCall::Rate]);
}

#[actix_web::test]
async fn create_order_without_rate() {
    let _ = env_logger::try_init().ok();
    let db = MockSettlementBackend::new();
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let mut body = new_order_body();
    body["reference_amount"] = json!("25.00");
    let req = TestRequest::post().uri("/api/orders").set_json(body);
    let (status, _) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn create_order_with_unpriceable_reference_amount() {
    let _ = env_logger::try_init().ok();
    let db = MockSettlementBackend::new();
    let gateway = ScriptedGateway::new();
    gateway.set_rate(Cents::from(36_500));
    let services = services(db, &gateway);
    let mut body = new_order_body();
    body["reference_amount"] = json!("90000000000000000.00");
    let req = TestRequest::post().uri("/api/orders").set_json(body);
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("out of range"), "{body}");
}

#[actix_web::test]
async fn create_order_needs_an_amount() {
    let _ = env_logger::try_init().ok();
    let db = MockSettlementBackend::new();
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = TestRequest::post().uri("/api/orders").set_json(new_order_body());
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Either amount or reference_amount is required"), "{body}");
}

#[actix_web::test]
async fn create_duplicate_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    db.expect_insert_order()
        .times(1)
        .returning(|order| Err(SettlementDatabaseError::OrderAlreadyExists(order.order_id)));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let mut body = new_order_body();
    body["amount"] = json!(1500);
    let req = TestRequest::post().uri("/api/orders").set_json(body);
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, r#"{"error":"Cannot insert order, since it already exists: #1001"}"#);
}

#[actix_web::test]
async fn fetch_unknown_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_order().returning(|_| Ok(None));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = TestRequest::get().uri("/api/orders/9999");
    let (status, _) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn checkout_opens_the_payment_window() {
    let _ = env_logger::try_init().ok();
    let order = sample_order("1001", OrderStatusType::PendingPayment, 150_000);
    let mut db = MockSettlementBackend::new();
    db.expect_transition_order_status()
        .withf(|id, from, to| {
            id.as_str() == "1001" && from == [OrderStatusType::Pending] && *to == OrderStatusType::PendingPayment
        })
        .times(1)
        .returning(move |_, _, _| Ok(Some(order.clone())));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = TestRequest::post().uri("/api/orders/1001/checkout");
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).expect("Response was not an order");
    assert_eq!(order.status, OrderStatusType::PendingPayment);
    assert!(services.scheduler().is_armed(&OrderId::new("1001")));
    services.scheduler().shutdown();
}

#[actix_web::test]
async fn checkout_of_a_paid_order_is_refused() {
    let _ = env_logger::try_init().ok();
    let accepted = sample_order("1001", OrderStatusType::Accepted, 150_000);
    let mut db = MockSettlementBackend::new();
    db.expect_transition_order_status().times(1).returning(|_, _, _| Ok(None));
    db.expect_fetch_order().returning(move |_| Ok(Some(accepted.clone())));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = TestRequest::post().uri("/api/orders/1001/checkout");
    let (status, _) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(!services.scheduler().is_armed(&OrderId::new("1001")));
}

#[actix_web::test]
async fn events_for_a_finished_order_end_immediately() {
    let _ = env_logger::try_init().ok();
    let accepted = sample_order("1001", OrderStatusType::Accepted, 150_000);
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_order().returning(move |_| Ok(Some(accepted.clone())));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = TestRequest::get().uri("/api/orders/1001/events");
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(services.scheduler().notifier().open_channels(), 0);
}

#[actix_web::test]
async fn events_stream_until_the_order_is_cancelled() {
    let _ = env_logger::try_init().ok();
    let order = sample_order("1001", OrderStatusType::PendingPayment, 150_000);
    let cancelled = with_status(&order, OrderStatusType::Cancelled);
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_order().returning(move |_| Ok(Some(order.clone())));
    db.expect_transition_order_status()
        .withf(|_, from, to| from == OrderStatusType::CANCELLABLE.as_slice() && *to == OrderStatusType::Cancelled)
        .times(1)
        .returning(move |_, _, _| Ok(Some(cancelled.clone())));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let webhooks = webhook_config();
    let app = App::new().configure(|cfg| configure_app(cfg, &services, &webhooks, ServerOptions::default()));
    let app = test::init_service(app).await;

    let events = test::call_service(&app, TestRequest::get().uri("/api/orders/1001/events").to_request()).await;
    assert_eq!(events.status(), StatusCode::OK);
    assert_eq!(events.headers().get(header::CONTENT_TYPE).unwrap(), "text/event-stream");
    let res = test::call_service(&app, TestRequest::post().uri("/api/orders/1001/cancel").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);

    let body = test::read_body(events).await;
    let body = String::from_utf8_lossy(&body);
    assert!(body.starts_with("event: cancelled\ndata: "), "{body}");
    assert!(body.contains(r#""order_id":"1001""#));
    assert!(body.contains(r#""status":"cancelled""#));
    assert!(body.ends_with("\n\n"));
}

//----------------------------------------------   Direct debit  ----------------------------------------------------

fn charge_body(amount: &str) -> serde_json::Value {
    json!({
        "identity": "V12345678",
        "bank_code": "0102",
        "phone": "04141234567",
        "otp": "123456",
        "amount": amount,
    })
}

#[actix_web::test]
async fn approved_charge_accepts_the_order() {
    let _ = env_logger::try_init().ok();
    let order = sample_order("1001", OrderStatusType::PendingPayment, 150_000);
    let accepted = with_status(&order, OrderStatusType::Accepted);
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_order().times(1).returning(move |_| Ok(Some(order.clone())));
    let transitioned = accepted.clone();
    db.expect_transition_order_status()
        .withf(|_, from, to| from == [OrderStatusType::PendingPayment] && *to == OrderStatusType::Accepted)
        .times(1)
        .returning(move |_, _, _| Ok(Some(transitioned.clone())));
    db.expect_record_settlement()
        .withf(|_, details: &SettlementDetails| {
            details.reference == "CHG-0001" && details.payer_bank.as_deref() == Some("0102")
        })
        .times(1)
        .returning(move |_, details| {
            let mut order = accepted.clone();
            order.payment_reference = Some(details.reference.clone());
            Ok(order)
        });
    expect_ledger_credit(&mut db, 150_000, 10_200);
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = TestRequest::post().uri("/api/orders/1001/charge").set_json(charge_body("1500.00"));
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"reference":"CHG-0001"}"#);
    let charge = GatewayCall::Charge { order_id: OrderId::new("1001"), amount: Cents::from(150_000) };
    assert_eq!(gateway.calls(), vec![charge]);
}

#[actix_web::test]
async fn rejected_charge_leaves_the_order_alone() {
    let _ = env_logger::try_init().ok();
    let order = sample_order("1001", OrderStatusType::PendingPayment, 150_000);
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_order().times(1).returning(move |_| Ok(Some(order.clone())));
    let gateway = ScriptedGateway::new();
    gateway.queue_charge(Ok(GatewayResponse::rejected("51", Some("Fondos insuficientes".into()))));
    let services = services(db, &gateway);
    let req = TestRequest::post().uri("/api/orders/1001/charge").set_json(charge_body("1500.00"));
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    let result: GatewayResult = serde_json::from_str(&body).expect("Response was not a gateway result");
    assert!(!result.success);
    assert_eq!(result.code.as_deref(), Some("51"));
    assert_eq!(result.message.as_deref(), Some("There are not enough funds in the account."));
}

#[actix_web::test]
async fn charge_for_the_wrong_amount() {
    let _ = env_logger::try_init().ok();
    let order = sample_order("1001", OrderStatusType::PendingPayment, 150_000);
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_order().returning(move |_| Ok(Some(order.clone())));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = TestRequest::post().uri("/api/orders/1001/charge").set_json(charge_body("1400.00"));
    let (status, _) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(gateway.charge_count(), 0);
}

#[actix_web::test]
async fn charge_before_checkout() {
    let _ = env_logger::try_init().ok();
    let order = sample_order("1001", OrderStatusType::Pending, 150_000);
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_order().returning(move |_| Ok(Some(order.clone())));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let req = TestRequest::post().uri("/api/orders/1001/charge").set_json(charge_body("1500.00"));
    let (status, _) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(gateway.charge_count(), 0);
}

#[actix_web::test]
async fn otp_request_uses_the_order_amount() {
    let _ = env_logger::try_init().ok();
    let order = sample_order("1001", OrderStatusType::PendingPayment, 150_000);
    let mut db = MockSettlementBackend::new();
    db.expect_fetch_order().returning(move |_| Ok(Some(order.clone())));
    let gateway = ScriptedGateway::new();
    let services = services(db, &gateway);
    let body = json!({ "identity": "V12345678", "bank_code": "0102", "phone": "04141234567", "amount": "1500.01" });
    let req = TestRequest::post().uri("/api/orders/1001/otp").set_json(body);
    let (status, body) = send_request(req, &services, &webhook_config()).await;
    assert_eq!(status, StatusCode::OK);
    let result: GatewayResult = serde_json::from_str(&body).expect("Response was not a gateway result");
    assert!(result.success);
    let otp = GatewayCall::Otp { order_id: OrderId::new("1001"), amount: Cents::from(150_000) };
    assert_eq!(gateway.calls(), vec![otp]);
}
