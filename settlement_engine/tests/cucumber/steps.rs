use std::{str::FromStr, time::Duration};

use cucumber::{given, then, when};
use settlement_engine::{
    db_types::{OrderStatusType, PaymentMethod},
    order_objects::{ChargeDetails, PaymentClaim},
    traits::GatewayResponse,
    ChargeError,
};

use crate::{cucumber::SettlementWorld, support::cents};

fn payment_method(s: &str) -> PaymentMethod {
    PaymentMethod::from_str(s).expect("Not a valid payment method")
}

#[given(expr = "order {word} for store {word} of {word} from payer {word} by {word} is awaiting payment")]
async fn open_order(
    world: &mut SettlementWorld,
    order_id: String,
    store_id: String,
    amount: String,
    identity: String,
    method: String,
) {
    world.engine().open_order(&order_id, &store_id, payment_method(&method), &identity, &amount).await;
}

#[given(expr = "I am watching order {word}")]
async fn watch_order(world: &mut SettlementWorld, order_id: String) {
    let stream = world.engine().notifier.subscribe(&order_id.as_str().into());
    world.watchers.insert(order_id, stream);
}

#[given(expr = "the gateway approves the next charge with reference {word}")]
async fn approve_next_charge(world: &mut SettlementWorld, reference: String) {
    world.engine().gateway.queue_charge(Ok(GatewayResponse::approved(reference)));
}

#[when(expr = "the gateway authorizes a transfer of {word} from {word}")]
async fn authorize_transfer(world: &mut SettlementWorld, amount: String, identity: String) {
    let ack = world.engine().reconciler.authorize(PaymentClaim::new(&identity, cents(&amount))).await;
    world.last_ack = Some(ack);
}

#[when(expr = "the gateway settles a transfer of {word} from {word} with reference {word}")]
async fn settle_transfer(world: &mut SettlementWorld, amount: String, identity: String, reference: String) {
    let claim = PaymentClaim::new(&identity, cents(&amount)).with_reference(reference);
    let ack = world.engine().reconciler.settle(claim).await;
    world.last_ack = Some(ack);
}

#[when(expr = "the payer charges order {word} for {word} with OTP {word}")]
async fn charge_order(world: &mut SettlementWorld, order_id: String, amount: String, otp: String) {
    let details = ChargeDetails {
        identity: "V12345678".into(),
        bank_code: "0102".into(),
        phone: "04141234567".into(),
        otp,
        amount: cents(&amount),
    };
    let result = world.engine().charges.charge(&order_id.as_str().into(), details).await;
    world.charges.push(result);
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut SettlementWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[then(expr = "order {word} is {word}")]
async fn check_order_status(world: &mut SettlementWorld, order_id: String, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order = world.engine().order(&order_id).await;
    assert_eq!(order.status, expected, "Order {order_id} has the wrong status");
}

#[then("the webhook is acknowledged")]
async fn webhook_acknowledged(world: &mut SettlementWorld) {
    let ack = world.last_ack.as_ref().expect("No webhook has been received");
    assert!(ack.success, "Webhook was rejected: {}", ack.message);
}

#[then("the webhook is rejected")]
async fn webhook_rejected(world: &mut SettlementWorld) {
    let ack = world.last_ack.as_ref().expect("No webhook has been received");
    assert!(!ack.success, "Webhook was unexpectedly matched to {:?}", ack.order_id);
}

#[then(expr = "the watcher of order {word} receives {word}")]
async fn watcher_receives(world: &mut SettlementWorld, order_id: String, event: String) {
    let stream = world.watchers.get_mut(&order_id).expect("Not watching that order");
    let received = tokio::time::timeout(Duration::from_secs(5), stream.next_event())
        .await
        .expect("Timed out waiting for an order event")
        .expect("The event stream closed early");
    assert_eq!(received.event.as_str(), event);
}

#[then(expr = "the watcher of order {word} sees the stream close")]
async fn watcher_sees_close(world: &mut SettlementWorld, order_id: String) {
    let stream = world.watchers.get_mut(&order_id).expect("Not watching that order");
    let next = tokio::time::timeout(Duration::from_secs(5), stream.next_event())
        .await
        .expect("Timed out waiting for the stream to close");
    assert!(next.is_none(), "Expected the stream to close, but received {next:?}");
}

#[then(expr = "store {word} has a balance of {word}")]
async fn check_store_balance(world: &mut SettlementWorld, store_id: String, amount: String) {
    let balance = world.engine().store_balance(&store_id).await;
    assert_eq!(balance, cents(&amount), "Store {store_id} has the wrong balance");
}

#[then(expr = "the platform available balance is {word}")]
async fn check_platform_available(world: &mut SettlementWorld, amount: String) {
    let balances = world.engine().platform().await;
    assert_eq!(balances.available, cents(&amount));
}

#[then(expr = "the charge succeeds with reference {word}")]
async fn charge_succeeded(world: &mut SettlementWorld, reference: String) {
    let result = world.last_charge().as_ref().expect("The charge failed");
    assert!(result.success);
    assert_eq!(result.reference.as_deref(), Some(reference.as_str()));
}

#[then("the charge is refused because the order is no longer awaiting payment")]
async fn charge_refused(world: &mut SettlementWorld) {
    let err = world.last_charge().as_ref().expect_err("The charge unexpectedly succeeded");
    assert!(matches!(err, ChargeError::NotAwaitingPayment { .. }), "Unexpected error: {err}");
}

#[then(expr = "the gateway was charged {int} time(s)")]
async fn check_charge_count(world: &mut SettlementWorld, count: usize) {
    assert_eq!(world.engine().gateway.charge_count(), count);
}
