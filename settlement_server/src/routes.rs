//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use std::convert::Infallible;

use actix_web::{get, http::header, web, HttpResponse, Responder};
use bytes::Bytes;
use futures::StreamExt;
use log::*;
use settlement_engine::{
    db_types::{OrderId, StoreId},
    events::OrderStatusEvent,
    order_objects::{ChargeDetails, OtpDetails, PaymentClaim, ReconciliationAck},
    ChargeFlowApi,
    ChargeGateway,
    DispersalApi,
    LedgerAccountant,
    OrderFlowApi,
    OrderManagement,
    PayoutGateway,
    ReconciliationApi,
    ReferenceRateApi,
    SettlementDatabase,
};

use crate::{
    data_objects::{BankAccountRequest, DispersalRequest, NewOrderRequest},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl OrderManagement, ChargeGateway);
/// Creates a new order in the `pending` state.
///
/// If the request carries only a `reference_amount`, the local amount is priced at the gateway's current reference
/// rate. If it carries both, they are stored as given.
pub async fn create_order<B, G>(
    body: web::Json<NewOrderRequest>,
    orders: web::Data<OrderFlowApi<B>>,
    rates: web::Data<ReferenceRateApi<G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + 'static,
    G: ChargeGateway,
{
    let req = body.into_inner();
    debug!("💻️ New order request for {} from store {}", req.order_id, req.store_id);
    let new_order = match (req.amount, req.reference_amount) {
        (Some(local), reference) => {
            let reference = reference.unwrap_or_default();
            req.into_new_order(local, reference)
        },
        (None, Some(reference)) => {
            let priced = rates.price(reference).await?;
            req.into_new_order(priced.local, priced.reference)
        },
        (None, None) => {
            return Err(ServerError::InvalidRequestBody("Either amount or reference_amount is required".into()));
        },
    };
    let order = orders.create_order(new_order).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement);
pub async fn order_by_id<B: OrderManagement + 'static>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ Fetching order {order_id}");
    let order = api
        .fetch_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(order))
}

route!(checkout => Post "/orders/{order_id}/checkout" impl OrderManagement);
/// Opens the payment window for the order. The order moves to `pending_payment`, and expires if it is not paid
/// within the configured window.
pub async fn checkout<B: OrderManagement + 'static>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ Checkout request for order {order_id}");
    let order = api.begin_payment(&order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl OrderManagement);
pub async fn cancel_order<B: OrderManagement + 'static>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ Cancel order request for {order_id}");
    let order = api.cancel_order(&order_id).await.map_err(|e| {
        debug!("💻️ Could not cancel order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_events => Get "/orders/{order_id}/events" impl OrderManagement);
/// Server-sent event stream of status changes for the order.
///
/// The stream carries `authorized`, `accepted`, `expired` and `cancelled` events as they happen. Events that
/// happened before the client connected are not replayed. The stream ends once the order reaches a final state.
pub async fn order_events<B: OrderManagement + 'static>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let notifier = api.scheduler().notifier();
    // Subscribe before reading the order so that no transition can slip in between the two
    let subscription = notifier.subscribe(&order_id);
    let order = match api.fetch_order(&order_id).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            notifier.close(&order_id);
            return Err(ServerError::NoRecordFound(format!("Order {order_id} does not exist")));
        },
        Err(e) => {
            notifier.close(&order_id);
            return Err(e.into());
        },
    };
    if order.status.is_terminal() {
        debug!("💻️ Order {order_id} is already {}. Closing its event stream", order.status);
        notifier.close(&order_id);
    } else {
        debug!("💻️ Client subscribed to events for order {order_id}");
    }
    let stream = subscription.into_stream().map(|event| Ok::<_, Infallible>(sse_frame(&event)));
    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header(header::CacheControl(vec![header::CacheDirective::NoCache]))
        .streaming(stream))
}

fn sse_frame(event: &OrderStatusEvent) -> Bytes {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        warn!("💻️ Could not serialize event for order {}. {e}", event.order_id);
        format!(r#"{{"order_id":"{}","event":"{}"}}"#, event.order_id, event.event.as_str())
    });
    Bytes::from(format!("event: {}\ndata: {data}\n\n", event.event.as_str()))
}

//----------------------------------------------   Direct debit  ----------------------------------------------------
route!(request_otp => Post "/orders/{order_id}/otp" impl SettlementDatabase, ChargeGateway);
/// Asks the payer's bank to send a one-time password for the order's amount.
///
/// Gateway rejections are reported with HTTP 200 and `success: false`, along with a message the payer can act on.
pub async fn request_otp<B, G>(
    path: web::Path<OrderId>,
    body: web::Json<OtpDetails>,
    api: web::Data<ChargeFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase + 'static,
    G: ChargeGateway,
{
    let order_id = path.into_inner();
    debug!("💻️ OTP request for order {order_id}");
    let result = api.request_otp(&order_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(charge => Post "/orders/{order_id}/charge" impl SettlementDatabase, ChargeGateway);
/// Debits the payer for the order. A successful response means the money has moved and the order is accepted.
///
/// Gateway rejections are reported with HTTP 200 and `success: false`, along with a message the payer can act on.
pub async fn charge<B, G>(
    path: web::Path<OrderId>,
    body: web::Json<ChargeDetails>,
    api: web::Data<ChargeFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase + 'static,
    G: ChargeGateway,
{
    let order_id = path.into_inner();
    debug!("💻️ Charge request for order {order_id}");
    let result = api.charge(&order_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(authorize_webhook => Post "/authorize" impl SettlementDatabase);
/// The gateway has seen a transfer for a pending order.
///
/// Webhooks are always acknowledged with HTTP 200. Whether the payment was matched is in the body.
pub async fn authorize_webhook<B: SettlementDatabase + 'static>(
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B>>,
) -> HttpResponse {
    let ack = match parse_claim(&body) {
        Ok(claim) => api.authorize(claim).await,
        Err(ack) => ack,
    };
    HttpResponse::Ok().json(ack)
}

route!(settle_webhook => Post "/settle" impl SettlementDatabase);
/// The gateway has confirmed the funds for an authorized order.
///
/// Webhooks are always acknowledged with HTTP 200. Whether the payment was matched is in the body.
pub async fn settle_webhook<B: SettlementDatabase + 'static>(
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B>>,
) -> HttpResponse {
    let ack = match parse_claim(&body) {
        Ok(claim) => api.settle(claim).await,
        Err(ack) => ack,
    };
    HttpResponse::Ok().json(ack)
}

fn parse_claim(body: &[u8]) -> Result<PaymentClaim, ReconciliationAck> {
    serde_json::from_slice::<PaymentClaim>(body).map_err(|e| {
        warn!("💻️ Could not read webhook payload. {e}");
        ReconciliationAck::rejected(format!("Invalid payload. {e}"))
    })
}

//----------------------------------------------   Balances  ----------------------------------------------------
route!(platform_balance => Get "/platform" impl SettlementDatabase);
pub async fn platform_balance<B: SettlementDatabase>(
    api: web::Data<LedgerAccountant<B>>,
) -> Result<HttpResponse, ServerError> {
    let balances = api.platform_balances().await?;
    Ok(HttpResponse::Ok().json(balances))
}

route!(store_balance => Get "/store/{store_id}" impl SettlementDatabase);
pub async fn store_balance<B: SettlementDatabase>(
    path: web::Path<StoreId>,
    api: web::Data<LedgerAccountant<B>>,
) -> Result<HttpResponse, ServerError> {
    let store_id = path.into_inner();
    let balance = api
        .store_balance(&store_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Store {store_id} has no balance")))?;
    Ok(HttpResponse::Ok().json(balance))
}

route!(register_bank_account => Post "/store/{store_id}/bank_account" impl SettlementDatabase, PayoutGateway);
pub async fn register_bank_account<B, P>(
    path: web::Path<StoreId>,
    body: web::Json<BankAccountRequest>,
    api: web::Data<DispersalApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PayoutGateway,
{
    let store_id = path.into_inner();
    api.register_bank_account(&store_id, &body.account).await?;
    Ok(HttpResponse::NoContent().finish())
}

//----------------------------------------------   Dispersals  ----------------------------------------------------
route!(dispersal_preview => Get "/preview" impl SettlementDatabase, PayoutGateway);
/// The stores that a dispersal would pay if it ran now.
pub async fn dispersal_preview<B, P>(api: web::Data<DispersalApi<B, P>>) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PayoutGateway,
{
    let preview = api.preview().await?;
    Ok(HttpResponse::Ok().json(preview))
}

route!(execute_dispersal => Post "" impl SettlementDatabase, PayoutGateway);
/// Pays every eligible store in a single gateway batch.
///
/// A batch that the gateway rejects is still a completed request: the response carries `"outcome": "rejected"` and
/// the gateway's message, and no balance has changed.
pub async fn execute_dispersal<B, P>(
    body: web::Json<DispersalRequest>,
    api: web::Data<DispersalApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PayoutGateway,
{
    let DispersalRequest { reference } = body.into_inner();
    info!("💻️ Dispersal requested with reference {reference}");
    let outcome = api.execute(&reference).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(dispersal_by_id => Get "/{id}" impl SettlementDatabase, PayoutGateway);
pub async fn dispersal_by_id<B, P>(
    path: web::Path<i64>,
    api: web::Data<DispersalApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PayoutGateway,
{
    let batch = api.fetch_dispersal(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(batch))
}
