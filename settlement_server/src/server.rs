use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use settlement_engine::{
    events::{EventHandlers, EventHooks, EventProducers, OrderSettledEvent},
    ChargeFlowApi,
    ChargeGateway,
    DispersalApi,
    ExpirationScheduler,
    LedgerAccountant,
    OrderFlowApi,
    PayoutGateway,
    RealtimeNotifier,
    ReconciliationApi,
    ReferenceRateApi,
    SettlementDatabase,
    SqliteDatabase,
};

use crate::{
    config::{ServerConfig, ServerOptions, WebhookConfig},
    errors::ServerError,
    integrations::gateway::HttpGateway,
    middleware::{IpWhitelistMiddlewareFactory, SharedSecretMiddlewareFactory},
    routes::{
        health,
        AuthorizeWebhookRoute,
        CancelOrderRoute,
        ChargeRoute,
        CheckoutRoute,
        CreateOrderRoute,
        DispersalByIdRoute,
        DispersalPreviewRoute,
        ExecuteDispersalRoute,
        OrderByIdRoute,
        OrderEventsRoute,
        PlatformBalanceRoute,
        RegisterBankAccountRoute,
        RequestOtpRoute,
        SettleWebhookRoute,
        StoreBalanceRoute,
    },
};

const HOOK_BUFFER_SIZE: usize = 128;

/// Every engine API the server exposes, wired to one backend, one gateway and one expiration scheduler.
pub struct SettlementServices<B, G> {
    pub db: Arc<B>,
    pub orders: OrderFlowApi<B>,
    pub charges: ChargeFlowApi<B, G>,
    pub reconciler: ReconciliationApi<B>,
    pub ledger: LedgerAccountant<B>,
    pub dispersals: DispersalApi<B, G>,
    pub rates: ReferenceRateApi<G>,
}

impl<B, G> Clone for SettlementServices<B, G> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            orders: self.orders.clone(),
            charges: self.charges.clone(),
            reconciler: self.reconciler.clone(),
            ledger: self.ledger.clone(),
            dispersals: self.dispersals.clone(),
            rates: self.rates.clone(),
        }
    }
}

impl<B, G> SettlementServices<B, G>
where
    B: SettlementDatabase + 'static,
    G: ChargeGateway + PayoutGateway + 'static,
{
    pub fn new(db: Arc<B>, gateway: Arc<G>, config: &ServerConfig, producers: EventProducers) -> Self {
        let notifier = RealtimeNotifier::default();
        let scheduler = ExpirationScheduler::new(Arc::clone(&db), notifier, config.payment_window);
        let ledger = LedgerAccountant::new(Arc::clone(&db), config.fee_rate_bps);
        let orders = OrderFlowApi::new(Arc::clone(&db), scheduler.clone());
        let charges = ChargeFlowApi::new(
            Arc::clone(&db),
            Arc::clone(&gateway),
            scheduler.clone(),
            ledger.clone(),
            producers.clone(),
        );
        let reconciler = ReconciliationApi::new(Arc::clone(&db), scheduler, ledger.clone(), producers);
        let dispersals = DispersalApi::new(Arc::clone(&db), Arc::clone(&gateway), config.bank_account_digits);
        let rates = ReferenceRateApi::new(gateway);
        Self { db, orders, charges, reconciler, ledger, dispersals, rates }
    }

    pub fn scheduler(&self) -> &ExpirationScheduler<B> {
        self.orders.scheduler()
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    if config.database_url.is_empty() {
        return Err(ServerError::ConfigurationError("MPS_DATABASE_URL is not set".into()));
    }
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = HttpGateway::new(config.gateway.clone())?;
    let handlers = EventHandlers::new(HOOK_BUFFER_SIZE, create_event_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let services = SettlementServices::new(Arc::new(db), Arc::new(gateway), &config, producers);
    if config.sweep_stale_orders {
        match services.scheduler().sweep_stale_orders().await {
            Ok(expired) => info!("🕰️ {} order(s) expired while the server was offline", expired.len()),
            Err(e) => error!("🕰️ Could not sweep stale orders. {e}"),
        }
    }
    let srv = create_server_instance(config, services.clone())?;
    let result = srv.await;
    info!("🚀️ Server stopped. Cancelling payment window timers");
    services.scheduler().shutdown();
    services.db.close().await;
    result.map_err(ServerError::from)
}

pub fn create_server_instance<G>(
    config: ServerConfig,
    services: SettlementServices<SqliteDatabase, G>,
) -> Result<Server, ServerError>
where
    G: ChargeGateway + PayoutGateway + 'static,
{
    let options = ServerOptions::from_config(&config);
    let webhooks = config.webhooks.clone();
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mps::access_log"))
            .configure(|cfg| configure_app(cfg, &services, &webhooks, options))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers the engine APIs and every route. Balance, dispersal and webhook routes sit behind the IP whitelist and
/// the shared secret; the storefront routes under `/api/orders` are open.
pub fn configure_app<B, G>(
    cfg: &mut web::ServiceConfig,
    services: &SettlementServices<B, G>,
    webhooks: &WebhookConfig,
    options: ServerOptions,
) where
    B: SettlementDatabase + 'static,
    G: ChargeGateway + PayoutGateway + 'static,
{
    let auth_layers = || {
        (
            IpWhitelistMiddlewareFactory::new(webhooks.whitelist.clone(), options),
            SharedSecretMiddlewareFactory::new(&webhooks.secret_header, webhooks.secret.clone()),
        )
    };
    let (whitelist, secret) = auth_layers();
    let balances_scope = web::scope("/api/balances")
        .wrap(secret)
        .wrap(whitelist)
        .service(PlatformBalanceRoute::<B>::new())
        .service(StoreBalanceRoute::<B>::new())
        .service(RegisterBankAccountRoute::<B, G>::new());
    let (whitelist, secret) = auth_layers();
    let dispersal_scope = web::scope("/api/dispersals")
        .wrap(secret)
        .wrap(whitelist)
        .service(DispersalPreviewRoute::<B, G>::new())
        .service(ExecuteDispersalRoute::<B, G>::new())
        .service(DispersalByIdRoute::<B, G>::new());
    let order_scope = web::scope("/api")
        .service(CreateOrderRoute::<B, G>::new())
        .service(OrderByIdRoute::<B>::new())
        .service(CheckoutRoute::<B>::new())
        .service(CancelOrderRoute::<B>::new())
        .service(OrderEventsRoute::<B>::new())
        .service(RequestOtpRoute::<B, G>::new())
        .service(ChargeRoute::<B, G>::new());
    let (whitelist, secret) = auth_layers();
    let webhook_scope = web::scope("/webhooks")
        .wrap(secret)
        .wrap(whitelist)
        .service(AuthorizeWebhookRoute::<B>::new())
        .service(SettleWebhookRoute::<B>::new());
    cfg.app_data(web::Data::new(services.orders.clone()))
        .app_data(web::Data::new(services.charges.clone()))
        .app_data(web::Data::new(services.reconciler.clone()))
        .app_data(web::Data::new(services.ledger.clone()))
        .app_data(web::Data::new(services.dispersals.clone()))
        .app_data(web::Data::new(services.rates.clone()))
        .app_data(
            web::JsonConfig::default()
                .error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into()),
        )
        .app_data(
            web::PathConfig::default()
                .error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into()),
        )
        .service(health)
        .service(balances_scope)
        .service(dispersal_scope)
        .service(order_scope)
        .service(webhook_scope);
}

fn create_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_settled(|ev: OrderSettledEvent| {
        Box::pin(async move {
            let order = &ev.order;
            let reference = ev.reference.as_deref().unwrap_or("<none>");
            if ev.ledger.is_complete() {
                info!(
                    "🪝️ Order {} for store {} settled via {:?} (ref {reference}). Net {} credited, fee {}",
                    order.order_id, order.store_id, ev.path, ev.ledger.split.net, ev.ledger.split.fee
                );
            } else {
                warn!(
                    "🪝️ Order {} for store {} settled via {:?} (ref {reference}), but the ledger is incomplete: {:?}",
                    order.order_id, order.store_id, ev.path, ev.ledger
                );
            }
        })
    });
    hooks
}
