use std::{collections::HashMap, fmt::Debug, time::Duration};

use cucumber::World;
use settlement_engine::{
    order_objects::{GatewayResult, ReconciliationAck},
    ChargeError,
    OrderEventStream,
    SqliteDatabase,
};

use crate::support::Engine;

#[derive(Default, World)]
pub struct SettlementWorld {
    pub system: Option<Engine<SqliteDatabase>>,
    pub last_ack: Option<ReconciliationAck>,
    pub charges: Vec<Result<GatewayResult, ChargeError>>,
    pub watchers: HashMap<String, OrderEventStream>,
}

impl Debug for SettlementWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementWorld")
            .field("db", &self.system.as_ref().map(|s| s.db.url().to_string()))
            .field("last_ack", &self.last_ack)
            .field("charges", &self.charges)
            .field("watchers", &self.watchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SettlementWorld {
    pub fn engine(&self) -> &Engine<SqliteDatabase> {
        self.system.as_ref().expect("Settlement engine not initialised")
    }

    pub async fn start(&mut self, window: Duration) {
        self.system = Some(Engine::new(window).await);
    }

    pub fn last_charge(&self) -> &Result<GatewayResult, ChargeError> {
        self.charges.last().expect("No charge has been made")
    }
}
