use std::time::Duration;

use cucumber::given;

use crate::cucumber::SettlementWorld;

#[given("a fresh install")]
async fn fresh_database(world: &mut SettlementWorld) {
    world.start(Duration::from_secs(300)).await;
}

#[given(expr = "a fresh install with a {int}ms payment window")]
async fn fresh_database_with_window(world: &mut SettlementWorld, ms: u64) {
    world.start(Duration::from_millis(ms)).await;
}
