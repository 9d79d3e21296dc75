//! Helpers for tests that need a real database or a gateway whose answers can be scripted.
mod gateway;
mod prepare_env;

pub use gateway::{GatewayCall, ScriptedGateway};
pub use prepare_env::{create_database, drop_database, prepare_test_env, random_db_path};
