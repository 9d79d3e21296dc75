//! A small JSON client for the payment gateway's merchant API.
//!
//! The client knows about the gateway's wire format and nothing else. Adapting its replies to the settlement
//! engine's gateway traits is the job of the server.
mod api;
mod config;
mod data_objects;
mod error;
pub mod helpers;

pub use api::GatewayApi;
pub use config::GatewayConfig;
pub use data_objects::{ChargeBody, GatewayReply, OtpBody, PayoutBody, PayoutLine, RateReply};
pub use error::GatewayApiError;
