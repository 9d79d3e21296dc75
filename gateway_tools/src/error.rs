use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("Could not build the gateway client: {0}")]
    Initialization(String),
    #[error("The gateway request could not be sent: {0}")]
    RestRequestError(String),
    #[error("The gateway response body could not be read: {0}")]
    RestResponseError(String),
    #[error("The gateway sent JSON we do not understand: {0}")]
    JsonError(String),
    /// The gateway answered with a non-2xx status. `message` is the raw response body.
    #[error("Gateway call failed with HTTP {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
}
