use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use settlement_engine::{ChargeError, DispersalError, GatewayError, OrderFlowError, SettlementDatabaseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("The payment gateway is unavailable. {0}")]
    GatewayUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<SettlementDatabaseError> for ServerError {
    fn from(e: SettlementDatabaseError) -> Self {
        match e {
            SettlementDatabaseError::OrderAlreadyExists(_) => Self::Conflict(e.to_string()),
            SettlementDatabaseError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            e => {
                error!("🗃️ Database error while handling a request. {e}");
                Self::BackendError(format!("Database error: {e}"))
            },
        }
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        error!("💳️ Payment gateway error while handling a request. {e}");
        Self::GatewayUnavailable(e.to_string())
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::DatabaseError(e) => e.into(),
            OrderFlowError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::InvalidTransition { .. } => Self::Conflict(e.to_string()),
            OrderFlowError::InvalidOrder(_) => Self::InvalidRequestBody(e.to_string()),
            OrderFlowError::PricingError(e) => e.into(),
        }
    }
}

impl From<ChargeError> for ServerError {
    fn from(e: ChargeError) -> Self {
        match e {
            ChargeError::DatabaseError(e) => e.into(),
            ChargeError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            ChargeError::NotAwaitingPayment { .. } => Self::Conflict(e.to_string()),
            ChargeError::AmountMismatch { .. } => Self::InvalidRequestBody(e.to_string()),
            ChargeError::MissingDetails(_) => Self::InvalidRequestBody(e.to_string()),
            ChargeError::GatewayError(e) => e.into(),
        }
    }
}

impl From<DispersalError> for ServerError {
    fn from(e: DispersalError) -> Self {
        match e {
            DispersalError::DatabaseError(e) => e.into(),
            DispersalError::NoEligibleStores => Self::Conflict(e.to_string()),
            DispersalError::DispersalInProgress => Self::Conflict(e.to_string()),
            DispersalError::BalanceChanged(_) => Self::Conflict(e.to_string()),
            DispersalError::MissingReference => Self::InvalidRequestBody(e.to_string()),
            DispersalError::InvalidBankAccount(_) => Self::InvalidRequestBody(e.to_string()),
            DispersalError::DispersalNotFound(_) => Self::NoRecordFound(e.to_string()),
            DispersalError::GatewayError(e) => e.into(),
        }
    }
}
