//! Error Types

use thiserror::Error;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout error types
///
/// The `Display` text of each variant is what the caller sees in the
/// `{"error": ...}` body.
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// No `Authorization` header on the request
    #[error("No authorization header")]
    MissingCredential,

    /// Identity provider rejected or could not resolve the token
    #[error("Unauthorized")]
    Unauthorized,

    /// Body was not a valid purchase request
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Purchase type is not one we sell
    #[error("Invalid type")]
    InvalidType(String),

    /// No row, fallback entry, or price could be resolved for a credit package
    #[error("Credit package not found")]
    CreditPackageNotFound,

    /// No product id, or no price and no amount, for a subscription plan
    #[error("Subscription plan not found")]
    SubscriptionPlanNotFound,

    /// Identity provider transport or protocol failure
    #[error("Identity provider error: {0}")]
    Identity(String),

    /// Datastore lookup failed
    #[error("Datastore error: {0}")]
    Datastore(String),

    /// Payment processor call failed
    #[error("Payment processor error: {0}")]
    Processor(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CheckoutError {
    /// Short machine-readable kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::MissingCredential | CheckoutError::Unauthorized => "unauthorized",
            CheckoutError::InvalidBody(_) | CheckoutError::InvalidType(_) => "invalid_request",
            CheckoutError::CreditPackageNotFound | CheckoutError::SubscriptionPlanNotFound => {
                "item_not_found"
            }
            CheckoutError::Identity(_)
            | CheckoutError::Datastore(_)
            | CheckoutError::Processor(_) => "upstream_failure",
            CheckoutError::Config(_) => "config",
        }
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        CheckoutError::InvalidBody(err.to_string())
    }
}
