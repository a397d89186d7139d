//! Payment Error Types

use checkout_core::CheckoutError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Currency code Stripe does not know
    #[error("Unsupported currency: {0}")]
    Currency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<stripe::StripeError> for PaymentError {
    fn from(err: stripe::StripeError) -> Self {
        PaymentError::Stripe(err.to_string())
    }
}

impl From<PaymentError> for CheckoutError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Config(msg) => CheckoutError::Config(msg),
            other => CheckoutError::Processor(other.to_string()),
        }
    }
}
