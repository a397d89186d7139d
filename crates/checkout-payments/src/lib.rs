//! # checkout-payments
//!
//! Stripe implementation of the checkout `PaymentProcessor`.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  Your Site  │────▶│  Stripe Hosted  │────▶│  Your Site  │
//! │  (credits)  │     │  Checkout Page  │     │ ?payment=.. │
//! └─────────────┘     └─────────────────┘     └─────────────┘
//! ```
//!
//! Prices are reused when an active one already exists on the product and
//! created on first use otherwise.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_payments::StripeProcessor;
//!
//! let processor = StripeProcessor::from_env()?;
//! let prices = processor
//!     .list_active_prices("prod_SyYfzJ1fjz9zb9", PriceKind::OneTime)
//!     .await?;
//! ```

mod error;
mod processor;

pub use error::{PaymentError, Result};
pub use processor::StripeProcessor;
