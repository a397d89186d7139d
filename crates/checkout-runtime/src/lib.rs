//! # checkout-runtime
//!
//! Runtime providers for the checkout handler.
//!
//! ## Providers
//!
//! - **Supabase Auth**: bearer token verification (`IdentityProvider`)
//! - **Supabase PostgREST**: `credit_packages` / `subscription_plans` lookups (`CatalogStore`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_runtime::SupabaseClient;
//!
//! let supabase = Arc::new(SupabaseClient::from_env()?);
//! let handler = CheckoutHandler::new(
//!     supabase.clone(),
//!     supabase,
//!     Arc::new(StripeProcessor::from_env()?),
//!     CheckoutConfig::from_env(),
//! );
//! ```

pub mod supabase;

pub use supabase::{SupabaseClient, SupabaseConfig};

// Re-export core types for convenience
pub use checkout_core::{
    CatalogStore, CheckoutConfig, CheckoutError, CheckoutHandler, IdentityProvider, Result,
};
