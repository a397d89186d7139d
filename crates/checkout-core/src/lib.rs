//! # checkout-core
//!
//! Checkout request pipeline with processor-agnostic collaborator abstractions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      CheckoutHandler                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │   Identity   │  │   Catalog    │  │  PaymentProcessor  │  │
//! │  │   Provider   │──│  + Fallback  │──│    (Strategy)      │  │
//! │  └──────────────┘  └──────────────┘  └────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The collaborator traits let the handler run against Supabase and Stripe
//! in production or the in-memory mocks in tests without changing its logic.

pub mod backend;
pub mod config;
pub mod error;
pub mod fallback;
pub mod handler;
pub mod model;
pub mod pricing;
pub mod session;

pub use backend::{CatalogKey, CatalogStore, IdentityProvider, PaymentProcessor};
pub use config::CheckoutConfig;
pub use error::{CheckoutError, Result};
pub use handler::{CheckoutHandler, CheckoutOutcome, RequestContext};
pub use model::{CreditPackageRow, PurchaseRequest, PurchaseType, SubscriptionPlanRow, UserIdentity};
pub use pricing::{ItemFields, ResolvedItem};
pub use session::{
    BillingInterval, CheckoutSession, LineItem, Metadata, NewPrice, PaymentMethodType, PriceKind,
    ProcessorPrice, SessionMode, SessionParams,
};
