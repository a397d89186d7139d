//! External Collaborators
//!
//! Traits for the three services a checkout talks to: the identity provider,
//! the catalog datastore and the payment processor. Production
//! implementations live in `checkout-runtime` (Supabase) and
//! `checkout-payments` (Stripe); [`mock`] holds in-memory versions.

pub mod mock;

pub use mock::{MockCatalogStore, MockIdentityProvider, MockPaymentProcessor};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{CreditPackageRow, SubscriptionPlanRow, UserIdentity};
use crate::session::{CheckoutSession, NewPrice, PriceKind, ProcessorPrice, SessionParams};

/// Resolves a bearer token to a user
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify the token and return its owner
    async fn verify_token(&self, token: &str) -> Result<UserIdentity>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Exact-match key for catalog lookups
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogKey<'a> {
    /// `stripe_product_id` column
    ProductId(&'a str),
    /// `id` column
    Id(&'a str),
}

impl CatalogKey<'_> {
    pub fn column(&self) -> &'static str {
        match self {
            CatalogKey::ProductId(_) => "stripe_product_id",
            CatalogKey::Id(_) => "id",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            CatalogKey::ProductId(v) | CatalogKey::Id(v) => v,
        }
    }
}

/// Read-only catalog lookups; zero or one row per key
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_credit_package(&self, key: CatalogKey<'_>) -> Result<Option<CreditPackageRow>>;

    async fn find_subscription_plan(
        &self,
        key: CatalogKey<'_>,
    ) -> Result<Option<SubscriptionPlanRow>>;
}

/// Payment processor (Strategy pattern)
///
/// Implement this for each processor. The handler only ever goes through it.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Active prices attached to a product, filtered by type
    async fn list_active_prices(
        &self,
        product_id: &str,
        kind: PriceKind,
    ) -> Result<Vec<ProcessorPrice>>;

    /// Create a price under an existing product
    async fn create_price(&self, price: &NewPrice) -> Result<ProcessorPrice>;

    /// Create a hosted checkout session
    async fn create_checkout_session(&self, params: &SessionParams) -> Result<CheckoutSession>;

    /// Processor name
    fn name(&self) -> &str;
}
