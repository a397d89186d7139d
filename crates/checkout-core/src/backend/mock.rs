//! In-memory Collaborators
//!
//! For testing and local demos. Every call is recorded so tests can assert
//! which external calls a request made.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use super::{CatalogKey, CatalogStore, IdentityProvider, PaymentProcessor};
use crate::error::{CheckoutError, Result};
use crate::model::{CreditPackageRow, SubscriptionPlanRow, UserIdentity};
use crate::session::{CheckoutSession, NewPrice, PriceKind, ProcessorPrice, SessionParams};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Identity provider backed by a token → user map
#[derive(Default)]
pub struct MockIdentityProvider {
    users: HashMap<String, UserIdentity>,
    calls: Mutex<Vec<String>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as belonging to `user_id`
    #[must_use]
    pub fn with_user(mut self, token: impl Into<String>, user_id: Uuid) -> Self {
        self.users.insert(token.into(), UserIdentity::new(user_id));
        self
    }

    /// Tokens passed to `verify_token`, in order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<UserIdentity> {
        lock(&self.calls).push(token.to_string());
        self.users
            .get(token)
            .cloned()
            .ok_or_else(|| CheckoutError::Identity("invalid JWT".into()))
    }

    fn name(&self) -> &str {
        "MockIdentity"
    }
}

/// Catalog backed by fixed row lists
#[derive(Default)]
pub struct MockCatalogStore {
    packages: Vec<CreditPackageRow>,
    plans: Vec<SubscriptionPlanRow>,
    failure: Option<String>,
    lookups: Mutex<Vec<String>>,
}

impl MockCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_credit_package(mut self, row: CreditPackageRow) -> Self {
        self.packages.push(row);
        self
    }

    #[must_use]
    pub fn with_subscription_plan(mut self, row: SubscriptionPlanRow) -> Self {
        self.plans.push(row);
        self
    }

    /// Make every lookup fail with a datastore error
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Lookups as `table.column=value`, in order
    pub fn lookups(&self) -> Vec<String> {
        lock(&self.lookups).clone()
    }

    fn record(&self, table: &str, key: CatalogKey<'_>) -> Result<()> {
        lock(&self.lookups).push(format!("{table}.{}={}", key.column(), key.value()));
        match &self.failure {
            Some(msg) => Err(CheckoutError::Datastore(msg.clone())),
            None => Ok(()),
        }
    }
}

fn key_matches(key: CatalogKey<'_>, id: &str, product_id: Option<&str>) -> bool {
    match key {
        CatalogKey::ProductId(v) => product_id == Some(v),
        CatalogKey::Id(v) => id == v,
    }
}

#[async_trait]
impl CatalogStore for MockCatalogStore {
    async fn find_credit_package(&self, key: CatalogKey<'_>) -> Result<Option<CreditPackageRow>> {
        self.record("credit_packages", key)?;
        Ok(self
            .packages
            .iter()
            .find(|r| key_matches(key, &r.id, r.stripe_product_id.as_deref()))
            .cloned())
    }

    async fn find_subscription_plan(
        &self,
        key: CatalogKey<'_>,
    ) -> Result<Option<SubscriptionPlanRow>> {
        self.record("subscription_plans", key)?;
        Ok(self
            .plans
            .iter()
            .find(|r| key_matches(key, &r.id, r.stripe_product_id.as_deref()))
            .cloned())
    }
}

/// Processor that keeps prices and sessions in memory
#[derive(Default)]
pub struct MockPaymentProcessor {
    prices: Mutex<Vec<ProcessorPrice>>,
    created: Mutex<Vec<NewPrice>>,
    sessions: Mutex<Vec<SessionParams>>,
    list_calls: Mutex<Vec<(String, PriceKind)>>,
    session_failure: Option<String>,
    omit_url: bool,
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing active price
    #[must_use]
    pub fn with_price(self, price: ProcessorPrice) -> Self {
        lock(&self.prices).push(price);
        self
    }

    /// Make session creation fail
    #[must_use]
    pub fn failing_sessions(mut self, message: impl Into<String>) -> Self {
        self.session_failure = Some(message.into());
        self
    }

    /// Return sessions without a redirect URL
    #[must_use]
    pub fn without_url(mut self) -> Self {
        self.omit_url = true;
        self
    }

    pub fn created_prices(&self) -> Vec<NewPrice> {
        lock(&self.created).clone()
    }

    pub fn sessions(&self) -> Vec<SessionParams> {
        lock(&self.sessions).clone()
    }

    pub fn list_calls(&self) -> Vec<(String, PriceKind)> {
        lock(&self.list_calls).clone()
    }

    /// Total number of processor calls made
    pub fn call_count(&self) -> usize {
        lock(&self.list_calls).len() + lock(&self.created).len() + lock(&self.sessions).len()
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn list_active_prices(
        &self,
        product_id: &str,
        kind: PriceKind,
    ) -> Result<Vec<ProcessorPrice>> {
        lock(&self.list_calls).push((product_id.to_string(), kind));
        Ok(lock(&self.prices)
            .iter()
            .filter(|p| p.product_id.as_deref() == Some(product_id) && p.kind() == kind)
            .cloned()
            .collect())
    }

    async fn create_price(&self, price: &NewPrice) -> Result<ProcessorPrice> {
        let mut created = lock(&self.created);
        created.push(price.clone());

        let stored = ProcessorPrice {
            id: format!("price_mock_{}", created.len()),
            product_id: Some(price.product_id.clone()),
            unit_amount: Some(price.unit_amount),
            currency: Some(price.currency.clone()),
            interval: price.interval,
        };
        lock(&self.prices).push(stored.clone());
        Ok(stored)
    }

    async fn create_checkout_session(&self, params: &SessionParams) -> Result<CheckoutSession> {
        let mut sessions = lock(&self.sessions);
        sessions.push(params.clone());

        if let Some(msg) = &self.session_failure {
            return Err(CheckoutError::Processor(msg.clone()));
        }

        let id = format!("cs_test_{}", sessions.len());
        let url = (!self.omit_url).then(|| format!("https://checkout.stripe.com/c/pay/{id}"));
        Ok(CheckoutSession { id, url })
    }

    fn name(&self) -> &str {
        "MockProcessor"
    }
}
