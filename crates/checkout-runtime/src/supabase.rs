//! Supabase Providers
//!
//! `IdentityProvider` over Supabase Auth and `CatalogStore` over PostgREST.

use std::time::Duration;

use async_trait::async_trait;
use checkout_core::{
    CatalogKey, CatalogStore, CheckoutError, CreditPackageRow, IdentityProvider, Result,
    SubscriptionPlanRow, UserIdentity,
};
use serde::de::DeserializeOwned;

const CREDIT_PACKAGES: &str = "credit_packages";
const SUBSCRIPTION_PLANS: &str = "subscription_plans";

/// Supabase project configuration
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,

    /// Public anon key, sent as `apikey`
    pub anon_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".into(),
            anon_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            ..Default::default()
        }
    }

    pub fn from_env() -> Result<Self> {
        let url = required_env("SUPABASE_URL")?;
        let anon_key = required_env("SUPABASE_ANON_KEY")?;
        let timeout_secs = std::env::var("SUPABASE_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            url,
            anon_key,
            timeout_secs,
        })
    }

    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CheckoutError::Config(format!("{name} not set")))
}

/// Supabase client implementing both identity and catalog lookups
pub struct SupabaseClient {
    http: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabaseClient {
    /// Create from configuration
    pub fn from_config(config: SupabaseConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CheckoutError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(SupabaseConfig::from_env()?)
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn auth_url(&self) -> String {
        format!("{}/auth/v1/user", self.config.base())
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.base())
    }

    /// Exact-match select; at most one row
    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        key: CatalogKey<'_>,
    ) -> Result<Option<T>> {
        let filter = format!("eq.{}", key.value());
        let response = self
            .http
            .get(self.table_url(table))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.anon_key)
            .query(&[("select", "*"), (key.column(), filter.as_str()), ("limit", "2")])
            .send()
            .await
            .map_err(|e| CheckoutError::Datastore(format!("{table}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckoutError::Datastore(format!(
                "{table} lookup returned {status}: {body}"
            )));
        }

        let rows: Vec<T> = response
            .json()
            .await
            .map_err(|e| CheckoutError::Datastore(format!("{table}: {e}")))?;

        tracing::debug!(
            table,
            column = key.column(),
            value = key.value(),
            rows = rows.len(),
            "Catalog lookup"
        );

        single_row(table, rows)
    }
}

fn single_row<T>(table: &str, rows: Vec<T>) -> Result<Option<T>> {
    if rows.len() > 1 {
        return Err(CheckoutError::Datastore(format!(
            "{table}: expected at most one row, got {}",
            rows.len()
        )));
    }
    Ok(rows.into_iter().next())
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn verify_token(&self, token: &str) -> Result<UserIdentity> {
        let response = self
            .http
            .get(self.auth_url())
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CheckoutError::Identity(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CheckoutError::Identity(format!("auth returned {status}")));
        }

        response
            .json::<UserIdentity>()
            .await
            .map_err(|e| CheckoutError::Identity(e.to_string()))
    }

    fn name(&self) -> &str {
        "Supabase"
    }
}

#[async_trait]
impl CatalogStore for SupabaseClient {
    async fn find_credit_package(&self, key: CatalogKey<'_>) -> Result<Option<CreditPackageRow>> {
        self.select_one(CREDIT_PACKAGES, key).await
    }

    async fn find_subscription_plan(
        &self,
        key: CatalogKey<'_>,
    ) -> Result<Option<SubscriptionPlanRow>> {
        self.select_one(SUBSCRIPTION_PLANS, key).await
    }
}
