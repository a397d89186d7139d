//! Checkout Request Handler
//!
//! Linear validate → resolve → create pipeline:
//!
//! ```text
//! bearer token ──▶ IdentityProvider ──▶ PurchaseRequest
//!                                          │
//!              ┌───────────────────────────┴──────────────────────┐
//!              ▼                                                  ▼
//!   credit package waterfall                           subscription waterfall
//!   row → product map → code map                       row → plan map
//!              │                                                  │
//!              └──────────▶ find-or-create price ◀────────────────┘
//!                                   │
//!                                   ▼
//!                   PaymentProcessor::create_checkout_session
//! ```
//!
//! Every step exits early on failure; nothing is retried.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, Span, field};

use crate::backend::{CatalogKey, CatalogStore, IdentityProvider, PaymentProcessor};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::fallback;
use crate::model::{
    CreditPackageRow, PurchaseRequest, PurchaseType, SubscriptionPlanRow, UserIdentity,
};
use crate::pricing::{ItemFields, ResolvedItem};
use crate::session::{
    BillingInterval, LineItem, Metadata, NewPrice, PaymentMethodType, PriceKind, SessionMode,
    SessionParams,
};

/// Plan id recorded when neither request, row nor fallback names one
pub const UNKNOWN_PLAN_ID: &str = "unknown_plan";

/// Transport-level facts about the incoming request
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    /// Raw `Authorization` header value
    pub authorization: Option<String>,

    /// Raw `Origin` header value
    pub origin: Option<String>,
}

impl RequestContext {
    pub fn bearer(token: &str) -> Self {
        Self {
            authorization: Some(format!("Bearer {token}")),
            origin: None,
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Token with any leading `Bearer ` removed
    fn token(&self) -> Result<&str> {
        let header = self
            .authorization
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(CheckoutError::MissingCredential)?;
        let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
        if token.is_empty() {
            return Err(CheckoutError::Unauthorized);
        }
        Ok(token)
    }
}

/// Successful checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub session_id: String,
    pub url: String,
}

/// The checkout request handler
pub struct CheckoutHandler {
    identity: Arc<dyn IdentityProvider>,
    catalog: Arc<dyn CatalogStore>,
    processor: Arc<dyn PaymentProcessor>,
    config: CheckoutConfig,
}

impl CheckoutHandler {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        catalog: Arc<dyn CatalogStore>,
        processor: Arc<dyn PaymentProcessor>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            identity,
            catalog,
            processor,
            config,
        }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    pub fn processor_name(&self) -> &str {
        self.processor.name()
    }

    /// Run one checkout request end to end
    ///
    /// Failures are logged here with whatever request fields were known at
    /// the time, then returned unchanged.
    pub async fn handle(&self, ctx: &RequestContext, body: &[u8]) -> Result<CheckoutOutcome> {
        let span = tracing::info_span!(
            "checkout",
            user_id = field::Empty,
            purchase_type = field::Empty,
            package_id = field::Empty,
            plan_id = field::Empty,
            stripe_product_id = field::Empty,
        );

        async move {
            let result = self.process(ctx, body).await;
            if let Err(e) = &result {
                tracing::error!(
                    error = %e,
                    kind = e.kind(),
                    origin = ?ctx.origin,
                    "Error creating Stripe checkout"
                );
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn process(&self, ctx: &RequestContext, body: &[u8]) -> Result<CheckoutOutcome> {
        let token = ctx.token()?;
        let user = self.identity.verify_token(token).await.map_err(|e| {
            tracing::warn!(error = %e, provider = self.identity.name(), "Token rejected");
            CheckoutError::Unauthorized
        })?;

        let request = PurchaseRequest::from_slice(body)?;
        record_request(&user, &request);

        tracing::info!(
            user_id = %user.id,
            purchase_type = %request.kind,
            package_id = ?request.package_id,
            plan_id = ?request.plan_id,
            stripe_product_id = ?request.stripe_product_id,
            "Creating Stripe checkout"
        );

        let origin = self.redirect_base(ctx);
        let params = match request.kind {
            PurchaseType::CreditPackage => {
                self.credit_package_session(&user, &request, origin).await?
            }
            PurchaseType::Subscription => self.subscription_session(&user, &request, origin).await?,
        };

        let session = self.processor.create_checkout_session(&params).await?;
        let url = session
            .url
            .ok_or_else(|| CheckoutError::Processor("No checkout URL returned".into()))?;

        tracing::info!(session_id = %session.id, "Stripe session created");

        Ok(CheckoutOutcome {
            session_id: session.id,
            url,
        })
    }

    fn redirect_base<'a>(&'a self, ctx: &'a RequestContext) -> &'a str {
        ctx.origin
            .as_deref()
            .filter(|o| !o.is_empty())
            .unwrap_or(&self.config.default_origin)
    }

    // ------------------------------------------------------------------
    // Credit packages
    // ------------------------------------------------------------------

    async fn find_credit_package_row(
        &self,
        request: &PurchaseRequest,
    ) -> Result<Option<CreditPackageRow>> {
        if let Some(product_id) = request.stripe_product_id.as_deref() {
            let key = CatalogKey::ProductId(product_id);
            let row = missing_on_datastore_error(
                "credit_packages",
                key,
                self.catalog.find_credit_package(key).await,
            )?;
            if row.is_some() {
                return Ok(row);
            }
        }
        let Some(id) = request.package_id.as_deref() else {
            return Ok(None);
        };
        let key = CatalogKey::Id(id);
        missing_on_datastore_error(
            "credit_packages",
            key,
            self.catalog.find_credit_package(key).await,
        )
    }

    /// Row → request product id → product-id table → package-code table
    pub async fn resolve_credit_package(&self, request: &PurchaseRequest) -> Result<ResolvedItem> {
        let row = self.find_credit_package_row(request).await?;
        let product_hint = request.stripe_product_id.as_deref();

        let item = ItemFields::merge([
            row.as_ref().map(ItemFields::from),
            product_hint.map(ItemFields::product),
            product_hint.and_then(fallback::credit_package_by_product),
            request
                .package_id
                .as_deref()
                .and_then(fallback::credit_package_by_code),
        ])
        .resolve(&self.config.currency);

        if !item.is_priceable() {
            tracing::error!(
                package_id = ?request.package_id,
                stripe_product_id = ?request.stripe_product_id,
                "Package not found"
            );
            return Err(CheckoutError::CreditPackageNotFound);
        }
        Ok(item)
    }

    async fn credit_package_session(
        &self,
        user: &UserIdentity,
        request: &PurchaseRequest,
        origin: &str,
    ) -> Result<SessionParams> {
        // Packages are always charged in the handler currency
        let item = self.resolve_credit_package(request).await?;

        let line_item = if let Some(product_id) = item.product_id.as_deref() {
            let price_id = self
                .find_or_create_price(
                    product_id,
                    None,
                    item.unit_amount_cents,
                    &self.config.currency,
                )
                .await?
                .ok_or_else(|| {
                    tracing::error!(%product_id, "No active price and no amount for package");
                    CheckoutError::CreditPackageNotFound
                })?;
            LineItem::price(price_id)
        } else {
            let Some(unit_amount) = item.unit_amount_cents else {
                return Err(CheckoutError::CreditPackageNotFound);
            };
            LineItem::Inline {
                name: format!("{} Credits", item.credits),
                description: (item.bonus_credits > 0)
                    .then(|| format!("Includes {} bonus credits!", item.bonus_credits)),
                unit_amount,
                currency: self.config.currency.clone(),
                quantity: 1,
            }
        };

        let mut metadata = Metadata::new();
        metadata.insert("user_id".into(), user.id.to_string());
        metadata.insert("credits".into(), item.total_credits().to_string());
        metadata.insert("type".into(), "credit_purchase".into());

        Ok(SessionParams {
            mode: SessionMode::Payment,
            payment_method_types: vec![PaymentMethodType::Card],
            line_items: vec![line_item],
            success_url: format!("{origin}/?payment=success"),
            cancel_url: format!("{origin}/?payment=cancelled"),
            metadata,
            subscription_metadata: None,
        })
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    async fn find_subscription_plan_row(
        &self,
        request: &PurchaseRequest,
    ) -> Result<Option<SubscriptionPlanRow>> {
        if let Some(product_id) = request.stripe_product_id.as_deref() {
            let key = CatalogKey::ProductId(product_id);
            let row = missing_on_datastore_error(
                "subscription_plans",
                key,
                self.catalog.find_subscription_plan(key).await,
            )?;
            if row.is_some() {
                return Ok(row);
            }
        }
        let Some(id) = request.plan_id.as_deref() else {
            return Ok(None);
        };
        let key = CatalogKey::Id(id);
        missing_on_datastore_error(
            "subscription_plans",
            key,
            self.catalog.find_subscription_plan(key).await,
        )
    }

    /// Row → request hints → plan table keyed by the resolved product id
    pub async fn resolve_subscription_plan(
        &self,
        request: &PurchaseRequest,
    ) -> Result<ResolvedItem> {
        let row = self.find_subscription_plan_row(request).await?;

        let known = ItemFields::merge([
            row.as_ref().map(ItemFields::from),
            Some(ItemFields {
                product_id: request.stripe_product_id.clone(),
                plan_id: request.plan_id.clone(),
                ..Default::default()
            }),
        ]);
        let plan_fallback = known
            .product_id
            .as_deref()
            .and_then(fallback::subscription_plan_by_product);

        let item = ItemFields::merge([Some(known), plan_fallback]).resolve(&self.config.currency);

        if item.product_id.is_none() {
            tracing::error!(
                plan_id = ?request.plan_id,
                "Plan missing product id; no DB row and no fallback"
            );
            return Err(CheckoutError::SubscriptionPlanNotFound);
        }
        Ok(item)
    }

    async fn subscription_session(
        &self,
        user: &UserIdentity,
        request: &PurchaseRequest,
        origin: &str,
    ) -> Result<SessionParams> {
        let item = self.resolve_subscription_plan(request).await?;
        let Some(product_id) = item.product_id.as_deref() else {
            return Err(CheckoutError::SubscriptionPlanNotFound);
        };

        let price_id = self
            .find_or_create_price(
                product_id,
                Some(BillingInterval::Monthly),
                item.unit_amount_cents,
                &item.currency,
            )
            .await?
            .ok_or_else(|| {
                tracing::error!(%product_id, "Cannot create price: amount unknown");
                CheckoutError::SubscriptionPlanNotFound
            })?;

        let plan_id = item.plan_id.as_deref().unwrap_or(UNKNOWN_PLAN_ID);

        let mut metadata = Metadata::new();
        metadata.insert("user_id".into(), user.id.to_string());
        metadata.insert("plan_id".into(), plan_id.to_string());
        metadata.insert("credits".into(), item.credits.to_string());
        metadata.insert("type".into(), "subscription".into());

        Ok(SessionParams {
            mode: SessionMode::Subscription,
            payment_method_types: vec![PaymentMethodType::Card],
            line_items: vec![LineItem::price(price_id)],
            success_url: format!("{origin}/?subscription=success"),
            cancel_url: format!("{origin}/?subscription=cancelled"),
            subscription_metadata: Some(metadata.clone()),
            metadata,
        })
    }

    // ------------------------------------------------------------------
    // Prices
    // ------------------------------------------------------------------

    /// Reuse an active price on `product_id`, or create one when an amount is known.
    ///
    /// `interval: None` looks for one-time prices and takes the first; otherwise
    /// recurring prices are filtered to that interval. Returns `Ok(None)` when
    /// nothing can be reused and there is no amount to create one with.
    ///
    /// Not guarded against concurrent first-time requests for the same product,
    /// which can each create a price.
    async fn find_or_create_price(
        &self,
        product_id: &str,
        interval: Option<BillingInterval>,
        unit_amount: Option<i64>,
        currency: &str,
    ) -> Result<Option<String>> {
        let kind = if interval.is_some() {
            PriceKind::Recurring
        } else {
            PriceKind::OneTime
        };

        let prices = self.processor.list_active_prices(product_id, kind).await?;
        let existing = match interval {
            None => prices.into_iter().next(),
            Some(wanted) => prices.into_iter().find(|p| p.interval == Some(wanted)),
        };

        if let Some(price) = existing {
            tracing::debug!(price_id = %price.id, %product_id, "Reusing existing price");
            return Ok(Some(price.id));
        }

        let Some(unit_amount) = unit_amount else {
            return Ok(None);
        };

        let created = self
            .processor
            .create_price(&NewPrice {
                product_id: product_id.to_string(),
                unit_amount,
                currency: currency.to_string(),
                interval,
            })
            .await?;

        tracing::info!(
            price_id = %created.id,
            %product_id,
            unit_amount,
            %currency,
            "Created price"
        );

        Ok(Some(created.id))
    }
}

/// A failed catalog lookup counts as "no row" so the fallback tables still apply
fn missing_on_datastore_error<T>(
    table: &str,
    key: CatalogKey<'_>,
    result: Result<Option<T>>,
) -> Result<Option<T>> {
    match result {
        Err(CheckoutError::Datastore(msg)) => {
            tracing::warn!(
                table,
                column = key.column(),
                value = key.value(),
                error = %msg,
                "Catalog lookup failed, using fallback tables"
            );
            Ok(None)
        }
        other => other,
    }
}

fn record_request(user: &UserIdentity, request: &PurchaseRequest) {
    let span = Span::current();
    span.record("user_id", field::display(user.id));
    span.record("purchase_type", request.kind.as_str());
    if let Some(v) = &request.package_id {
        span.record("package_id", v.as_str());
    }
    if let Some(v) = &request.plan_id {
        span.record("plan_id", v.as_str());
    }
    if let Some(v) = &request.stripe_product_id {
        span.record("stripe_product_id", v.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockCatalogStore, MockIdentityProvider, MockPaymentProcessor};
    use crate::session::ProcessorPrice;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    const TOKEN: &str = "token-abc";
    const USER: Uuid = Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0);

    struct Harness {
        identity: Arc<MockIdentityProvider>,
        catalog: Arc<MockCatalogStore>,
        processor: Arc<MockPaymentProcessor>,
        handler: CheckoutHandler,
    }

    fn harness(catalog: MockCatalogStore, processor: MockPaymentProcessor) -> Harness {
        let identity = Arc::new(MockIdentityProvider::new().with_user(TOKEN, USER));
        let catalog = Arc::new(catalog);
        let processor = Arc::new(processor);
        let handler = CheckoutHandler::new(
            identity.clone(),
            catalog.clone(),
            processor.clone(),
            CheckoutConfig::default(),
        );
        Harness {
            identity,
            catalog,
            processor,
            handler,
        }
    }

    fn empty() -> Harness {
        harness(MockCatalogStore::new(), MockPaymentProcessor::new())
    }

    fn one_time(id: &str, product: &str, amount: i64) -> ProcessorPrice {
        ProcessorPrice {
            id: id.into(),
            product_id: Some(product.into()),
            unit_amount: Some(amount),
            currency: Some("usd".into()),
            interval: None,
        }
    }

    fn recurring(id: &str, product: &str, interval: BillingInterval) -> ProcessorPrice {
        ProcessorPrice {
            interval: Some(interval),
            ..one_time(id, product, 1500)
        }
    }

    async fn run(h: &Harness, body: &str) -> Result<CheckoutOutcome> {
        h.handler
            .handle(&RequestContext::bearer(TOKEN), body.as_bytes())
            .await
    }

    #[tokio::test]
    async fn test_missing_credential_makes_no_calls() {
        for body in [
            r#"{"type":"credit_package","packageId":"pkg1"}"#,
            r#"{"type":"subscription","stripeProductId":"prod_SyYMs3lMIhORSP"}"#,
        ] {
            let h = empty();
            let err = h
                .handler
                .handle(&RequestContext::default(), body.as_bytes())
                .await
                .unwrap_err();
            assert!(matches!(err, CheckoutError::MissingCredential));
            assert!(h.identity.calls().is_empty());
            assert!(h.catalog.lookups().is_empty());
            assert_eq!(h.processor.call_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_rejected_token_is_unauthorized() {
        let h = empty();
        let err = h
            .handler
            .handle(
                &RequestContext::bearer("stolen"),
                br#"{"type":"credit_package","packageId":"pkg1"}"#,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Unauthorized));
        assert_eq!(err.to_string(), "Unauthorized");
        assert!(h.catalog.lookups().is_empty());
        assert_eq!(h.processor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_bearer_prefix_is_stripped() {
        let h = empty();
        run(&h, r#"{"type":"credit_package","packageId":"pkg1"}"#)
            .await
            .unwrap();
        assert_eq!(h.identity.calls(), vec![TOKEN.to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_type_makes_no_external_calls() {
        let h = empty();
        let err = run(&h, r#"{"type":"donation","packageId":"pkg1"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid type");
        assert!(h.catalog.lookups().is_empty());
        assert_eq!(h.processor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_pkg3_resolves_through_code_table() {
        let h = empty();
        let outcome = run(&h, r#"{"type":"credit_package","packageId":"pkg3"}"#)
            .await
            .unwrap();
        assert_eq!(outcome.session_id, "cs_test_1");
        assert!(outcome.url.contains("cs_test_1"));

        assert_eq!(h.catalog.lookups(), vec!["credit_packages.id=pkg3".to_string()]);

        let created = h.processor.created_prices();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].product_id, "prod_SyYfzJ1fjz9zb9");
        assert_eq!(created[0].unit_amount, 1000);
        assert_eq!(created[0].currency, "usd");
        assert_eq!(created[0].interval, None);

        let session = &h.processor.sessions()[0];
        assert_eq!(session.mode, SessionMode::Payment);
        assert_eq!(session.payment_method_types, vec![PaymentMethodType::Card]);
        assert_eq!(session.metadata["credits"], "1000");
        assert_eq!(session.metadata["type"], "credit_purchase");
        assert_eq!(session.metadata["user_id"], USER.to_string());
        assert_eq!(session.success_url, "http://localhost:8080/?payment=success");
        assert_eq!(session.cancel_url, "http://localhost:8080/?payment=cancelled");
        assert!(session.subscription_metadata.is_none());
    }

    #[tokio::test]
    async fn test_row_beats_both_fallback_tables() {
        let catalog = MockCatalogStore::new().with_credit_package(CreditPackageRow {
            id: "pkg3".into(),
            stripe_product_id: Some("prod_SyYfzJ1fjz9zb9".into()),
            credits: Some(1200),
            bonus: Some(300),
            price: Some(dec!(12.34)),
        });
        let h = harness(catalog, MockPaymentProcessor::new());

        run(
            &h,
            r#"{"type":"credit_package","packageId":"pkg3","stripeProductId":"prod_SyYfzJ1fjz9zb9"}"#,
        )
        .await
        .unwrap();

        assert_eq!(h.processor.created_prices()[0].unit_amount, 1234);
        assert_eq!(h.processor.sessions()[0].metadata["credits"], "1500");
    }

    #[tokio::test]
    async fn test_product_table_without_row() {
        let h = empty();
        run(
            &h,
            r#"{"type":"credit_package","stripeProductId":"prod_SyYmVrUetdiIBY"}"#,
        )
        .await
        .unwrap();

        let created = h.processor.created_prices();
        assert_eq!(created[0].product_id, "prod_SyYmVrUetdiIBY");
        assert_eq!(created[0].unit_amount, 2500);
        assert_eq!(h.processor.sessions()[0].metadata["credits"], "2500");
    }

    #[tokio::test]
    async fn test_product_lookup_falls_back_to_id_lookup() {
        let h = empty();
        run(
            &h,
            r#"{"type":"credit_package","packageId":"pkg2","stripeProductId":"prod_other"}"#,
        )
        .await
        .unwrap();

        assert_eq!(
            h.catalog.lookups(),
            vec![
                "credit_packages.stripe_product_id=prod_other".to_string(),
                "credit_packages.id=pkg2".to_string(),
            ]
        );
        // Request product id outranks the package code's product, code table supplies the price
        let created = h.processor.created_prices();
        assert_eq!(created[0].product_id, "prod_other");
        assert_eq!(created[0].unit_amount, 500);
    }

    #[tokio::test]
    async fn test_unresolvable_package_makes_no_processor_calls() {
        let h = empty();
        let err = run(&h, r#"{"type":"credit_package","packageId":"pkg99"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::CreditPackageNotFound));
        assert_eq!(err.to_string(), "Credit package not found");
        assert_eq!(h.processor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_existing_price_is_reused() {
        let processor = MockPaymentProcessor::new()
            .with_price(one_time("price_existing", "prod_SyYfzJ1fjz9zb9", 1000))
            .with_price(one_time("price_second", "prod_SyYfzJ1fjz9zb9", 999));
        let h = harness(MockCatalogStore::new(), processor);

        run(&h, r#"{"type":"credit_package","packageId":"pkg3"}"#)
            .await
            .unwrap();

        assert!(h.processor.created_prices().is_empty());
        assert_eq!(
            h.processor.sessions()[0].line_items[0].price_id(),
            Some("price_existing")
        );
        assert_eq!(
            h.processor.list_calls(),
            vec![("prod_SyYfzJ1fjz9zb9".to_string(), PriceKind::OneTime)]
        );
    }

    #[tokio::test]
    async fn test_exactly_one_price_created_before_session() {
        let h = empty();
        run(&h, r#"{"type":"credit_package","packageId":"pkg1"}"#)
            .await
            .unwrap();

        assert_eq!(h.processor.created_prices().len(), 1);
        assert_eq!(
            h.processor.sessions()[0].line_items[0].price_id(),
            Some("price_mock_1")
        );
    }

    #[tokio::test]
    async fn test_inline_price_without_product() {
        let catalog = MockCatalogStore::new().with_credit_package(CreditPackageRow {
            id: "promo".into(),
            stripe_product_id: None,
            credits: Some(400),
            bonus: Some(50),
            price: Some(dec!(4)),
        });
        let h = harness(catalog, MockPaymentProcessor::new());

        run(&h, r#"{"type":"credit_package","packageId":"promo"}"#)
            .await
            .unwrap();

        assert!(h.processor.list_calls().is_empty());
        let session = &h.processor.sessions()[0];
        assert_eq!(
            session.line_items[0],
            LineItem::Inline {
                name: "400 Credits".into(),
                description: Some("Includes 50 bonus credits!".into()),
                unit_amount: 400,
                currency: "usd".into(),
                quantity: 1,
            }
        );
        assert_eq!(session.metadata["credits"], "450");
    }

    #[tokio::test]
    async fn test_product_without_price_or_amount_fails_before_session() {
        let h = empty();
        let err = run(
            &h,
            r#"{"type":"credit_package","stripeProductId":"prod_unpriced"}"#,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::CreditPackageNotFound));
        assert_eq!(h.processor.list_calls().len(), 1);
        assert!(h.processor.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_pro_plan_through_fallback() {
        let h = empty();
        let ctx = RequestContext::bearer(TOKEN).with_origin("https://app.example.com");
        h.handler
            .handle(
                &ctx,
                br#"{"type":"subscription","stripeProductId":"prod_SyYMs3lMIhORSP"}"#,
            )
            .await
            .unwrap();

        let created = h.processor.created_prices();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].unit_amount, 1500);
        assert_eq!(created[0].currency, "usd");
        assert_eq!(created[0].interval, Some(BillingInterval::Monthly));

        let session = &h.processor.sessions()[0];
        assert_eq!(session.mode, SessionMode::Subscription);
        assert_eq!(session.metadata["plan_id"], "plan_pro");
        assert_eq!(session.metadata["credits"], "2000");
        assert_eq!(session.metadata["type"], "subscription");
        assert_eq!(session.subscription_metadata.as_ref(), Some(&session.metadata));
        assert_eq!(
            session.success_url,
            "https://app.example.com/?subscription=success"
        );
        assert_eq!(
            session.cancel_url,
            "https://app.example.com/?subscription=cancelled"
        );
    }

    #[tokio::test]
    async fn test_only_monthly_recurring_price_is_reused() {
        let processor = MockPaymentProcessor::new()
            .with_price(recurring("price_yearly", "prod_SyYK31lYwaraZW", BillingInterval::Yearly))
            .with_price(recurring("price_monthly", "prod_SyYK31lYwaraZW", BillingInterval::Monthly));
        let h = harness(MockCatalogStore::new(), processor);

        run(
            &h,
            r#"{"type":"subscription","stripeProductId":"prod_SyYK31lYwaraZW"}"#,
        )
        .await
        .unwrap();

        assert!(h.processor.created_prices().is_empty());
        assert_eq!(
            h.processor.sessions()[0].line_items[0].price_id(),
            Some("price_monthly")
        );
    }

    #[tokio::test]
    async fn test_yearly_price_is_not_reused() {
        let processor = MockPaymentProcessor::new().with_price(recurring(
            "price_yearly",
            "prod_SyYK31lYwaraZW",
            BillingInterval::Yearly,
        ));
        let h = harness(MockCatalogStore::new(), processor);

        run(
            &h,
            r#"{"type":"subscription","stripeProductId":"prod_SyYK31lYwaraZW"}"#,
        )
        .await
        .unwrap();

        let created = h.processor.created_prices();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].unit_amount, 900);
    }

    #[tokio::test]
    async fn test_plan_without_product_id_fails_without_processor_calls() {
        let h = empty();
        let err = run(&h, r#"{"type":"subscription","planId":"plan_pro"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::SubscriptionPlanNotFound));
        assert_eq!(
            h.catalog.lookups(),
            vec!["subscription_plans.id=plan_pro".to_string()]
        );
        assert_eq!(h.processor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_plan_without_amount_fails_after_lookup() {
        let h = empty();
        let err = run(
            &h,
            r#"{"type":"subscription","stripeProductId":"prod_mystery"}"#,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::SubscriptionPlanNotFound));
        assert_eq!(h.processor.list_calls().len(), 1);
        assert!(h.processor.created_prices().is_empty());
        assert!(h.processor.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_plan_row_wins_over_fallback() {
        let catalog = MockCatalogStore::new().with_subscription_plan(SubscriptionPlanRow {
            id: "plan_team".into(),
            stripe_product_id: Some("prod_SyYMs3lMIhORSP".into()),
            credits: Some(3000),
            price: Some(dec!(12)),
            currency: Some("EUR".into()),
        });
        let h = harness(catalog, MockPaymentProcessor::new());

        run(&h, r#"{"type":"subscription","planId":"plan_team"}"#)
            .await
            .unwrap();

        let created = h.processor.created_prices();
        assert_eq!(created[0].product_id, "prod_SyYMs3lMIhORSP");
        assert_eq!(created[0].unit_amount, 1200);
        assert_eq!(created[0].currency, "eur");

        let session = &h.processor.sessions()[0];
        assert_eq!(session.metadata["plan_id"], "plan_team");
        assert_eq!(session.metadata["credits"], "3000");
    }

    #[tokio::test]
    async fn test_plan_row_id_recorded_over_plan_table() {
        let catalog = MockCatalogStore::new().with_subscription_plan(SubscriptionPlanRow {
            id: "9f1c2d3e-0000-4000-8000-000000000001".into(),
            stripe_product_id: Some("prod_SyYMs3lMIhORSP".into()),
            ..Default::default()
        });
        let h = harness(catalog, MockPaymentProcessor::new());

        run(
            &h,
            r#"{"type":"subscription","stripeProductId":"prod_SyYMs3lMIhORSP"}"#,
        )
        .await
        .unwrap();

        let session = &h.processor.sessions()[0];
        assert_eq!(
            session.metadata["plan_id"],
            "9f1c2d3e-0000-4000-8000-000000000001"
        );
        // Empty row columns still come from the plan table
        assert_eq!(session.metadata["credits"], "2000");
        assert_eq!(h.processor.created_prices()[0].unit_amount, 1500);
    }

    #[tokio::test]
    async fn test_unknown_plan_id_default() {
        let processor = MockPaymentProcessor::new().with_price(recurring(
            "price_m",
            "prod_custom",
            BillingInterval::Monthly,
        ));
        let h = harness(MockCatalogStore::new(), processor);

        run(&h, r#"{"type":"subscription","stripeProductId":"prod_custom"}"#)
            .await
            .unwrap();

        let session = &h.processor.sessions()[0];
        assert_eq!(session.metadata["plan_id"], UNKNOWN_PLAN_ID);
        assert_eq!(session.metadata["credits"], "0");
    }

    #[tokio::test]
    async fn test_resolution_without_a_session() {
        let h = empty();

        let package = h
            .handler
            .resolve_credit_package(
                &PurchaseRequest::from_slice(br#"{"type":"credit_package","packageId":"pkg5"}"#)
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(package.product_id.as_deref(), Some("prod_SyYg54VfiOr7LQ"));
        assert_eq!(package.total_credits(), 5000);
        assert_eq!(package.unit_amount_cents, Some(5000));

        let plan = h
            .handler
            .resolve_subscription_plan(
                &PurchaseRequest::from_slice(
                    br#"{"type":"subscription","stripeProductId":"prod_SyYChoQJbIb1ye"}"#,
                )
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(plan.plan_id.as_deref(), Some("plan_free"));
        assert_eq!(plan.unit_amount_cents, Some(0));

        assert_eq!(h.processor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_datastore_failure_falls_back_to_tables() {
        let h = harness(
            MockCatalogStore::new().failing("invalid input syntax for type uuid: \"pkg3\""),
            MockPaymentProcessor::new(),
        );
        let outcome = run(&h, r#"{"type":"credit_package","packageId":"pkg3"}"#)
            .await
            .unwrap();
        assert_eq!(outcome.session_id, "cs_test_1");
        assert_eq!(h.catalog.lookups(), vec!["credit_packages.id=pkg3".to_string()]);

        let created = h.processor.created_prices();
        assert_eq!(created[0].product_id, "prod_SyYfzJ1fjz9zb9");
        assert_eq!(created[0].unit_amount, 1000);
        assert_eq!(h.processor.sessions()[0].metadata["credits"], "1000");
    }

    #[tokio::test]
    async fn test_datastore_failure_on_both_plan_lookups() {
        let h = harness(
            MockCatalogStore::new().failing("connection reset"),
            MockPaymentProcessor::new(),
        );
        run(
            &h,
            r#"{"type":"subscription","planId":"plan_pro","stripeProductId":"prod_SyYMs3lMIhORSP"}"#,
        )
        .await
        .unwrap();

        assert_eq!(h.catalog.lookups().len(), 2);
        let session = &h.processor.sessions()[0];
        assert_eq!(session.metadata["plan_id"], "plan_pro");
        assert_eq!(session.metadata["credits"], "2000");
    }

    #[tokio::test]
    async fn test_processor_failure_surfaces_message() {
        let h = harness(
            MockCatalogStore::new(),
            MockPaymentProcessor::new().failing_sessions("card declined"),
        );
        let err = run(&h, r#"{"type":"credit_package","packageId":"pkg1"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Payment processor error: card declined");
    }

    #[tokio::test]
    async fn test_session_without_url_is_an_error() {
        let h = harness(
            MockCatalogStore::new(),
            MockPaymentProcessor::new().without_url(),
        );
        let err = run(&h, r#"{"type":"credit_package","packageId":"pkg1"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Processor(_)));
    }
}
