//! Stripe Payment Processor
//!
//! Prices are looked up and created against existing Stripe products;
//! sessions use Stripe Checkout (Hosted).

use async_trait::async_trait;
use serde::Serialize;
use stripe::{
    CheckoutSessionMode, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionPaymentMethodTypes, CreateCheckoutSessionSubscriptionData, CreatePrice,
    CreatePriceRecurring, CreatePriceRecurringInterval, Currency, List, Price,
};

use checkout_core::{
    BillingInterval, CheckoutSession, LineItem, Metadata, NewPrice, PaymentMethodType,
    PaymentProcessor, PriceKind, ProcessorPrice, SessionMode, SessionParams,
};

use crate::error::{PaymentError, Result};

/// Query for `GET /v1/prices`
#[derive(Debug, Serialize)]
struct ListPricesQuery<'a> {
    product: &'a str,
    active: bool,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Stripe-backed [`PaymentProcessor`]
pub struct StripeProcessor {
    client: Client,
}

impl StripeProcessor {
    /// Create a new Stripe processor
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }

    /// Create from `STRIPE_SECRET_KEY`
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;

        Ok(Self::new(&secret_key))
    }

    async fn list_prices(&self, product_id: &str, kind: PriceKind) -> Result<Vec<ProcessorPrice>> {
        let query = ListPricesQuery {
            product: product_id,
            active: true,
            kind: kind.as_str(),
        };
        let prices: List<Price> = self.client.get_query("/prices", &query).await?;

        tracing::debug!(
            %product_id,
            kind = kind.as_str(),
            count = prices.data.len(),
            "Listed Stripe prices"
        );

        Ok(prices.data.into_iter().map(to_processor_price).collect())
    }

    async fn create_stripe_price(&self, price: &NewPrice) -> Result<ProcessorPrice> {
        let mut params = CreatePrice::new(parse_currency(&price.currency)?);
        params.product = Some(stripe::IdOrCreate::Id(&price.product_id));
        params.unit_amount = Some(price.unit_amount);
        params.recurring = price.interval.map(|interval| CreatePriceRecurring {
            interval: recurring_interval(interval),
            interval_count: None,
            aggregate_usage: None,
            usage_type: None,
            trial_period_days: None,
        });

        let created = Price::create(&self.client, params).await?;
        Ok(to_processor_price(created))
    }

    async fn create_session(&self, params: &SessionParams) -> Result<CheckoutSession> {
        let line_items = params
            .line_items
            .iter()
            .map(line_item)
            .collect::<Result<Vec<_>>>()?;

        let mut create = CreateCheckoutSession::new();
        create.mode = Some(session_mode(params.mode));
        create.success_url = Some(&params.success_url);
        create.cancel_url = Some(&params.cancel_url);
        create.payment_method_types = Some(
            params
                .payment_method_types
                .iter()
                .map(|m| payment_method(*m))
                .collect(),
        );
        create.line_items = Some(line_items);
        create.metadata = Some(stripe_metadata(&params.metadata));
        create.subscription_data =
            params
                .subscription_metadata
                .as_ref()
                .map(|m| CreateCheckoutSessionSubscriptionData {
                    metadata: Some(stripe_metadata(m)),
                    ..Default::default()
                });

        let session = stripe::CheckoutSession::create(&self.client, create).await?;

        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url,
        })
    }
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    async fn list_active_prices(
        &self,
        product_id: &str,
        kind: PriceKind,
    ) -> checkout_core::Result<Vec<ProcessorPrice>> {
        Ok(self.list_prices(product_id, kind).await?)
    }

    async fn create_price(&self, price: &NewPrice) -> checkout_core::Result<ProcessorPrice> {
        Ok(self.create_stripe_price(price).await?)
    }

    async fn create_checkout_session(
        &self,
        params: &SessionParams,
    ) -> checkout_core::Result<CheckoutSession> {
        Ok(self.create_session(params).await?)
    }

    fn name(&self) -> &str {
        "Stripe"
    }
}

fn parse_currency(code: &str) -> Result<Currency> {
    code.to_lowercase()
        .parse()
        .map_err(|_| PaymentError::Currency(code.to_string()))
}

fn recurring_interval(interval: BillingInterval) -> CreatePriceRecurringInterval {
    match interval {
        BillingInterval::Daily => CreatePriceRecurringInterval::Day,
        BillingInterval::Weekly => CreatePriceRecurringInterval::Week,
        BillingInterval::Monthly => CreatePriceRecurringInterval::Month,
        BillingInterval::Yearly => CreatePriceRecurringInterval::Year,
    }
}

fn session_mode(mode: SessionMode) -> CheckoutSessionMode {
    match mode {
        SessionMode::Payment => CheckoutSessionMode::Payment,
        SessionMode::Subscription => CheckoutSessionMode::Subscription,
    }
}

fn payment_method(method: PaymentMethodType) -> CreateCheckoutSessionPaymentMethodTypes {
    match method {
        PaymentMethodType::Card => CreateCheckoutSessionPaymentMethodTypes::Card,
    }
}

fn stripe_metadata(metadata: &Metadata) -> stripe::Metadata {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn line_item(item: &LineItem) -> Result<CreateCheckoutSessionLineItems> {
    match item {
        LineItem::Price { price_id, quantity } => Ok(CreateCheckoutSessionLineItems {
            price: Some(price_id.clone()),
            quantity: Some(*quantity),
            ..Default::default()
        }),
        LineItem::Inline {
            name,
            description,
            unit_amount,
            currency,
            quantity,
        } => Ok(CreateCheckoutSessionLineItems {
            quantity: Some(*quantity),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: parse_currency(currency)?,
                unit_amount: Some(*unit_amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: name.clone(),
                    description: description.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }),
    }
}

fn to_processor_price(price: Price) -> ProcessorPrice {
    ProcessorPrice {
        id: price.id.to_string(),
        product_id: price.product.as_ref().map(|p| p.id().to_string()),
        unit_amount: price.unit_amount,
        currency: price.currency.map(|c| c.to_string()),
        interval: price
            .recurring
            .as_ref()
            .and_then(|r| BillingInterval::parse(&r.interval.to_string())),
    }
}
