//! Processor-facing price and checkout session shapes
//!
//! These are processor-agnostic; `checkout-payments` maps them onto Stripe.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Session and subscription metadata
pub type Metadata = BTreeMap<String, String>;

/// Price type filter for listing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceKind {
    OneTime,
    Recurring,
}

impl PriceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceKind::OneTime => "one_time",
            PriceKind::Recurring => "recurring",
        }
    }
}

/// Billing interval
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingInterval {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Daily => "day",
            BillingInterval::Weekly => "week",
            BillingInterval::Monthly => "month",
            BillingInterval::Yearly => "year",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(BillingInterval::Daily),
            "week" => Some(BillingInterval::Weekly),
            "month" => Some(BillingInterval::Monthly),
            "year" => Some(BillingInterval::Yearly),
            _ => None,
        }
    }
}

/// A price as reported by the processor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorPrice {
    pub id: String,
    pub product_id: Option<String>,
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
    /// `None` for one-time prices
    pub interval: Option<BillingInterval>,
}

impl ProcessorPrice {
    pub fn kind(&self) -> PriceKind {
        if self.interval.is_some() {
            PriceKind::Recurring
        } else {
            PriceKind::OneTime
        }
    }
}

/// Parameters for creating a price under an existing product
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPrice {
    pub product_id: String,
    /// Minor units
    pub unit_amount: i64,
    pub currency: String,
    /// `None` creates a one-time price
    pub interval: Option<BillingInterval>,
}

/// Checkout mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Payment,
    Subscription,
}

/// Accepted payment methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodType {
    Card,
}

/// One checkout line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineItem {
    /// Reference to a persisted price
    Price { price_id: String, quantity: u64 },

    /// Ad-hoc price described inline
    Inline {
        name: String,
        description: Option<String>,
        unit_amount: i64,
        currency: String,
        quantity: u64,
    },
}

impl LineItem {
    pub fn price(price_id: impl Into<String>) -> Self {
        LineItem::Price {
            price_id: price_id.into(),
            quantity: 1,
        }
    }

    pub fn price_id(&self) -> Option<&str> {
        match self {
            LineItem::Price { price_id, .. } => Some(price_id),
            LineItem::Inline { .. } => None,
        }
    }
}

/// Everything needed to create a checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionParams {
    pub mode: SessionMode,
    pub payment_method_types: Vec<PaymentMethodType>,
    pub line_items: Vec<LineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Metadata,
    /// Copied onto the subscription the session creates
    pub subscription_metadata: Option<Metadata>,
}

/// Session as returned by the processor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}
