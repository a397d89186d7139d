//! Price Resolution
//!
//! A purchasable item is assembled from several partial sources (datastore
//! row, request hints, static fallback tables). Each source is an
//! [`ItemFields`]; sources are merged in priority order and, per field, the
//! first source that defines it wins.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::model::{CreditPackageRow, SubscriptionPlanRow};

/// One tier of partial item data
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemFields {
    pub product_id: Option<String>,
    pub credits: Option<u64>,
    pub bonus_credits: Option<u64>,
    /// Price in major currency units
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub plan_id: Option<String>,
}

impl ItemFields {
    /// A tier that only knows the processor product id
    pub fn product(product_id: impl Into<String>) -> Self {
        Self {
            product_id: Some(product_id.into()),
            ..Default::default()
        }
    }

    /// Fill every field `self` leaves undefined from `lower`
    #[must_use]
    pub fn or(self, lower: Self) -> Self {
        Self {
            product_id: self.product_id.or(lower.product_id),
            credits: self.credits.or(lower.credits),
            bonus_credits: self.bonus_credits.or(lower.bonus_credits),
            price: self.price.or(lower.price),
            currency: self.currency.or(lower.currency),
            plan_id: self.plan_id.or(lower.plan_id),
        }
    }

    /// Merge tiers given highest priority first; missing tiers are skipped
    pub fn merge<I>(tiers: I) -> Self
    where
        I: IntoIterator<Item = Option<Self>>,
    {
        tiers.into_iter().flatten().fold(Self::default(), Self::or)
    }

    /// Finalise into a resolved item, defaulting what is still missing
    pub fn resolve(self, default_currency: &str) -> ResolvedItem {
        ResolvedItem {
            unit_amount_cents: self.price.and_then(to_cents),
            product_id: self.product_id,
            credits: self.credits.unwrap_or(0),
            bonus_credits: self.bonus_credits.unwrap_or(0),
            currency: self
                .currency
                .unwrap_or_else(|| default_currency.to_string())
                .to_lowercase(),
            plan_id: self.plan_id,
        }
    }
}

impl From<&CreditPackageRow> for ItemFields {
    fn from(row: &CreditPackageRow) -> Self {
        Self {
            product_id: row.stripe_product_id.clone().filter(|p| !p.is_empty()),
            credits: row.credits,
            bonus_credits: row.bonus,
            price: row.price,
            currency: None,
            plan_id: None,
        }
    }
}

impl From<&SubscriptionPlanRow> for ItemFields {
    fn from(row: &SubscriptionPlanRow) -> Self {
        Self {
            product_id: row.stripe_product_id.clone().filter(|p| !p.is_empty()),
            credits: row.credits,
            bonus_credits: None,
            price: row.price,
            currency: row.currency.clone().filter(|c| !c.is_empty()),
            plan_id: Some(row.id.clone()),
        }
    }
}

/// A fully merged purchasable item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedItem {
    pub product_id: Option<String>,
    pub credits: u64,
    pub bonus_credits: u64,
    pub unit_amount_cents: Option<i64>,
    /// Lowercase ISO currency code
    pub currency: String,
    pub plan_id: Option<String>,
}

impl ResolvedItem {
    /// Credits granted including bonus
    pub fn total_credits(&self) -> u64 {
        self.credits.saturating_add(self.bonus_credits)
    }

    /// Whether a product reference or an amount exists to price this item
    pub fn is_priceable(&self) -> bool {
        self.product_id.is_some() || self.unit_amount_cents.is_some()
    }
}

/// Convert a major-unit price to minor units, rounding half away from zero.
///
/// Negative or out-of-range prices yield `None`.
pub fn to_cents(price: Decimal) -> Option<i64> {
    if price.is_sign_negative() {
        return None;
    }
    (price * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}
