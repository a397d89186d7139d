//! Domain Models
//!
//! Request, identity and catalog row shapes. Everything here lives for the
//! duration of a single checkout request.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{CheckoutError, Result};

/// What the caller is buying
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseType {
    /// One-time bundle of credits
    CreditPackage,
    /// Recurring monthly plan
    Subscription,
}

impl PurchaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseType::CreditPackage => "credit_package",
            PurchaseType::Subscription => "subscription",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit_package" => Some(PurchaseType::CreditPackage),
            "subscription" => Some(PurchaseType::Subscription),
            _ => None,
        }
    }
}

impl std::fmt::Display for PurchaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw JSON body, before the purchase type is checked
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurchasePayload {
    /// Any JSON value; only the two known strings are accepted
    #[serde(rename = "type", default)]
    kind: Option<Value>,
    #[serde(default)]
    package_id: Option<String>,
    #[serde(default)]
    plan_id: Option<String>,
    #[serde(default)]
    stripe_product_id: Option<String>,
}

/// A validated purchase request
///
/// The id fields are hints: at least one of them has to resolve to a known
/// item further down the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub kind: PurchaseType,
    pub package_id: Option<String>,
    pub plan_id: Option<String>,
    pub stripe_product_id: Option<String>,
}

impl PurchaseRequest {
    /// Parse a request body. Blank id fields are treated as absent.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let payload: PurchasePayload = serde_json::from_slice(body)?;

        let kind = match payload.kind {
            Some(Value::String(s)) => {
                PurchaseType::parse(&s).ok_or(CheckoutError::InvalidType(s))?
            }
            Some(other) => return Err(CheckoutError::InvalidType(other.to_string())),
            None => return Err(CheckoutError::InvalidType(String::new())),
        };

        Ok(Self {
            kind,
            package_id: non_blank(payload.package_id),
            plan_id: non_blank(payload.plan_id),
            stripe_product_id: non_blank(payload.stripe_product_id),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Authenticated caller, as resolved by the identity provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(id: Uuid) -> Self {
        Self { id, email: None }
    }
}

/// Row of the `credit_packages` table
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPackageRow {
    pub id: String,
    #[serde(default)]
    pub stripe_product_id: Option<String>,
    #[serde(default)]
    pub credits: Option<u64>,
    #[serde(default)]
    pub bonus: Option<u64>,
    /// Price in major currency units
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// Row of the `subscription_plans` table
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlanRow {
    pub id: String,
    #[serde(default)]
    pub stripe_product_id: Option<String>,
    #[serde(default)]
    pub credits: Option<u64>,
    /// Price in major currency units
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
}
