//! Handler configuration

/// Redirect origin used when the request carries no `Origin` header
pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";

/// Currency for credit packages and for plans that name none
pub const DEFAULT_CURRENCY: &str = "usd";

#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    /// Base for success/cancel redirects when no origin is sent
    pub default_origin: String,

    /// Lowercase ISO currency code
    pub currency: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            default_origin: DEFAULT_ORIGIN.into(),
            currency: DEFAULT_CURRENCY.into(),
        }
    }
}

impl CheckoutConfig {
    /// Read `CHECKOUT_DEFAULT_ORIGIN` and `CHECKOUT_CURRENCY`, falling back to defaults
    pub fn from_env() -> Self {
        let default_origin = std::env::var("CHECKOUT_DEFAULT_ORIGIN")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ORIGIN.into());
        let currency = std::env::var("CHECKOUT_CURRENCY")
            .ok()
            .filter(|v| !v.is_empty())
            .map_or_else(|| DEFAULT_CURRENCY.into(), |c| c.to_lowercase());

        Self {
            default_origin,
            currency,
        }
    }
}
