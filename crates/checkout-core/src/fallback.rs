//! Static Catalog Fallbacks
//!
//! Used when the datastore has no row for a requested item. Credit packages
//! can be found by processor product id or by short package code
//! (`pkg1`..`pkg6`); subscription plans only by product id.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::pricing::ItemFields;

/// (credits, price)
fn credit_package_entry(product_id: &str) -> Option<(u64, Decimal)> {
    match product_id {
        "prod_SyYasByos1peGR" => Some((200, dec!(2.00))),
        "prod_SyYeStqRDuWGFF" => Some((500, dec!(5.00))),
        "prod_SyYfzJ1fjz9zb9" => Some((1000, dec!(10.00))),
        "prod_SyYmVrUetdiIBY" => Some((2500, dec!(25.00))),
        "prod_SyYg54VfiOr7LQ" => Some((5000, dec!(50.00))),
        "prod_SyYhva8A2beAw6" => Some((10000, dec!(100.00))),
        "prod_SyYehlUkfzq9Qn" => Some((100, dec!(1.00))),
        _ => None,
    }
}

fn package_code_product(code: &str) -> Option<&'static str> {
    match code {
        "pkg1" => Some("prod_SyYasByos1peGR"),
        "pkg2" => Some("prod_SyYeStqRDuWGFF"),
        "pkg3" => Some("prod_SyYfzJ1fjz9zb9"),
        "pkg4" => Some("prod_SyYmVrUetdiIBY"),
        "pkg5" => Some("prod_SyYg54VfiOr7LQ"),
        "pkg6" => Some("prod_SyYhva8A2beAw6"),
        _ => None,
    }
}

/// (plan id, credits, price, currency)
fn subscription_plan_entry(product_id: &str) -> Option<(&'static str, u64, Decimal, &'static str)> {
    match product_id {
        "prod_SyYChoQJbIb1ye" => Some(("plan_free", 0, dec!(0), "usd")),
        "prod_SyYK31lYwaraZW" => Some(("plan_basic", 1000, dec!(9), "usd")),
        "prod_SyYMs3lMIhORSP" => Some(("plan_pro", 2000, dec!(15), "usd")),
        "prod_SyYVIP" => Some(("plan_vip", 4000, dec!(25), "usd")),
        _ => None,
    }
}

/// Credit package tier keyed by processor product id
pub fn credit_package_by_product(product_id: &str) -> Option<ItemFields> {
    let (credits, price) = credit_package_entry(product_id)?;
    Some(ItemFields {
        product_id: Some(product_id.to_string()),
        credits: Some(credits),
        price: Some(price),
        ..Default::default()
    })
}

/// Credit package tier keyed by short package code
pub fn credit_package_by_code(code: &str) -> Option<ItemFields> {
    let product_id = package_code_product(code)?;
    credit_package_by_product(product_id)
}

/// Subscription plan tier keyed by processor product id
pub fn subscription_plan_by_product(product_id: &str) -> Option<ItemFields> {
    let (plan_id, credits, price, currency) = subscription_plan_entry(product_id)?;
    Some(ItemFields {
        product_id: Some(product_id.to_string()),
        credits: Some(credits),
        price: Some(price),
        currency: Some(currency.to_string()),
        plan_id: Some(plan_id.to_string()),
        ..Default::default()
    })
}
