//! Credit checkout HTTP server
//!
//! Axum-based server exposing the create-stripe-checkout endpoint backed by
//! Supabase (identity, catalog) and Stripe (prices, sessions).

mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_core::{CheckoutConfig, CheckoutHandler};
use checkout_payments::StripeProcessor;
use checkout_runtime::SupabaseClient;

use crate::routes::{CHECKOUT_PATH, FUNCTION_CHECKOUT_PATH, create_router};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let supabase = Arc::new(SupabaseClient::from_env()?);
    tracing::info!(url = %supabase.config().url, "Supabase configured");

    let stripe = Arc::new(StripeProcessor::from_env()?);
    tracing::info!("Stripe configured");

    let config = CheckoutConfig::from_env();
    tracing::info!(
        default_origin = %config.default_origin,
        currency = %config.currency,
        "Checkout configured"
    );

    let handler = CheckoutHandler::new(supabase.clone(), supabase, stripe, config);
    let state = AppState {
        handler: Arc::new(handler),
    };

    let app = create_router(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Checkout server running on http://{}", addr);
    tracing::info!("  GET  /health");
    tracing::info!("  POST {CHECKOUT_PATH}");
    tracing::info!("  POST {FUNCTION_CHECKOUT_PATH}");

    axum::serve(listener, app).await?;

    Ok(())
}
