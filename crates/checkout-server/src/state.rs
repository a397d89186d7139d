//! Application State

use std::sync::Arc;

use checkout_core::CheckoutHandler;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout pipeline with its identity, catalog and processor backends
    pub handler: Arc<CheckoutHandler>,
}
