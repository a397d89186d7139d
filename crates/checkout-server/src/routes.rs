//! Router

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::handlers::{create_checkout, health_check, preflight};
use crate::state::AppState;

pub const CHECKOUT_PATH: &str = "/create-stripe-checkout";
pub const FUNCTION_CHECKOUT_PATH: &str = "/functions/v1/create-stripe-checkout";

const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ]);

    Router::new()
        .route("/health", get(health_check))
        .route(CHECKOUT_PATH, post(create_checkout).options(preflight))
        .route(FUNCTION_CHECKOUT_PATH, post(create_checkout).options(preflight))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static(ALLOW_HEADERS),
                ))
                .layer(cors),
        )
        .with_state(state)
}
