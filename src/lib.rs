pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod relay;

pub use config::Config;
pub use error::{RelayError, RelayResult};
pub use relay::{Operation, Relay, RelayOptions, RelayOutput};

use axum::{
    routing::{get, post},
    Router,
};
use handlers::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the relay router with its middleware stack.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/relay/{operation}", post(handlers::relay_handler))
        .route("/health", get(handlers::health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
