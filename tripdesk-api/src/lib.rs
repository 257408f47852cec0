use axum::{
    http::{header, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod agents;
pub mod bookings;
pub mod error;
pub mod middleware;
pub mod payments;
pub mod portal;
pub mod state;

pub use state::{AppState, AuthConfig};

use middleware::auth::{require_admin, require_agent, session_middleware};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::USER_AGENT]);

    let admin = Router::new()
        .merge(agents::routes())
        .merge(bookings::routes())
        .merge(payments::routes())
        .route_layer(from_fn(require_admin));

    let agent = portal::routes().route_layer(from_fn(require_agent));

    Router::new()
        .route("/health", get(health))
        .merge(agents::status_routes())
        .merge(admin)
        .merge(agent)
        .layer(from_fn_with_state(state.clone(), session_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
