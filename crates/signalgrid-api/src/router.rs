//! Axum router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::operator;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// Routes:
/// - `GET /` -- HTML status page
/// - `GET|POST /api/signals` -- list / create
/// - `GET|DELETE /api/signals/{id}` -- fetch / delete
/// - `POST /api/signals/relocate` -- move all signals
/// - `POST /api/override`, `POST /api/emergency`, `POST /api/simulate`
/// - `GET /api/history/{id}`, `GET /api/analytics`
///
/// CORS allows any origin so a separately hosted dashboard can call the API.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        // Signals
        .route(
            "/api/signals",
            get(handlers::list_signals).post(operator::create_signal),
        )
        .route("/api/signals/relocate", post(operator::relocate))
        .route(
            "/api/signals/{id}",
            get(handlers::get_signal).delete(operator::delete_signal),
        )
        // Operator controls
        .route("/api/override", post(operator::override_signal))
        .route("/api/emergency", post(operator::set_emergency))
        .route("/api/simulate", post(operator::simulate))
        // Reporting
        .route("/api/history/{id}", get(handlers::signal_history))
        .route("/api/analytics", get(handlers::analytics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
