//! Operator endpoints that change signal state.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/signals` | Create a signal |
//! | `DELETE` | `/api/signals/{id}` | Delete a signal and its history |
//! | `POST` | `/api/override` | Override vehicle count and/or green time |
//! | `POST` | `/api/emergency` | Enter or leave emergency mode |
//! | `POST` | `/api/simulate` | Re-draw demand for every signal |
//! | `POST` | `/api/signals/relocate` | Move all signals around a new center |
//!
//! Request bodies that fail to parse are answered with a 400 in the same
//! JSON error shape as every other failure.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use signalgrid_core::OverrideRequest;
use signalgrid_types::{NewSignal, SignalId};

use crate::error::ApiError;
use crate::handlers::{SignalView, parse_signal_id};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/override`.
#[derive(Debug, serde::Deserialize)]
pub struct OverrideBody {
    /// Target signal.
    pub signal_id: SignalId,
    /// New demand; recomputes green time and density.
    pub vehicle_count: Option<u32>,
    /// Explicit green duration in seconds.
    pub green_time: Option<u32>,
}

/// Request body for `POST /api/emergency`.
#[derive(Debug, serde::Deserialize)]
pub struct EmergencyBody {
    /// Target signal.
    pub signal_id: SignalId,
    /// `true` to enter emergency mode, `false` to leave it.
    #[serde(default)]
    pub enable: bool,
}

/// Request body for `POST /api/signals/relocate`.
#[derive(Debug, serde::Deserialize)]
pub struct RelocateBody {
    /// Center latitude.
    pub lat: f64,
    /// Center longitude.
    pub lng: f64,
}

/// Response for single-signal mutations.
#[derive(Debug, serde::Serialize)]
struct SignalResponse {
    status: &'static str,
    signal: SignalView,
}

impl SignalResponse {
    fn ok(signal: signalgrid_types::Signal) -> Json<Self> {
        Json(Self {
            status: "ok",
            signal: SignalView::from(signal),
        })
    }
}

// ---------------------------------------------------------------------------
// POST /api/signals
// ---------------------------------------------------------------------------

/// Create a signal and start its first cycle.
pub async fn create_signal(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewSignal>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(new) = body?;
    let signal = state.service.create_signal(&new).await?;
    Ok((StatusCode::CREATED, Json(SignalView::from(signal))))
}

// ---------------------------------------------------------------------------
// DELETE /api/signals/{id}
// ---------------------------------------------------------------------------

/// Delete a signal together with its history.
pub async fn delete_signal(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_signal_id(&id_str)?;
    state.service.delete_signal(id).await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "deleted": id,
    })))
}

// ---------------------------------------------------------------------------
// POST /api/override
// ---------------------------------------------------------------------------

/// Apply an operator override.
///
/// At least one of `vehicle_count` and `green_time` is required. When both
/// are given the vehicle count is applied first and the green time then
/// replaces the derived duration.
pub async fn override_signal(
    State(state): State<Arc<AppState>>,
    body: Result<Json<OverrideBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let request = OverrideRequest {
        vehicle_count: body.vehicle_count,
        green_time: body.green_time,
    };
    let signal = state.service.override_signal(body.signal_id, request).await?;
    Ok(SignalResponse::ok(signal))
}

// ---------------------------------------------------------------------------
// POST /api/emergency
// ---------------------------------------------------------------------------

/// Enter or leave emergency mode. Idempotent.
pub async fn set_emergency(
    State(state): State<Arc<AppState>>,
    body: Result<Json<EmergencyBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let signal = state
        .service
        .set_emergency(body.signal_id, body.enable)
        .await?;
    Ok(SignalResponse::ok(signal))
}

// ---------------------------------------------------------------------------
// POST /api/simulate
// ---------------------------------------------------------------------------

/// Draw fresh demand for every non-emergency signal and restart its cycle.
pub async fn simulate(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let signals = state.service.simulate_all().await?;
    let views: Vec<SignalView> = signals.into_iter().map(SignalView::from).collect();
    Ok(Json(views))
}

// ---------------------------------------------------------------------------
// POST /api/signals/relocate
// ---------------------------------------------------------------------------

/// Spread every signal around a new center point.
pub async fn relocate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RelocateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let signals = state.service.relocate_all(body.lat, body.lng).await?;
    let views: Vec<SignalView> = signals.into_iter().map(SignalView::from).collect();
    Ok(Json(views))
}
