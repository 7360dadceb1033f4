//! Read-only endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/signals` | List all signals |
//! | `GET` | `/api/signals/{id}` | Get a single signal |
//! | `GET` | `/api/history/{id}` | Recent snapshots (`?limit=N`) |
//! | `GET` | `/api/analytics` | History rollups |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse};
use signalgrid_core::timing;
use signalgrid_types::{Signal, SignalId};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response and query types
// ---------------------------------------------------------------------------

/// A signal as served over HTTP, with derived display fields.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SignalView {
    /// The stored signal.
    #[serde(flatten)]
    pub signal: Signal,
    /// Live efficiency score (0-100) for the current timing.
    pub efficiency: u32,
    /// Color hint for the density class.
    pub density_color: &'static str,
}

impl From<Signal> for SignalView {
    fn from(signal: Signal) -> Self {
        let efficiency = timing::calculate_efficiency(
            signal.vehicle_count,
            signal.green_time,
            signal.current_phase,
        );
        let density_color = signal.density.color();
        Self {
            signal,
            efficiency,
            density_color,
        }
    }
}

/// Query parameters for `GET /api/history/{id}`.
#[derive(Debug, serde::Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of snapshots (default from [`AppState`]).
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page listing every signal and the API routes.
pub async fn index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let signals = state.service.list_signals().await?;

    let mut rows = String::new();
    for signal in &signals {
        let view = SignalView::from(signal.clone());
        let mode = if signal.emergency { "EMERGENCY" } else { "normal" };
        rows.push_str(&format!(
            r#"<tr><td>{id}</td><td>{name}</td><td>{location}</td><td class="{phase}">{phase}</td><td>{countdown}</td><td>{vehicles}</td><td>{green}s</td><td style="color:{color}">{density}</td><td>{efficiency}%</td><td>{mode}</td></tr>"#,
            id = signal.id,
            name = escape_html(&signal.name),
            location = escape_html(&signal.location),
            phase = signal.current_phase,
            countdown = signal.countdown,
            vehicles = signal.vehicle_count,
            green = signal.green_time,
            color = view.density_color,
            density = signal.density,
            efficiency = view.efficiency,
        ));
    }
    let count = signals.len();

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta http-equiv="refresh" content="3">
    <title>SignalGrid</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 1100px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ border-bottom: 1px solid #30363d; padding: 0.4rem 0.6rem; text-align: left; }}
        th {{ color: #8b949e; font-weight: normal; }}
        .green {{ color: #3fb950; }}
        .yellow {{ color: #d29922; }}
        .red {{ color: #f85149; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
    </style>
</head>
<body>
    <h1>SignalGrid</h1>
    <p class="subtitle">{count} signals -- adaptive timing simulator</p>
    <table>
        <tr><th>ID</th><th>Name</th><th>Location</th><th>Phase</th><th>Countdown</th><th>Vehicles</th><th>Green</th><th>Density</th><th>Efficiency</th><th>Mode</th></tr>
        {rows}
    </table>
    <h2>API</h2>
    <ul>
        <li>GET <a href="/api/signals">/api/signals</a></li>
        <li>GET /api/signals/{{id}}</li>
        <li>GET /api/history/{{id}}?limit=N</li>
        <li>GET <a href="/api/analytics">/api/analytics</a></li>
        <li>POST /api/signals, /api/override, /api/emergency, /api/simulate, /api/signals/relocate</li>
        <li>DELETE /api/signals/{{id}}</li>
    </ul>
</body>
</html>"#
    )))
}

// ---------------------------------------------------------------------------
// GET /api/signals
// ---------------------------------------------------------------------------

/// List all signals, ordered by id.
pub async fn list_signals(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let signals = state.service.list_signals().await?;
    let views: Vec<SignalView> = signals.into_iter().map(SignalView::from).collect();
    Ok(Json(views))
}

// ---------------------------------------------------------------------------
// GET /api/signals/{id}
// ---------------------------------------------------------------------------

/// Return a single signal.
pub async fn get_signal(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_signal_id(&id_str)?;
    let signal = state.service.get_signal(id).await?;
    Ok(Json(SignalView::from(signal)))
}

// ---------------------------------------------------------------------------
// GET /api/history/{id}
// ---------------------------------------------------------------------------

/// Return the most recent snapshots for a signal, oldest first.
///
/// An unknown signal yields an empty list.
pub async fn signal_history(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_signal_id(&id_str)?;
    let limit = params.limit.unwrap_or(state.history_limit);
    let rows = state.service.history(id, limit).await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// GET /api/analytics
// ---------------------------------------------------------------------------

/// Return rollups over the whole history log.
pub async fn analytics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.analytics().await?))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a path segment into a [`SignalId`].
pub(crate) fn parse_signal_id(s: &str) -> Result<SignalId, ApiError> {
    s.parse::<i64>()
        .map(SignalId::new)
        .map_err(|e| ApiError::InvalidInput(format!("invalid signal id {s:?}: {e}")))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
