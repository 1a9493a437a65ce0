//! HTTP handlers for the station API.

use crate::station::{CommandOutcome, CommandRequest, ConnectionSnapshot, Station};
use crate::telemetry::{FillReport, TelemetrySnapshot};
use crate::web::export;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

/// Latest value of each sensor channel.
pub async fn get_telemetry(State(station): State<Station>) -> Json<TelemetrySnapshot> {
    Json(station.telemetry())
}

/// Link status, active port and discovered ports.
pub async fn get_connection(State(station): State<Station>) -> Json<ConnectionSnapshot> {
    Json(station.connection_status())
}

/// Fill counter and event history.
pub async fn get_report(State(station): State<Station>) -> Json<FillReport> {
    Json(station.report())
}

/// Start, stop or query the conveyor band.
pub async fn band_command(
    State(station): State<Station>,
    Path(state): Path<String>,
) -> Result<Json<CommandOutcome>, (StatusCode, Json<serde_json::Value>)> {
    let request: CommandRequest = state.parse().map_err(|e: crate::StationError| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(Json(station.send_command(request).await))
}

/// Download the event history as CSV.
pub async fn export_csv(State(station): State<Station>) -> Response {
    match export::report_csv(&station.report()) {
        Ok(body) => {
            let disposition = format!(
                "attachment;filename={}",
                export::csv_filename(chrono::Local::now())
            );
            (
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to export report: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Health check endpoint.
pub async fn health_check(State(station): State<Station>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "fill-station",
        "version": env!("CARGO_PKG_VERSION"),
        "link": station.connection_status().status,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Serve the built-in dashboard page.
pub async fn index() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

/// Minimal dashboard polling the JSON endpoints.
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Fill Station</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f4f6fb; color: #333; padding: 20px; }
        .container { max-width: 960px; margin: 0 auto; }
        .grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 16px; }
        .card { background: white; border-radius: 12px; padding: 20px; box-shadow: 0 6px 20px rgba(0,0,0,0.08); }
        .card h3 { color: #667eea; margin: 0 0 10px; }
        .value { font-size: 1.4rem; font-weight: bold; }
        button { padding: 10px 18px; margin-right: 8px; border: none; border-radius: 8px; color: white; cursor: pointer; }
        .start { background: #2ecc71; } .stop { background: #e74c3c; }
        table { width: 100%; border-collapse: collapse; margin-top: 10px; }
        td, th { border-bottom: 1px solid #eee; padding: 6px; text-align: left; }
    </style>
</head>
<body>
<div class="container">
    <h1>Fill Station</h1>
    <p id="status">Connecting...</p>
    <div class="grid">
        <div class="card"><h3>Presence</h3><div class="value" id="presence">-</div></div>
        <div class="card"><h3>Level</h3><div class="value" id="distance">-</div></div>
        <div class="card"><h3>Temperature</h3><div class="value" id="temperature">-</div></div>
        <div class="card"><h3>Pump</h3><div class="value" id="pump">-</div></div>
        <div class="card"><h3>Cups filled</h3><div class="value" id="fills">0</div></div>
    </div>
    <div class="card" style="margin-top:16px">
        <h3>Band</h3>
        <button class="start" onclick="band('on')">Start band</button>
        <button class="stop" onclick="band('off')">Stop band</button>
        <span id="band-message"></span>
    </div>
    <div class="card" style="margin-top:16px">
        <h3>Events <a href="/api/report.csv">CSV</a></h3>
        <table><thead><tr><th>Phase</th><th>Time</th><th>Level</th><th>Temperature</th></tr></thead><tbody id="events"></tbody></table>
    </div>
</div>
<script>
    async function refresh() {
        try {
            const t = await (await fetch('/api/telemetry')).json();
            for (const k of ['presence', 'distance', 'temperature', 'pump']) {
                document.getElementById(k).textContent = t[k];
            }
            const c = await (await fetch('/api/connection')).json();
            document.getElementById('status').textContent = `${c.status} (${c.active_port})`;
            const r = await (await fetch('/api/report')).json();
            document.getElementById('fills').textContent = r.fill_count;
            document.getElementById('events').innerHTML = r.events.slice().reverse().map(e =>
                `<tr><td>${e.phase}</td><td>${e.timestamp}</td><td>${e.level}</td><td>${e.temperature}</td></tr>`).join('');
        } catch (e) {
            document.getElementById('status').textContent = 'Dashboard offline';
        }
    }
    async function band(state) {
        const r = await (await fetch(`/api/band/${state}`)).json();
        document.getElementById('band-message').textContent = r.message;
    }
    refresh();
    setInterval(refresh, 1000);
</script>
</body>
</html>"#;
