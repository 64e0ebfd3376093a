//! HTTP surface: a thin `axum` veneer over the sensor registry and rate
//! projector. A collaborator, not core — `spec.md` §6 names these routes
//! and response shapes exactly.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::bus::SerialSettings;
use crate::error::DeviceNotFound;
use crate::probe;
use crate::rate::{RateProjector, RateStatus};
use crate::registry::SensorRegistry;

pub struct AppState {
    pub registry: SensorRegistry,
    pub http_projector: RateProjector,
    pub probe_serial: SerialSettings,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/sensors/", get(list_sensors))
        .route("/sensors/:name", get(get_sensor))
        .route("/test_sensor/:addr", get(test_sensor))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct IndexResponse {
    message: &'static str,
}

async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "Owen Pulse Counter API",
    })
}

#[derive(Deserialize)]
struct ListQuery {
    work_centers: Option<String>,
}

#[derive(Serialize)]
struct SensorRateEntry {
    sensor: String,
    value: Option<f64>,
    measured_at: Option<DateTime<Utc>>,
    status: &'static str,
}

fn status_label(status: RateStatus) -> &'static str {
    match status {
        RateStatus::Ok => "OK",
        RateStatus::Offline => "OFFLINE",
        RateStatus::NotFound => "NOT FOUND",
    }
}

/// `GET /sensors/?work_centers=a,b,c`: one rate-projected entry per
/// requested name, in request order. Unknown names are `NOT FOUND`;
/// sensors whose elapsed time since the last sample is non-positive are
/// omitted entirely (`spec.md` §4.6).
async fn list_sensors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<SensorRateEntry>> {
    let names: Vec<String> = query
        .work_centers
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let Ok(sensor) = state.registry.get(&name) else {
            entries.push(SensorRateEntry {
                sensor: name,
                value: None,
                measured_at: None,
                status: status_label(RateStatus::NotFound),
            });
            continue;
        };
        let reading = sensor.last_reading();
        let Some(sample) = state.http_projector.project(&name, &reading) else {
            continue;
        };
        entries.push(SensorRateEntry {
            sensor: name,
            value: sample.value,
            measured_at: Some(reading.time),
            status: status_label(sample.status),
        });
    }
    Json(entries)
}

#[derive(Serialize)]
struct SensorReadingResponse {
    name: String,
    reading: Option<f64>,
    reading_time: DateTime<Utc>,
}

impl IntoResponse for DeviceNotFound {
    fn into_response(self) -> Response {
        (StatusCode::NOT_FOUND, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

async fn get_sensor(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SensorReadingResponse>, DeviceNotFound> {
    let sensor = state.registry.get(&name)?;
    let reading = sensor.last_reading();
    Ok(Json(SensorReadingResponse {
        name,
        reading: reading.value.as_ref().map(|v| v.as_f64()),
        reading_time: reading.time,
    }))
}

#[derive(Serialize)]
struct ProbeResponse {
    addr: u16,
    value: Option<f64>,
    measured_at: DateTime<Utc>,
    status: &'static str,
}

async fn test_sensor(
    State(state): State<Arc<AppState>>,
    Path(addr): Path<u16>,
) -> Result<Json<ProbeResponse>, (StatusCode, String)> {
    let result = probe::probe(state.probe_serial.clone(), addr)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(ProbeResponse {
        addr: result.addr,
        value: result.value,
        measured_at: Utc::now(),
        status: match result.status {
            probe::ProbeStatus::Ok => "OK",
            probe::ProbeStatus::Offline => "OFFLINE",
            probe::ProbeStatus::Timeout => "TIMEOUT",
        },
    }))
}

