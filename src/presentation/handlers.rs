// HTTP request handlers
use crate::application::coordinator::Selection;
use crate::domain::error::RangeError;
use crate::domain::granularity::{self, Granularity};
use crate::domain::range::QuickRange;
use crate::domain::selection::{PersistedSelection, format_instant, parse_instant};
use crate::domain::window::Timezone;
use crate::presentation::app_state::AppState;
use crate::presentation::event_stream::sse_from_receiver;
use axum::{
    Json,
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct RangeView {
    pub range: &'static str,
    pub code: String,
    pub start: String,
    pub end: String,
    pub from: i64,
    pub to: i64,
    pub granularity: Granularity,
    pub supported_granularities: Vec<Granularity>,
    pub sync: bool,
    pub timezone: Timezone,
    pub link: String,
}

impl RangeView {
    fn new(selection: Selection, supported_granularities: Vec<Granularity>) -> Self {
        let window = selection.window;
        let link = PersistedSelection::from_state(&selection.mode, &window, selection.sync)
            .to_query_string();
        Self {
            range: selection.mode.label(),
            code: selection.mode.code(),
            start: format_instant(window.start()),
            end: format_instant(window.end()),
            from: window.start().timestamp_millis(),
            to: window.end().timestamp_millis(),
            granularity: window.granularity(),
            supported_granularities,
            sync: selection.sync,
            timezone: window.timezone(),
            link,
        }
    }
}

/// Rejected selections map to 400 with the reason
#[derive(Debug)]
pub struct ApiError(RangeError);

impl From<RangeError> for ApiError {
    fn from(e: RangeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!("Rejected range request: {}", self.0);
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

type ApiResult = Result<Json<RangeView>, ApiError>;

#[derive(Deserialize)]
pub struct QuickRequest {
    pub range: String,
}

#[derive(Deserialize)]
pub struct CustomRequest {
    pub start: String,
    pub end: String,
    pub granularity: Option<String>,
}

#[derive(Deserialize)]
pub struct GranularityRequest {
    pub granularity: String,
}

#[derive(Deserialize)]
pub struct SyncRequest {
    pub enabled: bool,
}

#[derive(Deserialize)]
pub struct TimezoneRequest {
    pub timezone: String,
}

fn view(state: &AppState, selection: Selection) -> Json<RangeView> {
    Json(RangeView::new(
        selection,
        state.coordinator.supported_granularities(),
    ))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current selection
pub async fn get_range(State(state): State<Arc<AppState>>) -> Json<RangeView> {
    view(&state, state.coordinator.current())
}

pub async fn select_quick(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuickRequest>,
) -> ApiResult {
    let range: QuickRange = request.range.parse()?;
    let selection = state.coordinator.select_quick(range)?;
    Ok(view(&state, selection))
}

pub async fn select_custom(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CustomRequest>,
) -> ApiResult {
    let start = parse_instant(&request.start)
        .ok_or_else(|| RangeError::InvalidTimestamp(request.start.clone()))?;
    let end = parse_instant(&request.end)
        .ok_or_else(|| RangeError::InvalidTimestamp(request.end.clone()))?;
    // Unknown or unsupported granularities fall back like any other illegal choice
    let granularity = request.granularity.as_deref().and_then(Granularity::parse);

    let selection = state.coordinator.select_custom(start, end, granularity)?;
    Ok(view(&state, selection))
}

pub async fn set_granularity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GranularityRequest>,
) -> ApiResult {
    let granularity: Granularity = request.granularity.parse()?;
    let selection = state.coordinator.set_granularity(granularity)?;
    Ok(view(&state, selection))
}

pub async fn set_sync(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SyncRequest>,
) -> ApiResult {
    let selection = state.coordinator.set_sync(request.enabled)?;
    Ok(view(&state, selection))
}

pub async fn set_timezone(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TimezoneRequest>,
) -> ApiResult {
    let timezone: Timezone = request.timezone.parse()?;
    let selection = state.coordinator.set_timezone(timezone)?;
    Ok(view(&state, selection))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> ApiResult {
    let selection = state.coordinator.refresh()?;
    Ok(view(&state, selection))
}

#[derive(Debug, Serialize)]
pub struct RangeOption {
    pub label: &'static str,
    pub code: String,
    pub default_granularity: Granularity,
}

#[derive(Debug, Serialize)]
pub struct PickerOptions {
    pub ranges: Vec<RangeOption>,
    pub available_granularities: String,
    pub granularities: Vec<Granularity>,
    pub past_ranges: bool,
}

/// Quick ranges and granularity floor the picker offers
pub async fn options(State(state): State<Arc<AppState>>) -> Json<PickerOptions> {
    let coordinator = &state.coordinator;
    let floor = coordinator.granularity_floor();
    let ranges = coordinator
        .available_ranges()
        .into_iter()
        .map(|range| RangeOption {
            label: range.label(),
            code: range.code(),
            default_granularity: granularity::validate(
                Some(range.default_granularity()),
                range.supported_granularities(),
                floor,
            ),
        })
        .collect();

    Json(PickerOptions {
        ranges,
        available_granularities: floor.label(),
        granularities: floor.allowed(),
        past_ranges: coordinator.past_ranges_enabled(),
    })
}

/// Shareable query string for the current selection
pub async fn share_link(State(state): State<Arc<AppState>>) -> String {
    let current = state.coordinator.current();
    PersistedSelection::from_state(&current.mode, &current.window, current.sync).to_query_string()
}

/// Apply a selection given as query parameters (`?tr=lastday&g=hour`)
pub async fn apply_link(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> ApiResult {
    let persisted = PersistedSelection::from_query_string(query.as_deref().unwrap_or_default());
    let selection = state.coordinator.apply_persisted(&persisted)?;
    Ok(view(&state, selection))
}

/// Live feed of published windows
pub async fn stream_windows(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sse_from_receiver(state.coordinator.subscribe())
}
