// HTTP request handlers
use crate::application::view_registry::ViewHandle;
use crate::domain::channel::ChannelSelection;
use crate::domain::timestamp::{TimeRange, Timestamp};
use crate::infrastructure::chunked_json::stream_from_receiver;
use crate::infrastructure::http_response::json_response;
use crate::infrastructure::wire::{series_to_wire, summary_to_wire, traces_to_wire};
use crate::presentation::api_error::ApiError;
use crate::presentation::app_state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct FilesQuery {
    /// Comma-separated file ids.
    pub files: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BuildViewRequest {
    pub files: Vec<String>,
    #[serde(default)]
    pub primary: Vec<String>,
    #[serde(default)]
    pub secondary: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SeriesQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub budget: Option<usize>,
    pub buckets: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RelayoutQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub budget: Option<usize>,
}

fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').any(|enc| enc.trim().starts_with("br")))
        .unwrap_or(false)
}

async fn respond<T: Serialize>(status: StatusCode, data: &T, compress: bool) -> Response<Body> {
    match json_response(status, data, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// A range bound in either wire form: RFC 3339, or epoch milliseconds.
fn parse_bound(input: &str) -> Result<Timestamp, ApiError> {
    Timestamp::parse_rfc3339(input)
        .ok()
        .or_else(|| input.trim().parse::<f64>().ok().and_then(Timestamp::from_epoch_millis))
        .ok_or_else(|| {
            ApiError::bad_request(format!(
                "invalid timestamp {input:?}: expected RFC 3339 or epoch milliseconds"
            ))
        })
}

fn parse_range(start: Option<&str>, end: Option<&str>) -> Result<Option<TimeRange>, ApiError> {
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => Ok(Some(TimeRange::new(parse_bound(start)?, parse_bound(end)?))),
        _ => Err(ApiError::bad_request("start and end must be given together")),
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_files(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response<Body>, ApiError> {
    let files = state.view_service.list_files().await?;
    Ok(respond(StatusCode::OK, &files, accepts_brotli(&headers)).await)
}

/// Channel names across the given files, for populating the selection lists
pub async fn discover_channels(
    Query(query): Query<FilesQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response<Body>, ApiError> {
    let files: Vec<String> = query
        .files
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect();

    let channels = state.view_service.discover_channels(&files).await?;
    Ok(respond(StatusCode::OK, &channels, accepts_brotli(&headers)).await)
}

/// Build (or rebuild) the view of a session. Supersedes any in-flight build for it.
pub async fn build_view(
    Path(session): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(request): Json<BuildViewRequest>,
) -> Result<Response<Body>, ApiError> {
    let selection = ChannelSelection::new(request.primary, request.secondary);
    let summary = state
        .view_service
        .build_view(&session, &request.files, &selection)
        .await?;

    let dto = summary_to_wire(summary, state.timestamp_format);
    Ok(respond(StatusCode::CREATED, &dto, accepts_brotli(&headers)).await)
}

pub async fn close_session(
    Path(session): Path<String>,
    State(state): State<Arc<AppState>>,
) -> StatusCode {
    if state.view_service.close_session(&session).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn view_summary(
    Path(handle): Path<u64>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response<Body>, ApiError> {
    let summary = state.view_service.summary(ViewHandle(handle)).await?;
    let dto = summary_to_wire(summary, state.timestamp_format);
    Ok(respond(StatusCode::OK, &dto, accepts_brotli(&headers)).await)
}

/// Decimated points of one channel of a view
pub async fn series(
    Path((handle, channel)): Path<(u64, String)>,
    Query(query): Query<SeriesQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response<Body>, ApiError> {
    let range = parse_range(query.start.as_deref(), query.end.as_deref())?;
    let series = state
        .view_service
        .decimate(ViewHandle(handle), &channel, range, query.budget, query.buckets)
        .await?;

    let dto = series_to_wire(series, state.timestamp_format);
    Ok(respond(StatusCode::OK, &dto, accepts_brotli(&headers)).await)
}

/// Every trace of a view re-decimated for a new visible range, in one response
pub async fn relayout(
    Path(handle): Path<u64>,
    Query(query): Query<RelayoutQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response<Body>, ApiError> {
    let range = parse_range(query.start.as_deref(), query.end.as_deref())?;
    let traces = state
        .view_service
        .relayout(ViewHandle(handle), range, query.budget)
        .await?;

    let dto = traces_to_wire(traces, state.timestamp_format);
    Ok(respond(StatusCode::OK, &dto, accepts_brotli(&headers)).await)
}

/// Stream every trace of a view re-decimated for a new visible range (progressive loading)
pub async fn stream_relayout(
    Path(handle): Path<u64>,
    Query(query): Query<RelayoutQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response<Body>, ApiError> {
    let range = parse_range(query.start.as_deref(), query.end.as_deref())?;
    let rx = state
        .streaming_service
        .stream_relayout(ViewHandle(handle), range, query.budget)
        .await?;

    Ok(stream_from_receiver(rx, accepts_brotli(&headers), state.timestamp_format).into_response())
}
