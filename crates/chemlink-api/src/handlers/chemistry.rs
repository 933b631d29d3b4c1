//! Chemistry HTTP handlers.
//!
//! Conversion and render bodies are returned raw with their media type;
//! extraction and search results are JSON.

use std::collections::BTreeSet;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;

use chemlink_core::{
    ConversionRequest, ExtractionRequest, ExtractionResult, ImageRequest, SaveRequest,
    SearchQuery,
};

use crate::{ApiError, AppState};

/// Convert a structure to another notation.
///
/// # Returns
/// - 200 OK with the converted text
/// - 400 Bad Request if the input is blank, the format is unsupported, or no
///   engine could read the structure
pub async fn convert(
    State(state): State<AppState>,
    payload: Result<Json<ConversionRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    let Json(request) = payload?;
    Ok(state.conversion.convert(&request).await?)
}

/// Render a structure as PNG, JPEG or SVG.
pub async fn image(
    State(state): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let rendered = state.render.render(&request).await?;
    Ok(([(header::CONTENT_TYPE, rendered.content_type())], rendered.bytes))
}

pub async fn extract(
    State(state): State<AppState>,
    payload: Result<Json<ExtractionRequest>, JsonRejection>,
) -> Result<Json<ExtractionResult>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.extract.extract(&request.input).await?))
}

pub async fn save(
    State(state): State<AppState>,
    payload: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    let Json(request) = payload?;
    state.search.save(&request).await?;
    Ok("Saved")
}

/// Ids of saved structures matching the query, as a JSON array.
pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchQuery>, JsonRejection>,
) -> Result<Json<BTreeSet<String>>, ApiError> {
    let Json(query) = payload?;
    Ok(Json(state.search.search(&query).await?))
}

/// Fold recent saves into the accelerated index now, without waiting for
/// the next scheduled run. With a scheduler attached the reindex runs on its
/// task, so it never overlaps a scheduled one.
pub async fn index(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    match &state.scheduler {
        Some(scheduler) => scheduler.trigger().await?,
        None => state.search.reindex().await?,
    }
    Ok("Indexed")
}

pub async fn clear(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state.search.clear().await?;
    Ok("Cleared")
}
