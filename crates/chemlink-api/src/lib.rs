//! # chemlink-api
//!
//! HTTP surface for chemlink: structure conversion, rendering, property
//! extraction and chemical search.

pub mod error;
pub mod handlers;
pub mod state;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

/// Request body ceiling. Structure files rarely exceed a few hundred KB.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    use handlers::{chemistry, health};

    Router::new()
        .route("/health", get(health::health))
        .route("/chemistry/convert", post(chemistry::convert))
        .route("/chemistry/image", post(chemistry::image))
        .route("/chemistry/extract", post(chemistry::extract))
        .route("/chemistry/save", post(chemistry::save))
        .route("/chemistry/search", post(chemistry::search))
        .route("/chemistry/index", post(chemistry::index))
        .route("/chemistry/clearSearchIndexes", delete(chemistry::clear))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
