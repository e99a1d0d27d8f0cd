use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

use crate::datastore::{Datastore, NewsRow};
use crate::news;

/// Shared state for the news read API
#[derive(Clone)]
pub struct AppState {
    pub datastore: Arc<dyn Datastore>,
}

#[derive(Debug, Deserialize)]
struct FetchParams {
    tablename: String,
}

#[derive(Debug, Serialize)]
struct FetchResponse {
    content: Vec<NewsRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Builds the router exposing the cached-news read endpoint
#[must_use]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/fetchData", get(fetch_data))
        .with_state(state)
}

/// GET /fetchData?tablename=TABLE - returns the cached rows for one table
#[instrument(skip(state, params), fields(table = %params.tablename))]
async fn fetch_data(State(state): State<AppState>, Query(params): Query<FetchParams>) -> Response {
    match news::fetch_news(state.datastore.as_ref(), &params.tablename).await {
        Ok(rows) => Json(FetchResponse { content: rows }).into_response(),
        Err(e) => {
            error!(error = %e, table = %params.tablename, "Failed to fetch news rows");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error occurred. Please try again in some time."
                        .to_string(),
                }),
            )
                .into_response()
        }
    }
}
