//! Read-side HTTP API for stored delegations.
//!
//! One endpoint, `GET /xtz/delegations`, serving newest-first pages
//! from the repository. API failures never touch poller state.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::error::Result;
use crate::model::Delegation;
use crate::repository::{DelegationRepository, PAGE_LIMIT};

/// Earliest year with delegation data worth serving.
pub const MIN_YEAR: i32 = 2018;

/// Shared state for the request handlers.
#[derive(Clone)]
pub struct ApiState {
    pub repo: Arc<dyn DelegationRepository>,
}

#[derive(Deserialize)]
pub struct DelegationsQuery {
    year: Option<i32>,
    offset: Option<u32>,
}

#[derive(Serialize)]
pub struct DelegationsResponse {
    pub data: Vec<Delegation>,
    pub offset: u32,
    pub limit: u32,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

async fn get_delegations(
    State(state): State<ApiState>,
    Query(params): Query<DelegationsQuery>,
) -> std::result::Result<Json<DelegationsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let current_year = Utc::now().year();
    let year = params.year.unwrap_or(current_year);
    if year < MIN_YEAR || year > current_year {
        error!("Invalid year parameter: {}", year);
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid year: {}", year),
        ));
    }

    let offset = params.offset.unwrap_or(0);
    let data = state.repo.delegations_page(year, offset).map_err(|e| {
        error!("Error fetching delegations: {}", e);
        error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    })?;

    Ok(Json(DelegationsResponse {
        data,
        offset,
        limit: PAGE_LIMIT,
    }))
}

/// Build the API router.
pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/xtz/delegations", get(get_delegations))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve the API. Blocks until the server exits.
pub async fn start_server(addr: &str, state: ApiState) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
