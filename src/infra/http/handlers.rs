use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use coinrank_api_types::{
    BitcoinResponse, CacheStatsResponse, DeleteBitcoinResponse, HealthResponse,
    UpdatePriceRequest, UpsertBitcoinRequest,
};

use crate::application::error::ErrorReport;
use crate::cache::ReadSource;

use super::HttpState;
use super::error::{ApiError, codes};

const CACHE_HEADER: &str = "x-cache";
const DELETED_MESSAGE: &str = "Bitcoin deleted successfully";

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

pub async fn ready(State(state): State<HttpState>) -> Response {
    let readiness = state.service.readiness().await;
    if readiness.is_ready() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
    ErrorReport::from_message(
        "infra::http::ready",
        StatusCode::SERVICE_UNAVAILABLE,
        format!(
            "store_ready={} cache_ready={}",
            readiness.store, readiness.cache
        ),
    )
    .attach(&mut response);
    response
}

pub async fn list_bitcoins(State(state): State<HttpState>) -> Result<Response, ApiError> {
    let outcome = state.service.list_ranked().await?;
    let source = outcome.source;
    let body: Vec<BitcoinResponse> = outcome
        .into_value()
        .into_iter()
        .map(BitcoinResponse::from)
        .collect();
    Ok(with_cache_header(Json(body).into_response(), source))
}

pub async fn get_bitcoin(
    State(state): State<HttpState>,
    Path(symbol): Path<String>,
) -> Result<Response, ApiError> {
    let outcome = state.service.get_bitcoin(&symbol).await?;
    let source = outcome.source;
    let record = outcome
        .into_value()
        .ok_or_else(|| ApiError::not_found("Bitcoin not found"))?;
    Ok(with_cache_header(
        Json(BitcoinResponse::from(record)).into_response(),
        source,
    ))
}

pub async fn create_bitcoin(
    State(state): State<HttpState>,
    payload: Result<Json<UpsertBitcoinRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BitcoinResponse>), ApiError> {
    const REQUIRED: &str = "Symbol and price are required";

    let Json(request) =
        payload.map_err(|rejection| ApiError::bad_request(REQUIRED, Some(rejection.body_text())))?;
    let symbol = request
        .symbol
        .filter(|symbol| !symbol.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(REQUIRED, Some("symbol is missing".to_string())))?;
    let price = request
        .price
        .ok_or_else(|| ApiError::bad_request(REQUIRED, Some("price is missing".to_string())))?;

    let outcome = state.service.set_bitcoin(&symbol, price).await?;
    Ok((
        StatusCode::CREATED,
        Json(BitcoinResponse::from(outcome.into_value())),
    ))
}

pub async fn update_bitcoin(
    State(state): State<HttpState>,
    Path(symbol): Path<String>,
    payload: Result<Json<UpdatePriceRequest>, JsonRejection>,
) -> Result<Json<BitcoinResponse>, ApiError> {
    const REQUIRED: &str = "Price is required";

    let Json(request) =
        payload.map_err(|rejection| ApiError::bad_request(REQUIRED, Some(rejection.body_text())))?;
    let price = request
        .price
        .ok_or_else(|| ApiError::bad_request(REQUIRED, Some("price is missing".to_string())))?;

    let outcome = state.service.set_bitcoin(&symbol, price).await?;
    Ok(Json(BitcoinResponse::from(outcome.into_value())))
}

pub async fn delete_bitcoin(
    State(state): State<HttpState>,
    Path(symbol): Path<String>,
) -> Result<Json<DeleteBitcoinResponse>, ApiError> {
    let record = state
        .service
        .delete_bitcoin(&symbol)
        .await?
        .into_value()
        .ok_or_else(|| ApiError::not_found("Bitcoin not found"))?;

    Ok(Json(DeleteBitcoinResponse {
        message: DELETED_MESSAGE.to_string(),
        bitcoin: record.into(),
    }))
}

pub async fn cache_stats(
    State(state): State<HttpState>,
) -> Result<Json<CacheStatsResponse>, ApiError> {
    let info = state.service.cache_stats().await.map_err(|err| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::CACHE_UNAVAILABLE,
            "Cache statistics unavailable",
            Some(err.to_string()),
        )
    })?;
    Ok(Json(CacheStatsResponse { info }))
}

fn with_cache_header(mut response: Response, source: ReadSource) -> Response {
    response.headers_mut().insert(
        CACHE_HEADER,
        HeaderValue::from_static(source.as_header_value()),
    );
    response
}

