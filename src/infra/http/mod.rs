//! HTTP surface over [`CacheService`].

mod error;
mod handlers;
mod middleware;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};
pub use middleware::RequestContext;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN},
    },
    middleware as axum_middleware,
    routing::get,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::application::cache_service::CacheService;
use crate::config::AllowedOrigins;

use middleware::{log_responses, set_request_context};

const CORS_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Clone)]
pub struct HttpState {
    pub service: Arc<CacheService>,
}

impl HttpState {
    pub fn new(service: Arc<CacheService>) -> Self {
        Self { service }
    }
}

pub fn build_router(state: HttpState, origins: &AllowedOrigins) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/health/ready", get(handlers::ready))
        .route(
            "/api/bitcoins",
            get(handlers::list_bitcoins).post(handlers::create_bitcoin),
        )
        .route(
            "/api/bitcoins/{symbol}",
            get(handlers::get_bitcoin)
                .put(handlers::update_bitcoin)
                .delete(handlers::delete_bitcoin),
        )
        .route("/api/cache/stats", get(handlers::cache_stats))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .layer(cors_layer(origins))
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let allow_origin = match origins {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(err) => {
                        warn!(
                            target = "coinrank::http::cors",
                            origin = %origin,
                            error = %err,
                            "ignoring unparsable CORS origin"
                        );
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ORIGIN, CONTENT_TYPE, ACCEPT])
        .expose_headers([CONTENT_LENGTH])
        .max_age(CORS_MAX_AGE)
}
