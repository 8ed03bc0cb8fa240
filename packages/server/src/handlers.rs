//! HTTP handler functions for the noise map API.

use std::convert::Infallible;

use actix_web::{HttpResponse, web};
use noise_map_query::QueryError;
use noise_map_query::broadcast::NOISE_UPDATE_EVENT;
use noise_map_query::params::{parse_center, parse_radius, parse_time_range};
use noise_map_query::submission::SampleSubmission;
use noise_map_server_models::{
    ApiAreaStatistics, ApiError, ApiHealth, ApiNoiseSample, AreaQueryParams, HistoryQueryParams,
    RecordNoiseRequest,
};
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;
use crate::auth::AuthenticatedUser;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/noise/record`
///
/// Stores a sample for the authenticated user and fans it out to stream
/// subscribers.
pub async fn record(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<RecordNoiseRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    let submission = SampleSubmission {
        level: body.level,
        location: body.location,
        source: body.source,
        device_info: body.device_info,
        metadata: body.metadata,
    };

    match state.service.record_sample(user.id(), submission).await {
        Ok(sample) => HttpResponse::Created().json(ApiNoiseSample::from(sample)),
        Err(e) => error_response("record sample", &e),
    }
}

/// `GET /api/noise/area`
///
/// Returns up to 100 samples within `radius` meters of `(lng, lat)`,
/// newest first.
pub async fn area(
    state: web::Data<AppState>,
    params: web::Query<AreaQueryParams>,
) -> HttpResponse {
    let center = match parse_center(params.lng.as_deref(), params.lat.as_deref()) {
        Ok(center) => center,
        Err(e) => return error_response("query area", &e),
    };
    let radius = parse_radius(params.radius.as_deref());

    match state.service.find_nearby(center, radius).await {
        Ok(samples) => {
            let api_samples: Vec<ApiNoiseSample> =
                samples.into_iter().map(ApiNoiseSample::from).collect();
            HttpResponse::Ok().json(api_samples)
        }
        Err(e) => error_response("query area", &e),
    }
}

/// `GET /api/noise/history`
///
/// Returns the authenticated user's samples, optionally bounded by
/// `startDate` / `endDate`.
pub async fn history(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    params: web::Query<HistoryQueryParams>,
) -> HttpResponse {
    let range = match parse_time_range(params.start_date.as_deref(), params.end_date.as_deref()) {
        Ok(range) => range,
        Err(e) => return error_response("query history", &e),
    };

    match state.service.find_history(user.id(), &range).await {
        Ok(samples) => {
            let api_samples: Vec<ApiNoiseSample> =
                samples.into_iter().map(ApiNoiseSample::from).collect();
            HttpResponse::Ok().json(api_samples)
        }
        Err(e) => error_response("query history", &e),
    }
}

/// `GET /api/noise/statistics`
///
/// Returns count, mean, min, and max level within `radius` meters of
/// `(lng, lat)`. An area with no samples yields all zeros.
pub async fn statistics(
    state: web::Data<AppState>,
    params: web::Query<AreaQueryParams>,
) -> HttpResponse {
    let center = match parse_center(params.lng.as_deref(), params.lat.as_deref()) {
        Ok(center) => center,
        Err(e) => return error_response("query statistics", &e),
    };
    let radius = parse_radius(params.radius.as_deref());

    match state.service.area_statistics(center, radius).await {
        Ok(stats) => HttpResponse::Ok().json(ApiAreaStatistics::from(stats)),
        Err(e) => error_response("query statistics", &e),
    }
}

/// `GET /api/noise/stream`
///
/// Server-Sent Events stream of newly recorded samples. Each event is
/// named `noise-update` and carries the sample as JSON.
pub async fn stream(state: web::Data<AppState>) -> HttpResponse {
    let mut rx = state.service.subscribe();

    let body = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(update) => {
                    match serde_json::to_string(&ApiNoiseSample::from(update.sample)) {
                        Ok(json) => {
                            yield Ok::<_, Infallible>(web::Bytes::from(format!(
                                "event: {NOISE_UPDATE_EVENT}\ndata: {json}\n\n"
                            )));
                        }
                        Err(e) => log::warn!("Failed to serialize noise update: {e}"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Stream subscriber lagged, skipped {skipped} update(s)");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(body)
}

/// Maps a [`QueryError`] to its HTTP response.
fn error_response(action: &str, e: &QueryError) -> HttpResponse {
    match e {
        QueryError::InvalidArgument { message } => {
            log::warn!("Failed to {action}: {message}");
            HttpResponse::BadRequest().json(ApiError::new(message.clone()))
        }
        QueryError::Unavailable { message } => {
            log::error!("Failed to {action}: {message}");
            HttpResponse::ServiceUnavailable().json(ApiError::new(message.clone()))
        }
    }
}
