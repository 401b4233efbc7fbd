//! HTTP routes
//!
//! Public router: record submission, verification, queries and the event feed.
//! Admin router: Prometheus `/metrics`.

use std::str::FromStr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use traffic_core::api::{
    CiphertextResponse, EventsResponse, IdsResponse, SubmitScheduleRequest, SubmitTelemetryRequest,
    VerifyScheduleRequest, VerifyTelemetryRequest, WriteResponse, SENDER_HEADER,
};
use traffic_core::{
    Address, EncryptedRecord, Handle, Health, RecordKind, ScheduleView, TelemetryView,
};

use crate::broadcast::handle_event_subscription;
use crate::error::{Result, ServerError};
use crate::state::SharedState;

/// Default and maximum page size for `GET /events`
pub const MAX_EVENT_PAGE: usize = 1000;

/// Default cap on in-flight public requests
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 256;

/// Caller address from the `x-sender` header
pub fn sender_from_headers(headers: &HeaderMap) -> Result<Address> {
    let value = headers
        .get(SENDER_HEADER)
        .ok_or(ServerError::MissingSender {
            header: SENDER_HEADER,
        })?;
    let value = value
        .to_str()
        .map_err(|e| ServerError::InvalidSender(e.to_string()))?;
    Address::from_str(value.trim()).map_err(|e| ServerError::InvalidSender(e.to_string()))
}

/// Public API router
pub fn create_public_router(state: SharedState, max_concurrent_requests: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/telemetry", get(list_telemetry).post(submit_telemetry))
        .route("/telemetry/:id", get(get_telemetry))
        .route("/telemetry/:id/verify", post(verify_telemetry))
        .route("/schedules", get(list_schedules).post(submit_schedule))
        .route("/schedules/:id", get(get_schedule))
        .route("/schedules/:id/verify", post(verify_schedule))
        .route("/records/:kind/:id", get(get_record))
        .route("/ciphertexts/:handle", get(get_ciphertext))
        .route("/events", get(list_events))
        .route("/events/subscribe", get(subscribe_events))
        .layer(ConcurrencyLimitLayer::new(max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Admin router exposing Prometheus metrics
pub fn create_admin_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(handle)
}

/// Public router with default limits and no metrics
pub fn create_router(state: SharedState) -> Router {
    create_public_router(state, DEFAULT_CONCURRENCY_LIMIT)
}

/// Public and admin routes on one listener
pub fn create_router_with_metrics(
    state: SharedState,
    handle: PrometheusHandle,
    max_concurrent_requests: usize,
) -> Router {
    create_public_router(state, max_concurrent_requests).merge(create_admin_router(handle))
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

async fn health(State(state): State<SharedState>) -> Json<Health> {
    Json(state.read(|ledger| ledger.health_check()).await)
}

async fn submit_telemetry(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<SubmitTelemetryRequest>,
) -> Result<(StatusCode, Json<WriteResponse>)> {
    let sender = sender_from_headers(&headers)?;
    let event = state
        .submit(
            sender,
            RecordKind::Telemetry,
            &request.vehicle_id,
            None,
            &[request.speed, request.position],
        )
        .await?;
    Ok((StatusCode::CREATED, Json(WriteResponse { event })))
}

async fn submit_schedule(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<SubmitScheduleRequest>,
) -> Result<(StatusCode, Json<WriteResponse>)> {
    let sender = sender_from_headers(&headers)?;
    let event = state
        .submit(
            sender,
            RecordKind::Schedule,
            &request.intersection_id,
            Some(request.location),
            &[request.cycle_time],
        )
        .await?;
    Ok((StatusCode::CREATED, Json(WriteResponse { event })))
}

async fn verify_telemetry(
    State(state): State<SharedState>,
    Path(vehicle_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<VerifyTelemetryRequest>,
) -> Result<Json<WriteResponse>> {
    let sender = sender_from_headers(&headers)?;
    let event = state
        .verify(
            sender,
            RecordKind::Telemetry,
            &vehicle_id,
            &[request.speed, request.position],
        )
        .await?;
    Ok(Json(WriteResponse { event }))
}

async fn verify_schedule(
    State(state): State<SharedState>,
    Path(intersection_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<VerifyScheduleRequest>,
) -> Result<Json<WriteResponse>> {
    let sender = sender_from_headers(&headers)?;
    let event = state
        .verify(
            sender,
            RecordKind::Schedule,
            &intersection_id,
            &[request.cycle_time],
        )
        .await?;
    Ok(Json(WriteResponse { event }))
}

async fn get_telemetry(
    State(state): State<SharedState>,
    Path(vehicle_id): Path<String>,
) -> Result<Json<TelemetryView>> {
    let view = state.read(|ledger| ledger.get_telemetry(&vehicle_id)).await?;
    Ok(Json(view))
}

async fn get_schedule(
    State(state): State<SharedState>,
    Path(intersection_id): Path<String>,
) -> Result<Json<ScheduleView>> {
    let view = state
        .read(|ledger| ledger.get_schedule(&intersection_id))
        .await?;
    Ok(Json(view))
}

async fn get_record(
    State(state): State<SharedState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<EncryptedRecord>> {
    let kind = RecordKind::from_str(&kind).map_err(ServerError::InvalidRequest)?;
    let record = state
        .read(|ledger| ledger.get_record(kind, &id).cloned())
        .await?;
    Ok(Json(record))
}

async fn get_ciphertext(
    State(state): State<SharedState>,
    Path(handle): Path<String>,
) -> Result<Json<CiphertextResponse>> {
    let handle = Handle::from_str(&handle).map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
    let response = state
        .read(|ledger| {
            let service = ledger.ciphertext_service();
            service.ciphertext(&handle).map(|ciphertext| CiphertextResponse {
                handle,
                ciphertext: ciphertext.to_vec(),
                publicly_decryptable: service.is_publicly_decryptable(&handle),
            })
        })
        .await
        .ok_or(ServerError::UnknownHandle(handle))?;
    Ok(Json(response))
}

async fn list_telemetry(State(state): State<SharedState>) -> Json<IdsResponse> {
    let ids = state
        .read(|ledger| ledger.list_telemetry_ids().to_vec())
        .await;
    Json(IdsResponse { ids })
}

async fn list_schedules(State(state): State<SharedState>) -> Json<IdsResponse> {
    let ids = state.read(|ledger| ledger.list_schedule_ids().to_vec()).await;
    Json(IdsResponse { ids })
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    since: u64,
    limit: Option<usize>,
}

async fn list_events(
    State(state): State<SharedState>,
    Query(query): Query<EventsQuery>,
) -> Json<EventsResponse> {
    let limit = query.limit.unwrap_or(MAX_EVENT_PAGE).min(MAX_EVENT_PAGE);
    let response = state
        .read(|ledger| {
            let log = ledger.events();
            let page = log.since(query.since);
            let events = page[..page.len().min(limit)].to_vec();
            let next_seq = events
                .last()
                .map_or(query.since.min(log.next_seq()), |e| e.seq + 1);
            EventsResponse { events, next_seq }
        })
        .await;
    Json(response)
}

async fn subscribe_events(State(state): State<SharedState>, ws: WebSocketUpgrade) -> Response {
    let (rx, next_seq) = state.subscribe().await;
    crate::metrics::set_ws_subscribers(state.broadcast().subscriber_count());
    ws.on_upgrade(move |socket| async move {
        handle_event_subscription(socket, rx, next_seq).await;
        crate::metrics::set_ws_subscribers(state.broadcast().subscriber_count());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_sender_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            sender_from_headers(&headers),
            Err(ServerError::MissingSender { .. })
        ));

        headers.insert(SENDER_HEADER, HeaderValue::from_static("0xnothex"));
        assert!(matches!(
            sender_from_headers(&headers),
            Err(ServerError::InvalidSender(_))
        ));

        headers.insert(
            SENDER_HEADER,
            HeaderValue::from_static("0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"),
        );
        assert_eq!(sender_from_headers(&headers).unwrap(), Address([0xa1u8; 20]));
    }
}
