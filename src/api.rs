use std::{future::Future, sync::Arc};

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    clients::health::HealthChecker,
    models::{
        request::SendNotificationRequest,
        response::{SendNotificationResponse, StatusResponse},
    },
    service::{IngressError, NotificationService},
    store::StoreError,
};

/// `/health` only, for processes without an ingress surface.
pub fn health_router(health_checker: HealthChecker) -> Router {
    health_routes(health_checker).layer(TraceLayer::new_for_http())
}

pub fn ingress_router(service: Arc<NotificationService>, health_checker: HealthChecker) -> Router {
    Router::new()
        .route("/api/v1/notifications", post(send_notification))
        .route(
            "/api/v1/notifications/{id}/status",
            get(notification_status),
        )
        .with_state(service)
        .merge(health_routes(health_checker))
        .layer(TraceLayer::new_for_http())
}

fn health_routes(health_checker: HealthChecker) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(Arc::new(health_checker))
}

pub async fn run_api_server<F>(router: Router, port: u16, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "HTTP server started");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn health_check(State(health_checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    let health = health_checker.check_all().await;

    let status_code = if health.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

async fn send_notification(
    State(service): State<Arc<NotificationService>>,
    Json(request): Json<SendNotificationRequest>,
) -> impl IntoResponse {
    match service.submit(&request).await {
        Ok(id) => (StatusCode::ACCEPTED, Json(SendNotificationResponse::accepted(id))),
        Err(e) => {
            let status_code = match &e {
                IngressError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                IngressError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                IngressError::RateLimiter(_) => StatusCode::SERVICE_UNAVAILABLE,
                IngressError::Publish(_) => StatusCode::BAD_GATEWAY,
                IngressError::Storage(_) | IngressError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };

            (status_code, Json(SendNotificationResponse::rejected(e.to_string())))
        }
    }
}

async fn notification_status(
    State(service): State<Arc<NotificationService>>,
    Path(notification_id): Path<i64>,
) -> impl IntoResponse {
    match service.status(notification_id).await {
        Ok(status) => (StatusCode::OK, Json(StatusResponse::found(status))),
        Err(StoreError::NotFound(id)) => (
            StatusCode::NOT_FOUND,
            Json(StatusResponse::error(format!("Notification {} not found", id))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse::error(e.to_string())),
        ),
    }
}
