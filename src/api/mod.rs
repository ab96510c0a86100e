//! HTTP and WebSocket surface.
//!
//! Handlers are thin: they extract the actor and body, call into [`crate::core`],
//! and let [`error::ApiError`] turn domain errors into status codes.

/// Guide-managed departures
pub mod availabilities;
/// Reservation, lookup, refund preview and cancellation
pub mod bookings;
/// Domain error to HTTP response mapping
pub mod error;
/// Actor identity extraction
pub mod extractors;
/// Guide applications
pub mod guide_applications;
/// Liveness check
pub mod health;
/// Tour management and approval
pub mod tours;
/// Payment gateway webhook
pub mod webhook;
/// Payment notification WebSocket
pub mod ws;

use crate::{
    config::settings::PaymentAccount,
    core::{notification::PaymentNotificationHub, refund::RefundPolicy},
};
use axum::{
    Router,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Payment notification hub shared by the webhook and WebSocket handlers
    pub hub: PaymentNotificationHub,
    /// Validated cancellation refund policy
    pub policy: Arc<RefundPolicy>,
    /// Receiving account shown in payment instructions
    pub payment: Arc<PaymentAccount>,
    /// Key the payment gateway must present, if configured
    pub webhook_api_key: Option<Arc<str>>,
}

impl AppState {
    /// Builds the state with a fresh notification hub.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        policy: RefundPolicy,
        payment: PaymentAccount,
        webhook_api_key: Option<String>,
    ) -> Self {
        Self {
            db,
            hub: PaymentNotificationHub::new(),
            policy: Arc::new(policy),
            payment: Arc::new(payment),
            webhook_api_key: webhook_api_key.map(Arc::from),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/tours", get(tours::list).post(tours::create))
        .route("/tours/:id", get(tours::get).put(tours::edit))
        .route("/tours/:id/status", put(tours::set_status))
        .route("/tours/:id/featured", put(tours::set_featured))
        .route(
            "/tours/:id/availabilities",
            get(availabilities::list).post(availabilities::create),
        )
        .route(
            "/availabilities/:id",
            put(availabilities::update).delete(availabilities::delete),
        )
        .route("/bookings", post(bookings::create))
        .route("/bookings/:id", get(bookings::get))
        .route("/bookings/:id/cancel", post(bookings::cancel))
        .route("/bookings/:id/calculate-refund", post(bookings::calculate_refund))
        .route(
            "/guide-applications",
            get(guide_applications::list_pending).post(guide_applications::submit),
        )
        .route("/guide-applications/:id", get(guide_applications::get))
        .route("/guide-applications/:id/review", put(guide_applications::review))
        .route("/guide-applications/:id/resubmit", put(guide_applications::resubmit))
        .route("/webhooks/payment", post(webhook::receive))
        .route("/ws", get(ws::handle))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        api::extractors::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER},
        core::approval::{Actor, Role},
        test_utils::test_refund_policy,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    pub fn test_state(db: DatabaseConnection, webhook_api_key: Option<&str>) -> AppState {
        AppState::new(
            db,
            test_refund_policy(),
            PaymentAccount {
                bank_name: "MBBank".to_string(),
                account_number: "0123456789".to_string(),
                account_name: "TOUR COMPANY".to_string(),
                qr_base_url: Some("https://qr.sepay.vn/img".to_string()),
            },
            webhook_api_key.map(str::to_string),
        )
    }

    /// Sends one request through a fresh router and returns status and JSON body.
    pub async fn send(
        state: &AppState,
        method: &str,
        uri: &str,
        actor: Option<Actor>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            let role = match actor.role {
                Role::Admin => "admin",
                Role::Guide => "guide",
                Role::Customer => "customer",
            };
            request = request
                .header(ACTOR_ID_HEADER, actor.id.to_string())
                .header(ACTOR_ROLE_HEADER, role);
        }
        let request = match body {
            Some(json) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
