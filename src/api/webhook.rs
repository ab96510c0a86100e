//! Payment gateway webhook.
//!
//! The gateway retries any delivery that does not get a 2xx answer, so every
//! business outcome (including unmatched transfers and amount mismatches) is
//! acknowledged with 200 once the event is recorded. Only malformed requests,
//! bad credentials and infrastructure failures produce an error status.

use crate::{
    api::{AppState, error::ApiError},
    core::{
        notification::PaymentNotification,
        reconciler::{self, IgnoreReason, IncomingTransfer, Reconciliation},
    },
    entities::payment_event::EventOutcome,
    errors::Error,
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Transfer notification as posted by the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// Gateway-unique transaction id
    pub id: i64,
    /// Bank name
    pub gateway: String,
    /// Transaction time as formatted by the gateway
    pub transaction_date: String,
    /// Receiving account
    pub account_number: String,
    /// Payment code detected by the gateway
    #[serde(default)]
    pub code: Option<String>,
    /// Transfer content
    #[serde(default)]
    pub content: String,
    /// `in` or `out`
    pub transfer_type: String,
    /// Amount transferred
    pub transfer_amount: f64,
    /// Account balance after the transfer
    #[serde(default)]
    pub accumulated: f64,
    /// Virtual sub-account, if any
    #[serde(default)]
    pub sub_account: Option<String>,
    /// Bank-side transaction reference
    #[serde(default)]
    pub reference_code: Option<String>,
    /// Full transfer description
    #[serde(default)]
    pub description: Option<String>,
}

impl From<WebhookPayload> for IncomingTransfer {
    fn from(payload: WebhookPayload) -> Self {
        Self {
            gateway_id: payload.id,
            gateway: payload.gateway,
            transaction_date: payload.transaction_date,
            account_number: payload.account_number,
            code: payload.code,
            content: payload.content,
            transfer_type: payload.transfer_type,
            transfer_amount: payload.transfer_amount,
            bank_reference: payload.reference_code,
            description: payload.description,
        }
    }
}

/// Acknowledgement returned to the gateway.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    booking_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processed_at: Option<DateTime<Utc>>,
}

impl WebhookResponse {
    fn acknowledged(success: bool, gateway_id: i64, message: &str) -> Self {
        Self {
            success,
            message: Some(message.to_string()),
            transaction_id: Some(gateway_id.to_string()),
            processed_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

const fn ignore_message(reason: &IgnoreReason) -> &'static str {
    match reason {
        IgnoreReason::Duplicate { .. } => "Transaction already processed",
        IgnoreReason::Unmatched => "Transaction recorded",
        IgnoreReason::AlreadyPaid => "Booking already paid",
        IgnoreReason::BookingCancelled => "Booking is cancelled; recorded for manual review",
        IgnoreReason::Outgoing => "Outgoing transfer ignored",
    }
}

/// Answer for an ignored delivery. A redelivery repeats the first delivery's outcome.
fn ignored_response(gateway_id: i64, reason: IgnoreReason) -> WebhookResponse {
    let message = ignore_message(&reason);
    match reason {
        IgnoreReason::Duplicate {
            prior,
            reference_code,
            booking_id,
        } => WebhookResponse {
            order_id: reference_code,
            booking_id: booking_id
                .filter(|_| prior == EventOutcome::Settled)
                .map(|id| id.to_string()),
            ..WebhookResponse::acknowledged(prior != EventOutcome::AmountMismatch, gateway_id, message)
        },
        _ => WebhookResponse::acknowledged(true, gateway_id, message),
    }
}

fn authorize(expected: Option<&str>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().strip_prefix("Apikey "))
        .map(str::trim);

    if presented == Some(expected) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("invalid webhook credentials"))
    }
}

/// `POST /webhooks/payment`
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<WebhookResponse>, ApiError> {
    authorize(state.webhook_api_key.as_deref(), &headers)?;
    let gateway_id = payload.id;

    match reconciler::ingest(&state.db, payload.into()).await {
        Ok(Reconciliation::Settled {
            booking_id,
            reference_code,
            gateway_id,
        }) => {
            let notification = PaymentNotification::PaymentSuccess {
                booking_number: reference_code.clone(),
            };
            let delivered = state.hub.publish(&reference_code, notification).await;
            info!(
                "Notified {} subscriber(s) of payment for {}",
                delivered, reference_code
            );

            Ok(Json(WebhookResponse {
                order_id: Some(reference_code),
                booking_id: Some(booking_id.to_string()),
                ..WebhookResponse::acknowledged(true, gateway_id, "Payment processed")
            }))
        }
        Ok(Reconciliation::Ignored { reason }) => Ok(Json(ignored_response(gateway_id, reason))),
        Err(Error::AmountMismatch { reference_code, .. }) => Ok(Json(WebhookResponse {
            order_id: Some(reference_code),
            ..WebhookResponse::acknowledged(
                false,
                gateway_id,
                "Amount does not match the booking; recorded for manual review",
            )
        })),
        Err(err) => Err(err.into()),
    }
}
