//! Booking endpoints: reserve, read, preview refund, cancel.

use crate::{
    api::{AppState, error::ApiError, extractors::CurrentActor},
    config::settings::PaymentAccount,
    core::{
        availability,
        booking::get_booking_for_actor,
        cancellation::{self, CancelRequest, RefundBankDetails},
        refund::RefundDecision,
    },
    entities::{
        BookingModel,
        booking::{CancellationState, PaymentStatus},
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Booking as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    id: i64,
    reference_code: String,
    availability_id: i64,
    adults: i32,
    children: i32,
    adult_price: i64,
    child_price: i64,
    surcharge: i64,
    total_amount: i64,
    payment_status: PaymentStatus,
    cancellation_state: CancellationState,
    cancel_reason: Option<String>,
    refund_amount: Option<i64>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl From<BookingModel> for BookingView {
    fn from(booking: BookingModel) -> Self {
        Self {
            id: booking.id,
            reference_code: booking.reference_code,
            availability_id: booking.availability_id,
            adults: booking.adults,
            children: booking.children,
            adult_price: booking.adult_price,
            child_price: booking.child_price,
            surcharge: booking.surcharge,
            total_amount: booking.total_amount,
            payment_status: booking.payment_status,
            cancellation_state: booking.cancellation_state,
            cancel_reason: booking.cancel_reason,
            refund_amount: booking.refund_amount,
            created_at: booking.created_at,
            paid_at: booking.paid_at,
            cancelled_at: booking.cancelled_at,
        }
    }
}

/// How to pay for a new booking.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstructions {
    bank_name: String,
    account_number: String,
    account_name: String,
    amount: i64,
    transfer_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    qr_url: Option<String>,
}

impl PaymentInstructions {
    fn new(account: &PaymentAccount, booking: &BookingModel) -> Self {
        let qr_url = account.qr_base_url.as_deref().map(|base| {
            format!(
                "{base}?acc={}&bank={}&amount={}&des={}",
                account.account_number,
                account.bank_name.replace(' ', "%20"),
                booking.total_amount,
                booking.reference_code
            )
        });
        Self {
            bank_name: account.bank_name.clone(),
            account_number: account.account_number.clone(),
            account_name: account.account_name.clone(),
            amount: booking.total_amount,
            transfer_content: booking.reference_code.clone(),
            qr_url,
        }
    }
}

/// Body of `POST /bookings`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveBody {
    availability_id: i64,
    adults: i32,
    #[serde(default)]
    children: i32,
}

/// Response of `POST /bookings`.
#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    booking: BookingView,
    payment: PaymentInstructions,
}

/// `POST /bookings`
pub async fn create(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<ReserveBody>,
) -> Result<(StatusCode, Json<ReservationResponse>), ApiError> {
    let booking = availability::reserve(
        &state.db,
        actor.id,
        body.availability_id,
        body.adults,
        body.children,
    )
    .await?;

    let payment = PaymentInstructions::new(&state.payment, &booking);
    Ok((
        StatusCode::CREATED,
        Json(ReservationResponse {
            booking: booking.into(),
            payment,
        }),
    ))
}

/// `GET /bookings/:id`
pub async fn get(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(booking_id): Path<i64>,
) -> Result<Json<BookingView>, ApiError> {
    let booking = get_booking_for_actor(&state.db, &actor, booking_id).await?;
    Ok(Json(booking.into()))
}

/// `POST /bookings/:id/calculate-refund`
///
/// The request may carry a `reason`; it does not influence the preview.
pub async fn calculate_refund(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(booking_id): Path<i64>,
) -> Result<Json<RefundDecision>, ApiError> {
    let decision =
        cancellation::preview_refund(&state.db, &state.policy, &actor, booking_id, Utc::now())
            .await?;
    Ok(Json(decision))
}

/// Body of `POST /bookings/:id/cancel`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    reason: String,
    refund_bank_code: Option<String>,
    refund_bank_account: Option<String>,
    refund_account_name: Option<String>,
}

impl From<CancelBody> for CancelRequest {
    fn from(body: CancelBody) -> Self {
        let any_detail = body.refund_bank_code.is_some()
            || body.refund_bank_account.is_some()
            || body.refund_account_name.is_some();
        let refund_details = any_detail.then(|| RefundBankDetails {
            bank_code: body.refund_bank_code.unwrap_or_default(),
            bank_account: body.refund_bank_account.unwrap_or_default(),
            account_name: body.refund_account_name.unwrap_or_default(),
        });
        Self {
            reason: body.reason,
            refund_details,
        }
    }
}

/// Response of `POST /bookings/:id/cancel`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationResponse {
    booking: BookingView,
    refund: RefundDecision,
    seats_released: bool,
}

/// `POST /bookings/:id/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(booking_id): Path<i64>,
    Json(body): Json<CancelBody>,
) -> Result<Json<CancellationResponse>, ApiError> {
    let outcome = cancellation::cancel(
        &state.db,
        &state.policy,
        &actor,
        booking_id,
        body.into(),
        Utc::now(),
    )
    .await?;

    Ok(Json(CancellationResponse {
        booking: outcome.booking.into(),
        refund: outcome.decision,
        seats_released: outcome.seats_released,
    }))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::test_support::*,
        core::approval::{Actor, Role},
        errors::Result,
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_reserve_returns_payment_instructions() -> Result<()> {
        let (db, availability) = setup_with_availability(4).await?;
        let state = test_state(db, None);

        let (status, body) = send(
            &state,
            "POST",
            "/bookings",
            Some(customer()),
            Some(json!({ "availabilityId": availability.id, "adults": 2, "children": 1 })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let reference = body["booking"]["referenceCode"].as_str().unwrap_or_default();
        assert!(reference.starts_with("BK"));
        assert_eq!(body["booking"]["totalAmount"], json!(1_000_000));
        assert_eq!(body["booking"]["paymentStatus"], json!("Unpaid"));
        assert_eq!(body["payment"]["transferContent"], json!(reference));
        assert_eq!(body["payment"]["amount"], json!(1_000_000));
        assert!(
            body["payment"]["qrUrl"]
                .as_str()
                .is_some_and(|url| url.ends_with(&format!("des={reference}")))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_sold_out_is_conflict() -> Result<()> {
        let (db, availability) = setup_with_availability(1).await?;
        let state = test_state(db, None);
        let request = json!({ "availabilityId": availability.id, "adults": 1 });

        let (first, _) = send(&state, "POST", "/bookings", Some(customer()), Some(request.clone())).await;
        let (second, body) = send(&state, "POST", "/bookings", Some(customer()), Some(request)).await;

        assert_eq!(first, StatusCode::CREATED);
        assert_eq!(second, StatusCode::CONFLICT);
        assert_eq!(body["code"], json!("SOLD_OUT"));
        Ok(())
    }

    #[tokio::test]
    async fn test_requests_without_identity_are_rejected() -> Result<()> {
        let (db, availability) = setup_with_availability(1).await?;
        let state = test_state(db, None);

        let (status, _) = send(
            &state,
            "POST",
            "/bookings",
            None,
            Some(json!({ "availabilityId": availability.id, "adults": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_preview_then_cancel_paid_booking() -> Result<()> {
        let (db, availability) = setup_with_availability(4).await?;
        let booking = create_test_booking(&db, availability.id, 1, 0).await?;
        mark_paid(&db, booking.id).await?;
        let state = test_state(db, None);

        let (status, preview) = send(
            &state,
            "POST",
            &format!("/bookings/{}/calculate-refund", booking.id),
            Some(customer()),
            Some(json!({ "reason": "sick" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(preview["refundPercentage"], json!(100));
        assert_eq!(preview["canRefund"], json!(true));

        let (status, body) = send(
            &state,
            "POST",
            &format!("/bookings/{}/cancel", booking.id),
            Some(customer()),
            Some(json!({ "reason": "sick" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], json!("MISSING_REFUND_DETAILS"));

        let (status, body) = send(
            &state,
            "POST",
            &format!("/bookings/{}/cancel", booking.id),
            Some(customer()),
            Some(json!({
                "reason": "sick",
                "refundBankCode": "VCB",
                "refundBankAccount": "0011223344",
                "refundAccountName": "NGUYEN VAN A"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["booking"]["cancellationState"], json!("Cancelled"));
        assert_eq!(body["refund"]["refundAmount"], preview["refundAmount"]);
        assert_eq!(body["seatsReleased"], json!(true));

        let (status, body) = send(
            &state,
            "POST",
            &format!("/bookings/{}/cancel", booking.id),
            Some(admin()),
            Some(json!({ "reason": "again" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], json!("ALREADY_CANCELLED"));
        Ok(())
    }

    #[tokio::test]
    async fn test_other_customer_cannot_read_booking() -> Result<()> {
        let (db, availability) = setup_with_availability(4).await?;
        let booking = create_test_booking(&db, availability.id, 1, 0).await?;
        let state = test_state(db, None);
        let stranger = Actor::new(CUSTOMER_ID + 1, Role::Customer);

        let uri = format!("/bookings/{}", booking.id);
        let (status, _) = send(&state, "GET", &uri, Some(stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&state, "GET", &uri, Some(customer()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["referenceCode"], json!(booking.reference_code));
        Ok(())
    }
}
