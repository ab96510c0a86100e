//! Booking cancellation.
//!
//! Cancelling computes the refund with the same pure calculator the preview uses,
//! marks the booking cancelled and gives its seats back, all in one transaction.
//! The refund transfer itself is settled manually; only the amount owed and the
//! customer's bank details are recorded here.
//!
//! The write is conditional on the booking still being uncancelled and still having
//! the payment status the refund was computed from. If a webhook settles the booking
//! in between, the refund is recomputed against the new status.

use crate::{
    core::{
        approval::Actor,
        availability::release_seats,
        booking::{ensure_booking_access, get_booking_by_id, get_booking_for_actor},
        refund::{self, RefundDecision, RefundPolicy},
    },
    entities::{
        Booking, TourAvailability,
        booking::{self, CancellationState},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use tracing::{info, warn};

const MAX_ATTEMPTS: usize = 3;

/// Where a refund should be sent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundBankDetails {
    /// Bank code or short name
    pub bank_code: String,
    /// Account number
    pub bank_account: String,
    /// Account holder name
    pub account_name: String,
}

impl RefundBankDetails {
    fn validate(&self) -> Result<()> {
        let blank = [&self.bank_code, &self.bank_account, &self.account_name]
            .iter()
            .any(|field| field.trim().is_empty());
        if blank {
            return Err(Error::MissingRefundDetails);
        }
        Ok(())
    }
}

/// A cancellation request from the customer or an admin.
#[derive(Debug, Clone)]
pub struct CancelRequest {
    /// Why the booking is being cancelled
    pub reason: String,
    /// Refund destination; required when a refund is owed
    pub refund_details: Option<RefundBankDetails>,
}

/// Result of a successful cancellation.
#[derive(Debug, Clone)]
pub struct Cancellation {
    /// The booking after cancellation
    pub booking: booking::Model,
    /// The refund decision that was applied
    pub decision: RefundDecision,
    /// Whether this call returned the seats to the departure
    pub seats_released: bool,
}

async fn departure_date<C>(conn: &C, booking: &booking::Model) -> Result<NaiveDate>
where
    C: ConnectionTrait,
{
    TourAvailability::find_by_id(booking.availability_id)
        .one(conn)
        .await?
        .map(|availability| availability.date)
        .ok_or_else(|| Error::not_found("Availability", booking.availability_id))
}

/// Side-effect-free refund preview for a booking.
pub async fn preview_refund(
    db: &DatabaseConnection,
    policy: &RefundPolicy,
    actor: &Actor,
    booking_id: i64,
    now: DateTime<Utc>,
) -> Result<RefundDecision> {
    let booking = get_booking_for_actor(db, actor, booking_id).await?;
    if booking.is_cancelled() {
        return Err(Error::AlreadyCancelled { booking_id });
    }

    let departure = departure_date(db, &booking).await?;
    Ok(refund::calculate(policy, &booking, departure, now))
}

/// Writes the cancellation of `booking` as it was read, on the caller's transaction.
///
/// Returns `None` and writes nothing when the stored booking no longer has the
/// cancellation state and payment status the refund was computed from.
async fn apply_cancellation<C>(
    conn: &C,
    policy: &RefundPolicy,
    booking: &booking::Model,
    request: &CancelRequest,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Option<Cancellation>>
where
    C: ConnectionTrait,
{
    let departure = departure_date(conn, booking).await?;
    let decision = refund::calculate(policy, booking, departure, now);

    let details = if decision.can_refund {
        let details = request
            .refund_details
            .as_ref()
            .ok_or(Error::MissingRefundDetails)?;
        details.validate()?;
        Some(details)
    } else {
        None
    };

    let changes = booking::ActiveModel {
        cancellation_state: Set(CancellationState::Cancelled),
        cancel_reason: Set(Some(reason.to_string())),
        refund_bank_code: Set(details.map(|d| d.bank_code.trim().to_string())),
        refund_bank_account: Set(details.map(|d| d.bank_account.trim().to_string())),
        refund_account_name: Set(details.map(|d| d.account_name.trim().to_string())),
        refund_amount: Set(decision.can_refund.then_some(decision.refund_amount)),
        cancelled_at: Set(Some(Utc::now())),
        ..Default::default()
    };

    let result = Booking::update_many()
        .set(changes)
        .filter(booking::Column::Id.eq(booking.id))
        .filter(booking::Column::CancellationState.eq(CancellationState::NotCancelled))
        .filter(booking::Column::PaymentStatus.eq(booking.payment_status))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Ok(None);
    }

    let seats_released = release_seats(conn, booking).await?;
    let cancelled = get_booking_by_id(conn, booking.id)
        .await?
        .ok_or_else(|| Error::not_found("Booking", booking.id))?;
    Ok(Some(Cancellation {
        booking: cancelled,
        decision,
        seats_released,
    }))
}

/// Cancels a booking and releases its seats.
///
/// # Errors
/// - [`Error::AlreadyCancelled`] if the booking was cancelled before (seats are not released twice)
/// - [`Error::MissingRefundDetails`] if a refund is owed and no complete bank details were given
/// - [`Error::Forbidden`] if `actor` is neither the customer nor an admin
/// - [`Error::Conflict`] if the payment status kept changing underneath the cancellation
pub async fn cancel(
    db: &DatabaseConnection,
    policy: &RefundPolicy,
    actor: &Actor,
    booking_id: i64,
    request: CancelRequest,
    now: DateTime<Utc>,
) -> Result<Cancellation> {
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(Error::Validation {
            message: "a cancellation reason is required".to_string(),
        });
    }

    for attempt in 1..=MAX_ATTEMPTS {
        let txn = db.begin().await?;

        let booking = get_booking_by_id(&txn, booking_id)
            .await?
            .ok_or_else(|| Error::not_found("Booking", booking_id))?;
        ensure_booking_access(actor, &booking)?;
        if booking.is_cancelled() {
            return Err(Error::AlreadyCancelled { booking_id });
        }

        if let Some(cancellation) =
            apply_cancellation(&txn, policy, &booking, &request, reason, now).await?
        {
            txn.commit().await?;
            info!(
                "Cancelled booking {} ({}) by actor {}: refund {}% = {}",
                booking_id,
                cancellation.booking.reference_code,
                actor.id,
                cancellation.decision.refund_percentage,
                cancellation.decision.refund_amount
            );
            return Ok(cancellation);
        }

        txn.rollback().await?;
        let current = get_booking_by_id(db, booking_id)
            .await?
            .ok_or_else(|| Error::not_found("Booking", booking_id))?;
        if current.is_cancelled() {
            return Err(Error::AlreadyCancelled { booking_id });
        }
        warn!(
            "Payment status of booking {} changed during cancellation (attempt {}), recomputing refund",
            booking_id, attempt
        );
    }

    Err(Error::Conflict {
        message: format!("booking {booking_id} kept changing while being cancelled"),
    })
}
