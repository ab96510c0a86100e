//! Bank-transfer webhook reconciliation.
//!
//! This is the only entry point fed by an untrusted outside party. Nothing in the
//! payload is believed on its own: a transfer settles a booking only when the
//! reference code it carries names an existing unpaid booking *and* the amount
//! matches that booking's frozen total exactly.
//!
//! Idempotency rests on the unique index over `payment_events.gateway_id`. Every
//! delivery first tries a conditional insert of its event row; a redelivery (even a
//! concurrent one, on another server) inserts nothing and reports the outcome
//! recorded by the first delivery. Settlement itself is a conditional update on
//! the booking, so it also loses cleanly against a concurrent cancellation.

use crate::{
    core::{booking::get_booking_by_reference, reference::extract_reference_code},
    entities::{
        Booking, PaymentEvent,
        booking::{self, CancellationState, PaymentStatus},
        payment_event::{self, EventOutcome},
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use tracing::{debug, error, info, warn};

/// One bank transfer as reported by the payment gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingTransfer {
    /// Gateway-unique transaction id; the idempotency key
    pub gateway_id: i64,
    /// Bank or gateway name
    pub gateway: String,
    /// Transaction date as reported
    pub transaction_date: String,
    /// Receiving account number
    pub account_number: String,
    /// Payment code the gateway detected, if any
    pub code: Option<String>,
    /// Transfer content
    pub content: String,
    /// `"in"` for money received, `"out"` for money sent
    pub transfer_type: String,
    /// Amount transferred
    pub transfer_amount: f64,
    /// Bank-side reference of the transfer
    pub bank_reference: Option<String>,
    /// Full description, if the gateway sends one separately
    pub description: Option<String>,
}

impl IncomingTransfer {
    fn is_outgoing(&self) -> bool {
        self.transfer_type.trim().eq_ignore_ascii_case("out")
    }

    /// Booking reference found in the code, content or description, in that order.
    #[must_use]
    pub fn reference_code(&self) -> Option<String> {
        self.code
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.content.as_str()))
            .chain(self.description.as_deref())
            .find_map(extract_reference_code)
    }

    /// The amount in whole currency units, if it is one.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn whole_amount(&self) -> Option<i64> {
        let amount = self.transfer_amount;
        #[allow(clippy::cast_precision_loss)]
        let in_range = amount >= 0.0 && amount <= i64::MAX as f64;
        (amount.is_finite() && amount.fract() == 0.0 && in_range).then(|| amount as i64)
    }
}

/// Why a transfer did not settle anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The gateway id was seen before; carries what happened the first time
    Duplicate {
        /// Outcome recorded for the original delivery
        prior: EventOutcome,
        /// Reference code the original delivery matched, if any
        reference_code: Option<String>,
        /// Booking the original delivery was matched against, if any
        booking_id: Option<i64>,
    },
    /// No booking reference matched
    Unmatched,
    /// The matched booking is already paid
    AlreadyPaid,
    /// The matched booking was cancelled
    BookingCancelled,
    /// Money leaving the account
    Outgoing,
}

/// Successful result of ingesting a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The transfer settled a booking
    Settled {
        /// Booking that is now paid
        booking_id: i64,
        /// Its reference code, also the notification topic
        reference_code: String,
        /// Gateway transaction id
        gateway_id: i64,
    },
    /// The transfer was recorded but changed nothing
    Ignored {
        /// Why nothing was settled
        reason: IgnoreReason,
    },
}

/// What processing decided for a newly recorded event.
struct Decision {
    outcome: EventOutcome,
    reference: Option<String>,
    booking: Option<booking::Model>,
}

impl Decision {
    const fn new(outcome: EventOutcome) -> Self {
        Self {
            outcome,
            reference: None,
            booking: None,
        }
    }
}

/// Records a gateway event and settles the booking it pays for, at most once.
///
/// # Errors
/// Returns [`Error::AmountMismatch`] when the transfer names a pending booking but
/// the amount differs. The event is still recorded (committed) for audit and the
/// booking stays unpaid.
pub async fn ingest(db: &DatabaseConnection, transfer: IncomingTransfer) -> Result<Reconciliation> {
    let txn = db.begin().await?;

    let row = payment_event::ActiveModel {
        gateway_id: Set(transfer.gateway_id),
        gateway: Set(transfer.gateway.clone()),
        transaction_date: Set(transfer.transaction_date.clone()),
        account_number: Set(transfer.account_number.clone()),
        content: Set(transfer.content.clone()),
        description: Set(transfer.description.clone()),
        transfer_type: Set(transfer.transfer_type.clone()),
        transfer_amount: Set(transfer.transfer_amount.to_string()),
        bank_reference: Set(transfer.bank_reference.clone()),
        matched_reference: Set(None),
        booking_id: Set(None),
        outcome: Set(EventOutcome::Received),
        received_at: Set(Utc::now()),
        ..Default::default()
    };

    let inserted = PaymentEvent::insert(row)
        .on_conflict(
            OnConflict::column(payment_event::Column::GatewayId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

    if inserted == 0 {
        let reason = find_event(&txn, transfer.gateway_id).await?.map_or(
            IgnoreReason::Duplicate {
                prior: EventOutcome::Received,
                reference_code: None,
                booking_id: None,
            },
            |event| IgnoreReason::Duplicate {
                prior: event.outcome,
                reference_code: event.matched_reference,
                booking_id: event.booking_id,
            },
        );
        txn.rollback().await?;
        info!(
            "Ignoring redelivered gateway event {} ({:?})",
            transfer.gateway_id, reason
        );
        return Ok(Reconciliation::Ignored { reason });
    }

    let decision = decide(&txn, &transfer).await?;

    PaymentEvent::update_many()
        .col_expr(payment_event::Column::Outcome, Expr::value(decision.outcome))
        .col_expr(
            payment_event::Column::MatchedReference,
            Expr::value(decision.reference.clone()),
        )
        .col_expr(
            payment_event::Column::BookingId,
            Expr::value(decision.booking.as_ref().map(|b| b.id)),
        )
        .filter(payment_event::Column::GatewayId.eq(transfer.gateway_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    let reference = decision.reference.unwrap_or_default();
    match (decision.outcome, decision.booking) {
        (EventOutcome::Settled, Some(booking)) => {
            info!(
                "Gateway event {} settled booking {} ({}) for {}",
                transfer.gateway_id, booking.id, reference, booking.total_amount
            );
            Ok(Reconciliation::Settled {
                booking_id: booking.id,
                reference_code: booking.reference_code,
                gateway_id: transfer.gateway_id,
            })
        }
        (EventOutcome::AmountMismatch, Some(booking)) => {
            error!(
                "Gateway event {} for booking {} ({}) carried {} but {} is owed; left unpaid for review",
                transfer.gateway_id,
                booking.id,
                reference,
                transfer.transfer_amount,
                booking.total_amount
            );
            Err(Error::AmountMismatch {
                reference_code: reference,
                expected: booking.total_amount,
                received: transfer.transfer_amount.to_string(),
            })
        }
        (outcome, _) => {
            let reason = match outcome {
                EventOutcome::Outgoing => IgnoreReason::Outgoing,
                EventOutcome::AlreadyPaid => IgnoreReason::AlreadyPaid,
                EventOutcome::BookingCancelled => IgnoreReason::BookingCancelled,
                _ => IgnoreReason::Unmatched,
            };
            if reason == IgnoreReason::Outgoing {
                debug!("Gateway event {} is an outgoing transfer", transfer.gateway_id);
            } else {
                warn!(
                    "Gateway event {} recorded for manual reconciliation: {:?} (reference {:?})",
                    transfer.gateway_id, reason, reference
                );
            }
            Ok(Reconciliation::Ignored { reason })
        }
    }
}

async fn find_event<C>(conn: &C, gateway_id: i64) -> Result<Option<payment_event::Model>>
where
    C: ConnectionTrait,
{
    PaymentEvent::find()
        .filter(payment_event::Column::GatewayId.eq(gateway_id))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Matches the transfer to a booking and settles it if everything lines up.
async fn decide<C>(conn: &C, transfer: &IncomingTransfer) -> Result<Decision>
where
    C: ConnectionTrait,
{
    if transfer.is_outgoing() {
        return Ok(Decision::new(EventOutcome::Outgoing));
    }

    let Some(reference) = transfer.reference_code() else {
        return Ok(Decision::new(EventOutcome::Unmatched));
    };

    let Some(booking) = get_booking_by_reference(conn, &reference).await? else {
        return Ok(Decision {
            reference: Some(reference),
            ..Decision::new(EventOutcome::Unmatched)
        });
    };

    let outcome = if booking.is_cancelled() {
        EventOutcome::BookingCancelled
    } else if booking.payment_status == PaymentStatus::Paid {
        EventOutcome::AlreadyPaid
    } else if transfer.whole_amount() != Some(booking.total_amount) {
        EventOutcome::AmountMismatch
    } else {
        settle(conn, &booking).await?
    };

    Ok(Decision {
        outcome,
        reference: Some(reference),
        booking: Some(booking),
    })
}

/// Marks the booking paid unless a concurrent writer got there first.
async fn settle<C>(conn: &C, booking: &booking::Model) -> Result<EventOutcome>
where
    C: ConnectionTrait,
{
    let result = Booking::update_many()
        .col_expr(booking::Column::PaymentStatus, Expr::value(PaymentStatus::Paid))
        .col_expr(booking::Column::PaidAt, Expr::value(Some(Utc::now())))
        .filter(booking::Column::Id.eq(booking.id))
        .filter(booking::Column::PaymentStatus.eq(PaymentStatus::Unpaid))
        .filter(booking::Column::CancellationState.eq(CancellationState::NotCancelled))
        .exec(conn)
        .await?;

    if result.rows_affected == 1 {
        return Ok(EventOutcome::Settled);
    }

    let current = Booking::find_by_id(booking.id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("Booking", booking.id))?;
    Ok(if current.is_cancelled() {
        EventOutcome::BookingCancelled
    } else {
        EventOutcome::AlreadyPaid
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::{
            booking::get_booking_by_id,
            cancellation::{CancelRequest, cancel},
        },
        test_utils::*,
    };

    async fn event_outcome(db: &DatabaseConnection, gateway_id: i64) -> EventOutcome {
        find_event(db, gateway_id).await.unwrap().unwrap().outcome
    }

    #[tokio::test]
    async fn test_matching_transfer_settles_once() -> Result<()> {
        let (db, availability) = setup_with_availability(10).await?;
        let booking = create_test_booking(&db, availability.id, 1, 0).await?;
        let transfer = transfer_for(&booking.reference_code, booking.total_amount, 9001);

        let first = ingest(&db, transfer.clone()).await?;
        assert_eq!(
            first,
            Reconciliation::Settled {
                booking_id: booking.id,
                reference_code: booking.reference_code.clone(),
                gateway_id: 9001,
            }
        );

        let replay = ingest(&db, transfer).await?;
        assert_eq!(
            replay,
            Reconciliation::Ignored {
                reason: IgnoreReason::Duplicate {
                    prior: EventOutcome::Settled,
                    reference_code: Some(booking.reference_code.clone()),
                    booking_id: Some(booking.id),
                }
            }
        );

        let settled = get_booking_by_id(&db, booking.id).await?.unwrap();
        assert_eq!(settled.payment_status, PaymentStatus::Paid);
        assert!(settled.paid_at.is_some());
        assert_eq!(PaymentEvent::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_million_transfer_scenario() -> Result<()> {
        let db = setup_test_db().await?;
        let tour = create_test_tour(&db).await?;
        let availability = create_priced_availability(&db, tour.id, 10, 1_000_000).await?;
        let booking = create_test_booking(&db, availability.id, 1, 0).await?;
        assert_eq!(booking.total_amount, 1_000_000);

        let transfer = transfer_for(&booking.reference_code, 1_000_000, 42);
        assert!(matches!(
            ingest(&db, transfer.clone()).await?,
            Reconciliation::Settled { .. }
        ));
        assert!(matches!(
            ingest(&db, transfer).await?,
            Reconciliation::Ignored { .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_redeliveries_settle_exactly_once() -> Result<()> {
        let (db, availability) = setup_with_availability(10).await?;
        let booking = create_test_booking(&db, availability.id, 2, 0).await?;
        let transfer = transfer_for(&booking.reference_code, booking.total_amount, 777);

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let db = db.clone();
                let transfer = transfer.clone();
                tokio::spawn(async move { ingest(&db, transfer).await })
            })
            .collect();

        let mut settled = 0;
        let mut ignored = 0;
        for handle in handles {
            match handle.await.unwrap()? {
                Reconciliation::Settled { .. } => settled += 1,
                Reconciliation::Ignored { .. } => ignored += 1,
            }
        }

        assert_eq!(settled, 1);
        assert_eq!(ignored, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_unmatched_transfer_is_recorded_and_ignored() -> Result<()> {
        let db = setup_test_db().await?;
        let transfer = transfer_for("BK0123456789", 500_000, 1);

        let result = ingest(&db, transfer).await?;
        assert_eq!(
            result,
            Reconciliation::Ignored {
                reason: IgnoreReason::Unmatched
            }
        );
        assert_eq!(event_outcome(&db, 1).await, EventOutcome::Unmatched);

        let mut no_code = transfer_for("", 500_000, 2);
        no_code.content = "chuyen tien".to_string();
        let result = ingest(&db, no_code).await?;
        assert_eq!(
            result,
            Reconciliation::Ignored {
                reason: IgnoreReason::Unmatched
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_amount_mismatch_leaves_booking_unpaid() -> Result<()> {
        let (db, availability) = setup_with_availability(10).await?;
        let booking = create_test_booking(&db, availability.id, 1, 0).await?;
        let transfer = transfer_for(&booking.reference_code, booking.total_amount - 1, 55);

        let result = ingest(&db, transfer.clone()).await;
        assert!(matches!(result, Err(Error::AmountMismatch { expected, .. }) if expected == booking.total_amount));

        let unpaid = get_booking_by_id(&db, booking.id).await?.unwrap();
        assert_eq!(unpaid.payment_status, PaymentStatus::Unpaid);

        let recorded = find_event(&db, 55).await?.unwrap();
        assert_eq!(recorded.outcome, EventOutcome::AmountMismatch);
        assert_eq!(recorded.booking_id, Some(booking.id));

        let replay = ingest(&db, transfer).await?;
        assert_eq!(
            replay,
            Reconciliation::Ignored {
                reason: IgnoreReason::Duplicate {
                    prior: EventOutcome::AmountMismatch,
                    reference_code: Some(booking.reference_code.clone()),
                    booking_id: Some(booking.id),
                }
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_fractional_amount_never_settles() -> Result<()> {
        let (db, availability) = setup_with_availability(10).await?;
        let booking = create_test_booking(&db, availability.id, 1, 0).await?;
        let mut transfer = transfer_for(&booking.reference_code, booking.total_amount, 56);
        transfer.transfer_amount += 0.5;

        let result = ingest(&db, transfer).await;
        assert!(matches!(result, Err(Error::AmountMismatch { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_second_payment_for_paid_booking_is_ignored() -> Result<()> {
        let (db, availability) = setup_with_availability(10).await?;
        let booking = create_test_booking(&db, availability.id, 1, 0).await?;

        ingest(&db, transfer_for(&booking.reference_code, booking.total_amount, 10)).await?;
        let second = ingest(&db, transfer_for(&booking.reference_code, booking.total_amount, 11)).await?;

        assert_eq!(
            second,
            Reconciliation::Ignored {
                reason: IgnoreReason::AlreadyPaid
            }
        );
        assert_eq!(event_outcome(&db, 11).await, EventOutcome::AlreadyPaid);
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_after_cancellation_is_ignored() -> Result<()> {
        let (db, availability) = setup_with_availability(10).await?;
        let booking = create_test_booking(&db, availability.id, 1, 0).await?;
        cancel(
            &db,
            &test_refund_policy(),
            &customer(),
            booking.id,
            CancelRequest {
                reason: "No longer needed".to_string(),
                refund_details: None,
            },
            Utc::now(),
        )
        .await?;

        let result = ingest(&db, transfer_for(&booking.reference_code, booking.total_amount, 20)).await?;
        assert_eq!(
            result,
            Reconciliation::Ignored {
                reason: IgnoreReason::BookingCancelled
            }
        );
        let still_unpaid = get_booking_by_id(&db, booking.id).await?.unwrap();
        assert_eq!(still_unpaid.payment_status, PaymentStatus::Unpaid);
        Ok(())
    }

    #[tokio::test]
    async fn test_settle_losing_to_cancellation_reports_cancelled() -> Result<()> {
        let (db, availability) = setup_with_availability(10).await?;
        let booking = create_test_booking(&db, availability.id, 1, 0).await?;

        // `booking` was read while open; the cancellation commits before the settle
        cancel(
            &db,
            &test_refund_policy(),
            &customer(),
            booking.id,
            CancelRequest {
                reason: "Found another tour".to_string(),
                refund_details: None,
            },
            Utc::now(),
        )
        .await?;

        assert_eq!(settle(&db, &booking).await?, EventOutcome::BookingCancelled);
        let current = get_booking_by_id(&db, booking.id).await?.unwrap();
        assert_eq!(current.payment_status, PaymentStatus::Unpaid);
        assert!(current.paid_at.is_none());
        assert!(current.is_cancelled());
        Ok(())
    }

    #[tokio::test]
    async fn test_settle_losing_to_other_settlement_reports_already_paid() -> Result<()> {
        let (db, availability) = setup_with_availability(10).await?;
        let booking = create_test_booking(&db, availability.id, 1, 0).await?;

        assert_eq!(settle(&db, &booking).await?, EventOutcome::Settled);
        assert_eq!(settle(&db, &booking).await?, EventOutcome::AlreadyPaid);
        Ok(())
    }

    #[tokio::test]
    async fn test_event_keeps_description_for_audit() -> Result<()> {
        let db = setup_test_db().await?;
        let mut transfer = transfer_for("", 250_000, 31);
        transfer.content = "chuyen tien".to_string();
        transfer.description = Some("BankAPINotify chuyen tien BK00112233AA".to_string());

        ingest(&db, transfer).await?;
        let event = find_event(&db, 31).await?.unwrap();
        assert_eq!(
            event.description.as_deref(),
            Some("BankAPINotify chuyen tien BK00112233AA")
        );
        assert_eq!(event.matched_reference.as_deref(), Some("BK00112233AA"));
        Ok(())
    }

    #[tokio::test]
    async fn test_outgoing_transfer_is_ignored() -> Result<()> {
        let (db, availability) = setup_with_availability(10).await?;
        let booking = create_test_booking(&db, availability.id, 1, 0).await?;
        let mut transfer = transfer_for(&booking.reference_code, booking.total_amount, 30);
        transfer.transfer_type = "out".to_string();

        let result = ingest(&db, transfer).await?;
        assert_eq!(
            result,
            Reconciliation::Ignored {
                reason: IgnoreReason::Outgoing
            }
        );
        let untouched = get_booking_by_id(&db, booking.id).await?.unwrap();
        assert_eq!(untouched.payment_status, PaymentStatus::Unpaid);
        Ok(())
    }

    #[tokio::test]
    async fn test_reference_found_in_description() -> Result<()> {
        let (db, availability) = setup_with_availability(10).await?;
        let booking = create_test_booking(&db, availability.id, 1, 0).await?;
        let mut transfer = transfer_for(&booking.reference_code, booking.total_amount, 40);
        transfer.content = "IBFT transfer".to_string();
        transfer.description = Some(format!("BankAPINotify {}", booking.reference_code.to_lowercase()));

        let result = ingest(&db, transfer).await?;
        assert!(matches!(result, Reconciliation::Settled { .. }));
        Ok(())
    }

    #[test]
    fn test_whole_amount() {
        let mut transfer = transfer_for("BK0000000000", 0, 1);
        transfer.transfer_amount = 1_500_000.0;
        assert_eq!(transfer.whole_amount(), Some(1_500_000));
        transfer.transfer_amount = 10.25;
        assert_eq!(transfer.whole_amount(), None);
        transfer.transfer_amount = -5.0;
        assert_eq!(transfer.whole_amount(), None);
        transfer.transfer_amount = f64::NAN;
        assert_eq!(transfer.whole_amount(), None);
    }
}
