//! Shared test utilities for the booking engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating tours, departures and bookings with sensible defaults.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_precision_loss)]

use crate::{
    core::{
        approval::{Actor, Role},
        availability::{self, AvailabilityDraft},
        reconciler::IncomingTransfer,
        refund::{RefundPolicy, RefundTier},
    },
    entities::{
        Booking, BookingModel, TourAvailabilityModel, TourModel,
        booking::{self, CancellationState, PaymentStatus},
        tour::{self, TourStatus},
        tour_availability,
    },
    errors::Result,
};
use chrono::{Duration, NaiveDate, Utc};
use sea_orm::{Set, prelude::*, sea_query::Expr};

/// User ID of the admin actor used in tests.
pub const ADMIN_ID: i64 = 1;
/// User ID of the guide who owns test tours.
pub const GUIDE_ID: i64 = 7;
/// User ID of the customer who makes test bookings.
pub const CUSTOMER_ID: i64 = 42;

/// Admin actor.
pub const fn admin() -> Actor {
    Actor::new(ADMIN_ID, Role::Admin)
}

/// The guide owning test tours.
pub const fn guide() -> Actor {
    Actor::new(GUIDE_ID, Role::Guide)
}

/// The customer owning test bookings.
pub const fn customer() -> Actor {
    Actor::new(CUSTOMER_ID, Role::Customer)
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// The example policy: 100% from 7 days out, 50% from 3 days, nothing after.
pub fn test_refund_policy() -> RefundPolicy {
    RefundPolicy::new(vec![
        RefundTier {
            min_days: 7,
            percentage: 100,
            description: None,
        },
        RefundTier {
            min_days: 3,
            percentage: 50,
            description: None,
        },
    ])
    .expect("example tiers are valid")
}

/// An unsaved booking with the given total and payment status, for pure calculations.
pub fn booking_model(total_amount: i64, payment_status: PaymentStatus) -> BookingModel {
    BookingModel {
        id: 1,
        availability_id: 1,
        customer_id: CUSTOMER_ID,
        reference_code: "BK0000000001".to_string(),
        adults: 1,
        children: 0,
        adult_price: total_amount,
        child_price: 0,
        surcharge: 0,
        total_amount,
        payment_status,
        cancellation_state: CancellationState::NotCancelled,
        seats_released: false,
        cancel_reason: None,
        refund_bank_code: None,
        refund_bank_account: None,
        refund_account_name: None,
        refund_amount: None,
        created_at: Utc::now(),
        paid_at: None,
        cancelled_at: None,
    }
}

/// Inserts a tour owned by `guide_id` directly in the given status.
pub async fn create_tour_with_status(
    db: &DatabaseConnection,
    guide_id: i64,
    status: TourStatus,
) -> Result<TourModel> {
    let now = Utc::now();
    tour::ActiveModel {
        guide_id: Set(guide_id),
        title: Set("Ha Long Bay Day Trip".to_string()),
        description: Set(String::new()),
        status: Set(status),
        is_featured: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates an approved, bookable tour owned by [`GUIDE_ID`].
pub async fn create_test_tour(db: &DatabaseConnection) -> Result<TourModel> {
    create_tour_with_status(db, GUIDE_ID, TourStatus::Approved).await
}

/// Draft for a departure on `date`.
///
/// # Defaults
/// * adult price: 400,000
/// * child price: 200,000
/// * surcharge: 0
pub fn test_availability_draft(max_participants: i32, date: NaiveDate) -> AvailabilityDraft {
    AvailabilityDraft {
        date,
        max_participants,
        adult_price: 400_000,
        child_price: 200_000,
        surcharge: 0,
        departure_location: "Hanoi Old Quarter".to_string(),
        vehicle: "45-seat coach".to_string(),
        trip_time: "07:30 - 19:00".to_string(),
    }
}

async fn insert_availability(
    db: &DatabaseConnection,
    tour_id: i64,
    draft: AvailabilityDraft,
) -> Result<TourAvailabilityModel> {
    tour_availability::ActiveModel {
        tour_id: Set(tour_id),
        date: Set(draft.date),
        max_participants: Set(draft.max_participants),
        booked_participants: Set(0),
        adult_price: Set(draft.adult_price),
        child_price: Set(draft.child_price),
        surcharge: Set(draft.surcharge),
        departure_location: Set(draft.departure_location),
        vehicle: Set(draft.vehicle),
        trip_time: Set(draft.trip_time),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a departure on `date` with default prices.
pub async fn create_availability_on(
    db: &DatabaseConnection,
    tour_id: i64,
    max_participants: i32,
    date: NaiveDate,
) -> Result<TourAvailabilityModel> {
    insert_availability(db, tour_id, test_availability_draft(max_participants, date)).await
}

/// Inserts a departure 30 days from today with default prices.
pub async fn create_test_availability(
    db: &DatabaseConnection,
    tour_id: i64,
    max_participants: i32,
) -> Result<TourAvailabilityModel> {
    create_availability_on(db, tour_id, max_participants, Utc::now().date_naive() + Duration::days(30)).await
}

/// Inserts a departure 30 days out with a specific adult price and no other charges.
pub async fn create_priced_availability(
    db: &DatabaseConnection,
    tour_id: i64,
    max_participants: i32,
    adult_price: i64,
) -> Result<TourAvailabilityModel> {
    let draft = AvailabilityDraft {
        adult_price,
        child_price: 0,
        ..test_availability_draft(max_participants, Utc::now().date_naive() + Duration::days(30))
    };
    insert_availability(db, tour_id, draft).await
}

/// Fresh database with one approved tour and one departure of `max_participants` seats.
pub async fn setup_with_availability(
    max_participants: i32,
) -> Result<(DatabaseConnection, TourAvailabilityModel)> {
    let db = setup_test_db().await?;
    let tour = create_test_tour(&db).await?;
    let availability = create_test_availability(&db, tour.id, max_participants).await?;
    Ok((db, availability))
}

/// Reserves seats for [`CUSTOMER_ID`] through the real reservation path.
pub async fn create_test_booking(
    db: &DatabaseConnection,
    availability_id: i64,
    adults: i32,
    children: i32,
) -> Result<BookingModel> {
    availability::reserve(db, CUSTOMER_ID, availability_id, adults, children).await
}

/// Marks a booking paid without going through the webhook.
pub async fn mark_paid(db: &DatabaseConnection, booking_id: i64) -> Result<()> {
    Booking::update_many()
        .col_expr(booking::Column::PaymentStatus, Expr::value(PaymentStatus::Paid))
        .col_expr(booking::Column::PaidAt, Expr::value(Some(Utc::now())))
        .filter(booking::Column::Id.eq(booking_id))
        .exec(db)
        .await?;
    Ok(())
}

/// An incoming bank transfer paying `amount` with `reference` in its content.
pub fn transfer_for(reference: &str, amount: i64, gateway_id: i64) -> IncomingTransfer {
    IncomingTransfer {
        gateway_id,
        gateway: "MBBank".to_string(),
        transaction_date: "2026-03-01 10:15:00".to_string(),
        account_number: "0123456789".to_string(),
        code: None,
        content: format!("{reference} thanh toan tour"),
        transfer_type: "in".to_string(),
        transfer_amount: amount as f64,
        bank_reference: Some(format!("FT{gateway_id:08}")),
        description: None,
    }
}
