//! Availability and capacity management.
//!
//! Owns the `booked_participants` counter of every departure. Seats are claimed
//! with a single conditional UPDATE:
//! `UPDATE tour_availabilities SET booked = booked + n WHERE id = ? AND booked + n <= max`
//! so two concurrent reservations can never jointly oversell, whatever the store's
//! isolation level. Releases are made idempotent by flipping `bookings.seats_released`
//! with the same kind of conditional update before the counter is touched.

use crate::{
    core::{
        approval::{Actor, Role},
        reference::generate_reference_code,
    },
    entities::{
        Booking, Tour, TourAvailability,
        booking::{self, CancellationState, PaymentStatus},
        tour::TourStatus,
        tour_availability,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Fields of a new departure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityDraft {
    /// Departure date
    pub date: NaiveDate,
    /// Seat capacity
    pub max_participants: i32,
    /// Price per adult
    pub adult_price: i64,
    /// Price per child
    pub child_price: i64,
    /// Flat surcharge per booking
    #[serde(default)]
    pub surcharge: i64,
    /// Departure location
    pub departure_location: String,
    /// Vehicle description
    pub vehicle: String,
    /// Free-text trip time
    pub trip_time: String,
}

/// Partial update of a departure. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityUpdate {
    /// New departure date
    pub date: Option<NaiveDate>,
    /// New seat capacity; may not drop below the seats already booked
    pub max_participants: Option<i32>,
    /// New adult price
    pub adult_price: Option<i64>,
    /// New child price
    pub child_price: Option<i64>,
    /// New surcharge
    pub surcharge: Option<i64>,
    /// New departure location
    pub departure_location: Option<String>,
    /// New vehicle description
    pub vehicle: Option<String>,
    /// New trip time
    pub trip_time: Option<String>,
}

impl AvailabilityUpdate {
    const fn touches_prices(&self) -> bool {
        self.adult_price.is_some() || self.child_price.is_some() || self.surcharge.is_some()
    }

    const fn is_empty(&self) -> bool {
        !self.touches_prices()
            && self.date.is_none()
            && self.max_participants.is_none()
            && self.departure_location.is_none()
            && self.vehicle.is_none()
            && self.trip_time.is_none()
    }
}

fn validate_prices(prices: &[i64]) -> Result<()> {
    if prices.iter().any(|price| *price < 0) {
        return Err(Error::InvalidAmount {
            message: "prices cannot be negative".to_string(),
        });
    }
    Ok(())
}

fn validate_capacity(max_participants: i32) -> Result<()> {
    if max_participants <= 0 {
        return Err(Error::Validation {
            message: format!("maxParticipants must be positive, got {max_participants}"),
        });
    }
    Ok(())
}

/// `adults × adult price + children × child price + surcharge`, with overflow checks.
pub fn booking_total(
    adults: i32,
    children: i32,
    availability: &tour_availability::Model,
) -> Result<i64> {
    i64::from(adults)
        .checked_mul(availability.adult_price)
        .and_then(|adult_total| {
            i64::from(children)
                .checked_mul(availability.child_price)
                .and_then(|child_total| adult_total.checked_add(child_total))
        })
        .and_then(|subtotal| subtotal.checked_add(availability.surcharge))
        .ok_or_else(|| Error::InvalidAmount {
            message: "booking total overflows".to_string(),
        })
}

/// Loads the tour and checks that `actor` is the guide who owns it.
async fn owned_tour<C>(conn: &C, actor: &Actor, tour_id: i64) -> Result<crate::entities::TourModel>
where
    C: ConnectionTrait,
{
    let tour = Tour::find_by_id(tour_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("Tour", tour_id))?;

    if actor.role != Role::Guide || actor.id != tour.guide_id {
        return Err(Error::forbidden("manage departures of a tour owned by another guide"));
    }
    Ok(tour)
}

/// Finds a departure by its unique ID.
pub async fn get_availability_by_id(
    db: &DatabaseConnection,
    availability_id: i64,
) -> Result<Option<tour_availability::Model>> {
    TourAvailability::find_by_id(availability_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists the departures of a tour, earliest first.
pub async fn get_availabilities_for_tour(
    db: &DatabaseConnection,
    tour_id: i64,
) -> Result<Vec<tour_availability::Model>> {
    TourAvailability::find()
        .filter(tour_availability::Column::TourId.eq(tour_id))
        .order_by_asc(tour_availability::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a new departure for a tour owned by `actor`.
pub async fn create_availability(
    db: &DatabaseConnection,
    actor: &Actor,
    tour_id: i64,
    draft: AvailabilityDraft,
) -> Result<tour_availability::Model> {
    validate_capacity(draft.max_participants)?;
    validate_prices(&[draft.adult_price, draft.child_price, draft.surcharge])?;

    owned_tour(db, actor, tour_id).await?;

    let availability = tour_availability::ActiveModel {
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
    .await?;

    info!(
        "Created availability {} for tour {} on {} with {} seats",
        availability.id, tour_id, availability.date, availability.max_participants
    );
    Ok(availability)
}

/// Edits a departure owned by `actor`.
///
/// Prices are frozen once any booking references the departure, and capacity can
/// never drop below the seats already booked.
pub async fn update_availability(
    db: &DatabaseConnection,
    actor: &Actor,
    availability_id: i64,
    update: AvailabilityUpdate,
) -> Result<tour_availability::Model> {
    if let Some(max) = update.max_participants {
        validate_capacity(max)?;
    }
    validate_prices(
        &[update.adult_price, update.child_price, update.surcharge]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>(),
    )?;

    let txn = db.begin().await?;

    let current = TourAvailability::find_by_id(availability_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Availability", availability_id))?;
    owned_tour(&txn, actor, current.tour_id).await?;

    if update.is_empty() {
        return Ok(current);
    }

    if update.touches_prices() {
        let bookings = Booking::find()
            .filter(booking::Column::AvailabilityId.eq(availability_id))
            .count(&txn)
            .await?;
        if bookings > 0 {
            return Err(Error::PricesLocked { availability_id });
        }
    }

    let mut changes = <tour_availability::ActiveModel as Default>::default();
    if let Some(date) = update.date {
        changes.date = Set(date);
    }
    if let Some(max) = update.max_participants {
        changes.max_participants = Set(max);
    }
    if let Some(price) = update.adult_price {
        changes.adult_price = Set(price);
    }
    if let Some(price) = update.child_price {
        changes.child_price = Set(price);
    }
    if let Some(surcharge) = update.surcharge {
        changes.surcharge = Set(surcharge);
    }
    if let Some(location) = update.departure_location {
        changes.departure_location = Set(location);
    }
    if let Some(vehicle) = update.vehicle {
        changes.vehicle = Set(vehicle);
    }
    if let Some(trip_time) = update.trip_time {
        changes.trip_time = Set(trip_time);
    }

    let mut statement = TourAvailability::update_many()
        .set(changes)
        .filter(tour_availability::Column::Id.eq(availability_id));
    if let Some(max) = update.max_participants {
        statement = statement.filter(tour_availability::Column::BookedParticipants.lte(max));
    }
    let result = statement.exec(&txn).await?;

    if result.rows_affected == 0 {
        return Err(Error::Validation {
            message: format!(
                "maxParticipants cannot be lower than the {} seats already booked",
                current.booked_participants
            ),
        });
    }

    let updated = TourAvailability::find_by_id(availability_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Availability", availability_id))?;
    txn.commit().await?;

    info!("Updated availability {}", availability_id);
    Ok(updated)
}

/// Deletes a departure that no booking has ever referenced.
pub async fn delete_availability(
    db: &DatabaseConnection,
    actor: &Actor,
    availability_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;

    let current = TourAvailability::find_by_id(availability_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Availability", availability_id))?;
    owned_tour(&txn, actor, current.tour_id).await?;

    let bookings = Booking::find()
        .filter(booking::Column::AvailabilityId.eq(availability_id))
        .count(&txn)
        .await?;
    if bookings > 0 {
        return Err(Error::AvailabilityInUse { availability_id });
    }

    let deleted = TourAvailability::delete_many()
        .filter(tour_availability::Column::Id.eq(availability_id))
        .filter(tour_availability::Column::BookedParticipants.eq(0))
        .exec(&txn)
        .await?;
    if deleted.rows_affected == 0 {
        return Err(Error::AvailabilityInUse { availability_id });
    }

    txn.commit().await?;
    info!("Deleted availability {}", availability_id);
    Ok(())
}

/// Reserves `adults + children` seats on a departure and creates the pending booking.
///
/// The counter is claimed atomically; if the seats are not available the call
/// fails with [`Error::SoldOut`] and nothing is written. Prices are read after the
/// claim, inside the same transaction, and locked into the booking.
pub async fn reserve(
    db: &DatabaseConnection,
    customer_id: i64,
    availability_id: i64,
    adults: i32,
    children: i32,
) -> Result<booking::Model> {
    if adults < 1 || children < 0 {
        return Err(Error::InvalidParticipants { adults, children });
    }
    let seats = adults
        .checked_add(children)
        .ok_or(Error::InvalidParticipants { adults, children })?;

    let txn = db.begin().await?;

    let availability = TourAvailability::find_by_id(availability_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Availability", availability_id))?;

    if availability.date < Utc::now().date_naive() {
        return Err(Error::DepartureClosed {
            date: availability.date,
        });
    }

    let tour = Tour::find_by_id(availability.tour_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Tour", availability.tour_id))?;
    if tour.status != TourStatus::Approved {
        return Err(Error::NotBookable { tour_id: tour.id });
    }

    let claimed = TourAvailability::update_many()
        .col_expr(
            tour_availability::Column::BookedParticipants,
            Expr::col(tour_availability::Column::BookedParticipants).add(seats),
        )
        .filter(tour_availability::Column::Id.eq(availability_id))
        .filter(
            Expr::expr(Expr::col(tour_availability::Column::BookedParticipants).add(seats))
                .lte(Expr::col(tour_availability::Column::MaxParticipants)),
        )
        .exec(&txn)
        .await?;

    // Re-read after the claim; the row is now held by this transaction.
    let locked = TourAvailability::find_by_id(availability_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Availability", availability_id))?;

    if claimed.rows_affected == 0 {
        warn!(
            "Availability {} sold out: requested {} seats, {} remaining",
            availability_id,
            seats,
            locked.remaining_seats()
        );
        return Err(Error::SoldOut {
            requested: seats,
            remaining: locked.remaining_seats(),
        });
    }

    let total_amount = booking_total(adults, children, &locked)?;

    let booking = booking::ActiveModel {
        availability_id: Set(availability_id),
        customer_id: Set(customer_id),
        reference_code: Set(generate_reference_code()),
        adults: Set(adults),
        children: Set(children),
        adult_price: Set(locked.adult_price),
        child_price: Set(locked.child_price),
        surcharge: Set(locked.surcharge),
        total_amount: Set(total_amount),
        payment_status: Set(PaymentStatus::Unpaid),
        cancellation_state: Set(CancellationState::NotCancelled),
        seats_released: Set(false),
        cancel_reason: Set(None),
        refund_bank_code: Set(None),
        refund_bank_account: Set(None),
        refund_account_name: Set(None),
        refund_amount: Set(None),
        created_at: Set(Utc::now()),
        paid_at: Set(None),
        cancelled_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
        "Reserved {} seats on availability {} as booking {} ({}), total {}",
        seats, availability_id, booking.id, booking.reference_code, booking.total_amount
    );
    Ok(booking)
}

/// Returns a booking's seats to its departure.
///
/// Idempotent: returns `Ok(false)` without touching the counter if the seats were
/// already released.
pub async fn release(db: &DatabaseConnection, booking_id: i64) -> Result<bool> {
    let txn = db.begin().await?;

    let booking = Booking::find_by_id(booking_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Booking", booking_id))?;

    let released = release_seats(&txn, &booking).await?;
    txn.commit().await?;
    Ok(released)
}

/// Release step shared with cancellation, run on the caller's transaction.
pub(crate) async fn release_seats<C>(conn: &C, booking: &booking::Model) -> Result<bool>
where
    C: ConnectionTrait,
{
    let marked = Booking::update_many()
        .col_expr(booking::Column::SeatsReleased, Expr::value(true))
        .filter(booking::Column::Id.eq(booking.id))
        .filter(booking::Column::SeatsReleased.eq(false))
        .exec(conn)
        .await?;

    if marked.rows_affected == 0 {
        debug!("Seats of booking {} already released", booking.id);
        return Ok(false);
    }

    let seats = booking.seat_count();
    let returned = TourAvailability::update_many()
        .col_expr(
            tour_availability::Column::BookedParticipants,
            Expr::col(tour_availability::Column::BookedParticipants).sub(seats),
        )
        .filter(tour_availability::Column::Id.eq(booking.availability_id))
        .filter(tour_availability::Column::BookedParticipants.gte(seats))
        .exec(conn)
        .await?;

    if returned.rows_affected == 0 {
        return Err(Error::Conflict {
            message: format!(
                "availability {} holds fewer than the {} seats of booking {}",
                booking.availability_id, seats, booking.id
            ),
        });
    }

    info!(
        "Released {} seats of booking {} back to availability {}",
        seats, booking.id, booking.availability_id
    );
    Ok(true)
}
