//! Booking lookups.
//!
//! Bookings are created by [`crate::core::availability::reserve`], settled by the
//! webhook reconciler and cancelled by [`crate::core::cancellation`]; this module
//! only reads them.

use crate::{
    core::approval::Actor,
    entities::{Booking, booking},
    errors::{Error, Result},
};
use sea_orm::prelude::*;

/// Retrieves a booking by its unique ID.
pub async fn get_booking_by_id<C>(db: &C, booking_id: i64) -> Result<Option<booking::Model>>
where
    C: ConnectionTrait,
{
    Booking::find_by_id(booking_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the booking a payment reference code belongs to.
pub async fn get_booking_by_reference<C>(
    db: &C,
    reference_code: &str,
) -> Result<Option<booking::Model>>
where
    C: ConnectionTrait,
{
    Booking::find()
        .filter(booking::Column::ReferenceCode.eq(reference_code))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Checks that `actor` may act on `booking`: its customer or an admin.
pub fn ensure_booking_access(actor: &Actor, booking: &booking::Model) -> Result<()> {
    if actor.is_admin() || actor.id == booking.customer_id {
        Ok(())
    } else {
        Err(Error::forbidden(format!("access booking {}", booking.id)))
    }
}

/// Loads a booking on behalf of `actor`.
pub async fn get_booking_for_actor(
    db: &DatabaseConnection,
    actor: &Actor,
    booking_id: i64,
) -> Result<booking::Model> {
    let booking = get_booking_by_id(db, booking_id)
        .await?
        .ok_or_else(|| Error::not_found("Booking", booking_id))?;
    ensure_booking_access(actor, &booking)?;
    Ok(booking)
}
