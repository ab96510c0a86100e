//! Tour availability entity - One dated, priced, capacity-bounded departure of a tour.
//!
//! `booked_participants` is the only shared counter in the system. It is never
//! written with a read-modify-write; see [`crate::core::availability`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tour availability database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tour_availabilities")]
pub struct Model {
    /// Unique identifier for the departure
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tour this departure belongs to
    pub tour_id: i64,
    /// Departure date
    pub date: Date,
    /// Seat capacity
    pub max_participants: i32,
    /// Seats currently held by non-cancelled bookings
    pub booked_participants: i32,
    /// Price per adult, in whole currency units
    pub adult_price: i64,
    /// Price per child, in whole currency units
    pub child_price: i64,
    /// Flat surcharge added to every booking
    pub surcharge: i64,
    /// Where the tour departs from
    pub departure_location: String,
    /// Vehicle description
    pub vehicle: String,
    /// Free-text trip time, e.g. "07:30 - 17:00"
    pub trip_time: String,
}

impl Model {
    /// Seats still available on this departure.
    #[must_use]
    pub const fn remaining_seats(&self) -> i32 {
        self.max_participants - self.booked_participants
    }
}

/// Defines relationships between `TourAvailability` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each departure belongs to one tour
    #[sea_orm(
        belongs_to = "super::tour::Entity",
        from = "Column::TourId",
        to = "super::tour::Column::Id"
    )]
    Tour,
    /// One departure has many bookings
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::tour::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tour.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
