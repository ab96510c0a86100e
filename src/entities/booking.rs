//! Booking entity - A reservation of N seats on one tour availability.
//!
//! Prices are copied from the availability when the booking is created and the
//! total is frozen at that point. `reference_code` is the token the customer puts
//! in the bank transfer description; it is how webhook events find their booking.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment state of a booking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "PascalCase")]
pub enum PaymentStatus {
    /// Waiting for a matching bank transfer
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    /// Settled by reconciliation
    #[sea_orm(string_value = "paid")]
    Paid,
}

/// Cancellation state of a booking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "PascalCase")]
pub enum CancellationState {
    /// Booking is active
    #[sea_orm(string_value = "none")]
    #[serde(rename = "None")]
    NotCancelled,
    /// Booking was cancelled and its seats released
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Booking database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    /// Unique identifier for the booking
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Departure the seats were reserved on
    pub availability_id: i64,
    /// User ID of the customer who made the booking
    pub customer_id: i64,
    /// Payment reference embedded in the expected bank transfer
    #[sea_orm(unique)]
    pub reference_code: String,
    /// Number of adult seats
    pub adults: i32,
    /// Number of child seats
    pub children: i32,
    /// Adult price locked at creation
    pub adult_price: i64,
    /// Child price locked at creation
    pub child_price: i64,
    /// Surcharge locked at creation
    pub surcharge: i64,
    /// Frozen total amount owed
    pub total_amount: i64,
    /// Unpaid until a matching webhook settles it
    pub payment_status: PaymentStatus,
    /// Whether the booking has been cancelled
    pub cancellation_state: CancellationState,
    /// Set once the booking's seats have been returned to the availability
    pub seats_released: bool,
    /// Reason given when cancelling
    pub cancel_reason: Option<String>,
    /// Bank code for the refund transfer
    pub refund_bank_code: Option<String>,
    /// Account number for the refund transfer
    pub refund_bank_account: Option<String>,
    /// Account holder name for the refund transfer
    pub refund_account_name: Option<String>,
    /// Refund owed, computed at cancellation time
    pub refund_amount: Option<i64>,
    /// When the booking was created
    pub created_at: DateTimeUtc,
    /// When the booking was settled
    pub paid_at: Option<DateTimeUtc>,
    /// When the booking was cancelled
    pub cancelled_at: Option<DateTimeUtc>,
}

impl Model {
    /// Number of seats this booking holds.
    #[must_use]
    pub const fn seat_count(&self) -> i32 {
        self.adults + self.children
    }

    /// Whether the booking has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_state == CancellationState::Cancelled
    }
}

/// Defines relationships between Booking and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each booking belongs to one departure
    #[sea_orm(
        belongs_to = "super::tour_availability::Entity",
        from = "Column::AvailabilityId",
        to = "super::tour_availability::Column::Id"
    )]
    Availability,
}

impl Related<super::tour_availability::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Availability.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
