//! Payment event entity - One bank transfer reported by the payment gateway.
//!
//! `gateway_id` carries a unique index and is the only idempotency key for webhook
//! deliveries. Rows are written once and then only have their outcome filled in.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What reconciliation decided for a payment event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// Recorded, decision not yet written
    #[sea_orm(string_value = "received")]
    Received,
    /// Matched and settled a booking
    #[sea_orm(string_value = "settled")]
    Settled,
    /// No booking matched the transfer description
    #[sea_orm(string_value = "unmatched")]
    Unmatched,
    /// Booking matched but the amount differed
    #[sea_orm(string_value = "amount_mismatch")]
    AmountMismatch,
    /// Booking matched but was already paid
    #[sea_orm(string_value = "already_paid")]
    AlreadyPaid,
    /// Booking matched but had been cancelled
    #[sea_orm(string_value = "booking_cancelled")]
    BookingCancelled,
    /// Money leaving the account; not a customer payment
    #[sea_orm(string_value = "outgoing")]
    Outgoing,
}

/// Payment event database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_events")]
pub struct Model {
    /// Unique identifier for the row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Gateway-assigned transaction id
    #[sea_orm(unique)]
    pub gateway_id: i64,
    /// Bank or gateway name
    pub gateway: String,
    /// Transaction date as reported by the gateway
    pub transaction_date: String,
    /// Receiving account number
    pub account_number: String,
    /// Transfer content
    pub content: String,
    /// Full transfer description, when the gateway sends one
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// `"in"` or `"out"`
    pub transfer_type: String,
    /// Transfer amount as reported, kept verbatim for audit
    pub transfer_amount: String,
    /// Bank-side reference of the transfer
    pub bank_reference: Option<String>,
    /// Booking reference code found in the event, if any
    pub matched_reference: Option<String>,
    /// Booking the event was matched against, if any
    pub booking_id: Option<i64>,
    /// Reconciliation outcome
    pub outcome: EventOutcome,
    /// When the event was received
    pub received_at: DateTimeUtc,
}

/// `PaymentEvent` rows reference bookings by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
