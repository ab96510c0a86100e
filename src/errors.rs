use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Invalid participant count: {adults} adults, {children} children")]
    InvalidParticipants { adults: i32, children: i32 },

    #[error("Sold out: requested {requested} seats, {remaining} remaining")]
    SoldOut { requested: i32, remaining: i32 },

    #[error("Departure on {date} is no longer open for booking")]
    DepartureClosed { date: NaiveDate },

    #[error("Tour {tour_id} is not open for booking")]
    NotBookable { tour_id: i64 },

    #[error("Amount mismatch for booking {reference_code}: expected {expected}, received {received}")]
    AmountMismatch {
        reference_code: String,
        expected: i64,
        received: String,
    },

    #[error("Booking {booking_id} is already cancelled")]
    AlreadyCancelled { booking_id: i64 },

    #[error("Refund bank details are required to cancel a paid booking")]
    MissingRefundDetails,

    #[error("Forbidden: {action}")]
    Forbidden { action: String },

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Prices of availability {availability_id} are locked by existing bookings")]
    PricesLocked { availability_id: i64 },

    #[error("Availability {availability_id} still has bookings")]
    AvailabilityInUse { availability_id: i64 },

    #[error("Conflict: {message}")]
    Conflict { message: String },
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`Error::Forbidden`].
    pub fn forbidden(action: impl Into<String>) -> Self {
        Self::Forbidden {
            action: action.into(),
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
