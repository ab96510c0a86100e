//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod booking;
pub mod guide_application;
pub mod payment_event;
pub mod tour;
pub mod tour_availability;

// Re-export specific types to avoid conflicts
pub use booking::{Column as BookingColumn, Entity as Booking, Model as BookingModel};
pub use guide_application::{
    Column as GuideApplicationColumn, Entity as GuideApplication, Model as GuideApplicationModel,
};
pub use payment_event::{
    Column as PaymentEventColumn, Entity as PaymentEvent, Model as PaymentEventModel,
};
pub use tour::{Column as TourColumn, Entity as Tour, Model as TourModel};
pub use tour_availability::{
    Column as TourAvailabilityColumn, Entity as TourAvailability, Model as TourAvailabilityModel,
};
