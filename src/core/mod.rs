//! Core business logic - framework-agnostic booking lifecycle operations.
//!
//! Nothing in here knows about HTTP or WebSockets; the `api` layer maps requests
//! onto these functions and their [`crate::errors::Error`] results onto responses.

/// Role-gated state machines for tours and guide applications
pub mod approval;
/// Departures, seat capacity, reservation and release
pub mod availability;
/// Booking lookups and access checks
pub mod booking;
/// Cancellation with refund computation and seat release
pub mod cancellation;
/// Guide application submission and review
pub mod guide_application;
/// Topic-keyed payment notification fan-out
pub mod notification;
/// Bank-transfer webhook reconciliation
pub mod reconciler;
/// Booking reference code generation and extraction
pub mod reference;
/// Refund policy tiers and the refund calculator
pub mod refund;
/// Tour creation, editing and approval
pub mod tour;
