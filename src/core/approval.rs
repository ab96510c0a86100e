//! Role-gated approval workflows for tours and guide applications.
//!
//! Both machines are pure: they take the current status, the acting [`Actor`] and
//! the requested target, and either return the next status or explain why not.
//! Role checks run before the transition graph, so an unauthorised caller always
//! gets [`Error::Forbidden`] and never learns whether the edge exists.

use crate::{
    entities::{guide_application::ApplicationStatus, tour::TourStatus},
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Role of an authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform administrator
    Admin,
    /// Tour guide
    Guide,
    /// Booking customer
    Customer,
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "guide" => Ok(Self::Guide),
            "customer" => Ok(Self::Customer),
            other => Err(Error::Validation {
                message: format!("Unknown role {other:?}"),
            }),
        }
    }
}

/// Verified identity supplied by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User ID
    pub id: i64,
    /// Role the user acts with
    pub role: Role,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub const fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    /// Whether this actor is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl fmt::Display for TourStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PendingApproval => "PendingApproval",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PendingReview => "pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::AllowEdit => "allow_edit",
        };
        f.write_str(name)
    }
}

fn invalid<S: fmt::Display>(from: S, to: S) -> Error {
    Error::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// Direct status change requested by an actor (the admin review screen).
///
/// Allowed edges: `PendingApproval → Approved | Rejected`, `Rejected → Approved`,
/// `Approved → PendingApproval` (unapprove). Only admins may use them.
pub fn transition_tour(actor: &Actor, from: TourStatus, to: TourStatus) -> Result<TourStatus> {
    if !actor.is_admin() {
        return Err(Error::forbidden(format!("set tour status to {to}")));
    }

    match (from, to) {
        (TourStatus::PendingApproval, TourStatus::Approved | TourStatus::Rejected)
        | (TourStatus::Rejected, TourStatus::Approved)
        | (TourStatus::Approved, TourStatus::PendingApproval) => Ok(to),
        _ => Err(invalid(from, to)),
    }
}

/// Status a tour takes after its content is edited by `actor`.
///
/// Only the owning guide may edit. Editing an approved tour sends it back to
/// `PendingApproval`; other statuses are left as they are.
pub fn tour_status_after_edit(actor: &Actor, owner_id: i64, current: TourStatus) -> Result<TourStatus> {
    if actor.role != Role::Guide || actor.id != owner_id {
        return Err(Error::forbidden("edit a tour owned by another guide"));
    }

    Ok(match current {
        TourStatus::Approved => TourStatus::PendingApproval,
        other => other,
    })
}

/// Admin decision on a pending guide application.
///
/// Allowed edges: `pending_review → approved | rejected | allow_edit`.
pub fn review_application(
    actor: &Actor,
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> Result<ApplicationStatus> {
    if !actor.is_admin() {
        return Err(Error::forbidden(format!("set application status to {to}")));
    }

    match (from, to) {
        (
            ApplicationStatus::PendingReview,
            ApplicationStatus::Approved | ApplicationStatus::Rejected | ApplicationStatus::AllowEdit,
        ) => Ok(to),
        _ => Err(invalid(from, to)),
    }
}

/// Applicant resubmission, allowed only from `rejected` or `allow_edit`.
pub fn resubmit_application(
    actor: &Actor,
    applicant_id: i64,
    from: ApplicationStatus,
) -> Result<ApplicationStatus> {
    if actor.id != applicant_id {
        return Err(Error::forbidden("resubmit another person's application"));
    }

    match from {
        ApplicationStatus::Rejected | ApplicationStatus::AllowEdit => {
            Ok(ApplicationStatus::PendingReview)
        }
        _ => Err(invalid(from, ApplicationStatus::PendingReview)),
    }
}
