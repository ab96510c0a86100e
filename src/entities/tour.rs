//! Tour entity - A bookable product owned by a guide.
//!
//! Tours move through an admin-gated approval workflow (see [`crate::core::approval`]).
//! Media and itinerary details beyond a plain description live elsewhere.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Approval status of a tour.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "PascalCase")]
pub enum TourStatus {
    /// Waiting for an admin decision
    #[sea_orm(string_value = "pending_approval")]
    PendingApproval,
    /// Visible and bookable
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Refused by an admin
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Tour database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tours")]
pub struct Model {
    /// Unique identifier for the tour
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User ID of the guide who owns the tour
    pub guide_id: i64,
    /// Display title
    pub title: String,
    /// Free-text itinerary and description
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// Current approval status
    pub status: TourStatus,
    /// Whether an admin has featured this tour
    pub is_featured: bool,
    /// When the tour was created
    pub created_at: DateTimeUtc,
    /// When the tour was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Tour and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One tour has many dated departures
    #[sea_orm(has_many = "super::tour_availability::Entity")]
    Availabilities,
}

impl Related<super::tour_availability::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Availabilities.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
