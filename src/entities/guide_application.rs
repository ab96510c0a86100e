//! Guide application entity - A person's request to become a tour guide.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Review status of a guide application.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Submitted and waiting for an admin
    #[sea_orm(string_value = "pending_review")]
    PendingReview,
    /// Accepted; terminal
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Refused; applicant may resubmit
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Returned to the applicant for changes
    #[sea_orm(string_value = "allow_edit")]
    AllowEdit,
}

/// Guide application database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "guide_applications")]
pub struct Model {
    /// Unique identifier for the application
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User ID of the applicant
    pub applicant_id: i64,
    /// Submitted form fields
    pub form_payload: Json,
    /// Document references (URLs or storage keys)
    pub documents: Json,
    /// Current review status
    pub status: ApplicationStatus,
    /// Note left by the reviewing admin
    pub review_note: Option<String>,
    /// Admin who last reviewed the application
    pub reviewed_by: Option<i64>,
    /// When the application was first submitted
    pub created_at: DateTimeUtc,
    /// When the application last changed
    pub updated_at: DateTimeUtc,
}

/// `GuideApplication` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
