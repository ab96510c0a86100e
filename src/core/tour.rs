//! Tour management operations.
//!
//! Status changes go through [`crate::core::approval`]; this module persists them.
//! Every write is conditional on the status it was decided from, so two admins
//! (or an admin and the owning guide) racing on the same tour cannot apply a
//! transition from a state the tour is no longer in.

use crate::{
    core::approval::{Actor, Role, tour_status_after_edit, transition_tour},
    entities::{
        Tour,
        tour::{self, TourStatus},
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::info;

/// Fields of a new tour.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourDraft {
    /// Display title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
}

/// Content edit of a tour. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourEdit {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::Validation {
            message: "tour title cannot be empty".to_string(),
        });
    }
    Ok(())
}

/// Retrieves a tour by its unique ID.
pub async fn get_tour<C>(db: &C, tour_id: i64) -> Result<Option<tour::Model>>
where
    C: ConnectionTrait,
{
    Tour::find_by_id(tour_id).one(db).await.map_err(Into::into)
}

async fn require_tour<C>(db: &C, tour_id: i64) -> Result<tour::Model>
where
    C: ConnectionTrait,
{
    get_tour(db, tour_id)
        .await?
        .ok_or_else(|| Error::not_found("Tour", tour_id))
}

/// Lists tours, optionally filtered by status; featured tours first.
pub async fn list_tours(
    db: &DatabaseConnection,
    status: Option<TourStatus>,
) -> Result<Vec<tour::Model>> {
    let mut query = Tour::find()
        .order_by_desc(tour::Column::IsFeatured)
        .order_by_asc(tour::Column::Id);
    if let Some(status) = status {
        query = query.filter(tour::Column::Status.eq(status));
    }
    query.all(db).await.map_err(Into::into)
}

/// Creates a tour owned by the calling guide. New tours wait for admin approval.
pub async fn create_tour(db: &DatabaseConnection, actor: &Actor, draft: TourDraft) -> Result<tour::Model> {
    if actor.role != Role::Guide {
        return Err(Error::forbidden("create a tour without the guide role"));
    }
    validate_title(&draft.title)?;

    let now = Utc::now();
    let tour = tour::ActiveModel {
        guide_id: Set(actor.id),
        title: Set(draft.title.trim().to_string()),
        description: Set(draft.description),
        status: Set(TourStatus::PendingApproval),
        is_featured: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Guide {} created tour {} ({})", actor.id, tour.id, tour.title);
    Ok(tour)
}

/// Applies a content edit by the owning guide.
///
/// An approved tour goes back to `PendingApproval` so an admin reviews the change.
pub async fn edit_tour(
    db: &DatabaseConnection,
    actor: &Actor,
    tour_id: i64,
    edit: TourEdit,
) -> Result<tour::Model> {
    if let Some(title) = &edit.title {
        validate_title(title)?;
    }

    let txn = db.begin().await?;
    let current = require_tour(&txn, tour_id).await?;
    let next_status = tour_status_after_edit(actor, current.guide_id, current.status)?;

    let mut changes = tour::ActiveModel {
        status: Set(next_status),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    if let Some(title) = edit.title {
        changes.title = Set(title.trim().to_string());
    }
    if let Some(description) = edit.description {
        changes.description = Set(description);
    }

    let result = Tour::update_many()
        .set(changes)
        .filter(tour::Column::Id.eq(tour_id))
        .filter(tour::Column::Status.eq(current.status))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::Conflict {
            message: format!("tour {tour_id} changed status while being edited"),
        });
    }

    let updated = require_tour(&txn, tour_id).await?;
    txn.commit().await?;

    if current.status != updated.status {
        info!(
            "Tour {} edited by its guide, status {} -> {}",
            tour_id, current.status, updated.status
        );
    } else {
        info!("Tour {} edited by its guide", tour_id);
    }
    Ok(updated)
}

/// Moves a tour along the admin approval graph.
pub async fn set_tour_status(
    db: &DatabaseConnection,
    actor: &Actor,
    tour_id: i64,
    status: TourStatus,
) -> Result<tour::Model> {
    let txn = db.begin().await?;
    let current = require_tour(&txn, tour_id).await?;
    let next = transition_tour(actor, current.status, status)?;

    let result = Tour::update_many()
        .col_expr(tour::Column::Status, Expr::value(next))
        .col_expr(tour::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(tour::Column::Id.eq(tour_id))
        .filter(tour::Column::Status.eq(current.status))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::Conflict {
            message: format!("tour {tour_id} is no longer {}", current.status),
        });
    }

    let updated = require_tour(&txn, tour_id).await?;
    txn.commit().await?;

    info!(
        "Admin {} moved tour {} from {} to {}",
        actor.id, tour_id, current.status, next
    );
    Ok(updated)
}

/// Features or unfeatures a tour. Admin only.
pub async fn set_featured(
    db: &DatabaseConnection,
    actor: &Actor,
    tour_id: i64,
    featured: bool,
) -> Result<tour::Model> {
    if !actor.is_admin() {
        return Err(Error::forbidden("feature a tour"));
    }

    let current = require_tour(db, tour_id).await?;
    let mut tour: tour::ActiveModel = current.into();
    tour.is_featured = Set(featured);
    tour.updated_at = Set(Utc::now());
    let updated = tour.update(db).await?;

    info!("Admin {} set featured={} on tour {}", actor.id, featured, tour_id);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn draft(title: &str) -> TourDraft {
        TourDraft {
            title: title.to_string(),
            description: "Two days in the karst bay".to_string(),
        }
    }

    #[tokio::test]
    async fn test_guide_creates_pending_tour() -> Result<()> {
        let db = setup_test_db().await?;

        let tour = create_tour(&db, &guide(), draft("  Ha Long Bay  ")).await?;
        assert_eq!(tour.status, TourStatus::PendingApproval);
        assert_eq!(tour.guide_id, GUIDE_ID);
        assert_eq!(tour.title, "Ha Long Bay");
        assert!(!tour.is_featured);

        let by_customer = create_tour(&db, &customer(), draft("Sapa")).await;
        assert!(matches!(by_customer, Err(Error::Forbidden { .. })));

        let blank = create_tour(&db, &guide(), draft(" ")).await;
        assert!(matches!(blank, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_owner_edit_of_approved_tour_requires_new_approval() -> Result<()> {
        let db = setup_test_db().await?;
        let tour = create_tour_with_status(&db, GUIDE_ID, TourStatus::Approved).await?;

        let edited = edit_tour(
            &db,
            &guide(),
            tour.id,
            TourEdit {
                title: Some("Ha Long Bay overnight".to_string()),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(edited.status, TourStatus::PendingApproval);
        assert_eq!(edited.title, "Ha Long Bay overnight");
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_cannot_reopen_rejected_tour_directly() -> Result<()> {
        let db = setup_test_db().await?;
        let tour = create_tour_with_status(&db, GUIDE_ID, TourStatus::Rejected).await?;

        let result = set_tour_status(&db, &admin(), tour.id, TourStatus::PendingApproval).await;
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));

        let unchanged = get_tour(&db, tour.id).await?.unwrap();
        assert_eq!(unchanged.status, TourStatus::Rejected);

        let approved = set_tour_status(&db, &admin(), tour.id, TourStatus::Approved).await?;
        assert_eq!(approved.status, TourStatus::Approved);
        Ok(())
    }

    #[tokio::test]
    async fn test_only_admin_sets_status() -> Result<()> {
        let db = setup_test_db().await?;
        let tour = create_tour_with_status(&db, GUIDE_ID, TourStatus::PendingApproval).await?;

        let result = set_tour_status(&db, &guide(), tour.id, TourStatus::Approved).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        let missing = set_tour_status(&db, &admin(), 999, TourStatus::Approved).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_featured_flag_is_admin_only() -> Result<()> {
        let db = setup_test_db().await?;
        let tour = create_test_tour(&db).await?;

        let result = set_featured(&db, &guide(), tour.id, true).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        let featured = set_featured(&db, &admin(), tour.id, true).await?;
        assert!(featured.is_featured);

        create_tour_with_status(&db, GUIDE_ID, TourStatus::Approved).await?;
        let listed = list_tours(&db, Some(TourStatus::Approved)).await?;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, tour.id);
        Ok(())
    }
}
