//! Guide applications: submit, admin review, resubmit.

use crate::{
    core::approval::{Actor, resubmit_application, review_application},
    entities::{
        GuideApplication,
        guide_application::{self, ApplicationStatus},
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

/// Form contents of an application.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationForm {
    /// Submitted form fields
    pub form_payload: Value,
    /// Document references
    #[serde(default)]
    pub documents: Vec<String>,
}

/// An admin decision on an application.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationReview {
    /// Target status
    pub status: ApplicationStatus,
    /// Optional note for the applicant
    pub note: Option<String>,
}

fn validate_form(form: &ApplicationForm) -> Result<()> {
    if !form.form_payload.is_object() {
        return Err(Error::Validation {
            message: "formPayload must be a JSON object".to_string(),
        });
    }
    Ok(())
}

/// Retrieves an application by its unique ID.
pub async fn get_application<C>(db: &C, application_id: i64) -> Result<Option<guide_application::Model>>
where
    C: ConnectionTrait,
{
    GuideApplication::find_by_id(application_id)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn require_application<C>(db: &C, application_id: i64) -> Result<guide_application::Model>
where
    C: ConnectionTrait,
{
    get_application(db, application_id)
        .await?
        .ok_or_else(|| Error::not_found("GuideApplication", application_id))
}

/// Lists applications waiting for review, oldest first.
pub async fn list_pending_applications(
    db: &DatabaseConnection,
    actor: &Actor,
) -> Result<Vec<guide_application::Model>> {
    if !actor.is_admin() {
        return Err(Error::forbidden("list guide applications"));
    }
    GuideApplication::find()
        .filter(guide_application::Column::Status.eq(ApplicationStatus::PendingReview))
        .order_by_asc(guide_application::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Submits a new application for `actor`.
///
/// An applicant may have only one open application; an approved applicant is
/// already a guide and cannot apply again.
pub async fn submit_application(
    db: &DatabaseConnection,
    actor: &Actor,
    form: ApplicationForm,
) -> Result<guide_application::Model> {
    validate_form(&form)?;

    let txn = db.begin().await?;
    let existing = GuideApplication::find()
        .filter(guide_application::Column::ApplicantId.eq(actor.id))
        .count(&txn)
        .await?;
    if existing > 0 {
        return Err(Error::Conflict {
            message: format!("applicant {} already has an application", actor.id),
        });
    }

    let now = Utc::now();
    let application = guide_application::ActiveModel {
        applicant_id: Set(actor.id),
        form_payload: Set(form.form_payload),
        documents: Set(Value::from(form.documents)),
        status: Set(ApplicationStatus::PendingReview),
        review_note: Set(None),
        reviewed_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!("Applicant {} submitted guide application {}", actor.id, application.id);
    Ok(application)
}

/// Records an admin decision on a pending application.
pub async fn review(
    db: &DatabaseConnection,
    actor: &Actor,
    application_id: i64,
    decision: ApplicationReview,
) -> Result<guide_application::Model> {
    let txn = db.begin().await?;
    let current = require_application(&txn, application_id).await?;
    let next = review_application(actor, current.status, decision.status)?;

    let note = decision
        .note
        .map(|note| note.trim().to_string())
        .filter(|note| !note.is_empty());

    let result = GuideApplication::update_many()
        .set(guide_application::ActiveModel {
            status: Set(next),
            review_note: Set(note),
            reviewed_by: Set(Some(actor.id)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(guide_application::Column::Id.eq(application_id))
        .filter(guide_application::Column::Status.eq(current.status))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::Conflict {
            message: format!("application {application_id} was reviewed concurrently"),
        });
    }

    let updated = require_application(&txn, application_id).await?;
    txn.commit().await?;

    info!(
        "Admin {} moved guide application {} from {} to {}",
        actor.id, application_id, current.status, next
    );
    Ok(updated)
}

/// Replaces the form of a rejected or returned application and puts it back in review.
pub async fn resubmit(
    db: &DatabaseConnection,
    actor: &Actor,
    application_id: i64,
    form: ApplicationForm,
) -> Result<guide_application::Model> {
    validate_form(&form)?;

    let txn = db.begin().await?;
    let current = require_application(&txn, application_id).await?;
    let next = resubmit_application(actor, current.applicant_id, current.status)?;

    let result = GuideApplication::update_many()
        .set(guide_application::ActiveModel {
            form_payload: Set(form.form_payload),
            documents: Set(Value::from(form.documents)),
            status: Set(next),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(guide_application::Column::Id.eq(application_id))
        .filter(guide_application::Column::Status.eq(current.status))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::Conflict {
            message: format!("application {application_id} changed while being resubmitted"),
        });
    }

    let updated = require_application(&txn, application_id).await?;
    txn.commit().await?;

    info!("Applicant {} resubmitted guide application {}", actor.id, application_id);
    Ok(updated)
}
