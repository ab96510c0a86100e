//! Guide application endpoints.

use crate::{
    api::{AppState, error::ApiError, extractors::CurrentActor},
    core::guide_application::{self, ApplicationForm, ApplicationReview},
    entities::{GuideApplicationModel, guide_application::ApplicationStatus},
    errors::Error,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Application as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    id: i64,
    applicant_id: i64,
    form_payload: Value,
    documents: Value,
    status: ApplicationStatus,
    review_note: Option<String>,
    reviewed_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GuideApplicationModel> for ApplicationView {
    fn from(application: GuideApplicationModel) -> Self {
        Self {
            id: application.id,
            applicant_id: application.applicant_id,
            form_payload: application.form_payload,
            documents: application.documents,
            status: application.status,
            review_note: application.review_note,
            reviewed_by: application.reviewed_by,
            created_at: application.created_at,
            updated_at: application.updated_at,
        }
    }
}

/// `POST /guide-applications`
pub async fn submit(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(form): Json<ApplicationForm>,
) -> Result<(StatusCode, Json<ApplicationView>), ApiError> {
    let application = guide_application::submit_application(&state.db, &actor, form).await?;
    Ok((StatusCode::CREATED, Json(application.into())))
}

/// `GET /guide-applications`, admin only.
pub async fn list_pending(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<ApplicationView>>, ApiError> {
    let pending = guide_application::list_pending_applications(&state.db, &actor).await?;
    Ok(Json(pending.into_iter().map(ApplicationView::from).collect()))
}

/// `GET /guide-applications/:id`, visible to the applicant and admins.
pub async fn get(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(application_id): Path<i64>,
) -> Result<Json<ApplicationView>, ApiError> {
    let application = guide_application::get_application(&state.db, application_id)
        .await?
        .ok_or_else(|| Error::not_found("GuideApplication", application_id))?;
    if !actor.is_admin() && application.applicant_id != actor.id {
        return Err(Error::forbidden(format!("read guide application {application_id}")).into());
    }
    Ok(Json(application.into()))
}

/// `PUT /guide-applications/:id/review`
pub async fn review(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(application_id): Path<i64>,
    Json(decision): Json<ApplicationReview>,
) -> Result<Json<ApplicationView>, ApiError> {
    let application =
        guide_application::review(&state.db, &actor, application_id, decision).await?;
    Ok(Json(application.into()))
}

/// `PUT /guide-applications/:id/resubmit`
pub async fn resubmit(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(application_id): Path<i64>,
    Json(form): Json<ApplicationForm>,
) -> Result<Json<ApplicationView>, ApiError> {
    let application =
        guide_application::resubmit(&state.db, &actor, application_id, form).await?;
    Ok(Json(application.into()))
}
