//! Tour endpoints.

use crate::{
    api::{AppState, error::ApiError, extractors::CurrentActor},
    core::tour::{self, TourDraft, TourEdit},
    entities::{TourModel, tour::TourStatus},
    errors::Error,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tour as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourView {
    id: i64,
    guide_id: i64,
    title: String,
    description: String,
    status: TourStatus,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TourModel> for TourView {
    fn from(tour: TourModel) -> Self {
        Self {
            id: tour.id,
            guide_id: tour.guide_id,
            title: tour.title,
            description: tour.description,
            status: tour.status,
            is_featured: tour.is_featured,
            created_at: tour.created_at,
            updated_at: tour.updated_at,
        }
    }
}

/// Query of `GET /tours`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    status: Option<TourStatus>,
}

/// `GET /tours`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TourView>>, ApiError> {
    let tours = tour::list_tours(&state.db, query.status).await?;
    Ok(Json(tours.into_iter().map(TourView::from).collect()))
}

/// `GET /tours/:id`
pub async fn get(
    State(state): State<AppState>,
    Path(tour_id): Path<i64>,
) -> Result<Json<TourView>, ApiError> {
    let tour = tour::get_tour(&state.db, tour_id)
        .await?
        .ok_or_else(|| Error::not_found("Tour", tour_id))?;
    Ok(Json(tour.into()))
}

/// `POST /tours`
pub async fn create(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(draft): Json<TourDraft>,
) -> Result<(StatusCode, Json<TourView>), ApiError> {
    let tour = tour::create_tour(&state.db, &actor, draft).await?;
    Ok((StatusCode::CREATED, Json(tour.into())))
}

/// `PUT /tours/:id`
pub async fn edit(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(tour_id): Path<i64>,
    Json(edit): Json<TourEdit>,
) -> Result<Json<TourView>, ApiError> {
    let tour = tour::edit_tour(&state.db, &actor, tour_id, edit).await?;
    Ok(Json(tour.into()))
}

/// Body of `PUT /tours/:id/status`.
#[derive(Debug, Deserialize)]
pub struct StatusBody {
    status: TourStatus,
}

/// `PUT /tours/:id/status`
pub async fn set_status(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(tour_id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> Result<Json<TourView>, ApiError> {
    let tour = tour::set_tour_status(&state.db, &actor, tour_id, body.status).await?;
    Ok(Json(tour.into()))
}

/// Body of `PUT /tours/:id/featured`.
#[derive(Debug, Deserialize)]
pub struct FeaturedBody {
    featured: bool,
}

/// `PUT /tours/:id/featured`
pub async fn set_featured(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(tour_id): Path<i64>,
    Json(body): Json<FeaturedBody>,
) -> Result<Json<TourView>, ApiError> {
    let tour = tour::set_featured(&state.db, &actor, tour_id, body.featured).await?;
    Ok(Json(tour.into()))
}

#[cfg(test)]
mod tests {
    use crate::{api::test_support::*, errors::Result, test_utils::*};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_status_endpoint_enforces_role_and_graph() -> Result<()> {
        let state = test_state(setup_test_db().await?, None);

        let (status, created) = send(
            &state,
            "POST",
            "/tours",
            Some(guide()),
            Some(json!({ "title": "Mekong Delta", "description": "Floating markets" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], json!("PendingApproval"));
        let uri = format!("/tours/{}/status", created["id"]);

        let (status, _) = send(&state, "PUT", &uri, Some(guide()), Some(json!({ "status": "Approved" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&state, "PUT", &uri, Some(admin()), Some(json!({ "status": "Rejected" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("Rejected"));

        let (status, body) = send(
            &state,
            "PUT",
            &uri,
            Some(admin()),
            Some(json!({ "status": "PendingApproval" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], json!("INVALID_TRANSITION"));
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_and_list() -> Result<()> {
        let db = setup_test_db().await?;
        let tour = create_test_tour(&db).await?;
        let state = test_state(db, None);

        let (status, body) = send(
            &state,
            "PUT",
            &format!("/tours/{}", tour.id),
            Some(guide()),
            Some(json!({ "description": "Now with kayaking" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("PendingApproval"));

        let (status, body) = send(&state, "GET", "/tours?status=Approved", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _) = send(&state, "GET", "/tours/999", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }
}
