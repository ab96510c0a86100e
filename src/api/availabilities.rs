//! Departure endpoints, managed by the tour's guide.

use crate::{
    api::{AppState, error::ApiError, extractors::CurrentActor},
    core::availability::{self, AvailabilityDraft, AvailabilityUpdate},
    entities::TourAvailabilityModel,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Serialize;

/// Departure as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityView {
    id: i64,
    tour_id: i64,
    date: NaiveDate,
    max_participants: i32,
    booked_participants: i32,
    remaining_seats: i32,
    adult_price: i64,
    child_price: i64,
    surcharge: i64,
    departure_location: String,
    vehicle: String,
    trip_time: String,
}

impl From<TourAvailabilityModel> for AvailabilityView {
    fn from(availability: TourAvailabilityModel) -> Self {
        Self {
            remaining_seats: availability.remaining_seats(),
            id: availability.id,
            tour_id: availability.tour_id,
            date: availability.date,
            max_participants: availability.max_participants,
            booked_participants: availability.booked_participants,
            adult_price: availability.adult_price,
            child_price: availability.child_price,
            surcharge: availability.surcharge,
            departure_location: availability.departure_location,
            vehicle: availability.vehicle,
            trip_time: availability.trip_time,
        }
    }
}

/// `GET /tours/:id/availabilities`
pub async fn list(
    State(state): State<AppState>,
    Path(tour_id): Path<i64>,
) -> Result<Json<Vec<AvailabilityView>>, ApiError> {
    let departures = availability::get_availabilities_for_tour(&state.db, tour_id).await?;
    Ok(Json(departures.into_iter().map(AvailabilityView::from).collect()))
}

/// `POST /tours/:id/availabilities`
pub async fn create(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(tour_id): Path<i64>,
    Json(draft): Json<AvailabilityDraft>,
) -> Result<(StatusCode, Json<AvailabilityView>), ApiError> {
    let created = availability::create_availability(&state.db, &actor, tour_id, draft).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// `PUT /availabilities/:id`
pub async fn update(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(availability_id): Path<i64>,
    Json(update): Json<AvailabilityUpdate>,
) -> Result<Json<AvailabilityView>, ApiError> {
    let updated =
        availability::update_availability(&state.db, &actor, availability_id, update).await?;
    Ok(Json(updated.into()))
}

/// `DELETE /availabilities/:id`
pub async fn delete(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(availability_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    availability::delete_availability(&state.db, &actor, availability_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
