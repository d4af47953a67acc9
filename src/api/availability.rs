//! Availability API endpoints
//!
//! - POST /api/v1/availability - Professor declares availability windows
//! - GET /api/v1/availability/professors - List professors
//! - GET /api/v1/availability/professors/{professor_id} - Open slots of a professor

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreatedWindow, ProfessorSlots, ProfessorSummary, TimeWindow};

#[derive(Debug, Deserialize)]
pub struct TimeSlotRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SetAvailabilityRequest {
    pub time_slots: Option<Vec<TimeSlotRequest>>,
}

#[derive(Debug, Serialize)]
pub struct SetAvailabilityResponse {
    pub message: String,
    pub availability: Vec<CreatedWindow>,
}

#[derive(Debug, Serialize)]
pub struct ProfessorListResponse {
    pub professors: Vec<ProfessorSummary>,
}

/// Routes open to any authenticated user
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/professors", get(list_professors))
        .route("/professors/{professor_id}", get(get_professor_slots))
}

/// Routes that need the professor role
pub fn professor_router() -> Router<AppState> {
    Router::new().route("/", post(set_availability))
}

/// POST /api/v1/availability
async fn set_availability(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<SetAvailabilityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let slots = body
        .time_slots
        .ok_or_else(|| ApiError::validation_error("Time slots array required"))?;

    let windows: Vec<TimeWindow> = slots
        .into_iter()
        .map(|slot| TimeWindow::new(slot.start_time, slot.end_time))
        .collect();

    let created = state
        .availability_service
        .declare(user.id, &windows)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SetAvailabilityResponse {
            message: "Availability set successfully".to_string(),
            availability: created.iter().map(CreatedWindow::from).collect(),
        }),
    ))
}

/// GET /api/v1/availability/professors
async fn list_professors(
    State(state): State<AppState>,
) -> Result<Json<ProfessorListResponse>, ApiError> {
    let professors = state
        .user_service
        .list_professors()
        .await?
        .into_iter()
        .map(|p| ProfessorSummary {
            id: p.id,
            username: p.username,
        })
        .collect();

    Ok(Json(ProfessorListResponse { professors }))
}

/// GET /api/v1/availability/professors/{professor_id}
async fn get_professor_slots(
    State(state): State<AppState>,
    Path(professor_id): Path<i64>,
) -> Result<Json<ProfessorSlots>, ApiError> {
    let slots = state
        .availability_service
        .professor_slots(professor_id)
        .await?;
    Ok(Json(slots))
}
