//! Appointment API endpoints
//!
//! - POST /api/v1/appointments - Student books a slot
//! - DELETE /api/v1/appointments/{appointment_id} - Professor cancels an appointment
//! - GET /api/v1/appointments/my-appointments - Student's scheduled appointments

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{BookedAppointment, StudentAppointment};

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub availability_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub message: String,
    pub appointment: BookedAppointment,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MyAppointmentsResponse {
    pub appointments: Vec<StudentAppointment>,
}

/// Student routes
pub fn student_router() -> Router<AppState> {
    Router::new()
        .route("/", post(book_appointment))
        .route("/my-appointments", get(list_my_appointments))
}

/// Professor routes
pub fn professor_router() -> Router<AppState> {
    Router::new().route("/{appointment_id}", delete(cancel_appointment))
}

/// POST /api/v1/appointments
async fn book_appointment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<BookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let availability_id = body
        .availability_id
        .ok_or_else(|| ApiError::validation_error("Availability ID required"))?;

    let appointment = state
        .appointment_service
        .book(user.id, availability_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookResponse {
            message: "Appointment booked successfully".to_string(),
            appointment,
        }),
    ))
}

/// DELETE /api/v1/appointments/{appointment_id}
async fn cancel_appointment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(appointment_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .appointment_service
        .cancel(appointment_id, user.id)
        .await?;

    Ok(Json(MessageResponse {
        message: "Appointment cancelled successfully".to_string(),
    }))
}

/// GET /api/v1/appointments/my-appointments
async fn list_my_appointments(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<MyAppointmentsResponse>, ApiError> {
    let appointments = state.appointment_service.list_by_student(user.id).await?;
    Ok(Json(MyAppointmentsResponse { appointments }))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{login, register, send, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    struct Fixture {
        app: axum::Router,
        prof_id: i64,
        prof: String,
        student_id: i64,
        student: String,
        slot_id: i64,
    }

    async fn fixture() -> Fixture {
        let (app, _state) = test_app().await;
        let prof_id = register(&app, "prof_liskov", "professor").await;
        let prof = login(&app, "prof_liskov").await;
        let student_id = register(&app, "student_a", "student").await;
        let student = login(&app, "student_a").await;

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/v1/availability",
            Some(&prof),
            Some(json!({"time_slots": [{
                "start_time": "2030-01-01T10:00:00Z",
                "end_time": "2030-01-01T11:00:00Z",
            }]})),
        )
        .await;
        let slot_id = body["availability"][0]["availability_id"].as_i64().unwrap();

        Fixture {
            app,
            prof_id,
            prof,
            student_id,
            student,
            slot_id,
        }
    }

    async fn book(f: &Fixture, token: &str) -> (StatusCode, Value) {
        send(
            &f.app,
            Method::POST,
            "/api/v1/appointments",
            Some(token),
            Some(json!({"availability_id": f.slot_id})),
        )
        .await
    }

    async fn open_slot_count(f: &Fixture) -> usize {
        let uri = format!("/api/v1/availability/professors/{}", f.prof_id);
        let (_, body) = send(&f.app, Method::GET, &uri, Some(&f.student), None).await;
        body["available_slots"].as_array().unwrap().len()
    }

    #[tokio::test]
    async fn test_book_returns_denormalized_appointment() {
        let f = fixture().await;

        let (status, body) = book(&f, &f.student).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Appointment booked successfully");
        let appointment = &body["appointment"];
        assert_eq!(appointment["student_id"], f.student_id);
        assert_eq!(appointment["professor_id"], f.prof_id);
        assert_eq!(appointment["professor_name"], "prof_liskov");
        assert_eq!(appointment["start_time"], "2030-01-01T10:00:00Z");
        assert_eq!(appointment["status"], "scheduled");

        assert_eq!(open_slot_count(&f).await, 0);
    }

    #[tokio::test]
    async fn test_second_booking_conflicts() {
        let f = fixture().await;
        register(&f.app, "student_b", "student").await;
        let other = login(&f.app, "student_b").await;

        book(&f, &f.student).await;
        let (status, body) = book(&f, &other).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["message"], "Time slot already booked");
    }

    #[tokio::test]
    async fn test_book_validates_input() {
        let f = fixture().await;

        let (status, body) = send(
            &f.app,
            Method::POST,
            "/api/v1/appointments",
            Some(&f.student),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Availability ID required");

        let (status, body) = send(
            &f.app,
            Method::POST,
            "/api/v1/appointments",
            Some(&f.student),
            Some(json!({"availability_id": 9999})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Time slot not found or unavailable");
    }

    #[tokio::test]
    async fn test_professor_cannot_book() {
        let f = fixture().await;
        let (status, _) = book(&f, &f.prof).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_cancel_frees_slot_once() {
        let f = fixture().await;
        let (_, body) = book(&f, &f.student).await;
        let appointment_id = body["appointment"]["id"].as_i64().unwrap();
        let uri = format!("/api/v1/appointments/{}", appointment_id);

        let (status, body) = send(&f.app, Method::DELETE, &uri, Some(&f.prof), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Appointment cancelled successfully");
        assert_eq!(open_slot_count(&f).await, 1);

        let (status, body) = send(&f.app, Method::DELETE, &uri, Some(&f.prof), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body["error"]["message"],
            "Appointment not found or already cancelled"
        );

        // The freed window can be booked again
        let (status, _) = book(&f, &f.student).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_cancel_by_other_professor_is_not_found() {
        let f = fixture().await;
        register(&f.app, "prof_other", "professor").await;
        let other = login(&f.app, "prof_other").await;

        let (_, body) = book(&f, &f.student).await;
        let uri = format!("/api/v1/appointments/{}", body["appointment"]["id"]);

        let (status, _) = send(&f.app, Method::DELETE, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&f.app, Method::DELETE, &uri, Some(&f.student), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(open_slot_count(&f).await, 0);
    }

    #[tokio::test]
    async fn test_my_appointments_lists_scheduled_only() {
        let f = fixture().await;

        let (status, body) = send(
            &f.app,
            Method::GET,
            "/api/v1/appointments/my-appointments",
            Some(&f.student),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["appointments"], json!([]));

        let (_, booked) = book(&f, &f.student).await;
        let (_, body) = send(
            &f.app,
            Method::GET,
            "/api/v1/appointments/my-appointments",
            Some(&f.student),
            None,
        )
        .await;
        let list = body["appointments"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"], booked["appointment"]["id"]);
        assert_eq!(list[0]["professor_name"], "prof_liskov");

        let uri = format!("/api/v1/appointments/{}", booked["appointment"]["id"]);
        send(&f.app, Method::DELETE, &uri, Some(&f.prof), None).await;
        let (_, body) = send(
            &f.app,
            Method::GET,
            "/api/v1/appointments/my-appointments",
            Some(&f.student),
            None,
        )
        .await;
        assert_eq!(body["appointments"], json!([]));
    }
}
