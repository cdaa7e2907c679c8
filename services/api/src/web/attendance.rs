//! services/api/src/web/attendance.rs
//!
//! Attendance submission. The ledger is append-only: there is no edit
//! or delete, because issued invoices are built from these records.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::AuthContext;
use crate::web::port_error_response;
use crate::web::state::AppState;
use tuition_center_core::domain::AttendanceRecord;
use tuition_center_core::permissions::Permission;
use tuition_center_core::ports::NewAttendance;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SubmitAttendanceRequest {
    pub student_id: Uuid,
    pub tutor_id: Uuid,
    pub subject: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Session quality from the tutor's side, 1 to 10.
    pub rating: i16,
    pub remarks: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub tutor_id: Uuid,
    pub subject: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub rating: i16,
    pub remarks: Option<String>,
    pub date_recorded: NaiveDate,
}

impl AttendanceResponse {
    pub fn from_domain(record: &AttendanceRecord) -> Self {
        Self {
            id: record.id,
            student_id: record.student_id,
            tutor_id: record.tutor_id,
            subject: record.subject.clone(),
            start_time: record.start_time,
            end_time: record.end_time,
            duration_minutes: record.duration_minutes,
            rating: record.rating,
            remarks: record.remarks.clone(),
            date_recorded: record.date_recorded,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /attendance - Record one taught class
#[utoipa::path(
    post,
    path = "/attendance",
    request_body = SubmitAttendanceRequest,
    responses(
        (status = 201, description = "Attendance recorded", body = AttendanceResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Unknown student or tutor"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn submit_attendance_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<SubmitAttendanceRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::SubmitAttendance)?;

    if req.end_time <= req.start_time {
        return Err((StatusCode::BAD_REQUEST, "end_time must be after start_time".to_string()));
    }
    if !(1..=10).contains(&req.rating) {
        return Err((StatusCode::BAD_REQUEST, "rating must be between 1 and 10".to_string()));
    }

    // Both sides of the pairing must exist before anything is written.
    state
        .db
        .get_student(req.student_id)
        .await
        .map_err(|e| port_error_response("load student", e))?;
    state
        .db
        .get_tutor(req.tutor_id)
        .await
        .map_err(|e| port_error_response("load tutor", e))?;

    let duration_minutes = (req.end_time - req.start_time).num_minutes() as i32;
    let new_record = NewAttendance {
        id: Uuid::new_v4(),
        student_id: req.student_id,
        tutor_id: req.tutor_id,
        subject: req.subject,
        start_time: req.start_time,
        end_time: req.end_time,
        duration_minutes,
        rating: req.rating,
        remarks: req.remarks,
        // Billing aggregates by the calendar date the class started.
        date_recorded: req.start_time.date_naive(),
    };

    let record = state
        .db
        .record_attendance(new_record)
        .await
        .map_err(|e| port_error_response("record attendance", e))?;

    Ok((StatusCode::CREATED, Json(AttendanceResponse::from_domain(&record))))
}
