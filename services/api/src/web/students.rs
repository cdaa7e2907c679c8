//! services/api/src/web/students.rs
//!
//! Student enrollment endpoints. Creation starts the student's billing
//! clock at today; edits can never touch the clock, only invoice
//! issuance moves it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::attendance::AttendanceResponse;
use crate::web::invoices::InvoiceResponse;
use crate::web::middleware::AuthContext;
use crate::web::port_error_response;
use crate::web::state::AppState;
use tuition_center_core::domain::{Student, StudentStatus, TutorAssignment};
use tuition_center_core::permissions::Permission;
use tuition_center_core::ports::{NewStudent, StudentUpdate};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct AssignmentRequest {
    pub tutor_id: Uuid,
    pub pay_per_class_minor: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateStudentRequest {
    pub full_name: String,
    pub parent_name: String,
    pub parent_whatsapp: String,
    pub class_level: String,
    pub subjects: Vec<String>,
    pub per_class_fee_minor: i64,
    #[serde(default)]
    pub assignments: Vec<AssignmentRequest>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateStudentRequest {
    pub full_name: String,
    pub parent_name: String,
    pub parent_whatsapp: String,
    pub class_level: String,
    pub subjects: Vec<String>,
    pub per_class_fee_minor: i64,
    pub status: String,
    #[serde(default)]
    pub assignments: Vec<AssignmentRequest>,
}

#[derive(Serialize, ToSchema)]
pub struct StudentResponse {
    pub id: Uuid,
    pub full_name: String,
    pub parent_name: String,
    pub parent_whatsapp: String,
    pub class_level: String,
    pub subjects: Vec<String>,
    pub per_class_fee_minor: i64,
    pub billing_start_date: NaiveDate,
    pub next_billing_date: NaiveDate,
    pub status: String,
}

impl StudentResponse {
    pub fn from_domain(student: &Student) -> Self {
        Self {
            id: student.id,
            full_name: student.full_name.clone(),
            parent_name: student.parent_name.clone(),
            parent_whatsapp: student.parent_whatsapp.clone(),
            class_level: student.class_level.clone(),
            subjects: student.subjects.clone(),
            per_class_fee_minor: student.per_class_fee_minor,
            billing_start_date: student.billing_start_date,
            next_billing_date: student.next_billing_date(),
            status: student.status.as_str().to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub tutor_id: Uuid,
    pub tutor_name: String,
    pub pay_per_class_minor: i64,
}

#[derive(Serialize, ToSchema)]
pub struct StudentDetailResponse {
    #[serde(flatten)]
    pub student: StudentResponse,
    pub assignments: Vec<AssignmentResponse>,
    pub recent_attendance: Vec<AttendanceResponse>,
    pub recent_invoices: Vec<InvoiceResponse>,
}

fn validate_fields(
    full_name: &str,
    per_class_fee_minor: i64,
    assignments: &[AssignmentRequest],
) -> Result<(), (StatusCode, String)> {
    if full_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "full_name must not be empty".to_string()));
    }
    if per_class_fee_minor < 0 {
        return Err((StatusCode::BAD_REQUEST, "per_class_fee_minor must not be negative".to_string()));
    }
    if assignments.iter().any(|a| a.pay_per_class_minor < 0) {
        return Err((StatusCode::BAD_REQUEST, "pay_per_class_minor must not be negative".to_string()));
    }
    Ok(())
}

fn to_assignments(assignments: Vec<AssignmentRequest>) -> Vec<TutorAssignment> {
    assignments
        .into_iter()
        .map(|a| TutorAssignment {
            tutor_id: a.tutor_id,
            pay_per_class_minor: a.pay_per_class_minor,
        })
        .collect()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /students - List every student
#[utoipa::path(
    get,
    path = "/students",
    responses(
        (status = 200, description = "All students", body = [StudentResponse]),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn list_students_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::ViewStudents)?;

    let students = state
        .db
        .list_students()
        .await
        .map_err(|e| port_error_response("load students", e))?;

    let response: Vec<StudentResponse> = students.iter().map(StudentResponse::from_domain).collect();
    Ok(Json(response))
}

/// POST /students - Enroll a new student
#[utoipa::path(
    post,
    path = "/students",
    request_body = CreateStudentRequest,
    responses(
        (status = 201, description = "Student enrolled", body = StudentResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn create_student_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateStudentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::AddStudents)?;
    validate_fields(&req.full_name, req.per_class_fee_minor, &req.assignments)?;

    let new_student = NewStudent {
        id: Uuid::new_v4(),
        full_name: req.full_name,
        parent_name: req.parent_name,
        parent_whatsapp: req.parent_whatsapp,
        class_level: req.class_level,
        subjects: req.subjects,
        per_class_fee_minor: req.per_class_fee_minor,
        // The billing clock starts today; the first invoice covers the
        // 30 days from enrollment.
        billing_start_date: Utc::now().date_naive(),
    };

    let student = state
        .db
        .create_student(new_student, to_assignments(req.assignments))
        .await
        .map_err(|e| port_error_response("create student", e))?;

    Ok((StatusCode::CREATED, Json(StudentResponse::from_domain(&student))))
}

/// GET /students/{id} - One student with assignments and recent history
#[utoipa::path(
    get,
    path = "/students/{id}",
    params(("id" = Uuid, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student profile", body = StudentDetailResponse),
        (status = 404, description = "No such student"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn get_student_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::ViewStudents)?;

    let student = state
        .db
        .get_student(id)
        .await
        .map_err(|e| port_error_response("load student", e))?;

    let mut assignments = Vec::new();
    for assignment in state
        .db
        .assignments_for_student(id)
        .await
        .map_err(|e| port_error_response("load assignments", e))?
    {
        let tutor = state
            .db
            .get_tutor(assignment.tutor_id)
            .await
            .map_err(|e| port_error_response("load assigned tutor", e))?;
        assignments.push(AssignmentResponse {
            tutor_id: assignment.tutor_id,
            tutor_name: tutor.full_name,
            pay_per_class_minor: assignment.pay_per_class_minor,
        });
    }

    let recent_attendance = state
        .db
        .recent_attendance_for_student(id, 10)
        .await
        .map_err(|e| port_error_response("load attendance", e))?
        .iter()
        .map(AttendanceResponse::from_domain)
        .collect();

    let recent_invoices = state
        .db
        .invoices_for_student(id, 10)
        .await
        .map_err(|e| port_error_response("load invoices", e))?
        .iter()
        .map(InvoiceResponse::from_domain)
        .collect();

    Ok(Json(StudentDetailResponse {
        student: StudentResponse::from_domain(&student),
        assignments,
        recent_attendance,
        recent_invoices,
    }))
}

/// PUT /students/{id} - Update a student's details and assignments
#[utoipa::path(
    put,
    path = "/students/{id}",
    params(("id" = Uuid, Path, description = "Student ID")),
    request_body = UpdateStudentRequest,
    responses(
        (status = 200, description = "Student updated", body = StudentResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "No such student"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn update_student_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStudentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::EditStudents)?;
    validate_fields(&req.full_name, req.per_class_fee_minor, &req.assignments)?;

    let status = StudentStatus::parse(&req.status).ok_or((
        StatusCode::BAD_REQUEST,
        format!("Unknown student status '{}'", req.status),
    ))?;

    let update = StudentUpdate {
        full_name: req.full_name,
        parent_name: req.parent_name,
        parent_whatsapp: req.parent_whatsapp,
        class_level: req.class_level,
        subjects: req.subjects,
        per_class_fee_minor: req.per_class_fee_minor,
        status,
    };

    let student = state
        .db
        .update_student(id, update, to_assignments(req.assignments))
        .await
        .map_err(|e| port_error_response("update student", e))?;

    Ok(Json(StudentResponse::from_domain(&student)))
}
