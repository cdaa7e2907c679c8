//! services/api/src/web/tutors.rs
//!
//! Tutor management endpoints. Creating a tutor also creates their login
//! account: the username is derived from first name and date of birth,
//! and the one-time password is returned exactly once in the response.

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
use crate::web::auth::hash_password;
use crate::web::invoices::ReceiptResponse;
use crate::web::middleware::AuthContext;
use crate::web::port_error_response;
use crate::web::state::AppState;
use tuition_center_core::domain::{tutor_username, Tutor, TutorStatus};
use tuition_center_core::permissions::{Permission, Role};
use tuition_center_core::ports::{NewTutor, NewUserAccount, TutorUpdate};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateTutorRequest {
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub mobile: String,
    pub upi_id: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTutorRequest {
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub mobile: String,
    pub upi_id: Option<String>,
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct TutorResponse {
    pub id: Uuid,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub mobile: String,
    pub upi_id: Option<String>,
    pub username: String,
    pub billing_start_date: NaiveDate,
    pub next_payment_date: NaiveDate,
    pub status: String,
}

impl TutorResponse {
    pub fn from_domain(tutor: &Tutor) -> Self {
        Self {
            id: tutor.id,
            full_name: tutor.full_name.clone(),
            date_of_birth: tutor.date_of_birth,
            mobile: tutor.mobile.clone(),
            upi_id: tutor.upi_id.clone(),
            username: tutor.username.clone(),
            billing_start_date: tutor.billing_start_date,
            next_payment_date: tutor.next_payment_date(),
            status: tutor.status.as_str().to_string(),
        }
    }
}

/// Returned once at creation; the password is not retrievable later.
#[derive(Serialize, ToSchema)]
pub struct CreateTutorResponse {
    #[serde(flatten)]
    pub tutor: TutorResponse,
    pub one_time_password: String,
}

#[derive(Serialize, ToSchema)]
pub struct TutorStudentResponse {
    pub id: Uuid,
    pub full_name: String,
    pub class_level: String,
}

#[derive(Serialize, ToSchema)]
pub struct TutorDetailResponse {
    #[serde(flatten)]
    pub tutor: TutorResponse,
    pub students: Vec<TutorStudentResponse>,
    pub recent_attendance: Vec<AttendanceResponse>,
    pub recent_receipts: Vec<ReceiptResponse>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /tutors - List every tutor
#[utoipa::path(
    get,
    path = "/tutors",
    responses(
        (status = 200, description = "All tutors", body = [TutorResponse]),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn list_tutors_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::ViewTutors)?;

    let tutors = state
        .db
        .list_tutors()
        .await
        .map_err(|e| port_error_response("load tutors", e))?;

    let response: Vec<TutorResponse> = tutors.iter().map(TutorResponse::from_domain).collect();
    Ok(Json(response))
}

/// POST /tutors - Add a tutor and their login account
#[utoipa::path(
    post,
    path = "/tutors",
    request_body = CreateTutorRequest,
    responses(
        (status = 201, description = "Tutor created; response carries the one-time password", body = CreateTutorResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Username or mobile already in use"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn create_tutor_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTutorRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::AddTutors)?;

    if req.full_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "full_name must not be empty".to_string()));
    }
    if req.mobile.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "mobile must not be empty".to_string()));
    }

    let username = tutor_username(&req.full_name, req.date_of_birth);

    // The tutor's first password is their mobile number; only the hash
    // is stored, so it is returned to the caller exactly once here.
    let one_time_password = req.mobile.clone();
    let hashed_password = hash_password(&one_time_password)?;

    let new_tutor = NewTutor {
        id: Uuid::new_v4(),
        full_name: req.full_name.clone(),
        date_of_birth: Some(req.date_of_birth),
        mobile: req.mobile.clone(),
        upi_id: req.upi_id,
        username: username.clone(),
        billing_start_date: Utc::now().date_naive(),
    };

    let login = NewUserAccount {
        id: Uuid::new_v4(),
        username,
        hashed_password,
        full_name: Some(req.full_name),
        email: req.email,
        mobile: Some(req.mobile),
        role: Role::Tutor,
    };

    let tutor = state
        .db
        .create_tutor(new_tutor, login)
        .await
        .map_err(|e| port_error_response("create tutor", e))?;

    Ok((
        StatusCode::CREATED,
        Json(CreateTutorResponse {
            tutor: TutorResponse::from_domain(&tutor),
            one_time_password,
        }),
    ))
}

/// GET /tutors/{id} - One tutor with students and recent history
#[utoipa::path(
    get,
    path = "/tutors/{id}",
    params(("id" = Uuid, Path, description = "Tutor ID")),
    responses(
        (status = 200, description = "Tutor profile", body = TutorDetailResponse),
        (status = 404, description = "No such tutor"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn get_tutor_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::ViewTutors)?;

    let tutor = state
        .db
        .get_tutor(id)
        .await
        .map_err(|e| port_error_response("load tutor", e))?;

    let students = state
        .db
        .students_for_tutor(id)
        .await
        .map_err(|e| port_error_response("load tutor's students", e))?
        .into_iter()
        .map(|s| TutorStudentResponse {
            id: s.id,
            full_name: s.full_name,
            class_level: s.class_level,
        })
        .collect();

    let recent_attendance = state
        .db
        .recent_attendance_for_tutor(id, 10)
        .await
        .map_err(|e| port_error_response("load attendance", e))?
        .iter()
        .map(AttendanceResponse::from_domain)
        .collect();

    let recent_receipts = state
        .db
        .receipts_for_tutor(id, 10)
        .await
        .map_err(|e| port_error_response("load receipts", e))?
        .iter()
        .map(ReceiptResponse::from_domain)
        .collect();

    Ok(Json(TutorDetailResponse {
        tutor: TutorResponse::from_domain(&tutor),
        students,
        recent_attendance,
        recent_receipts,
    }))
}

/// PUT /tutors/{id} - Update a tutor's details
#[utoipa::path(
    put,
    path = "/tutors/{id}",
    params(("id" = Uuid, Path, description = "Tutor ID")),
    request_body = UpdateTutorRequest,
    responses(
        (status = 200, description = "Tutor updated", body = TutorResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "No such tutor"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn update_tutor_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTutorRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::EditTutors)?;

    if req.full_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "full_name must not be empty".to_string()));
    }
    let status = TutorStatus::parse(&req.status).ok_or((
        StatusCode::BAD_REQUEST,
        format!("Unknown tutor status '{}'", req.status),
    ))?;

    let update = TutorUpdate {
        full_name: req.full_name,
        date_of_birth: req.date_of_birth,
        mobile: req.mobile,
        upi_id: req.upi_id,
        status,
    };

    let tutor = state
        .db
        .update_tutor(id, update)
        .await
        .map_err(|e| port_error_response("update tutor", e))?;

    Ok(Json(TutorResponse::from_domain(&tutor)))
}
