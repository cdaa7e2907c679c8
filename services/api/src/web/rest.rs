//! services/api/src/web/rest.rs
//!
//! Contains the dashboard, profile, and user-administration handlers and the
//! master definition for the OpenAPI specification.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::attendance::AttendanceResponse;
use crate::web::auth::hash_password;
use crate::web::invoices::ReceiptResponse;
use crate::web::middleware::AuthContext;
use crate::web::port_error_response;
use crate::web::state::AppState;
use crate::web::tutors::{TutorDetailResponse, TutorResponse, TutorStudentResponse};
use tuition_center_core::domain::UserAccount;
use tuition_center_core::permissions::{Permission, Role};
use tuition_center_core::ports::NewUserAccount;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::students::list_students_handler,
        crate::web::students::create_student_handler,
        crate::web::students::get_student_handler,
        crate::web::students::update_student_handler,
        crate::web::tutors::list_tutors_handler,
        crate::web::tutors::create_tutor_handler,
        crate::web::tutors::get_tutor_handler,
        crate::web::tutors::update_tutor_handler,
        crate::web::attendance::submit_attendance_handler,
        crate::web::invoices::list_invoices_handler,
        crate::web::invoices::list_receipts_handler,
        crate::web::invoices::run_sweep_handler,
        crate::web::invoices::pay_invoice_handler,
        crate::web::invoices::pay_receipt_handler,
        crate::web::invoices::invoice_document_handler,
        crate::web::invoices::receipt_document_handler,
        dashboard_handler,
        me_handler,
        list_users_handler,
        create_user_handler,
    ),
    components(
        schemas(
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            crate::web::students::AssignmentRequest,
            crate::web::students::CreateStudentRequest,
            crate::web::students::UpdateStudentRequest,
            crate::web::students::StudentResponse,
            crate::web::students::AssignmentResponse,
            crate::web::students::StudentDetailResponse,
            crate::web::tutors::CreateTutorRequest,
            crate::web::tutors::UpdateTutorRequest,
            crate::web::tutors::TutorResponse,
            crate::web::tutors::CreateTutorResponse,
            crate::web::tutors::TutorStudentResponse,
            crate::web::tutors::TutorDetailResponse,
            crate::web::attendance::SubmitAttendanceRequest,
            crate::web::attendance::AttendanceResponse,
            crate::web::invoices::InvoiceResponse,
            crate::web::invoices::ReceiptResponse,
            crate::web::invoices::PaymentRequest,
            crate::web::invoices::SweepResponse,
            DashboardResponse,
            MeResponse,
            UserResponse,
            CreateUserRequest,
        )
    ),
    tags(
        (name = "Tuition Center API", description = "Billing and operations API for a tuition center.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Financial snapshot shown on the landing page.
#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub collected_revenue_minor: i64,
    pub pending_revenue_minor: i64,
    pub paid_payout_minor: i64,
    pub pending_payout_minor: i64,
    pub active_students: i64,
    pub active_tutors: i64,
    pub invoice_count: i64,
    pub receipt_count: i64,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserResponse {
    fn from_domain(account: &UserAccount) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            full_name: account.full_name.clone(),
            email: account.email.clone(),
            mobile: account.mobile.clone(),
            role: account.role.to_string(),
            is_active: account.is_active,
            last_login: account.last_login,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub user: UserResponse,
    pub permissions: Vec<String>,
    /// Present only when the signed-in account belongs to a tutor.
    pub tutor: Option<TutorDetailResponse>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub role: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /dashboard - Totals across every invoice and receipt
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Billing totals", body = DashboardResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::ViewInvoices)?;

    let totals = state
        .db
        .billing_totals()
        .await
        .map_err(|e| port_error_response("load dashboard totals", e))?;

    Ok(Json(DashboardResponse {
        collected_revenue_minor: totals.collected_revenue_minor,
        pending_revenue_minor: totals.pending_revenue_minor,
        paid_payout_minor: totals.paid_payout_minor,
        pending_payout_minor: totals.pending_payout_minor,
        active_students: totals.active_students,
        active_tutors: totals.active_tutors,
        invoice_count: totals.invoice_count,
        receipt_count: totals.receipt_count,
    }))
}

/// GET /me - The signed-in account, with the tutor profile when one is linked
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current account", body = MeResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let account = state
        .db
        .get_user_account(auth.user_id)
        .await
        .map_err(|e| port_error_response("load account", e))?;

    let tutor = if account.role == Role::Tutor {
        match state
            .db
            .get_tutor_by_user(auth.user_id)
            .await
            .map_err(|e| port_error_response("load tutor profile", e))?
        {
            Some(tutor) => Some(tutor_detail(&state, tutor).await?),
            None => None,
        }
    } else {
        None
    };

    Ok(Json(MeResponse {
        user: UserResponse::from_domain(&account),
        permissions: auth.permissions.names().into_iter().map(String::from).collect(),
        tutor,
    }))
}

async fn tutor_detail(
    state: &AppState,
    tutor: tuition_center_core::domain::Tutor,
) -> Result<TutorDetailResponse, (StatusCode, String)> {
    let students = state
        .db
        .students_for_tutor(tutor.id)
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
        .recent_attendance_for_tutor(tutor.id, 10)
        .await
        .map_err(|e| port_error_response("load attendance", e))?
        .iter()
        .map(AttendanceResponse::from_domain)
        .collect();

    let recent_receipts = state
        .db
        .receipts_for_tutor(tutor.id, 10)
        .await
        .map_err(|e| port_error_response("load receipts", e))?
        .iter()
        .map(ReceiptResponse::from_domain)
        .collect();

    Ok(TutorDetailResponse {
        tutor: TutorResponse::from_domain(&tutor),
        students,
        recent_attendance,
        recent_receipts,
    })
}

/// GET /admin/users - Every login account
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All accounts", body = [UserResponse]),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::ManageUsers)?;

    let accounts = state
        .db
        .list_user_accounts()
        .await
        .map_err(|e| port_error_response("load accounts", e))?;

    let response: Vec<UserResponse> = accounts.iter().map(UserResponse::from_domain).collect();
    Ok(Json(response))
}

/// POST /admin/users - Create a staff login
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Username already taken"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::ManageUsers)?;

    if req.username.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Username must not be empty".to_string()));
    }
    if req.password.len() < 8 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters".to_string(),
        ));
    }
    let role: Role = req
        .role
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("Unknown role: {}", req.role)))?;

    let hashed_password = hash_password(&req.password)?;

    let account = state
        .db
        .create_user_account(NewUserAccount {
            id: Uuid::new_v4(),
            username: req.username.trim().to_string(),
            hashed_password,
            full_name: req.full_name,
            email: req.email,
            mobile: req.mobile,
            role,
        })
        .await
        .map_err(|e| port_error_response("create account", e))?;

    Ok((StatusCode::CREATED, Json(UserResponse::from_domain(&account))))
}
