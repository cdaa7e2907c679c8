//! services/api/src/web/invoices.rs
//!
//! Billing endpoints: listing issued documents, recording payments,
//! downloading printable copies, and a manual sweep trigger for
//! accountants who don't want to wait for the next login.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::adapters::render::{student_invoice_html, tutor_receipt_html, ReceiptLine};
use crate::web::middleware::AuthContext;
use crate::web::port_error_response;
use crate::web::state::AppState;
use tuition_center_core::billing::run_billing_sweep;
use tuition_center_core::domain::{StudentInvoice, TutorReceipt};
use tuition_center_core::permissions::Permission;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub invoice_number: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_classes: i64,
    pub total_amount_minor: i64,
    pub amount_paid_minor: i64,
    pub status: String,
    pub generated_at: DateTime<Utc>,
}

impl InvoiceResponse {
    pub fn from_domain(invoice: &StudentInvoice) -> Self {
        Self {
            id: invoice.id,
            student_id: invoice.student_id,
            invoice_number: invoice.invoice_number.clone(),
            start_date: invoice.start_date,
            end_date: invoice.end_date,
            total_classes: invoice.total_classes,
            total_amount_minor: invoice.total_amount_minor,
            amount_paid_minor: invoice.amount_paid_minor,
            status: invoice.status.as_str().to_string(),
            generated_at: invoice.generated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ReceiptResponse {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub receipt_number: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_classes: i64,
    pub total_earnings_minor: i64,
    pub status: String,
    pub generated_at: DateTime<Utc>,
}

impl ReceiptResponse {
    pub fn from_domain(receipt: &TutorReceipt) -> Self {
        Self {
            id: receipt.id,
            tutor_id: receipt.tutor_id,
            receipt_number: receipt.receipt_number.clone(),
            start_date: receipt.start_date,
            end_date: receipt.end_date,
            total_classes: receipt.total_classes,
            total_earnings_minor: receipt.total_earnings_minor,
            status: receipt.status.as_str().to_string(),
            generated_at: receipt.generated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct PaymentRequest {
    /// Total received to date for this invoice, in minor units.
    pub amount_paid_minor: i64,
}

#[derive(Serialize, ToSchema)]
pub struct SweepResponse {
    pub invoices_issued: u32,
    pub receipts_issued: u32,
    pub failures: u32,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /invoices - Every issued student invoice, newest first
#[utoipa::path(
    get,
    path = "/invoices",
    responses(
        (status = 200, description = "All student invoices", body = [InvoiceResponse]),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn list_invoices_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::ViewInvoices)?;

    let invoices = state
        .db
        .list_student_invoices()
        .await
        .map_err(|e| port_error_response("load invoices", e))?;

    let response: Vec<InvoiceResponse> = invoices.iter().map(InvoiceResponse::from_domain).collect();
    Ok(Json(response))
}

/// GET /receipts - Every issued tutor receipt, newest first
#[utoipa::path(
    get,
    path = "/receipts",
    responses(
        (status = 200, description = "All tutor receipts", body = [ReceiptResponse]),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn list_receipts_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::ViewInvoices)?;

    let receipts = state
        .db
        .list_tutor_receipts()
        .await
        .map_err(|e| port_error_response("load receipts", e))?;

    let response: Vec<ReceiptResponse> = receipts.iter().map(ReceiptResponse::from_domain).collect();
    Ok(Json(response))
}

/// POST /billing/sweep - Run the billing sweep now
#[utoipa::path(
    post,
    path = "/billing/sweep",
    responses(
        (status = 200, description = "Sweep finished", body = SweepResponse),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn run_sweep_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::GenerateInvoices)?;

    let summary = run_billing_sweep(state.db.as_ref(), Utc::now().date_naive()).await;

    Ok(Json(SweepResponse {
        invoices_issued: summary.invoices_issued,
        receipts_issued: summary.receipts_issued,
        failures: summary.failures,
    }))
}

/// POST /invoices/{id}/payments - Record money received for an invoice
#[utoipa::path(
    post,
    path = "/invoices/{id}/payments",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = InvoiceResponse),
        (status = 400, description = "Invalid amount"),
        (status = 404, description = "No such invoice"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn pay_invoice_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::MarkPayments)?;

    if req.amount_paid_minor < 0 {
        return Err((StatusCode::BAD_REQUEST, "amount_paid_minor must not be negative".to_string()));
    }

    let invoice = state
        .db
        .record_invoice_payment(id, req.amount_paid_minor)
        .await
        .map_err(|e| port_error_response("record payment", e))?;

    Ok(Json(InvoiceResponse::from_domain(&invoice)))
}

/// POST /receipts/{id}/payments - Mark a tutor receipt as paid out
#[utoipa::path(
    post,
    path = "/receipts/{id}/payments",
    params(("id" = Uuid, Path, description = "Receipt ID")),
    responses(
        (status = 200, description = "Receipt marked paid", body = ReceiptResponse),
        (status = 404, description = "No such receipt"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn pay_receipt_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::MarkPayments)?;

    let receipt = state
        .db
        .mark_receipt_paid(id)
        .await
        .map_err(|e| port_error_response("mark receipt paid", e))?;

    Ok(Json(ReceiptResponse::from_domain(&receipt)))
}

/// GET /invoices/{id}/document - Printable invoice
#[utoipa::path(
    get,
    path = "/invoices/{id}/document",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Printable HTML invoice", content_type = "text/html"),
        (status = 404, description = "No such invoice"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn invoice_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::DownloadInvoices)?;

    let invoice = state
        .db
        .get_student_invoice(id)
        .await
        .map_err(|e| port_error_response("load invoice", e))?;
    let student = state
        .db
        .get_student(invoice.student_id)
        .await
        .map_err(|e| port_error_response("load student", e))?;

    let html = student_invoice_html(&state.config.center_name, &invoice, &student);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.html\"", invoice.invoice_number),
            ),
        ],
        html,
    ))
}

/// GET /receipts/{id}/document - Printable receipt, grouped by student
#[utoipa::path(
    get,
    path = "/receipts/{id}/document",
    params(("id" = Uuid, Path, description = "Receipt ID")),
    responses(
        (status = 200, description = "Printable HTML receipt", content_type = "text/html"),
        (status = 404, description = "No such receipt"),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn receipt_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Permission::DownloadInvoices)?;

    let receipt = state
        .db
        .get_tutor_receipt(id)
        .await
        .map_err(|e| port_error_response("load receipt", e))?;
    let tutor = state
        .db
        .get_tutor(receipt.tutor_id)
        .await
        .map_err(|e| port_error_response("load tutor", e))?;

    // Rebuild the per-student breakdown from the attendance the receipt
    // was issued over.
    let records = state
        .db
        .tutor_attendance_between(receipt.tutor_id, receipt.start_date, receipt.end_date)
        .await
        .map_err(|e| port_error_response("load attendance", e))?;

    let mut classes_by_student: HashMap<Uuid, i64> = HashMap::new();
    for record in &records {
        *classes_by_student.entry(record.student_id).or_insert(0) += 1;
    }

    let mut lines = Vec::new();
    for (student_id, classes) in classes_by_student {
        let student = state
            .db
            .get_student(student_id)
            .await
            .map_err(|e| port_error_response("load student", e))?;
        let rate = state
            .db
            .pair_pay_rate(student_id, receipt.tutor_id)
            .await
            .map_err(|e| port_error_response("load pay rate", e))?
            .unwrap_or(0);
        lines.push(ReceiptLine {
            student_name: student.full_name,
            classes,
            pay_per_class_minor: rate,
        });
    }
    lines.sort_by(|a, b| a.student_name.cmp(&b.student_name));

    let html = tutor_receipt_html(&state.config.center_name, &receipt, &tutor, &lines);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.html\"", receipt.receipt_number),
            ),
        ],
        html,
    ))
}
