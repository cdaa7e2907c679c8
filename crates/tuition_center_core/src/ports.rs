//! crates/tuition_center_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    AttendanceRecord, BillingPeriod, BillingTotals, Student, StudentInvoice, StudentStatus, Tutor,
    TutorAssignment, TutorReceipt, TutorStatus, UserAccount, UserCredentials,
};
use crate::permissions::Role;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Write Payloads
//=========================================================================================

/// IDs are assigned by the caller so that derived values (document
/// numbers, links between rows) can be computed before anything is stored.
#[derive(Debug, Clone)]
pub struct NewUserAccount {
    pub id: Uuid,
    pub username: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub id: Uuid,
    pub full_name: String,
    pub parent_name: String,
    pub parent_whatsapp: String,
    pub class_level: String,
    pub subjects: Vec<String>,
    pub per_class_fee_minor: i64,
    pub billing_start_date: NaiveDate,
}

/// Editable student fields. The billing clock is deliberately absent:
/// only invoice issuance moves `billing_start_date`.
#[derive(Debug, Clone)]
pub struct StudentUpdate {
    pub full_name: String,
    pub parent_name: String,
    pub parent_whatsapp: String,
    pub class_level: String,
    pub subjects: Vec<String>,
    pub per_class_fee_minor: i64,
    pub status: StudentStatus,
}

#[derive(Debug, Clone)]
pub struct NewTutor {
    pub id: Uuid,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub mobile: String,
    pub upi_id: Option<String>,
    pub username: String,
    pub billing_start_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct TutorUpdate {
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub mobile: String,
    pub upi_id: Option<String>,
    pub status: TutorStatus,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
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

#[derive(Debug, Clone)]
pub struct NewStudentInvoice {
    pub id: Uuid,
    pub student_id: Uuid,
    pub invoice_number: String,
    pub period: BillingPeriod,
    pub total_classes: i64,
    pub total_amount_minor: i64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTutorReceipt {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub receipt_number: String,
    pub period: BillingPeriod,
    pub total_classes: i64,
    pub total_earnings_minor: i64,
    pub generated_at: DateTime<Utc>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Accounts and Auth ---
    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials>;

    async fn get_user_account(&self, user_id: Uuid) -> PortResult<UserAccount>;

    async fn list_user_accounts(&self) -> PortResult<Vec<UserAccount>>;

    async fn create_user_account(&self, new_user: NewUserAccount) -> PortResult<UserAccount>;

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Students ---
    async fn list_students(&self) -> PortResult<Vec<Student>>;

    /// Students with `Active` status, the only ones the billing sweep visits.
    async fn list_active_students(&self) -> PortResult<Vec<Student>>;

    async fn get_student(&self, student_id: Uuid) -> PortResult<Student>;

    async fn create_student(
        &self,
        new_student: NewStudent,
        assignments: Vec<TutorAssignment>,
    ) -> PortResult<Student>;

    /// Replaces the student's editable fields and their full assignment list.
    async fn update_student(
        &self,
        student_id: Uuid,
        update: StudentUpdate,
        assignments: Vec<TutorAssignment>,
    ) -> PortResult<Student>;

    async fn assignments_for_student(&self, student_id: Uuid) -> PortResult<Vec<TutorAssignment>>;

    async fn students_for_tutor(&self, tutor_id: Uuid) -> PortResult<Vec<Student>>;

    // --- Tutors ---
    async fn list_tutors(&self) -> PortResult<Vec<Tutor>>;

    async fn list_active_tutors(&self) -> PortResult<Vec<Tutor>>;

    async fn get_tutor(&self, tutor_id: Uuid) -> PortResult<Tutor>;

    /// The tutor profile linked to a login account, if any.
    async fn get_tutor_by_user(&self, user_id: Uuid) -> PortResult<Option<Tutor>>;

    /// Creates the tutor and their login account together; neither exists
    /// if the other fails.
    async fn create_tutor(&self, new_tutor: NewTutor, login: NewUserAccount) -> PortResult<Tutor>;

    async fn update_tutor(&self, tutor_id: Uuid, update: TutorUpdate) -> PortResult<Tutor>;

    // --- Attendance Ledger ---
    async fn record_attendance(&self, new_record: NewAttendance) -> PortResult<AttendanceRecord>;

    /// Number of classes a student attended with `date_recorded` in the
    /// inclusive range.
    async fn count_student_attendance(
        &self,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<i64>;

    async fn tutor_attendance_between(
        &self,
        tutor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<AttendanceRecord>>;

    async fn recent_attendance_for_student(
        &self,
        student_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<AttendanceRecord>>;

    async fn recent_attendance_for_tutor(
        &self,
        tutor_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<AttendanceRecord>>;

    /// Agreed per-class pay for one student/tutor pairing, if assigned.
    async fn pair_pay_rate(&self, student_id: Uuid, tutor_id: Uuid) -> PortResult<Option<i64>>;

    // --- Billing Documents ---
    async fn find_student_invoice_for_period(
        &self,
        student_id: Uuid,
        period: BillingPeriod,
    ) -> PortResult<Option<StudentInvoice>>;

    /// Stores the invoice and advances the student's billing clock to the
    /// day after `period.end_date`, in one transaction. If an invoice for
    /// the same period was stored concurrently, returns that one and
    /// leaves the clock alone.
    async fn insert_student_invoice(&self, new_invoice: NewStudentInvoice) -> PortResult<StudentInvoice>;

    async fn find_tutor_receipt_for_period(
        &self,
        tutor_id: Uuid,
        period: BillingPeriod,
    ) -> PortResult<Option<TutorReceipt>>;

    /// Same contract as `insert_student_invoice`, for tutor receipts.
    async fn insert_tutor_receipt(&self, new_receipt: NewTutorReceipt) -> PortResult<TutorReceipt>;

    async fn get_student_invoice(&self, invoice_id: Uuid) -> PortResult<StudentInvoice>;

    async fn get_tutor_receipt(&self, receipt_id: Uuid) -> PortResult<TutorReceipt>;

    async fn list_student_invoices(&self) -> PortResult<Vec<StudentInvoice>>;

    async fn list_tutor_receipts(&self) -> PortResult<Vec<TutorReceipt>>;

    async fn invoices_for_student(&self, student_id: Uuid, limit: i64) -> PortResult<Vec<StudentInvoice>>;

    async fn receipts_for_tutor(&self, tutor_id: Uuid, limit: i64) -> PortResult<Vec<TutorReceipt>>;

    /// Overwrites the amount received and re-derives the invoice status.
    async fn record_invoice_payment(
        &self,
        invoice_id: Uuid,
        amount_paid_minor: i64,
    ) -> PortResult<StudentInvoice>;

    async fn mark_receipt_paid(&self, receipt_id: Uuid) -> PortResult<TutorReceipt>;

    // --- Reporting ---
    async fn billing_totals(&self) -> PortResult<BillingTotals>;
}
