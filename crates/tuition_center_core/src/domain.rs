//! crates/tuition_center_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::permissions::Role;

/// Students are billed every 30 days from their individual start date.
pub const STUDENT_CYCLE_DAYS: i64 = 30;

/// Tutors are paid every 40 days from their individual start date.
pub const TUTOR_CYCLE_DAYS: i64 = 40;

/// A closed date range covered by one invoice or receipt.
/// Both ends are inclusive; the day after `end_date` starts the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentStatus {
    Active,
    Inactive,
    Graduated,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "Active",
            StudentStatus::Inactive => "Inactive",
            StudentStatus::Graduated => "Graduated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(StudentStatus::Active),
            "Inactive" => Some(StudentStatus::Inactive),
            "Graduated" => Some(StudentStatus::Graduated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TutorStatus {
    Active,
    Inactive,
}

impl TutorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TutorStatus::Active => "Active",
            TutorStatus::Inactive => "Inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(TutorStatus::Active),
            "Inactive" => Some(TutorStatus::Inactive),
            _ => None,
        }
    }
}

/// An enrolled student. `billing_start_date` is the student's personal
/// billing clock; it only moves forward when an invoice is issued.
#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub parent_name: String,
    pub parent_whatsapp: String,
    pub class_level: String,
    pub subjects: Vec<String>,
    /// Fee charged per attended class, in minor currency units (paise).
    pub per_class_fee_minor: i64,
    pub billing_start_date: NaiveDate,
    pub status: StudentStatus,
}

impl Student {
    /// First day NOT covered by the current cycle. An invoice becomes due
    /// once this date has been reached.
    pub fn next_billing_date(&self) -> NaiveDate {
        self.billing_start_date + Duration::days(STUDENT_CYCLE_DAYS)
    }

    pub fn is_billing_due(&self, today: NaiveDate) -> bool {
        self.next_billing_date() <= today
    }

    /// The period the next invoice would cover, inclusive on both ends.
    pub fn current_billing_period(&self) -> BillingPeriod {
        BillingPeriod {
            start_date: self.billing_start_date,
            end_date: self.next_billing_date() - Duration::days(1),
        }
    }
}

/// A tutor on the payroll. Mirrors `Student` but on a 40 day clock, and
/// optionally linked to a login account via `user_id`.
#[derive(Debug, Clone)]
pub struct Tutor {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub mobile: String,
    pub upi_id: Option<String>,
    pub username: String,
    pub billing_start_date: NaiveDate,
    pub status: TutorStatus,
}

impl Tutor {
    pub fn next_payment_date(&self) -> NaiveDate {
        self.billing_start_date + Duration::days(TUTOR_CYCLE_DAYS)
    }

    pub fn is_payment_due(&self, today: NaiveDate) -> bool {
        self.next_payment_date() <= today
    }

    pub fn current_payment_period(&self) -> BillingPeriod {
        BillingPeriod {
            start_date: self.billing_start_date,
            end_date: self.next_payment_date() - Duration::days(1),
        }
    }
}

/// Derives a tutor login name from their legal name and date of birth:
/// first name with day and month appended, e.g. "Priya0703".
pub fn tutor_username(full_name: &str, date_of_birth: NaiveDate) -> String {
    let first = full_name.split_whitespace().next().unwrap_or(full_name);
    format!("{}{}", first, date_of_birth.format("%d%m"))
}

/// A tutor assigned to a student, with the agreed per-class pay for that
/// specific pairing. The same tutor can earn different rates per student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TutorAssignment {
    pub tutor_id: Uuid,
    pub pay_per_class_minor: i64,
}

/// One taught class. Append-only; `date_recorded` (the calendar date of
/// `start_time`) is what billing periods aggregate over.
#[derive(Debug, Clone)]
pub struct AttendanceRecord {
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
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Due,
    Partial,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Due => "Due",
            InvoiceStatus::Partial => "Partial",
            InvoiceStatus::Paid => "Paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Due" => Some(InvoiceStatus::Due),
            "Partial" => Some(InvoiceStatus::Partial),
            "Paid" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }

    /// Status implied by how much of the total has been received.
    pub fn from_payment(total_minor: i64, paid_minor: i64) -> Self {
        if paid_minor >= total_minor {
            InvoiceStatus::Paid
        } else if paid_minor > 0 {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Due
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Due,
    Paid,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Due => "Due",
            ReceiptStatus::Paid => "Paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Due" => Some(ReceiptStatus::Due),
            "Paid" => Some(ReceiptStatus::Paid),
            _ => None,
        }
    }
}

/// An invoice issued to a student's family for one billing period.
#[derive(Debug, Clone)]
pub struct StudentInvoice {
    pub id: Uuid,
    pub student_id: Uuid,
    pub invoice_number: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_classes: i64,
    pub total_amount_minor: i64,
    pub status: InvoiceStatus,
    pub amount_paid_minor: i64,
    pub generated_at: DateTime<Utc>,
}

/// A payment receipt owed to a tutor for one payment period.
#[derive(Debug, Clone)]
pub struct TutorReceipt {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub receipt_number: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_classes: i64,
    pub total_earnings_minor: i64,
    pub status: ReceiptStatus,
    pub generated_at: DateTime<Utc>,
}

pub fn student_invoice_number(generated_at: DateTime<Utc>, student_id: Uuid, invoice_id: Uuid) -> String {
    format!("INV-{}-{}-{}", generated_at.format("%Y%m"), student_id, invoice_id)
}

pub fn tutor_receipt_number(generated_at: DateTime<Utc>, tutor_id: Uuid, receipt_id: Uuid) -> String {
    format!("REC-{}-{}-{}", generated_at.format("%Y%m"), tutor_id, receipt_id)
}

// Represents a staff or tutor login account - used throughout app
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub username: String,
    pub hashed_password: String,
    pub role: Role,
    pub is_active: bool,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Aggregate money figures shown on the dashboard, all in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BillingTotals {
    pub collected_revenue_minor: i64,
    pub pending_revenue_minor: i64,
    pub paid_payout_minor: i64,
    pub pending_payout_minor: i64,
    pub active_students: i64,
    pub active_tutors: i64,
    pub invoice_count: i64,
    pub receipt_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn student_with_start(start: NaiveDate) -> Student {
        Student {
            id: Uuid::new_v4(),
            full_name: "Asha Rao".to_string(),
            parent_name: "Vikram Rao".to_string(),
            parent_whatsapp: "+919800000001".to_string(),
            class_level: "Grade 8".to_string(),
            subjects: vec!["Maths".to_string()],
            per_class_fee_minor: 50_000,
            billing_start_date: start,
            status: StudentStatus::Active,
        }
    }

    #[test]
    fn student_due_exactly_on_cycle_boundary() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let student = student_with_start(start);

        assert_eq!(student.next_billing_date(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert!(!student.is_billing_due(NaiveDate::from_ymd_opt(2024, 1, 30).unwrap()));
        assert!(student.is_billing_due(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));
        assert!(student.is_billing_due(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()));
    }

    #[test]
    fn student_period_is_inclusive_and_thirty_days_long() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let period = student_with_start(start).current_billing_period();

        assert_eq!(period.start_date, start);
        assert_eq!(period.end_date, NaiveDate::from_ymd_opt(2024, 1, 30).unwrap());
        assert_eq!((period.end_date - period.start_date).num_days() + 1, STUDENT_CYCLE_DAYS);
    }

    #[test]
    fn tutor_runs_on_a_forty_day_clock() {
        let tutor = Tutor {
            id: Uuid::new_v4(),
            user_id: None,
            full_name: "Priya Nair".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1995, 3, 7),
            mobile: "+919800000002".to_string(),
            upi_id: None,
            username: "Priya0703".to_string(),
            billing_start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            status: TutorStatus::Active,
        };

        assert_eq!(tutor.next_payment_date(), NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
        assert!(!tutor.is_payment_due(NaiveDate::from_ymd_opt(2024, 2, 9).unwrap()));
        assert!(tutor.is_payment_due(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()));
        assert_eq!(
            tutor.current_payment_period().end_date,
            NaiveDate::from_ymd_opt(2024, 2, 9).unwrap()
        );
    }

    #[test]
    fn future_start_date_is_never_due() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let student = student_with_start(today + Duration::days(10));
        assert!(!student.is_billing_due(today));
    }

    #[test]
    fn tutor_username_uses_first_name_and_birth_day_month() {
        let dob = NaiveDate::from_ymd_opt(1995, 3, 7).unwrap();
        assert_eq!(tutor_username("Priya Nair", dob), "Priya0703");
        assert_eq!(tutor_username("Ravi", dob), "Ravi0703");
    }

    #[test]
    fn document_numbers_embed_month_and_both_ids() {
        let at = Utc.with_ymd_and_hms(2024, 2, 10, 8, 30, 0).unwrap();
        let student_id = Uuid::new_v4();
        let invoice_id = Uuid::new_v4();

        let number = student_invoice_number(at, student_id, invoice_id);
        assert_eq!(number, format!("INV-202402-{}-{}", student_id, invoice_id));

        let receipt = tutor_receipt_number(at, student_id, invoice_id);
        assert!(receipt.starts_with("REC-202402-"));
    }

    #[test]
    fn payment_status_follows_amount_received() {
        assert_eq!(InvoiceStatus::from_payment(150_000, 0), InvoiceStatus::Due);
        assert_eq!(InvoiceStatus::from_payment(150_000, 50_000), InvoiceStatus::Partial);
        assert_eq!(InvoiceStatus::from_payment(150_000, 150_000), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::from_payment(150_000, 200_000), InvoiceStatus::Paid);
    }
}
