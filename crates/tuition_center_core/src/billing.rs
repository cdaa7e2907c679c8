//! crates/tuition_center_core/src/billing.rs
//!
//! The billing cycle engine. Every student and tutor carries a personal
//! billing clock (`billing_start_date`); once a full cycle has elapsed,
//! the engine aggregates attendance over the finished period into an
//! invoice or receipt and moves the clock to the day after the period.
//!
//! Generation is idempotent per (entity, period), and the storage port
//! is required to persist the document and the clock advance atomically,
//! so a failed generation leaves the entity exactly as it was and is
//! simply retried on the next sweep.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::{
    student_invoice_number, tutor_receipt_number, Student, StudentInvoice, Tutor, TutorReceipt,
};
use crate::ports::{DatabaseService, NewStudentInvoice, NewTutorReceipt, PortResult};

/// Outcome counts of one billing sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub invoices_issued: u32,
    pub receipts_issued: u32,
    pub failures: u32,
}

/// Walks every active student and tutor and issues whatever documents
/// have come due as of `today`.
///
/// Each entity is processed independently: one failure is logged and
/// counted, never propagated, so a single bad record cannot stall
/// billing for everyone else. An entity more than one cycle behind is
/// caught up one period per sweep.
pub async fn run_billing_sweep(db: &dyn DatabaseService, today: NaiveDate) -> SweepSummary {
    let mut summary = SweepSummary::default();

    match db.list_active_students().await {
        Ok(students) => {
            for student in &students {
                if !student.is_billing_due(today) {
                    continue;
                }
                match generate_student_invoice(db, student, Utc::now()).await {
                    Ok(invoice) => {
                        info!(
                            student = %student.full_name,
                            number = %invoice.invoice_number,
                            classes = invoice.total_classes,
                            "issued student invoice"
                        );
                        summary.invoices_issued += 1;
                    }
                    Err(e) => {
                        error!(student_id = %student.id, error = %e, "student invoice generation failed");
                        summary.failures += 1;
                    }
                }
            }
        }
        Err(e) => {
            error!(error = %e, "could not scan students for billing");
            summary.failures += 1;
        }
    }

    match db.list_active_tutors().await {
        Ok(tutors) => {
            for tutor in &tutors {
                if !tutor.is_payment_due(today) {
                    continue;
                }
                match generate_tutor_receipt(db, tutor, Utc::now()).await {
                    Ok(receipt) => {
                        info!(
                            tutor = %tutor.full_name,
                            number = %receipt.receipt_number,
                            classes = receipt.total_classes,
                            "issued tutor receipt"
                        );
                        summary.receipts_issued += 1;
                    }
                    Err(e) => {
                        error!(tutor_id = %tutor.id, error = %e, "tutor receipt generation failed");
                        summary.failures += 1;
                    }
                }
            }
        }
        Err(e) => {
            error!(error = %e, "could not scan tutors for billing");
            summary.failures += 1;
        }
    }

    summary
}

/// Issues the invoice for the student's current billing period.
///
/// If that period is already invoiced, the existing invoice is returned
/// and nothing changes. Otherwise the total is classes attended in the
/// period times the student's per-class fee; a period with no attendance
/// still yields a zero-amount invoice so the cycle keeps advancing.
pub async fn generate_student_invoice(
    db: &dyn DatabaseService,
    student: &Student,
    generated_at: DateTime<Utc>,
) -> PortResult<StudentInvoice> {
    let period = student.current_billing_period();

    if let Some(existing) = db.find_student_invoice_for_period(student.id, period).await? {
        debug!(student_id = %student.id, number = %existing.invoice_number, "period already invoiced");
        return Ok(existing);
    }

    let total_classes = db
        .count_student_attendance(student.id, period.start_date, period.end_date)
        .await?;
    let total_amount_minor = total_classes * student.per_class_fee_minor;

    let invoice_id = Uuid::new_v4();
    db.insert_student_invoice(NewStudentInvoice {
        id: invoice_id,
        student_id: student.id,
        invoice_number: student_invoice_number(generated_at, student.id, invoice_id),
        period,
        total_classes,
        total_amount_minor,
        generated_at,
    })
    .await
}

/// Issues the receipt for the tutor's current payment period.
///
/// Earnings are summed per attendance record at the pay rate agreed for
/// that particular student/tutor pairing; a record whose pairing has no
/// rate on file contributes zero rather than failing the receipt.
pub async fn generate_tutor_receipt(
    db: &dyn DatabaseService,
    tutor: &Tutor,
    generated_at: DateTime<Utc>,
) -> PortResult<TutorReceipt> {
    let period = tutor.current_payment_period();

    if let Some(existing) = db.find_tutor_receipt_for_period(tutor.id, period).await? {
        debug!(tutor_id = %tutor.id, number = %existing.receipt_number, "period already receipted");
        return Ok(existing);
    }

    let records = db
        .tutor_attendance_between(tutor.id, period.start_date, period.end_date)
        .await?;

    let mut total_earnings_minor = 0i64;
    for record in &records {
        let rate = db.pair_pay_rate(record.student_id, tutor.id).await?.unwrap_or(0);
        total_earnings_minor += rate;
    }

    let receipt_id = Uuid::new_v4();
    db.insert_tutor_receipt(NewTutorReceipt {
        id: receipt_id,
        tutor_id: tutor.id,
        receipt_number: tutor_receipt_number(generated_at, tutor.id, receipt_id),
        period,
        total_classes: records.len() as i64,
        total_earnings_minor,
        generated_at,
    })
    .await
}
