//! Integration tests for the billing cycle engine, run against the
//! in-memory database fake in `common`.

mod common;

use chrono::{Duration, NaiveDate, TimeZone, Utc};

use common::{sample_student, sample_tutor, InMemoryDb};
use tuition_center_core::billing::{
    generate_student_invoice, generate_tutor_receipt, run_billing_sweep,
};
use tuition_center_core::domain::StudentStatus;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// Fixed "today" so due-ness is deterministic.
fn today() -> NaiveDate {
    day(2024, 6, 15)
}

#[tokio::test]
async fn generating_twice_for_one_period_returns_the_first_invoice() {
    let db = InMemoryDb::new();
    let student = sample_student(today() - Duration::days(40), 50_000);
    db.insert_student(student.clone());

    let now = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
    let first = generate_student_invoice(&db, &student, now).await.unwrap();
    let second = generate_student_invoice(&db, &student, now + Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.invoice_number, second.invoice_number);
    assert_eq!(db.stored_invoices().len(), 1);
}

#[tokio::test]
async fn receipt_generation_is_idempotent_too() {
    let db = InMemoryDb::new();
    let tutor = sample_tutor(today() - Duration::days(50));
    db.insert_tutor(tutor.clone());

    let now = Utc::now();
    let first = generate_tutor_receipt(&db, &tutor, now).await.unwrap();
    let second = generate_tutor_receipt(&db, &tutor, now).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(db.stored_receipts().len(), 1);
}

#[tokio::test]
async fn sweep_issues_nothing_before_a_cycle_has_elapsed() {
    let db = InMemoryDb::new();
    let student = sample_student(today() - Duration::days(29), 50_000);
    let tutor = sample_tutor(today() - Duration::days(39));
    db.insert_student(student);
    db.insert_tutor(tutor);

    let summary = run_billing_sweep(&db, today()).await;

    assert_eq!(summary.invoices_issued, 0);
    assert_eq!(summary.receipts_issued, 0);
    assert_eq!(summary.failures, 0);
    assert!(db.stored_invoices().is_empty());
    assert!(db.stored_receipts().is_empty());
}

#[tokio::test]
async fn sweep_bills_due_entities_and_advances_their_clocks() {
    let db = InMemoryDb::new();
    let start = today() - Duration::days(30);
    let student = sample_student(start, 50_000);
    let student_id = student.id;
    db.insert_student(student);

    let summary = run_billing_sweep(&db, today()).await;
    assert_eq!(summary.invoices_issued, 1);

    let invoices = db.stored_invoices();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].start_date, start);
    assert_eq!(invoices[0].end_date, today() - Duration::days(1));

    // Clock moves to the day after the invoiced period.
    assert_eq!(db.student(student_id).billing_start_date, today());

    // A second sweep on the same day finds nothing due.
    let again = run_billing_sweep(&db, today()).await;
    assert_eq!(again.invoices_issued, 0);
    assert_eq!(db.stored_invoices().len(), 1);
}

#[tokio::test]
async fn entity_far_behind_catches_up_one_period_per_sweep() {
    let db = InMemoryDb::new();
    let start = today() - Duration::days(95);
    let student = sample_student(start, 50_000);
    let student_id = student.id;
    db.insert_student(student);

    for _ in 0..3 {
        run_billing_sweep(&db, today()).await;
    }
    // Three full 30-day periods fit between start and today; a fourth sweep
    // finds the clock inside the current, unfinished cycle.
    let summary = run_billing_sweep(&db, today()).await;
    assert_eq!(summary.invoices_issued, 0);

    let mut invoices = db.stored_invoices();
    invoices.sort_by_key(|i| i.start_date);
    assert_eq!(invoices.len(), 3);
    for pair in invoices.windows(2) {
        assert_eq!(pair[0].end_date + Duration::days(1), pair[1].start_date);
    }
    assert_eq!(db.student(student_id).billing_start_date, start + Duration::days(90));
}

#[tokio::test]
async fn invoice_totals_multiply_attended_classes_by_the_fee() {
    let db = InMemoryDb::new();
    let student = sample_student(today() - Duration::days(30), 500);
    let tutor = sample_tutor(today());
    db.insert_student(student.clone());
    db.insert_tutor(tutor.clone());

    // Three classes inside the period, one on the day after it ends.
    db.add_class(student.id, tutor.id, today() - Duration::days(20));
    db.add_class(student.id, tutor.id, today() - Duration::days(15));
    db.add_class(student.id, tutor.id, today() - Duration::days(1));
    db.add_class(student.id, tutor.id, today());

    let invoice = generate_student_invoice(&db, &student, Utc::now()).await.unwrap();

    assert_eq!(invoice.total_classes, 3);
    assert_eq!(invoice.total_amount_minor, 1_500);
}

#[tokio::test]
async fn period_with_no_attendance_yields_a_zero_invoice() {
    let db = InMemoryDb::new();
    let student = sample_student(today() - Duration::days(31), 50_000);
    let student_id = student.id;
    db.insert_student(student.clone());

    let invoice = generate_student_invoice(&db, &student, Utc::now()).await.unwrap();

    assert_eq!(invoice.total_classes, 0);
    assert_eq!(invoice.total_amount_minor, 0);
    // The clock still advances so the next period can begin.
    assert_eq!(
        db.student(student_id).billing_start_date,
        invoice.end_date + Duration::days(1)
    );
}

#[tokio::test]
async fn receipt_earnings_use_the_rate_of_each_pairing() {
    let db = InMemoryDb::new();
    let tutor = sample_tutor(today() - Duration::days(40));
    let student_a = sample_student(today(), 50_000);
    let student_b = sample_student(today(), 60_000);
    db.insert_tutor(tutor.clone());
    db.insert_student(student_a.clone());
    db.insert_student(student_b.clone());
    db.set_pair_rate(student_a.id, tutor.id, 300);
    db.set_pair_rate(student_b.id, tutor.id, 400);

    db.add_class(student_a.id, tutor.id, today() - Duration::days(30));
    db.add_class(student_b.id, tutor.id, today() - Duration::days(10));

    let receipt = generate_tutor_receipt(&db, &tutor, Utc::now()).await.unwrap();

    assert_eq!(receipt.total_classes, 2);
    assert_eq!(receipt.total_earnings_minor, 700);
}

#[tokio::test]
async fn unassigned_pairing_earns_zero_instead_of_failing() {
    let db = InMemoryDb::new();
    let tutor = sample_tutor(today() - Duration::days(40));
    let rated = sample_student(today(), 50_000);
    let unrated = sample_student(today(), 50_000);
    db.insert_tutor(tutor.clone());
    db.insert_student(rated.clone());
    db.insert_student(unrated.clone());
    db.set_pair_rate(rated.id, tutor.id, 300);

    db.add_class(rated.id, tutor.id, today() - Duration::days(20));
    db.add_class(unrated.id, tutor.id, today() - Duration::days(20));

    let receipt = generate_tutor_receipt(&db, &tutor, Utc::now()).await.unwrap();

    assert_eq!(receipt.total_classes, 2);
    assert_eq!(receipt.total_earnings_minor, 300);
}

#[tokio::test]
async fn failed_insert_leaves_the_billing_clock_untouched() {
    let db = InMemoryDb::new();
    let start = today() - Duration::days(35);
    let student = sample_student(start, 50_000);
    let student_id = student.id;
    db.insert_student(student.clone());
    db.fail_invoice_insert(student_id);

    let result = generate_student_invoice(&db, &student, Utc::now()).await;

    assert!(result.is_err());
    assert!(db.stored_invoices().is_empty());
    assert_eq!(db.student(student_id).billing_start_date, start);
}

#[tokio::test]
async fn one_failing_entity_does_not_stall_the_sweep() {
    let db = InMemoryDb::new();
    let broken_start = today() - Duration::days(33);
    let broken = sample_student(broken_start, 50_000);
    let healthy = sample_student(today() - Duration::days(32), 50_000);
    let tutor = sample_tutor(today() - Duration::days(44));
    let broken_id = broken.id;
    let healthy_id = healthy.id;
    db.insert_student(broken);
    db.insert_student(healthy);
    db.insert_tutor(tutor);
    db.fail_invoice_insert(broken_id);

    let summary = run_billing_sweep(&db, today()).await;

    assert_eq!(summary.invoices_issued, 1);
    assert_eq!(summary.receipts_issued, 1);
    assert_eq!(summary.failures, 1);

    let invoices = db.stored_invoices();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].student_id, healthy_id);
    // The failed student is untouched and will be retried next sweep.
    assert_eq!(db.student(broken_id).billing_start_date, broken_start);
}

#[tokio::test]
async fn sweep_ignores_students_who_are_not_active() {
    let db = InMemoryDb::new();
    let mut student = sample_student(today() - Duration::days(60), 50_000);
    student.status = StudentStatus::Graduated;
    db.insert_student(student);

    let summary = run_billing_sweep(&db, today()).await;

    assert_eq!(summary.invoices_issued, 0);
    assert!(db.stored_invoices().is_empty());
}
