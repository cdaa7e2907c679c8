#![allow(dead_code)]

//! In-memory stand-in for the database port, used by the billing tests.
//! It mirrors the real adapter's atomicity contract: document insertion
//! and the billing clock advance happen under one lock, and an injected
//! failure leaves both untouched.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use tuition_center_core::domain::{
    AttendanceRecord, AuthSession, BillingPeriod, BillingTotals, InvoiceStatus, ReceiptStatus,
    Student, StudentInvoice, StudentStatus, Tutor, TutorReceipt, TutorStatus, UserAccount,
    UserCredentials,
};
use tuition_center_core::ports::{
    DatabaseService, NewAttendance, NewStudent, NewStudentInvoice, NewTutor, NewTutorReceipt,
    NewUserAccount, PortError, PortResult, StudentUpdate, TutorUpdate,
};

#[derive(Default)]
struct State {
    accounts: Vec<UserAccount>,
    credentials: Vec<UserCredentials>,
    sessions: HashMap<String, AuthSession>,
    students: HashMap<Uuid, Student>,
    tutors: HashMap<Uuid, Tutor>,
    pair_rates: HashMap<(Uuid, Uuid), i64>,
    attendance: Vec<AttendanceRecord>,
    invoices: Vec<StudentInvoice>,
    receipts: Vec<TutorReceipt>,
    fail_invoice_insert_for: Vec<Uuid>,
    fail_receipt_insert_for: Vec<Uuid>,
}

pub struct InMemoryDb {
    state: Mutex<State>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        InMemoryDb {
            state: Mutex::new(State::default()),
        }
    }

    pub fn insert_student(&self, student: Student) {
        self.state.lock().unwrap().students.insert(student.id, student);
    }

    pub fn insert_tutor(&self, tutor: Tutor) {
        self.state.lock().unwrap().tutors.insert(tutor.id, tutor);
    }

    pub fn set_pair_rate(&self, student_id: Uuid, tutor_id: Uuid, pay_per_class_minor: i64) {
        self.state
            .lock()
            .unwrap()
            .pair_rates
            .insert((student_id, tutor_id), pay_per_class_minor);
    }

    /// Records one taught class on the given calendar date.
    pub fn add_class(&self, student_id: Uuid, tutor_id: Uuid, date: NaiveDate) {
        let start = date.and_hms_opt(10, 0, 0).unwrap().and_utc();
        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            student_id,
            tutor_id,
            subject: "Maths".to_string(),
            start_time: start,
            end_time: start + Duration::minutes(60),
            duration_minutes: 60,
            rating: 8,
            remarks: None,
            date_recorded: date,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().attendance.push(record);
    }

    /// Makes every invoice insert for this student fail until cleared.
    pub fn fail_invoice_insert(&self, student_id: Uuid) {
        self.state.lock().unwrap().fail_invoice_insert_for.push(student_id);
    }

    pub fn fail_receipt_insert(&self, tutor_id: Uuid) {
        self.state.lock().unwrap().fail_receipt_insert_for.push(tutor_id);
    }

    pub fn student(&self, student_id: Uuid) -> Student {
        self.state.lock().unwrap().students[&student_id].clone()
    }

    pub fn tutor(&self, tutor_id: Uuid) -> Tutor {
        self.state.lock().unwrap().tutors[&tutor_id].clone()
    }

    pub fn stored_invoices(&self) -> Vec<StudentInvoice> {
        self.state.lock().unwrap().invoices.clone()
    }

    pub fn stored_receipts(&self) -> Vec<TutorReceipt> {
        self.state.lock().unwrap().receipts.clone()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        self.state
            .lock()
            .unwrap()
            .credentials
            .iter()
            .find(|c| c.username == username)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("user {}", username)))
    }

    async fn get_user_account(&self, user_id: Uuid) -> PortResult<UserAccount> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .iter()
            .find(|a| a.id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("user {}", user_id)))
    }

    async fn list_user_accounts(&self) -> PortResult<Vec<UserAccount>> {
        Ok(self.state.lock().unwrap().accounts.clone())
    }

    async fn create_user_account(&self, new_user: NewUserAccount) -> PortResult<UserAccount> {
        let mut state = self.state.lock().unwrap();
        if state.credentials.iter().any(|c| c.username == new_user.username) {
            return Err(PortError::Conflict(format!("username {}", new_user.username)));
        }
        let account = UserAccount {
            id: new_user.id,
            username: new_user.username.clone(),
            full_name: new_user.full_name,
            email: new_user.email,
            mobile: new_user.mobile,
            role: new_user.role,
            is_active: true,
            last_login: None,
        };
        state.credentials.push(UserCredentials {
            user_id: new_user.id,
            username: new_user.username,
            hashed_password: new_user.hashed_password,
            role: new_user.role,
            is_active: true,
        });
        state.accounts.push(account.clone());
        Ok(account)
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(account) = state.accounts.iter_mut().find(|a| a.id == user_id) {
            account.last_login = Some(at);
        }
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.state.lock().unwrap().sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let state = self.state.lock().unwrap();
        match state.sessions.get(session_id) {
            Some(session) if session.expires_at > Utc::now() => Ok(session.user_id),
            _ => Err(PortError::NotFound("Invalid or expired session".to_string())),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.state.lock().unwrap().sessions.remove(session_id);
        Ok(())
    }

    async fn list_students(&self) -> PortResult<Vec<Student>> {
        Ok(self.state.lock().unwrap().students.values().cloned().collect())
    }

    async fn list_active_students(&self) -> PortResult<Vec<Student>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .students
            .values()
            .filter(|s| s.status == StudentStatus::Active)
            .cloned()
            .collect())
    }

    async fn get_student(&self, student_id: Uuid) -> PortResult<Student> {
        self.state
            .lock()
            .unwrap()
            .students
            .get(&student_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("student {}", student_id)))
    }

    async fn create_student(
        &self,
        new_student: NewStudent,
        assignments: Vec<tuition_center_core::domain::TutorAssignment>,
    ) -> PortResult<Student> {
        let student = Student {
            id: new_student.id,
            full_name: new_student.full_name,
            parent_name: new_student.parent_name,
            parent_whatsapp: new_student.parent_whatsapp,
            class_level: new_student.class_level,
            subjects: new_student.subjects,
            per_class_fee_minor: new_student.per_class_fee_minor,
            billing_start_date: new_student.billing_start_date,
            status: StudentStatus::Active,
        };
        let mut state = self.state.lock().unwrap();
        for a in assignments {
            state.pair_rates.insert((student.id, a.tutor_id), a.pay_per_class_minor);
        }
        state.students.insert(student.id, student.clone());
        Ok(student)
    }

    async fn update_student(
        &self,
        student_id: Uuid,
        update: StudentUpdate,
        assignments: Vec<tuition_center_core::domain::TutorAssignment>,
    ) -> PortResult<Student> {
        let mut state = self.state.lock().unwrap();
        state.pair_rates.retain(|(sid, _), _| *sid != student_id);
        for a in assignments {
            state.pair_rates.insert((student_id, a.tutor_id), a.pay_per_class_minor);
        }
        let student = state
            .students
            .get_mut(&student_id)
            .ok_or_else(|| PortError::NotFound(format!("student {}", student_id)))?;
        student.full_name = update.full_name;
        student.parent_name = update.parent_name;
        student.parent_whatsapp = update.parent_whatsapp;
        student.class_level = update.class_level;
        student.subjects = update.subjects;
        student.per_class_fee_minor = update.per_class_fee_minor;
        student.status = update.status;
        Ok(student.clone())
    }

    async fn assignments_for_student(
        &self,
        student_id: Uuid,
    ) -> PortResult<Vec<tuition_center_core::domain::TutorAssignment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .pair_rates
            .iter()
            .filter(|((sid, _), _)| *sid == student_id)
            .map(|((_, tid), rate)| tuition_center_core::domain::TutorAssignment {
                tutor_id: *tid,
                pay_per_class_minor: *rate,
            })
            .collect())
    }

    async fn students_for_tutor(&self, tutor_id: Uuid) -> PortResult<Vec<Student>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .pair_rates
            .keys()
            .filter(|(_, tid)| *tid == tutor_id)
            .filter_map(|(sid, _)| state.students.get(sid).cloned())
            .collect())
    }

    async fn list_tutors(&self) -> PortResult<Vec<Tutor>> {
        Ok(self.state.lock().unwrap().tutors.values().cloned().collect())
    }

    async fn list_active_tutors(&self) -> PortResult<Vec<Tutor>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tutors
            .values()
            .filter(|t| t.status == TutorStatus::Active)
            .cloned()
            .collect())
    }

    async fn get_tutor(&self, tutor_id: Uuid) -> PortResult<Tutor> {
        self.state
            .lock()
            .unwrap()
            .tutors
            .get(&tutor_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("tutor {}", tutor_id)))
    }

    async fn get_tutor_by_user(&self, user_id: Uuid) -> PortResult<Option<Tutor>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tutors
            .values()
            .find(|t| t.user_id == Some(user_id))
            .cloned())
    }

    async fn create_tutor(&self, new_tutor: NewTutor, login: NewUserAccount) -> PortResult<Tutor> {
        let mut state = self.state.lock().unwrap();
        if state.credentials.iter().any(|c| c.username == login.username) {
            return Err(PortError::Conflict(format!("username {}", login.username)));
        }
        let tutor = Tutor {
            id: new_tutor.id,
            user_id: Some(login.id),
            full_name: new_tutor.full_name,
            date_of_birth: new_tutor.date_of_birth,
            mobile: new_tutor.mobile,
            upi_id: new_tutor.upi_id,
            username: new_tutor.username,
            billing_start_date: new_tutor.billing_start_date,
            status: TutorStatus::Active,
        };
        state.credentials.push(UserCredentials {
            user_id: login.id,
            username: login.username.clone(),
            hashed_password: login.hashed_password,
            role: login.role,
            is_active: true,
        });
        state.accounts.push(UserAccount {
            id: login.id,
            username: login.username,
            full_name: login.full_name,
            email: login.email,
            mobile: login.mobile,
            role: login.role,
            is_active: true,
            last_login: None,
        });
        state.tutors.insert(tutor.id, tutor.clone());
        Ok(tutor)
    }

    async fn update_tutor(&self, tutor_id: Uuid, update: TutorUpdate) -> PortResult<Tutor> {
        let mut state = self.state.lock().unwrap();
        let tutor = state
            .tutors
            .get_mut(&tutor_id)
            .ok_or_else(|| PortError::NotFound(format!("tutor {}", tutor_id)))?;
        tutor.full_name = update.full_name;
        tutor.date_of_birth = update.date_of_birth;
        tutor.mobile = update.mobile;
        tutor.upi_id = update.upi_id;
        tutor.status = update.status;
        Ok(tutor.clone())
    }

    async fn record_attendance(&self, new_record: NewAttendance) -> PortResult<AttendanceRecord> {
        let record = AttendanceRecord {
            id: new_record.id,
            student_id: new_record.student_id,
            tutor_id: new_record.tutor_id,
            subject: new_record.subject,
            start_time: new_record.start_time,
            end_time: new_record.end_time,
            duration_minutes: new_record.duration_minutes,
            rating: new_record.rating,
            remarks: new_record.remarks,
            date_recorded: new_record.date_recorded,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().attendance.push(record.clone());
        Ok(record)
    }

    async fn count_student_attendance(
        &self,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .attendance
            .iter()
            .filter(|r| r.student_id == student_id && r.date_recorded >= from && r.date_recorded <= to)
            .count() as i64)
    }

    async fn tutor_attendance_between(
        &self,
        tutor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<AttendanceRecord>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .attendance
            .iter()
            .filter(|r| r.tutor_id == tutor_id && r.date_recorded >= from && r.date_recorded <= to)
            .cloned()
            .collect())
    }

    async fn recent_attendance_for_student(
        &self,
        student_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<AttendanceRecord>> {
        let mut records: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .attendance
            .iter()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| std::cmp::Reverse(r.start_time));
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn recent_attendance_for_tutor(
        &self,
        tutor_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<AttendanceRecord>> {
        let mut records: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .attendance
            .iter()
            .filter(|r| r.tutor_id == tutor_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| std::cmp::Reverse(r.start_time));
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn pair_pay_rate(&self, student_id: Uuid, tutor_id: Uuid) -> PortResult<Option<i64>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .pair_rates
            .get(&(student_id, tutor_id))
            .copied())
    }

    async fn find_student_invoice_for_period(
        &self,
        student_id: Uuid,
        period: BillingPeriod,
    ) -> PortResult<Option<StudentInvoice>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .invoices
            .iter()
            .find(|i| {
                i.student_id == student_id
                    && i.start_date == period.start_date
                    && i.end_date == period.end_date
            })
            .cloned())
    }

    async fn insert_student_invoice(
        &self,
        new_invoice: NewStudentInvoice,
    ) -> PortResult<StudentInvoice> {
        let mut state = self.state.lock().unwrap();
        if state.fail_invoice_insert_for.contains(&new_invoice.student_id) {
            return Err(PortError::Unexpected("injected storage failure".to_string()));
        }
        if let Some(existing) = state.invoices.iter().find(|i| {
            i.student_id == new_invoice.student_id
                && i.start_date == new_invoice.period.start_date
                && i.end_date == new_invoice.period.end_date
        }) {
            return Ok(existing.clone());
        }
        let advance_to = new_invoice.period.end_date + Duration::days(1);
        match state.students.get_mut(&new_invoice.student_id) {
            Some(student) => student.billing_start_date = advance_to,
            None => return Err(PortError::NotFound(format!("student {}", new_invoice.student_id))),
        }
        let invoice = StudentInvoice {
            id: new_invoice.id,
            student_id: new_invoice.student_id,
            invoice_number: new_invoice.invoice_number,
            start_date: new_invoice.period.start_date,
            end_date: new_invoice.period.end_date,
            total_classes: new_invoice.total_classes,
            total_amount_minor: new_invoice.total_amount_minor,
            status: InvoiceStatus::Due,
            amount_paid_minor: 0,
            generated_at: new_invoice.generated_at,
        };
        state.invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn find_tutor_receipt_for_period(
        &self,
        tutor_id: Uuid,
        period: BillingPeriod,
    ) -> PortResult<Option<TutorReceipt>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .receipts
            .iter()
            .find(|r| {
                r.tutor_id == tutor_id
                    && r.start_date == period.start_date
                    && r.end_date == period.end_date
            })
            .cloned())
    }

    async fn insert_tutor_receipt(&self, new_receipt: NewTutorReceipt) -> PortResult<TutorReceipt> {
        let mut state = self.state.lock().unwrap();
        if state.fail_receipt_insert_for.contains(&new_receipt.tutor_id) {
            return Err(PortError::Unexpected("injected storage failure".to_string()));
        }
        if let Some(existing) = state.receipts.iter().find(|r| {
            r.tutor_id == new_receipt.tutor_id
                && r.start_date == new_receipt.period.start_date
                && r.end_date == new_receipt.period.end_date
        }) {
            return Ok(existing.clone());
        }
        let advance_to = new_receipt.period.end_date + Duration::days(1);
        match state.tutors.get_mut(&new_receipt.tutor_id) {
            Some(tutor) => tutor.billing_start_date = advance_to,
            None => return Err(PortError::NotFound(format!("tutor {}", new_receipt.tutor_id))),
        }
        let receipt = TutorReceipt {
            id: new_receipt.id,
            tutor_id: new_receipt.tutor_id,
            receipt_number: new_receipt.receipt_number,
            start_date: new_receipt.period.start_date,
            end_date: new_receipt.period.end_date,
            total_classes: new_receipt.total_classes,
            total_earnings_minor: new_receipt.total_earnings_minor,
            status: ReceiptStatus::Due,
            generated_at: new_receipt.generated_at,
        };
        state.receipts.push(receipt.clone());
        Ok(receipt)
    }

    async fn get_student_invoice(&self, invoice_id: Uuid) -> PortResult<StudentInvoice> {
        self.state
            .lock()
            .unwrap()
            .invoices
            .iter()
            .find(|i| i.id == invoice_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("invoice {}", invoice_id)))
    }

    async fn get_tutor_receipt(&self, receipt_id: Uuid) -> PortResult<TutorReceipt> {
        self.state
            .lock()
            .unwrap()
            .receipts
            .iter()
            .find(|r| r.id == receipt_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("receipt {}", receipt_id)))
    }

    async fn list_student_invoices(&self) -> PortResult<Vec<StudentInvoice>> {
        Ok(self.state.lock().unwrap().invoices.clone())
    }

    async fn list_tutor_receipts(&self) -> PortResult<Vec<TutorReceipt>> {
        Ok(self.state.lock().unwrap().receipts.clone())
    }

    async fn invoices_for_student(
        &self,
        student_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<StudentInvoice>> {
        let mut invoices: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .invoices
            .iter()
            .filter(|i| i.student_id == student_id)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| std::cmp::Reverse(i.start_date));
        invoices.truncate(limit as usize);
        Ok(invoices)
    }

    async fn receipts_for_tutor(&self, tutor_id: Uuid, limit: i64) -> PortResult<Vec<TutorReceipt>> {
        let mut receipts: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .receipts
            .iter()
            .filter(|r| r.tutor_id == tutor_id)
            .cloned()
            .collect();
        receipts.sort_by_key(|r| std::cmp::Reverse(r.start_date));
        receipts.truncate(limit as usize);
        Ok(receipts)
    }

    async fn record_invoice_payment(
        &self,
        invoice_id: Uuid,
        amount_paid_minor: i64,
    ) -> PortResult<StudentInvoice> {
        let mut state = self.state.lock().unwrap();
        let invoice = state
            .invoices
            .iter_mut()
            .find(|i| i.id == invoice_id)
            .ok_or_else(|| PortError::NotFound(format!("invoice {}", invoice_id)))?;
        invoice.amount_paid_minor = amount_paid_minor;
        invoice.status = InvoiceStatus::from_payment(invoice.total_amount_minor, amount_paid_minor);
        Ok(invoice.clone())
    }

    async fn mark_receipt_paid(&self, receipt_id: Uuid) -> PortResult<TutorReceipt> {
        let mut state = self.state.lock().unwrap();
        let receipt = state
            .receipts
            .iter_mut()
            .find(|r| r.id == receipt_id)
            .ok_or_else(|| PortError::NotFound(format!("receipt {}", receipt_id)))?;
        receipt.status = ReceiptStatus::Paid;
        Ok(receipt.clone())
    }

    async fn billing_totals(&self) -> PortResult<BillingTotals> {
        let state = self.state.lock().unwrap();
        let mut totals = BillingTotals::default();
        for invoice in &state.invoices {
            totals.collected_revenue_minor += invoice.amount_paid_minor;
            totals.pending_revenue_minor += invoice.total_amount_minor - invoice.amount_paid_minor;
            totals.invoice_count += 1;
        }
        for receipt in &state.receipts {
            match receipt.status {
                ReceiptStatus::Paid => totals.paid_payout_minor += receipt.total_earnings_minor,
                ReceiptStatus::Due => totals.pending_payout_minor += receipt.total_earnings_minor,
            }
            totals.receipt_count += 1;
        }
        totals.active_students =
            state.students.values().filter(|s| s.status == StudentStatus::Active).count() as i64;
        totals.active_tutors =
            state.tutors.values().filter(|t| t.status == TutorStatus::Active).count() as i64;
        Ok(totals)
    }
}

/// An active student whose billing clock starts at `start`.
pub fn sample_student(start: NaiveDate, per_class_fee_minor: i64) -> Student {
    Student {
        id: Uuid::new_v4(),
        full_name: "Asha Rao".to_string(),
        parent_name: "Vikram Rao".to_string(),
        parent_whatsapp: "+919800000001".to_string(),
        class_level: "Grade 8".to_string(),
        subjects: vec!["Maths".to_string(), "Physics".to_string()],
        per_class_fee_minor,
        billing_start_date: start,
        status: StudentStatus::Active,
    }
}

/// An active tutor whose payment clock starts at `start`.
pub fn sample_tutor(start: NaiveDate) -> Tutor {
    Tutor {
        id: Uuid::new_v4(),
        user_id: None,
        full_name: "Priya Nair".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1995, 3, 7),
        mobile: "+919800000002".to_string(),
        upi_id: Some("priya@upi".to_string()),
        username: "Priya0703".to_string(),
        billing_start_date: start,
        status: TutorStatus::Active,
    }
}
