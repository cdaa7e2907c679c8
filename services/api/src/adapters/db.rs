//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Queries are bound at runtime (no compile-time database check) so the
//! service builds without a reachable database. Billing document inserts
//! run in a transaction that locks the entity row, which is what makes
//! document creation and the clock advance atomic under concurrent logins.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use tuition_center_core::domain::{
    AttendanceRecord, BillingPeriod, BillingTotals, InvoiceStatus, ReceiptStatus, Student,
    StudentInvoice, StudentStatus, Tutor, TutorAssignment, TutorReceipt, TutorStatus, UserAccount,
    UserCredentials,
};
use tuition_center_core::permissions::Role;
use tuition_center_core::ports::{
    DatabaseService, NewAttendance, NewStudent, NewStudentInvoice, NewTutor, NewTutorReceipt,
    NewUserAccount, PortError, PortResult, StudentUpdate, TutorUpdate,
};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

const STUDENT_COLUMNS: &str = "id, full_name, parent_name, parent_whatsapp, class_level, subjects, \
     per_class_fee_minor, billing_start_date, status";

const TUTOR_COLUMNS: &str = "id, user_id, full_name, date_of_birth, mobile, upi_id, username, \
     billing_start_date, status";

const ATTENDANCE_COLUMNS: &str = "id, student_id, tutor_id, subject, start_time, end_time, \
     duration_minutes, rating, remarks, date_recorded, created_at";

const INVOICE_COLUMNS: &str = "id, student_id, invoice_number, start_date, end_date, \
     total_classes, total_amount_minor, status, amount_paid_minor, generated_at";

const RECEIPT_COLUMNS: &str = "id, tutor_id, receipt_number, start_date, end_date, \
     total_classes, total_earnings_minor, status, generated_at";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    username: String,
    hashed_password: String,
    role: String,
    is_active: bool,
}
impl CredentialsRecord {
    fn to_domain(self) -> PortResult<UserCredentials> {
        Ok(UserCredentials {
            user_id: self.id,
            username: self.username,
            hashed_password: self.hashed_password,
            role: parse_role(&self.role)?,
            is_active: self.is_active,
        })
    }
}

#[derive(FromRow)]
struct UserAccountRecord {
    id: Uuid,
    username: String,
    full_name: Option<String>,
    email: Option<String>,
    mobile: Option<String>,
    role: String,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
}
impl UserAccountRecord {
    fn to_domain(self) -> PortResult<UserAccount> {
        Ok(UserAccount {
            id: self.id,
            username: self.username,
            full_name: self.full_name,
            email: self.email,
            mobile: self.mobile,
            role: parse_role(&self.role)?,
            is_active: self.is_active,
            last_login: self.last_login,
        })
    }
}

#[derive(FromRow)]
struct StudentRecord {
    id: Uuid,
    full_name: String,
    parent_name: String,
    parent_whatsapp: String,
    class_level: String,
    subjects: Vec<String>,
    per_class_fee_minor: i64,
    billing_start_date: NaiveDate,
    status: String,
}
impl StudentRecord {
    fn to_domain(self) -> PortResult<Student> {
        let status = StudentStatus::parse(&self.status)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown student status '{}'", self.status)))?;
        Ok(Student {
            id: self.id,
            full_name: self.full_name,
            parent_name: self.parent_name,
            parent_whatsapp: self.parent_whatsapp,
            class_level: self.class_level,
            subjects: self.subjects,
            per_class_fee_minor: self.per_class_fee_minor,
            billing_start_date: self.billing_start_date,
            status,
        })
    }
}

#[derive(FromRow)]
struct TutorRecord {
    id: Uuid,
    user_id: Option<Uuid>,
    full_name: String,
    date_of_birth: Option<NaiveDate>,
    mobile: String,
    upi_id: Option<String>,
    username: String,
    billing_start_date: NaiveDate,
    status: String,
}
impl TutorRecord {
    fn to_domain(self) -> PortResult<Tutor> {
        let status = TutorStatus::parse(&self.status)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown tutor status '{}'", self.status)))?;
        Ok(Tutor {
            id: self.id,
            user_id: self.user_id,
            full_name: self.full_name,
            date_of_birth: self.date_of_birth,
            mobile: self.mobile,
            upi_id: self.upi_id,
            username: self.username,
            billing_start_date: self.billing_start_date,
            status,
        })
    }
}

#[derive(FromRow)]
struct AssignmentRecord {
    tutor_id: Uuid,
    pay_per_class_minor: i64,
}
impl AssignmentRecord {
    fn to_domain(self) -> TutorAssignment {
        TutorAssignment {
            tutor_id: self.tutor_id,
            pay_per_class_minor: self.pay_per_class_minor,
        }
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: Uuid,
    student_id: Uuid,
    tutor_id: Uuid,
    subject: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    duration_minutes: i32,
    rating: i16,
    remarks: Option<String>,
    date_recorded: NaiveDate,
    created_at: DateTime<Utc>,
}
impl AttendanceRow {
    fn to_domain(self) -> AttendanceRecord {
        AttendanceRecord {
            id: self.id,
            student_id: self.student_id,
            tutor_id: self.tutor_id,
            subject: self.subject,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
            rating: self.rating,
            remarks: self.remarks,
            date_recorded: self.date_recorded,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct InvoiceRecord {
    id: Uuid,
    student_id: Uuid,
    invoice_number: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_classes: i64,
    total_amount_minor: i64,
    status: String,
    amount_paid_minor: i64,
    generated_at: DateTime<Utc>,
}
impl InvoiceRecord {
    fn to_domain(self) -> PortResult<StudentInvoice> {
        let status = InvoiceStatus::parse(&self.status)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown invoice status '{}'", self.status)))?;
        Ok(StudentInvoice {
            id: self.id,
            student_id: self.student_id,
            invoice_number: self.invoice_number,
            start_date: self.start_date,
            end_date: self.end_date,
            total_classes: self.total_classes,
            total_amount_minor: self.total_amount_minor,
            status,
            amount_paid_minor: self.amount_paid_minor,
            generated_at: self.generated_at,
        })
    }
}

#[derive(FromRow)]
struct ReceiptRecord {
    id: Uuid,
    tutor_id: Uuid,
    receipt_number: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_classes: i64,
    total_earnings_minor: i64,
    status: String,
    generated_at: DateTime<Utc>,
}
impl ReceiptRecord {
    fn to_domain(self) -> PortResult<TutorReceipt> {
        let status = ReceiptStatus::parse(&self.status)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown receipt status '{}'", self.status)))?;
        Ok(TutorReceipt {
            id: self.id,
            tutor_id: self.tutor_id,
            receipt_number: self.receipt_number,
            start_date: self.start_date,
            end_date: self.end_date,
            total_classes: self.total_classes,
            total_earnings_minor: self.total_earnings_minor,
            status,
            generated_at: self.generated_at,
        })
    }
}

#[derive(FromRow)]
struct InvoiceTotalsRecord {
    collected: i64,
    pending: i64,
    invoice_count: i64,
}

#[derive(FromRow)]
struct ReceiptTotalsRecord {
    paid: i64,
    pending: i64,
    receipt_count: i64,
}

fn parse_role(raw: &str) -> PortResult<Role> {
    raw.parse::<Role>()
        .map_err(|e| PortError::Unexpected(e.to_string()))
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, username, hashed_password, role, is_active FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User '{}' not found", username)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn get_user_account(&self, user_id: Uuid) -> PortResult<UserAccount> {
        let record = sqlx::query_as::<_, UserAccountRecord>(
            "SELECT id, username, full_name, email, mobile, role, is_active, last_login \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn list_user_accounts(&self) -> PortResult<Vec<UserAccount>> {
        let records = sqlx::query_as::<_, UserAccountRecord>(
            "SELECT id, username, full_name, email, mobile, role, is_active, last_login \
             FROM users ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn create_user_account(&self, new_user: NewUserAccount) -> PortResult<UserAccount> {
        let record = sqlx::query_as::<_, UserAccountRecord>(
            "INSERT INTO users (id, username, hashed_password, full_name, email, mobile, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, username, full_name, email, mobile, role, is_active, last_login",
        )
        .bind(new_user.id)
        .bind(&new_user.username)
        .bind(&new_user.hashed_password)
        .bind(&new_user.full_name)
        .bind(&new_user.email)
        .bind(&new_user.mobile)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict(format!("Username '{}' is taken", new_user.username))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        user_id.ok_or_else(|| PortError::NotFound("Invalid or expired session".to_string()))
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn list_students(&self) -> PortResult<Vec<Student>> {
        let records = sqlx::query_as::<_, StudentRecord>(&format!(
            "SELECT {} FROM students ORDER BY full_name",
            STUDENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_active_students(&self) -> PortResult<Vec<Student>> {
        let records = sqlx::query_as::<_, StudentRecord>(&format!(
            "SELECT {} FROM students WHERE status = 'Active' ORDER BY full_name",
            STUDENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_student(&self, student_id: Uuid) -> PortResult<Student> {
        let record = sqlx::query_as::<_, StudentRecord>(&format!(
            "SELECT {} FROM students WHERE id = $1",
            STUDENT_COLUMNS
        ))
        .bind(student_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Student {} not found", student_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn create_student(
        &self,
        new_student: NewStudent,
        assignments: Vec<TutorAssignment>,
    ) -> PortResult<Student> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let record = sqlx::query_as::<_, StudentRecord>(&format!(
            "INSERT INTO students (id, full_name, parent_name, parent_whatsapp, class_level, \
             subjects, per_class_fee_minor, billing_start_date, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'Active') RETURNING {}",
            STUDENT_COLUMNS
        ))
        .bind(new_student.id)
        .bind(&new_student.full_name)
        .bind(&new_student.parent_name)
        .bind(&new_student.parent_whatsapp)
        .bind(&new_student.class_level)
        .bind(&new_student.subjects)
        .bind(new_student.per_class_fee_minor)
        .bind(new_student.billing_start_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        for assignment in &assignments {
            sqlx::query(
                "INSERT INTO student_tutors (student_id, tutor_id, pay_per_class_minor) \
                 VALUES ($1, $2, $3)",
            )
            .bind(new_student.id)
            .bind(assignment.tutor_id)
            .bind(assignment.pay_per_class_minor)
            .execute(&mut *tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.to_domain()
    }

    async fn update_student(
        &self,
        student_id: Uuid,
        update: StudentUpdate,
        assignments: Vec<TutorAssignment>,
    ) -> PortResult<Student> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // billing_start_date is deliberately not updatable here; only
        // invoice issuance moves the billing clock.
        let record = sqlx::query_as::<_, StudentRecord>(&format!(
            "UPDATE students SET full_name = $1, parent_name = $2, parent_whatsapp = $3, \
             class_level = $4, subjects = $5, per_class_fee_minor = $6, status = $7 \
             WHERE id = $8 RETURNING {}",
            STUDENT_COLUMNS
        ))
        .bind(&update.full_name)
        .bind(&update.parent_name)
        .bind(&update.parent_whatsapp)
        .bind(&update.class_level)
        .bind(&update.subjects)
        .bind(update.per_class_fee_minor)
        .bind(update.status.as_str())
        .bind(student_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Student {} not found", student_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        sqlx::query("DELETE FROM student_tutors WHERE student_id = $1")
            .bind(student_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        for assignment in &assignments {
            sqlx::query(
                "INSERT INTO student_tutors (student_id, tutor_id, pay_per_class_minor) \
                 VALUES ($1, $2, $3)",
            )
            .bind(student_id)
            .bind(assignment.tutor_id)
            .bind(assignment.pay_per_class_minor)
            .execute(&mut *tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.to_domain()
    }

    async fn assignments_for_student(&self, student_id: Uuid) -> PortResult<Vec<TutorAssignment>> {
        let records = sqlx::query_as::<_, AssignmentRecord>(
            "SELECT tutor_id, pay_per_class_minor FROM student_tutors WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn students_for_tutor(&self, tutor_id: Uuid) -> PortResult<Vec<Student>> {
        let records = sqlx::query_as::<_, StudentRecord>(
            "SELECT s.id, s.full_name, s.parent_name, s.parent_whatsapp, s.class_level, \
             s.subjects, s.per_class_fee_minor, s.billing_start_date, s.status \
             FROM students s \
             JOIN student_tutors st ON st.student_id = s.id \
             WHERE st.tutor_id = $1 ORDER BY s.full_name",
        )
        .bind(tutor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_tutors(&self) -> PortResult<Vec<Tutor>> {
        let records = sqlx::query_as::<_, TutorRecord>(&format!(
            "SELECT {} FROM tutors ORDER BY full_name",
            TUTOR_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_active_tutors(&self) -> PortResult<Vec<Tutor>> {
        let records = sqlx::query_as::<_, TutorRecord>(&format!(
            "SELECT {} FROM tutors WHERE status = 'Active' ORDER BY full_name",
            TUTOR_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_tutor(&self, tutor_id: Uuid) -> PortResult<Tutor> {
        let record = sqlx::query_as::<_, TutorRecord>(&format!(
            "SELECT {} FROM tutors WHERE id = $1",
            TUTOR_COLUMNS
        ))
        .bind(tutor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Tutor {} not found", tutor_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn get_tutor_by_user(&self, user_id: Uuid) -> PortResult<Option<Tutor>> {
        let record = sqlx::query_as::<_, TutorRecord>(&format!(
            "SELECT {} FROM tutors WHERE user_id = $1",
            TUTOR_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.map(|r| r.to_domain()).transpose()
    }

    async fn create_tutor(&self, new_tutor: NewTutor, login: NewUserAccount) -> PortResult<Tutor> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // The login account and the tutor profile are created together;
        // a failure on either side rolls back both.
        sqlx::query(
            "INSERT INTO users (id, username, hashed_password, full_name, email, mobile, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(login.id)
        .bind(&login.username)
        .bind(&login.hashed_password)
        .bind(&login.full_name)
        .bind(&login.email)
        .bind(&login.mobile)
        .bind(login.role.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict(format!("Username '{}' is taken", login.username))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;

        let record = sqlx::query_as::<_, TutorRecord>(&format!(
            "INSERT INTO tutors (id, user_id, full_name, date_of_birth, mobile, upi_id, username, \
             billing_start_date, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'Active') RETURNING {}",
            TUTOR_COLUMNS
        ))
        .bind(new_tutor.id)
        .bind(login.id)
        .bind(&new_tutor.full_name)
        .bind(new_tutor.date_of_birth)
        .bind(&new_tutor.mobile)
        .bind(&new_tutor.upi_id)
        .bind(&new_tutor.username)
        .bind(new_tutor.billing_start_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict(format!("Tutor with mobile '{}' already exists", new_tutor.mobile))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.to_domain()
    }

    async fn update_tutor(&self, tutor_id: Uuid, update: TutorUpdate) -> PortResult<Tutor> {
        let record = sqlx::query_as::<_, TutorRecord>(&format!(
            "UPDATE tutors SET full_name = $1, date_of_birth = $2, mobile = $3, upi_id = $4, \
             status = $5 WHERE id = $6 RETURNING {}",
            TUTOR_COLUMNS
        ))
        .bind(&update.full_name)
        .bind(update.date_of_birth)
        .bind(&update.mobile)
        .bind(&update.upi_id)
        .bind(update.status.as_str())
        .bind(tutor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Tutor {} not found", tutor_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn record_attendance(&self, new_record: NewAttendance) -> PortResult<AttendanceRecord> {
        let record = sqlx::query_as::<_, AttendanceRow>(&format!(
            "INSERT INTO attendance (id, student_id, tutor_id, subject, start_time, end_time, \
             duration_minutes, rating, remarks, date_recorded) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            ATTENDANCE_COLUMNS
        ))
        .bind(new_record.id)
        .bind(new_record.student_id)
        .bind(new_record.tutor_id)
        .bind(&new_record.subject)
        .bind(new_record.start_time)
        .bind(new_record.end_time)
        .bind(new_record.duration_minutes)
        .bind(new_record.rating)
        .bind(&new_record.remarks)
        .bind(new_record.date_recorded)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.to_domain())
    }

    async fn count_student_attendance(
        &self,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM attendance \
             WHERE student_id = $1 AND date_recorded BETWEEN $2 AND $3",
        )
        .bind(student_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn tutor_attendance_between(
        &self,
        tutor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRow>(&format!(
            "SELECT {} FROM attendance \
             WHERE tutor_id = $1 AND date_recorded BETWEEN $2 AND $3 ORDER BY start_time",
            ATTENDANCE_COLUMNS
        ))
        .bind(tutor_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn recent_attendance_for_student(
        &self,
        student_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRow>(&format!(
            "SELECT {} FROM attendance WHERE student_id = $1 ORDER BY start_time DESC LIMIT $2",
            ATTENDANCE_COLUMNS
        ))
        .bind(student_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn recent_attendance_for_tutor(
        &self,
        tutor_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRow>(&format!(
            "SELECT {} FROM attendance WHERE tutor_id = $1 ORDER BY start_time DESC LIMIT $2",
            ATTENDANCE_COLUMNS
        ))
        .bind(tutor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn pair_pay_rate(&self, student_id: Uuid, tutor_id: Uuid) -> PortResult<Option<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT pay_per_class_minor FROM student_tutors \
             WHERE student_id = $1 AND tutor_id = $2",
        )
        .bind(student_id)
        .bind(tutor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn find_student_invoice_for_period(
        &self,
        student_id: Uuid,
        period: BillingPeriod,
    ) -> PortResult<Option<StudentInvoice>> {
        let record = sqlx::query_as::<_, InvoiceRecord>(&format!(
            "SELECT {} FROM student_invoices \
             WHERE student_id = $1 AND start_date = $2 AND end_date = $3",
            INVOICE_COLUMNS
        ))
        .bind(student_id)
        .bind(period.start_date)
        .bind(period.end_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.map(|r| r.to_domain()).transpose()
    }

    async fn insert_student_invoice(
        &self,
        new_invoice: NewStudentInvoice,
    ) -> PortResult<StudentInvoice> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Lock the student row so concurrent generations for the same
        // student serialize here instead of double-billing.
        let locked = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT billing_start_date FROM students WHERE id = $1 FOR UPDATE",
        )
        .bind(new_invoice.student_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if locked.is_none() {
            return Err(PortError::NotFound(format!(
                "Student {} not found",
                new_invoice.student_id
            )));
        }

        // Re-check under the lock: whoever lost the race finds the
        // winner's invoice and returns it unchanged.
        let existing = sqlx::query_as::<_, InvoiceRecord>(&format!(
            "SELECT {} FROM student_invoices \
             WHERE student_id = $1 AND start_date = $2 AND end_date = $3",
            INVOICE_COLUMNS
        ))
        .bind(new_invoice.student_id)
        .bind(new_invoice.period.start_date)
        .bind(new_invoice.period.end_date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if let Some(record) = existing {
            return record.to_domain();
        }

        let record = sqlx::query_as::<_, InvoiceRecord>(&format!(
            "INSERT INTO student_invoices (id, student_id, invoice_number, start_date, end_date, \
             total_classes, total_amount_minor, status, amount_paid_minor, generated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'Due', 0, $8) RETURNING {}",
            INVOICE_COLUMNS
        ))
        .bind(new_invoice.id)
        .bind(new_invoice.student_id)
        .bind(&new_invoice.invoice_number)
        .bind(new_invoice.period.start_date)
        .bind(new_invoice.period.end_date)
        .bind(new_invoice.total_classes)
        .bind(new_invoice.total_amount_minor)
        .bind(new_invoice.generated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        sqlx::query("UPDATE students SET billing_start_date = $1 WHERE id = $2")
            .bind(new_invoice.period.end_date + Duration::days(1))
            .bind(new_invoice.student_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.to_domain()
    }

    async fn find_tutor_receipt_for_period(
        &self,
        tutor_id: Uuid,
        period: BillingPeriod,
    ) -> PortResult<Option<TutorReceipt>> {
        let record = sqlx::query_as::<_, ReceiptRecord>(&format!(
            "SELECT {} FROM tutor_receipts \
             WHERE tutor_id = $1 AND start_date = $2 AND end_date = $3",
            RECEIPT_COLUMNS
        ))
        .bind(tutor_id)
        .bind(period.start_date)
        .bind(period.end_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.map(|r| r.to_domain()).transpose()
    }

    async fn insert_tutor_receipt(&self, new_receipt: NewTutorReceipt) -> PortResult<TutorReceipt> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let locked = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT billing_start_date FROM tutors WHERE id = $1 FOR UPDATE",
        )
        .bind(new_receipt.tutor_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if locked.is_none() {
            return Err(PortError::NotFound(format!(
                "Tutor {} not found",
                new_receipt.tutor_id
            )));
        }

        let existing = sqlx::query_as::<_, ReceiptRecord>(&format!(
            "SELECT {} FROM tutor_receipts \
             WHERE tutor_id = $1 AND start_date = $2 AND end_date = $3",
            RECEIPT_COLUMNS
        ))
        .bind(new_receipt.tutor_id)
        .bind(new_receipt.period.start_date)
        .bind(new_receipt.period.end_date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if let Some(record) = existing {
            return record.to_domain();
        }

        let record = sqlx::query_as::<_, ReceiptRecord>(&format!(
            "INSERT INTO tutor_receipts (id, tutor_id, receipt_number, start_date, end_date, \
             total_classes, total_earnings_minor, status, generated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'Due', $8) RETURNING {}",
            RECEIPT_COLUMNS
        ))
        .bind(new_receipt.id)
        .bind(new_receipt.tutor_id)
        .bind(&new_receipt.receipt_number)
        .bind(new_receipt.period.start_date)
        .bind(new_receipt.period.end_date)
        .bind(new_receipt.total_classes)
        .bind(new_receipt.total_earnings_minor)
        .bind(new_receipt.generated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        sqlx::query("UPDATE tutors SET billing_start_date = $1 WHERE id = $2")
            .bind(new_receipt.period.end_date + Duration::days(1))
            .bind(new_receipt.tutor_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.to_domain()
    }

    async fn get_student_invoice(&self, invoice_id: Uuid) -> PortResult<StudentInvoice> {
        let record = sqlx::query_as::<_, InvoiceRecord>(&format!(
            "SELECT {} FROM student_invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Invoice {} not found", invoice_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn get_tutor_receipt(&self, receipt_id: Uuid) -> PortResult<TutorReceipt> {
        let record = sqlx::query_as::<_, ReceiptRecord>(&format!(
            "SELECT {} FROM tutor_receipts WHERE id = $1",
            RECEIPT_COLUMNS
        ))
        .bind(receipt_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Receipt {} not found", receipt_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn list_student_invoices(&self) -> PortResult<Vec<StudentInvoice>> {
        let records = sqlx::query_as::<_, InvoiceRecord>(&format!(
            "SELECT {} FROM student_invoices ORDER BY generated_at DESC",
            INVOICE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_tutor_receipts(&self) -> PortResult<Vec<TutorReceipt>> {
        let records = sqlx::query_as::<_, ReceiptRecord>(&format!(
            "SELECT {} FROM tutor_receipts ORDER BY generated_at DESC",
            RECEIPT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn invoices_for_student(
        &self,
        student_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<StudentInvoice>> {
        let records = sqlx::query_as::<_, InvoiceRecord>(&format!(
            "SELECT {} FROM student_invoices WHERE student_id = $1 \
             ORDER BY start_date DESC LIMIT $2",
            INVOICE_COLUMNS
        ))
        .bind(student_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn receipts_for_tutor(&self, tutor_id: Uuid, limit: i64) -> PortResult<Vec<TutorReceipt>> {
        let records = sqlx::query_as::<_, ReceiptRecord>(&format!(
            "SELECT {} FROM tutor_receipts WHERE tutor_id = $1 \
             ORDER BY start_date DESC LIMIT $2",
            RECEIPT_COLUMNS
        ))
        .bind(tutor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn record_invoice_payment(
        &self,
        invoice_id: Uuid,
        amount_paid_minor: i64,
    ) -> PortResult<StudentInvoice> {
        let invoice = self.get_student_invoice(invoice_id).await?;
        let status = InvoiceStatus::from_payment(invoice.total_amount_minor, amount_paid_minor);

        let record = sqlx::query_as::<_, InvoiceRecord>(&format!(
            "UPDATE student_invoices SET amount_paid_minor = $1, status = $2 \
             WHERE id = $3 RETURNING {}",
            INVOICE_COLUMNS
        ))
        .bind(amount_paid_minor)
        .bind(status.as_str())
        .bind(invoice_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.to_domain()
    }

    async fn mark_receipt_paid(&self, receipt_id: Uuid) -> PortResult<TutorReceipt> {
        let record = sqlx::query_as::<_, ReceiptRecord>(&format!(
            "UPDATE tutor_receipts SET status = 'Paid' WHERE id = $1 RETURNING {}",
            RECEIPT_COLUMNS
        ))
        .bind(receipt_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Receipt {} not found", receipt_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn billing_totals(&self) -> PortResult<BillingTotals> {
        let invoice_totals = sqlx::query_as::<_, InvoiceTotalsRecord>(
            "SELECT COALESCE(SUM(amount_paid_minor), 0)::BIGINT AS collected, \
             COALESCE(SUM(total_amount_minor - amount_paid_minor), 0)::BIGINT AS pending, \
             COUNT(*) AS invoice_count FROM student_invoices",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let receipt_totals = sqlx::query_as::<_, ReceiptTotalsRecord>(
            "SELECT COALESCE(SUM(total_earnings_minor) FILTER (WHERE status = 'Paid'), 0)::BIGINT AS paid, \
             COALESCE(SUM(total_earnings_minor) FILTER (WHERE status = 'Due'), 0)::BIGINT AS pending, \
             COUNT(*) AS receipt_count FROM tutor_receipts",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let active_students =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students WHERE status = 'Active'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let active_tutors =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tutors WHERE status = 'Active'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(BillingTotals {
            collected_revenue_minor: invoice_totals.collected,
            pending_revenue_minor: invoice_totals.pending,
            paid_payout_minor: receipt_totals.paid,
            pending_payout_minor: receipt_totals.pending,
            active_students,
            active_tutors,
            invoice_count: invoice_totals.invoice_count,
            receipt_count: receipt_totals.receipt_count,
        })
    }
}
