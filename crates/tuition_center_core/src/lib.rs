pub mod billing;
pub mod domain;
pub mod permissions;
pub mod ports;

pub use billing::{run_billing_sweep, SweepSummary};
pub use domain::{
    AttendanceRecord, AuthSession, BillingPeriod, BillingTotals, InvoiceStatus, ReceiptStatus,
    Student, StudentInvoice, StudentStatus, Tutor, TutorAssignment, TutorReceipt, TutorStatus,
    UserAccount, UserCredentials,
};
pub use permissions::{Permission, PermissionSet, Role};
pub use ports::{DatabaseService, PortError, PortResult};
