//! crates/tuition_center_core/src/permissions.rs
//!
//! Role-based access control. Each role maps to a fixed set of
//! capabilities; route handlers check capabilities, never role names,
//! so a role's reach is defined in exactly one place.

use std::fmt;
use std::str::FromStr;

/// A single capability a signed-in user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Permission {
    ViewStudents = 1,
    AddStudents = 1 << 1,
    EditStudents = 1 << 2,
    DeleteStudents = 1 << 3,
    ViewTutors = 1 << 4,
    AddTutors = 1 << 5,
    EditTutors = 1 << 6,
    DeleteTutors = 1 << 7,
    ViewAttendance = 1 << 8,
    SubmitAttendance = 1 << 9,
    ViewInvoices = 1 << 10,
    GenerateInvoices = 1 << 11,
    MarkPayments = 1 << 12,
    DownloadInvoices = 1 << 13,
    ManageUsers = 1 << 14,
}

impl Permission {
    pub const ALL: [Permission; 15] = [
        Permission::ViewStudents,
        Permission::AddStudents,
        Permission::EditStudents,
        Permission::DeleteStudents,
        Permission::ViewTutors,
        Permission::AddTutors,
        Permission::EditTutors,
        Permission::DeleteTutors,
        Permission::ViewAttendance,
        Permission::SubmitAttendance,
        Permission::ViewInvoices,
        Permission::GenerateInvoices,
        Permission::MarkPayments,
        Permission::DownloadInvoices,
        Permission::ManageUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewStudents => "view_students",
            Permission::AddStudents => "add_students",
            Permission::EditStudents => "edit_students",
            Permission::DeleteStudents => "delete_students",
            Permission::ViewTutors => "view_tutors",
            Permission::AddTutors => "add_tutors",
            Permission::EditTutors => "edit_tutors",
            Permission::DeleteTutors => "delete_tutors",
            Permission::ViewAttendance => "view_attendance",
            Permission::SubmitAttendance => "submit_attendance",
            Permission::ViewInvoices => "view_invoices",
            Permission::GenerateInvoices => "generate_invoices",
            Permission::MarkPayments => "mark_payments",
            Permission::DownloadInvoices => "download_invoices",
            Permission::ManageUsers => "manage_users",
        }
    }
}

/// A set of permissions, stored as a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionSet(u32);

impl PermissionSet {
    pub const fn empty() -> Self {
        PermissionSet(0)
    }

    pub fn all() -> Self {
        Permission::ALL.iter().copied().collect()
    }

    pub const fn with(self, permission: Permission) -> Self {
        PermissionSet(self.0 | permission as u32)
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0 & permission as u32 != 0
    }

    pub fn names(&self) -> Vec<&'static str> {
        Permission::ALL
            .iter()
            .filter(|p| self.contains(**p))
            .map(|p| p.as_str())
            .collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter().fold(PermissionSet::empty(), PermissionSet::with)
    }
}

/// The built-in roles. Admin holds every capability; the rest are
/// narrow operational profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Manager,
    Accountant,
    Watcher,
    Tutor,
}

impl Role {
    pub fn permissions(self) -> PermissionSet {
        use Permission::*;
        match self {
            Role::Admin => PermissionSet::all(),
            // Runs day-to-day enrollment but never touches money.
            Role::Manager => PermissionSet::empty()
                .with(ViewStudents)
                .with(AddStudents)
                .with(EditStudents)
                .with(DeleteStudents)
                .with(ViewTutors)
                .with(ViewAttendance),
            Role::Accountant => PermissionSet::empty()
                .with(ViewStudents)
                .with(ViewTutors)
                .with(ViewAttendance)
                .with(ViewInvoices)
                .with(GenerateInvoices)
                .with(MarkPayments)
                .with(DownloadInvoices),
            // Read-only oversight.
            Role::Watcher => PermissionSet::empty()
                .with(ViewStudents)
                .with(ViewTutors)
                .with(ViewAttendance)
                .with(ViewInvoices),
            Role::Tutor => PermissionSet::empty()
                .with(ViewAttendance)
                .with(SubmitAttendance),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Accountant => "Accountant",
            Role::Watcher => "Watcher",
            Role::Tutor => "Tutor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Manager" => Ok(Role::Manager),
            "Accountant" => Ok(Role::Accountant),
            "Watcher" => Ok(Role::Watcher),
            "Tutor" => Ok(Role::Tutor),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
