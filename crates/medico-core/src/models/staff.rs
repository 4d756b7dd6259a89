//! Staff models: employees, attendance and activity logs.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::account::UserSummary;
use crate::validation::ValidationErrors;

/// A staff member, bound one-to-one to a user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Employee {
    pub id: i64,
    pub user: UserSummary,
    /// Unique staff code (e.g., "EMP007")
    pub employee_id: String,
    pub department: String,
    pub role: String,
    pub mobile_number: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeeInput {
    pub user_id: Option<i64>,
    pub employee_id: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
    pub mobile_number: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeFields {
    pub user_id: i64,
    pub employee_id: String,
    pub department: String,
    pub role: String,
    pub mobile_number: String,
    pub is_active: bool,
}

impl EmployeeInput {
    pub fn validate(&self) -> Result<EmployeeFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let user_id = errors.required("user_id", &self.user_id);
        let employee_id = errors.text("employee_id", &self.employee_id, 10);
        let department = errors.text("department", &self.department, 100);
        let role = errors.text("role", &self.role, 50);
        let mobile_number = errors.text("mobile_number", &self.mobile_number, 15);

        match user_id {
            Some(user_id) if errors.is_empty() => Ok(EmployeeFields {
                user_id,
                employee_id,
                department,
                role,
                mobile_number,
                is_active: self.is_active.unwrap_or(true),
            }),
            _ => Err(errors),
        }
    }
}

impl From<&Employee> for EmployeeInput {
    fn from(e: &Employee) -> Self {
        Self {
            user_id: Some(e.user.id),
            employee_id: Some(e.employee_id.clone()),
            department: Some(e.department.clone()),
            role: Some(e.role.clone()),
            mobile_number: Some(e.mobile_number.clone()),
            is_active: Some(e.is_active),
        }
    }
}

/// Daily attendance status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    #[serde(rename = "On Leave")]
    OnLeave,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::OnLeave => "On Leave",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Present" => Some(AttendanceStatus::Present),
            "On Leave" => Some(AttendanceStatus::OnLeave),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmployeeAttendance {
    pub id: i64,
    /// Employee row id
    pub employee: i64,
    pub employee_name: String,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeeAttendanceInput {
    pub employee: Option<i64>,
    pub date: Option<NaiveDate>,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeAttendanceFields {
    pub employee: i64,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: AttendanceStatus,
}

impl EmployeeAttendanceInput {
    pub fn validate(&self) -> Result<EmployeeAttendanceFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let employee = errors.required("employee", &self.employee);
        let date = errors.required("date", &self.date);
        let status = errors.choice("status", &self.status, AttendanceStatus::parse);

        match (employee, date, status) {
            (Some(employee), Some(date), Some(status)) if errors.is_empty() => {
                Ok(EmployeeAttendanceFields {
                    employee,
                    date,
                    check_in: self.check_in,
                    check_out: self.check_out,
                    status,
                })
            }
            _ => Err(errors),
        }
    }
}

impl From<&EmployeeAttendance> for EmployeeAttendanceInput {
    fn from(a: &EmployeeAttendance) -> Self {
        Self {
            employee: Some(a.employee),
            date: Some(a.date),
            check_in: a.check_in,
            check_out: a.check_out,
            status: Some(a.status.as_str().to_string()),
        }
    }
}

/// Free-text audit line attributed to an employee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLog {
    pub id: i64,
    pub employee: i64,
    pub employee_name: String,
    pub message: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityLogInput {
    pub employee: Option<i64>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityLogFields {
    pub employee: i64,
    pub message: String,
}

impl ActivityLogInput {
    pub fn validate(&self) -> Result<ActivityLogFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let employee = errors.required("employee", &self.employee);
        let message = errors.text("message", &self.message, usize::MAX);

        match employee {
            Some(employee) if errors.is_empty() => Ok(ActivityLogFields { employee, message }),
            _ => Err(errors),
        }
    }
}

impl From<&ActivityLog> for ActivityLogInput {
    fn from(l: &ActivityLog) -> Self {
        Self {
            employee: Some(l.employee),
            message: Some(l.message.clone()),
        }
    }
}
