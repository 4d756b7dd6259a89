//! Medico Core Library
//!
//! Diagnostic laboratory records: patients, the lab test catalog, reports
//! with per-parameter results, staff, and login accounts, stored in SQLite.
//!
//! # Flow
//!
//! ```text
//! Register patient ──► PAT### identifier (from the table's sequence counter)
//!
//! Create lab test ──► name matches a template? ──► seed default parameters
//!                                                  (same transaction)
//!
//! Create report  ──► one blank result per current parameter of its test
//!                    (same transaction; later catalog edits don't resync)
//!
//! Record values  ──► update test results ──► mark report Completed
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer, one `impl Database` block per area
//! - [`models`]: Domain types and their write inputs
//! - [`validation`]: Field-keyed validation errors
//! - [`identifiers`]: `PAT###` patient identifiers
//! - [`templates`]: Default parameter sets and result materialization
//! - [`auth`]: Password hashing and API token keys

pub mod auth;
pub mod db;
pub mod identifiers;
pub mod models;
pub mod templates;
pub mod validation;

// Re-export commonly used types
pub use db::{Database, DbError, DbResult};
pub use models::{
    ActivityLog, Employee, EmployeeAttendance, Gender, LabTest, NewUser, NotificationPreference,
    Patient, Report, ReportDetail, ReportStatus, TestCategory, TestParameter, TestResult, User,
};
pub use templates::{ParameterSpec, ParameterTemplate, PARAMETER_TEMPLATES};
pub use validation::ValidationErrors;
