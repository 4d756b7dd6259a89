//! Report and per-parameter result models.

use serde::{Deserialize, Serialize};

use crate::validation::ValidationErrors;

/// Report workflow status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReportStatus {
    /// Results not yet entered
    #[default]
    Pending,
    /// Results entered and signed off
    Completed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "Pending",
            ReportStatus::Completed => "Completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(ReportStatus::Pending),
            "Completed" => Some(ReportStatus::Completed),
            _ => None,
        }
    }
}

/// A report row as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub id: i64,
    /// Patient row id
    pub patient: i64,
    /// Lab test row id
    pub lab_test: i64,
    pub status: ReportStatus,
    pub doctor_remarks: String,
    pub created_at: String,
}

/// One result line of a report, joined with its parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResultView {
    pub id: i64,
    pub parameter_name: String,
    pub unit: String,
    pub normal_range: String,
    /// Measured value; blank until an operator fills it in
    pub value: String,
}

/// The consumer-facing report: patient and test denormalized, results nested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportDetail {
    pub id: i64,
    /// Patient row id
    pub patient: i64,
    pub patient_name: String,
    /// Patient's human-readable identifier
    pub patient_id: String,
    /// Lab test row id
    pub lab_test: i64,
    pub test_name: String,
    pub status: ReportStatus,
    pub doctor_remarks: String,
    pub created_at: String,
    pub test_results: Vec<TestResultView>,
}

impl ReportDetail {
    /// Results still waiting for a value.
    pub fn blank_result_count(&self) -> usize {
        self.test_results
            .iter()
            .filter(|r| r.value.trim().is_empty())
            .count()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportInput {
    pub patient: Option<i64>,
    pub lab_test: Option<i64>,
    pub status: Option<String>,
    pub doctor_remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportFields {
    pub patient: i64,
    pub lab_test: i64,
    pub status: ReportStatus,
    pub doctor_remarks: String,
}

impl ReportInput {
    pub fn validate(&self) -> Result<ReportFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let patient = errors.required("patient", &self.patient);
        let lab_test = errors.required("lab_test", &self.lab_test);
        let status = match &self.status {
            None => Some(ReportStatus::default()),
            Some(_) => errors.choice("status", &self.status, ReportStatus::parse),
        };
        let doctor_remarks = errors.blankable_text("doctor_remarks", &self.doctor_remarks, None);

        match (patient, lab_test, status) {
            (Some(patient), Some(lab_test), Some(status)) if errors.is_empty() => {
                Ok(ReportFields {
                    patient,
                    lab_test,
                    status,
                    doctor_remarks,
                })
            }
            _ => Err(errors),
        }
    }
}

impl From<&Report> for ReportInput {
    fn from(r: &Report) -> Self {
        Self {
            patient: Some(r.patient),
            lab_test: Some(r.lab_test),
            status: Some(r.status.as_str().to_string()),
            doctor_remarks: Some(r.doctor_remarks.clone()),
        }
    }
}

/// A result row as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    pub id: i64,
    pub report: i64,
    pub parameter: i64,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestResultInput {
    pub report: Option<i64>,
    pub parameter: Option<i64>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestResultFields {
    pub report: i64,
    pub parameter: i64,
    pub value: String,
}

impl TestResultInput {
    pub fn validate(&self) -> Result<TestResultFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let report = errors.required("report", &self.report);
        let parameter = errors.required("parameter", &self.parameter);
        let value = errors.blankable_text("value", &self.value, Some(50));

        match (report, parameter) {
            (Some(report), Some(parameter)) if errors.is_empty() => Ok(TestResultFields {
                report,
                parameter,
                value,
            }),
            _ => Err(errors),
        }
    }
}

impl From<&TestResult> for TestResultInput {
    fn from(r: &TestResult) -> Self {
        Self {
            report: Some(r.report),
            parameter: Some(r.parameter),
            value: Some(r.value.clone()),
        }
    }
}
