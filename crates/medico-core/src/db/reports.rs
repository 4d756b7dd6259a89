//! Report and test result database operations.

use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

use super::{constraint_error, now_rfc3339, Database, DbError, DbResult};
use crate::models::{
    Report, ReportDetail, ReportFields, ReportInput, TestResult, TestResultFields,
    TestResultInput, TestResultView,
};
use crate::templates::materialize_results;
use crate::validation::ValidationErrors;

const SELECT_REPORT: &str = r#"
    SELECT id, patient_id, lab_test_id, status, doctor_remarks, created_at
    FROM reports
"#;

/// Report joined with patient and lab test for display.
const SELECT_REPORT_DETAIL: &str = r#"
    SELECT r.id, r.patient_id, p.full_name, p.patient_id,
           r.lab_test_id, t.name, r.status, r.doctor_remarks, r.created_at
    FROM reports r
    JOIN patients p ON p.id = r.patient_id
    JOIN lab_tests t ON t.id = r.lab_test_id
"#;

const SELECT_RESULT_VIEW: &str = r#"
    SELECT tr.id, tp.name, tp.unit, tp.normal_range, tr.value
    FROM test_results tr
    JOIN test_parameters tp ON tp.id = tr.parameter_id
"#;

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<Report> {
    Ok(Report {
        id: row.get(0)?,
        patient: row.get(1)?,
        lab_test: row.get(2)?,
        status: row.get(3)?,
        doctor_remarks: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn report_detail_from_row(row: &Row<'_>) -> rusqlite::Result<ReportDetail> {
    Ok(ReportDetail {
        id: row.get(0)?,
        patient: row.get(1)?,
        patient_name: row.get(2)?,
        patient_id: row.get(3)?,
        lab_test: row.get(4)?,
        test_name: row.get(5)?,
        status: row.get(6)?,
        doctor_remarks: row.get(7)?,
        created_at: row.get(8)?,
        test_results: Vec::new(),
    })
}

fn result_view_from_row(row: &Row<'_>) -> rusqlite::Result<TestResultView> {
    Ok(TestResultView {
        id: row.get(0)?,
        parameter_name: row.get(1)?,
        unit: row.get(2)?,
        normal_range: row.get(3)?,
        value: row.get(4)?,
    })
}

fn test_result_from_row(row: &Row<'_>) -> rusqlite::Result<TestResult> {
    Ok(TestResult {
        id: row.get(0)?,
        report: row.get(1)?,
        parameter: row.get(2)?,
        value: row.get(3)?,
    })
}

impl Database {
    // ========================================================================
    // Reports
    // ========================================================================

    fn checked_report(&self, input: &ReportInput) -> DbResult<ReportFields> {
        let fields = input.validate()?;
        let mut errors = ValidationErrors::new();
        self.check_reference(&mut errors, "patient", "patients", fields.patient)?;
        self.check_reference(&mut errors, "lab_test", "lab_tests", fields.lab_test)?;
        errors.into_result()?;
        Ok(fields)
    }

    /// Order a lab test for a patient.
    ///
    /// One blank result is created per parameter the lab test has right now,
    /// in the same transaction as the report row.
    pub fn create_report(&self, input: &ReportInput) -> DbResult<ReportDetail> {
        let ReportFields {
            patient,
            lab_test,
            status,
            doctor_remarks,
        } = self.checked_report(input)?;

        let tx = self.write_transaction()?;
        tx.execute(
            r#"
            INSERT INTO reports (patient_id, lab_test_id, status, doctor_remarks, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![patient, lab_test, status, doctor_remarks, now_rfc3339()],
        )
        .map_err(constraint_error)?;
        let id = tx.last_insert_rowid();
        let results = materialize_results(&tx, id, lab_test)?;
        tx.commit()?;

        info!(id, patient, lab_test, results, "created report");
        self.get_report_detail(id)?
            .ok_or_else(|| DbError::NotFound(format!("report {}", id)))
    }

    /// Update a report's fields. Its result rows are left as they are, even
    /// when the lab test changes.
    pub fn update_report(&self, id: i64, input: &ReportInput) -> DbResult<Option<ReportDetail>> {
        let ReportFields {
            patient,
            lab_test,
            status,
            doctor_remarks,
        } = self.checked_report(input)?;

        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE reports
                SET patient_id = ?2, lab_test_id = ?3, status = ?4, doctor_remarks = ?5
                WHERE id = ?1
                "#,
                params![id, patient, lab_test, status, doctor_remarks],
            )
            .map_err(constraint_error)?;
        if rows_affected == 0 {
            return Ok(None);
        }
        let detail = self.get_report_detail(id)?;
        if let Some(detail) = &detail {
            debug!(
                id,
                status = detail.status.as_str(),
                pending = detail.blank_result_count(),
                "updated report"
            );
        }
        Ok(detail)
    }

    /// The stored report row, without joins.
    pub fn get_report(&self, id: i64) -> DbResult<Option<Report>> {
        let sql = format!("{} WHERE id = ?", SELECT_REPORT);
        self.conn
            .query_row(&sql, [id], report_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// A report with patient and test names and its results.
    pub fn get_report_detail(&self, id: i64) -> DbResult<Option<ReportDetail>> {
        let sql = format!("{} WHERE r.id = ?", SELECT_REPORT_DETAIL);
        let detail = self
            .conn
            .query_row(&sql, [id], report_detail_from_row)
            .optional()?;
        match detail {
            Some(mut detail) => {
                detail.test_results = self.list_result_views(id)?;
                Ok(Some(detail))
            }
            None => Ok(None),
        }
    }

    pub fn list_report_details(&self) -> DbResult<Vec<ReportDetail>> {
        let sql = format!("{} ORDER BY r.id", SELECT_REPORT_DETAIL);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut details = stmt
            .query_map([], report_detail_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for detail in &mut details {
            detail.test_results = self.list_result_views(detail.id)?;
        }
        Ok(details)
    }

    fn list_result_views(&self, report_id: i64) -> DbResult<Vec<TestResultView>> {
        let sql = format!("{} WHERE tr.report_id = ? ORDER BY tr.id", SELECT_RESULT_VIEW);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([report_id], result_view_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a report and its results.
    pub fn delete_report(&self, id: i64) -> DbResult<bool> {
        self.delete_row("reports", id)
    }

    // ========================================================================
    // Test results
    // ========================================================================

    fn checked_test_result(&self, input: &TestResultInput) -> DbResult<TestResultFields> {
        let fields = input.validate()?;
        let mut errors = ValidationErrors::new();
        self.check_reference(&mut errors, "report", "reports", fields.report)?;
        self.check_reference(&mut errors, "parameter", "test_parameters", fields.parameter)?;
        errors.into_result()?;
        Ok(fields)
    }

    pub fn create_test_result(&self, input: &TestResultInput) -> DbResult<TestResultView> {
        let TestResultFields {
            report,
            parameter,
            value,
        } = self.checked_test_result(input)?;

        self.conn
            .execute(
                "INSERT INTO test_results (report_id, parameter_id, value) VALUES (?1, ?2, ?3)",
                params![report, parameter, value],
            )
            .map_err(constraint_error)?;
        let id = self.conn.last_insert_rowid();
        self.get_test_result_view(id)?
            .ok_or_else(|| DbError::NotFound(format!("test result {}", id)))
    }

    /// Record a measured value (or any other field change) on a result row.
    pub fn update_test_result(
        &self,
        id: i64,
        input: &TestResultInput,
    ) -> DbResult<Option<TestResultView>> {
        let TestResultFields {
            report,
            parameter,
            value,
        } = self.checked_test_result(input)?;

        let rows_affected = self
            .conn
            .execute(
                "UPDATE test_results SET report_id = ?2, parameter_id = ?3, value = ?4 WHERE id = ?1",
                params![id, report, parameter, value],
            )
            .map_err(constraint_error)?;
        if rows_affected == 0 {
            return Ok(None);
        }
        self.get_test_result_view(id)
    }

    /// The stored result row with its foreign keys.
    pub fn get_test_result(&self, id: i64) -> DbResult<Option<TestResult>> {
        self.conn
            .query_row(
                "SELECT id, report_id, parameter_id, value FROM test_results WHERE id = ?",
                [id],
                test_result_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_test_results(&self) -> DbResult<Vec<TestResult>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, report_id, parameter_id, value FROM test_results ORDER BY id")?;
        let rows = stmt.query_map([], test_result_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// A result with its parameter's name, unit and range.
    pub fn get_test_result_view(&self, id: i64) -> DbResult<Option<TestResultView>> {
        let sql = format!("{} WHERE tr.id = ?", SELECT_RESULT_VIEW);
        self.conn
            .query_row(&sql, [id], result_view_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn list_test_result_views(&self) -> DbResult<Vec<TestResultView>> {
        let sql = format!("{} ORDER BY tr.id", SELECT_RESULT_VIEW);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], result_view_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_test_result(&self, id: i64) -> DbResult<bool> {
        self.delete_row("test_results", id)
    }
}
