//! Staff database operations: employees, attendance, activity logs.

use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::{constraint_error, now_rfc3339, Database, DbError, DbResult};
use crate::models::{
    ActivityLog, ActivityLogFields, ActivityLogInput, Employee, EmployeeAttendance,
    EmployeeAttendanceFields, EmployeeAttendanceInput, EmployeeFields, EmployeeInput,
    UserSummary,
};
use crate::validation::ValidationErrors;

const SELECT_EMPLOYEE: &str = r#"
    SELECT e.id, e.employee_id, e.department, e.role, e.mobile_number, e.is_active,
           u.id, u.username, u.first_name, u.last_name, u.email, u.is_active
    FROM employees e
    JOIN users u ON u.id = e.user_id
"#;

const SELECT_ATTENDANCE: &str = r#"
    SELECT a.id, a.employee_id, TRIM(u.first_name || ' ' || u.last_name),
           a.date, a.check_in, a.check_out, a.status
    FROM employee_attendance a
    JOIN employees e ON e.id = a.employee_id
    JOIN users u ON u.id = e.user_id
"#;

const SELECT_ACTIVITY: &str = r#"
    SELECT l.id, l.employee_id, TRIM(u.first_name || ' ' || u.last_name),
           l.message, l.created_at
    FROM activity_logs l
    JOIN employees e ON e.id = l.employee_id
    JOIN users u ON u.id = e.user_id
"#;

fn employee_from_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        department: row.get(2)?,
        role: row.get(3)?,
        mobile_number: row.get(4)?,
        is_active: row.get(5)?,
        user: UserSummary {
            id: row.get(6)?,
            username: row.get(7)?,
            first_name: row.get(8)?,
            last_name: row.get(9)?,
            email: row.get(10)?,
            is_active: row.get(11)?,
        },
    })
}

fn attendance_from_row(row: &Row<'_>) -> rusqlite::Result<EmployeeAttendance> {
    Ok(EmployeeAttendance {
        id: row.get(0)?,
        employee: row.get(1)?,
        employee_name: row.get(2)?,
        date: row.get(3)?,
        check_in: row.get(4)?,
        check_out: row.get(5)?,
        status: row.get(6)?,
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityLog> {
    Ok(ActivityLog {
        id: row.get(0)?,
        employee: row.get(1)?,
        employee_name: row.get(2)?,
        message: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl Database {
    // ========================================================================
    // Employees
    // ========================================================================

    fn checked_employee(
        &self,
        input: &EmployeeInput,
        exclude_id: Option<i64>,
    ) -> DbResult<EmployeeFields> {
        let fields = input.validate()?;
        let mut errors = ValidationErrors::new();
        self.check_reference(&mut errors, "user_id", "users", fields.user_id)?;
        self.check_unique(
            &mut errors,
            "employees",
            "employee",
            "user_id",
            fields.user_id,
            exclude_id,
        )?;
        self.check_unique(
            &mut errors,
            "employees",
            "employee",
            "employee_id",
            &fields.employee_id,
            exclude_id,
        )?;
        errors.into_result()?;
        Ok(fields)
    }

    pub fn create_employee(&self, input: &EmployeeInput) -> DbResult<Employee> {
        let f = self.checked_employee(input, None)?;
        self.conn
            .execute(
                r#"
                INSERT INTO employees (user_id, employee_id, department, role, mobile_number, is_active)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![f.user_id, f.employee_id, f.department, f.role, f.mobile_number, f.is_active],
            )
            .map_err(constraint_error)?;
        let id = self.conn.last_insert_rowid();

        info!(id, employee_id = %f.employee_id, "created employee");
        self.get_employee(id)?
            .ok_or_else(|| DbError::NotFound(format!("employee {}", id)))
    }

    pub fn update_employee(&self, id: i64, input: &EmployeeInput) -> DbResult<Option<Employee>> {
        let f = self.checked_employee(input, Some(id))?;
        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE employees SET
                    user_id = ?2, employee_id = ?3, department = ?4,
                    role = ?5, mobile_number = ?6, is_active = ?7
                WHERE id = ?1
                "#,
                params![
                    id,
                    f.user_id,
                    f.employee_id,
                    f.department,
                    f.role,
                    f.mobile_number,
                    f.is_active
                ],
            )
            .map_err(constraint_error)?;
        if rows_affected == 0 {
            return Ok(None);
        }
        self.get_employee(id)
    }

    pub fn get_employee(&self, id: i64) -> DbResult<Option<Employee>> {
        let sql = format!("{} WHERE e.id = ?", SELECT_EMPLOYEE);
        self.conn
            .query_row(&sql, [id], employee_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn list_employees(&self) -> DbResult<Vec<Employee>> {
        let sql = format!("{} ORDER BY e.id", SELECT_EMPLOYEE);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], employee_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete an employee with their attendance and activity history.
    pub fn delete_employee(&self, id: i64) -> DbResult<bool> {
        self.delete_row("employees", id)
    }

    // ========================================================================
    // Attendance
    // ========================================================================

    fn checked_attendance(
        &self,
        input: &EmployeeAttendanceInput,
    ) -> DbResult<EmployeeAttendanceFields> {
        let fields = input.validate()?;
        let mut errors = ValidationErrors::new();
        self.check_reference(&mut errors, "employee", "employees", fields.employee)?;
        errors.into_result()?;
        Ok(fields)
    }

    pub fn create_attendance(&self, input: &EmployeeAttendanceInput) -> DbResult<EmployeeAttendance> {
        let f = self.checked_attendance(input)?;
        self.conn
            .execute(
                r#"
                INSERT INTO employee_attendance (employee_id, date, check_in, check_out, status)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![f.employee, f.date, f.check_in, f.check_out, f.status],
            )
            .map_err(constraint_error)?;
        let id = self.conn.last_insert_rowid();
        self.get_attendance(id)?
            .ok_or_else(|| DbError::NotFound(format!("attendance {}", id)))
    }

    pub fn update_attendance(
        &self,
        id: i64,
        input: &EmployeeAttendanceInput,
    ) -> DbResult<Option<EmployeeAttendance>> {
        let f = self.checked_attendance(input)?;
        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE employee_attendance SET
                    employee_id = ?2, date = ?3, check_in = ?4, check_out = ?5, status = ?6
                WHERE id = ?1
                "#,
                params![id, f.employee, f.date, f.check_in, f.check_out, f.status],
            )
            .map_err(constraint_error)?;
        if rows_affected == 0 {
            return Ok(None);
        }
        self.get_attendance(id)
    }

    pub fn get_attendance(&self, id: i64) -> DbResult<Option<EmployeeAttendance>> {
        let sql = format!("{} WHERE a.id = ?", SELECT_ATTENDANCE);
        self.conn
            .query_row(&sql, [id], attendance_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn list_attendance(&self) -> DbResult<Vec<EmployeeAttendance>> {
        let sql = format!("{} ORDER BY a.id", SELECT_ATTENDANCE);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], attendance_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_attendance(&self, id: i64) -> DbResult<bool> {
        self.delete_row("employee_attendance", id)
    }

    // ========================================================================
    // Activity logs
    // ========================================================================

    fn checked_activity(&self, input: &ActivityLogInput) -> DbResult<ActivityLogFields> {
        let fields = input.validate()?;
        let mut errors = ValidationErrors::new();
        self.check_reference(&mut errors, "employee", "employees", fields.employee)?;
        errors.into_result()?;
        Ok(fields)
    }

    pub fn create_activity_log(&self, input: &ActivityLogInput) -> DbResult<ActivityLog> {
        let f = self.checked_activity(input)?;
        self.conn
            .execute(
                "INSERT INTO activity_logs (employee_id, message, created_at) VALUES (?1, ?2, ?3)",
                params![f.employee, f.message, now_rfc3339()],
            )
            .map_err(constraint_error)?;
        let id = self.conn.last_insert_rowid();
        self.get_activity_log(id)?
            .ok_or_else(|| DbError::NotFound(format!("activity log {}", id)))
    }

    /// Update a log line. The timestamp stays at creation time.
    pub fn update_activity_log(
        &self,
        id: i64,
        input: &ActivityLogInput,
    ) -> DbResult<Option<ActivityLog>> {
        let f = self.checked_activity(input)?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE activity_logs SET employee_id = ?2, message = ?3 WHERE id = ?1",
                params![id, f.employee, f.message],
            )
            .map_err(constraint_error)?;
        if rows_affected == 0 {
            return Ok(None);
        }
        self.get_activity_log(id)
    }

    pub fn get_activity_log(&self, id: i64) -> DbResult<Option<ActivityLog>> {
        let sql = format!("{} WHERE l.id = ?", SELECT_ACTIVITY);
        self.conn
            .query_row(&sql, [id], activity_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn list_activity_logs(&self) -> DbResult<Vec<ActivityLog>> {
        let sql = format!("{} ORDER BY l.id", SELECT_ACTIVITY);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], activity_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_activity_log(&self, id: i64) -> DbResult<bool> {
        self.delete_row("activity_logs", id)
    }
}
