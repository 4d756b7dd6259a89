//! SQLite schema definition.

/// Complete database schema for medico.
pub const SCHEMA: &str = r#"
-- Enable foreign keys (cascading deletes depend on it)
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Accounts
-- ============================================================================

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,                 -- argon2 PHC string
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    is_active INTEGER NOT NULL DEFAULT 1,
    date_joined TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS auth_tokens (
    key TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    created TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_preferences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    email_notifications INTEGER NOT NULL DEFAULT 1,
    sms_alerts INTEGER NOT NULL DEFAULT 0,
    test_results_ready INTEGER NOT NULL DEFAULT 1,
    system_updates INTEGER NOT NULL DEFAULT 1
);

-- ============================================================================
-- Patients
-- ============================================================================

-- AUTOINCREMENT keeps the sqlite_sequence counter monotonic, so patient
-- identifiers derived from it are never handed out twice.
CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    age INTEGER NOT NULL CHECK (age >= 0),
    gender TEXT NOT NULL CHECK (gender IN ('Male', 'Female')),
    mobile_number TEXT NOT NULL,
    email TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patients_full_name ON patients(full_name);

-- ============================================================================
-- Test Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS test_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS lab_tests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    category_id INTEGER NOT NULL REFERENCES test_categories(id) ON DELETE CASCADE,
    price TEXT NOT NULL                          -- decimal string, two places
);

CREATE INDEX IF NOT EXISTS idx_lab_tests_category ON lab_tests(category_id);

CREATE TABLE IF NOT EXISTS test_parameters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    lab_test_id INTEGER NOT NULL REFERENCES lab_tests(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    unit TEXT NOT NULL,
    normal_range TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_test_parameters_lab_test ON test_parameters(lab_test_id);

-- ============================================================================
-- Reports
-- ============================================================================

CREATE TABLE IF NOT EXISTS reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    lab_test_id INTEGER NOT NULL REFERENCES lab_tests(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'Pending' CHECK (status IN ('Pending', 'Completed')),
    doctor_remarks TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_patient ON reports(patient_id);
CREATE INDEX IF NOT EXISTS idx_reports_lab_test ON reports(lab_test_id);

-- One row per parameter of the report's lab test
CREATE TABLE IF NOT EXISTS test_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    report_id INTEGER NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
    parameter_id INTEGER NOT NULL REFERENCES test_parameters(id) ON DELETE CASCADE,
    value TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_test_results_report ON test_results(report_id);

-- ============================================================================
-- Staff
-- ============================================================================

CREATE TABLE IF NOT EXISTS employees (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    employee_id TEXT NOT NULL UNIQUE,
    department TEXT NOT NULL,
    role TEXT NOT NULL,
    mobile_number TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS employee_attendance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    employee_id INTEGER NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    check_in TEXT,
    check_out TEXT,
    status TEXT NOT NULL CHECK (status IN ('Present', 'On Leave'))
);

CREATE INDEX IF NOT EXISTS idx_attendance_employee ON employee_attendance(employee_id);

CREATE TABLE IF NOT EXISTS activity_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    employee_id INTEGER NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
    message TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activity_logs_employee ON activity_logs(employee_id);
"#;
