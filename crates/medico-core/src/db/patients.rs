//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::{constraint_error, now_rfc3339, Database, DbError, DbResult};
use crate::identifiers::next_patient_id;
use crate::models::{Patient, PatientFields, PatientInput};

const SELECT_PATIENT: &str = r#"
    SELECT id, patient_id, full_name, age, gender, mobile_number, email, created_at
    FROM patients
"#;

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        full_name: row.get(2)?,
        age: row.get(3)?,
        gender: row.get(4)?,
        mobile_number: row.get(5)?,
        email: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Database {
    /// Register a patient and assign its identifier.
    ///
    /// The identifier is derived from the table's sequence counter inside an
    /// IMMEDIATE transaction and the row is inserted with the matching id,
    /// so the identifier always equals `PAT` + row id.
    pub fn create_patient(&self, input: &PatientInput) -> DbResult<Patient> {
        let fields = input.validate()?;

        let tx = self.write_transaction()?;
        let last_sequence: Option<i64> = tx
            .query_row(
                "SELECT seq FROM sqlite_sequence WHERE name = 'patients'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let id = last_sequence.unwrap_or(0) + 1;
        let patient_id = next_patient_id(last_sequence);

        tx.execute(
            r#"
            INSERT INTO patients (
                id, patient_id, full_name, age, gender, mobile_number, email, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                id,
                patient_id,
                fields.full_name,
                fields.age,
                fields.gender,
                fields.mobile_number,
                fields.email,
                now_rfc3339(),
            ],
        )
        .map_err(constraint_error)?;
        tx.commit()?;

        info!(id, patient_id = %patient_id, "registered patient");
        self.require_patient(id)
    }

    /// Update a patient's editable fields. The identifier never changes.
    pub fn update_patient(&self, id: i64, input: &PatientInput) -> DbResult<Option<Patient>> {
        let PatientFields {
            full_name,
            age,
            gender,
            mobile_number,
            email,
        } = input.validate()?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                full_name = ?2,
                age = ?3,
                gender = ?4,
                mobile_number = ?5,
                email = ?6
            WHERE id = ?1
            "#,
            params![id, full_name, age, gender, mobile_number, email],
        )?;
        if rows_affected == 0 {
            return Ok(None);
        }
        self.get_patient(id)
    }

    /// Get a patient by row id.
    pub fn get_patient(&self, id: i64) -> DbResult<Option<Patient>> {
        let sql = format!("{} WHERE id = ?", SELECT_PATIENT);
        self.conn
            .query_row(&sql, [id], patient_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// Get a patient by its `PAT###` identifier.
    pub fn get_patient_by_identifier(&self, patient_id: &str) -> DbResult<Option<Patient>> {
        let sql = format!("{} WHERE patient_id = ?", SELECT_PATIENT);
        self.conn
            .query_row(&sql, [patient_id], patient_from_row)
            .optional()
            .map_err(Into::into)
    }

    fn require_patient(&self, id: i64) -> DbResult<Patient> {
        self.get_patient(id)?
            .ok_or_else(|| DbError::NotFound(format!("patient {}", id)))
    }

    /// List all patients in creation order.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let sql = format!("{} ORDER BY id", SELECT_PATIENT);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], patient_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a patient (and, by cascade, their reports).
    pub fn delete_patient(&self, id: i64) -> DbResult<bool> {
        self.delete_row("patients", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn input(name: &str) -> PatientInput {
        PatientInput {
            full_name: Some(name.into()),
            age: Some(35),
            gender: Some("Male".into()),
            mobile_number: Some("9000000001".into()),
            email: Some("patient@example.com".into()),
        }
    }

    #[test]
    fn test_create_and_get() {
        let db = setup_db();

        let patient = db.create_patient(&input("Ravi Kumar")).unwrap();
        assert_eq!(patient.patient_id, "PAT001");

        let retrieved = db.get_patient(patient.id).unwrap().unwrap();
        assert_eq!(retrieved.full_name, "Ravi Kumar");
        assert_eq!(retrieved.email, Some("patient@example.com".into()));
        assert!(!retrieved.created_at.is_empty());

        let by_identifier = db.get_patient_by_identifier("PAT001").unwrap().unwrap();
        assert_eq!(by_identifier.id, patient.id);
    }

    #[test]
    fn test_sequential_identifiers() {
        let db = setup_db();

        let ids: Vec<String> = (1..=12)
            .map(|i| db.create_patient(&input(&format!("P{}", i))).unwrap().patient_id)
            .collect();

        let expected: Vec<String> = (1..=12).map(|i| format!("PAT{:03}", i)).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_identifier_not_reused_after_delete() {
        let db = setup_db();

        db.create_patient(&input("A")).unwrap();
        let second = db.create_patient(&input("B")).unwrap();
        assert!(db.delete_patient(second.id).unwrap());

        let third = db.create_patient(&input("C")).unwrap();
        assert_eq!(third.patient_id, "PAT003");
    }

    #[test]
    fn test_update_keeps_identifier() {
        let db = setup_db();
        let patient = db.create_patient(&input("Meera")).unwrap();

        let mut changed = input("Meera Shah");
        changed.age = Some(36);
        changed.email = None;
        let updated = db.update_patient(patient.id, &changed).unwrap().unwrap();

        assert_eq!(updated.patient_id, patient.patient_id);
        assert_eq!(updated.created_at, patient.created_at);
        assert_eq!(updated.full_name, "Meera Shah");
        assert_eq!(updated.age, 36);
        assert_eq!(updated.email, None);
    }

    #[test]
    fn test_update_missing_patient() {
        let db = setup_db();
        assert!(db.update_patient(99, &input("Nobody")).unwrap().is_none());
    }

    #[test]
    fn test_invalid_input_creates_nothing() {
        let db = setup_db();
        let result = db.create_patient(&PatientInput::default());
        assert!(matches!(result, Err(DbError::Validation(_))));
        assert!(db.list_patients().unwrap().is_empty());

        // Failed attempts do not consume identifiers
        let patient = db.create_patient(&input("First")).unwrap();
        assert_eq!(patient.patient_id, "PAT001");
    }
}
