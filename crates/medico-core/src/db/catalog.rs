//! Test catalog database operations: categories, lab tests, parameters.

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::info;

use super::{constraint_error, Database, DbError, DbResult};
use crate::models::{
    LabTest, LabTestFields, LabTestInput, TestCategory, TestCategoryInput, TestParameter,
    TestParameterFields, TestParameterInput,
};
use crate::templates::seed_parameters;
use crate::validation::ValidationErrors;

const SELECT_LAB_TEST: &str = r#"
    SELECT t.id, t.name, t.category_id, c.name, t.price
    FROM lab_tests t
    JOIN test_categories c ON c.id = t.category_id
"#;

const SELECT_PARAMETER: &str = r#"
    SELECT id, lab_test_id, name, unit, normal_range
    FROM test_parameters
"#;

fn lab_test_from_row(row: &Row<'_>) -> rusqlite::Result<LabTest> {
    let price: String = row.get(4)?;
    let price = Decimal::from_str(&price)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(LabTest {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        category_name: row.get(3)?,
        price,
    })
}

fn parameter_from_row(row: &Row<'_>) -> rusqlite::Result<TestParameter> {
    Ok(TestParameter {
        id: row.get(0)?,
        lab_test: row.get(1)?,
        name: row.get(2)?,
        unit: row.get(3)?,
        normal_range: row.get(4)?,
    })
}

impl Database {
    // ========================================================================
    // Categories
    // ========================================================================

    fn checked_category_name(
        &self,
        input: &TestCategoryInput,
        exclude_id: Option<i64>,
    ) -> DbResult<String> {
        let name = input.validate()?;
        let mut errors = ValidationErrors::new();
        self.check_unique(
            &mut errors,
            "test_categories",
            "test category",
            "name",
            &name,
            exclude_id,
        )?;
        errors.into_result()?;
        Ok(name)
    }

    pub fn create_test_category(&self, input: &TestCategoryInput) -> DbResult<TestCategory> {
        let name = self.checked_category_name(input, None)?;
        self.conn
            .execute("INSERT INTO test_categories (name) VALUES (?1)", [&name])
            .map_err(constraint_error)?;
        Ok(TestCategory {
            id: self.conn.last_insert_rowid(),
            name,
        })
    }

    pub fn update_test_category(
        &self,
        id: i64,
        input: &TestCategoryInput,
    ) -> DbResult<Option<TestCategory>> {
        let name = self.checked_category_name(input, Some(id))?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE test_categories SET name = ?2 WHERE id = ?1",
                params![id, name],
            )
            .map_err(constraint_error)?;
        Ok((rows_affected > 0).then_some(TestCategory { id, name }))
    }

    pub fn get_test_category(&self, id: i64) -> DbResult<Option<TestCategory>> {
        self.conn
            .query_row(
                "SELECT id, name FROM test_categories WHERE id = ?",
                [id],
                |row| {
                    Ok(TestCategory {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_test_categories(&self) -> DbResult<Vec<TestCategory>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM test_categories ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(TestCategory {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a category along with its lab tests, their parameters and reports.
    pub fn delete_test_category(&self, id: i64) -> DbResult<bool> {
        self.delete_row("test_categories", id)
    }

    // ========================================================================
    // Lab tests
    // ========================================================================

    fn checked_lab_test(&self, input: &LabTestInput) -> DbResult<LabTestFields> {
        let fields = input.validate()?;
        let mut errors = ValidationErrors::new();
        self.check_reference(&mut errors, "category", "test_categories", fields.category)?;
        errors.into_result()?;
        Ok(fields)
    }

    /// Create a lab test and seed its default parameters, atomically.
    pub fn create_lab_test(&self, input: &LabTestInput) -> DbResult<LabTest> {
        let LabTestFields {
            name,
            category,
            price,
        } = self.checked_lab_test(input)?;

        let tx = self.write_transaction()?;
        tx.execute(
            "INSERT INTO lab_tests (name, category_id, price) VALUES (?1, ?2, ?3)",
            params![name, category, price.to_string()],
        )
        .map_err(constraint_error)?;
        let id = tx.last_insert_rowid();
        let seeded = seed_parameters(&tx, self.templates, id, &name)?;
        tx.commit()?;

        info!(id, name = %name, seeded, "created lab test");
        self.require_lab_test(id)
    }

    /// Update a lab test. Templates are never applied on update.
    pub fn update_lab_test(&self, id: i64, input: &LabTestInput) -> DbResult<Option<LabTest>> {
        let LabTestFields {
            name,
            category,
            price,
        } = self.checked_lab_test(input)?;

        let rows_affected = self
            .conn
            .execute(
                "UPDATE lab_tests SET name = ?2, category_id = ?3, price = ?4 WHERE id = ?1",
                params![id, name, category, price.to_string()],
            )
            .map_err(constraint_error)?;
        if rows_affected == 0 {
            return Ok(None);
        }
        self.get_lab_test(id)
    }

    pub fn get_lab_test(&self, id: i64) -> DbResult<Option<LabTest>> {
        let sql = format!("{} WHERE t.id = ?", SELECT_LAB_TEST);
        self.conn
            .query_row(&sql, [id], lab_test_from_row)
            .optional()
            .map_err(Into::into)
    }

    fn require_lab_test(&self, id: i64) -> DbResult<LabTest> {
        self.get_lab_test(id)?
            .ok_or_else(|| DbError::NotFound(format!("lab test {}", id)))
    }

    pub fn list_lab_tests(&self) -> DbResult<Vec<LabTest>> {
        let sql = format!("{} ORDER BY t.id", SELECT_LAB_TEST);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], lab_test_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_lab_test(&self, id: i64) -> DbResult<bool> {
        self.delete_row("lab_tests", id)
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    fn checked_parameter(&self, input: &TestParameterInput) -> DbResult<TestParameterFields> {
        let fields = input.validate()?;
        let mut errors = ValidationErrors::new();
        self.check_reference(&mut errors, "lab_test", "lab_tests", fields.lab_test)?;
        errors.into_result()?;
        Ok(fields)
    }

    /// Add a parameter to a lab test. Existing reports are not touched.
    pub fn create_test_parameter(&self, input: &TestParameterInput) -> DbResult<TestParameter> {
        let TestParameterFields {
            lab_test,
            name,
            unit,
            normal_range,
        } = self.checked_parameter(input)?;

        self.conn
            .execute(
                r#"
                INSERT INTO test_parameters (lab_test_id, name, unit, normal_range)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![lab_test, name, unit, normal_range],
            )
            .map_err(constraint_error)?;
        Ok(TestParameter {
            id: self.conn.last_insert_rowid(),
            lab_test,
            name,
            unit,
            normal_range,
        })
    }

    pub fn update_test_parameter(
        &self,
        id: i64,
        input: &TestParameterInput,
    ) -> DbResult<Option<TestParameter>> {
        let TestParameterFields {
            lab_test,
            name,
            unit,
            normal_range,
        } = self.checked_parameter(input)?;

        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE test_parameters
                SET lab_test_id = ?2, name = ?3, unit = ?4, normal_range = ?5
                WHERE id = ?1
                "#,
                params![id, lab_test, name, unit, normal_range],
            )
            .map_err(constraint_error)?;
        Ok((rows_affected > 0).then_some(TestParameter {
            id,
            lab_test,
            name,
            unit,
            normal_range,
        }))
    }

    pub fn get_test_parameter(&self, id: i64) -> DbResult<Option<TestParameter>> {
        let sql = format!("{} WHERE id = ?", SELECT_PARAMETER);
        self.conn
            .query_row(&sql, [id], parameter_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn list_test_parameters(&self) -> DbResult<Vec<TestParameter>> {
        let sql = format!("{} ORDER BY id", SELECT_PARAMETER);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], parameter_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Parameters of one lab test, in insertion order.
    pub fn list_parameters_for_test(&self, lab_test_id: i64) -> DbResult<Vec<TestParameter>> {
        let sql = format!("{} WHERE lab_test_id = ? ORDER BY id", SELECT_PARAMETER);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([lab_test_id], parameter_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_test_parameter(&self, id: i64) -> DbResult<bool> {
        self.delete_row("test_parameters", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{ParameterSpec, ParameterTemplate, LIPID_PROFILE};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn category(db: &Database, name: &str) -> TestCategory {
        db.create_test_category(&TestCategoryInput {
            name: Some(name.into()),
        })
        .unwrap()
    }

    fn lab_test_input(name: &str, category: i64) -> LabTestInput {
        LabTestInput {
            name: Some(name.into()),
            category: Some(category),
            price: Some(Decimal::from(450)),
        }
    }

    #[test]
    fn test_category_crud() {
        let db = setup_db();
        let created = category(&db, "Biochemistry");
        assert_eq!(db.get_test_category(created.id).unwrap(), Some(created.clone()));

        let renamed = db
            .update_test_category(
                created.id,
                &TestCategoryInput {
                    name: Some("Clinical Biochemistry".into()),
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "Clinical Biochemistry");

        assert!(db.delete_test_category(created.id).unwrap());
        assert!(db.list_test_categories().unwrap().is_empty());
        assert!(!db.delete_test_category(created.id).unwrap());
    }

    #[test]
    fn test_category_name_unique() {
        let db = setup_db();
        let first = category(&db, "Hematology");

        let err = db
            .create_test_category(&TestCategoryInput {
                name: Some("Hematology".into()),
            })
            .unwrap_err();
        match err {
            DbError::Validation(errors) => assert_eq!(
                errors.get("name").unwrap()[0],
                "test category with this name already exists."
            ),
            other => panic!("unexpected error: {:?}", other),
        }

        // Saving a category under its own name is not a conflict
        let same = db
            .update_test_category(
                first.id,
                &TestCategoryInput {
                    name: Some("Hematology".into()),
                },
            )
            .unwrap();
        assert!(same.is_some());
    }

    #[test]
    fn test_lipid_profile_seeds_six_parameters() {
        let db = setup_db();
        let cat = category(&db, "Biochemistry");

        let test = db.create_lab_test(&lab_test_input(LIPID_PROFILE, cat.id)).unwrap();
        assert_eq!(test.category_name, "Biochemistry");
        assert_eq!(test.price.to_string(), "450.00");

        let params = db.list_parameters_for_test(test.id).unwrap();
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Total Cholesterol",
                "LDL Cholesterol",
                "HDL Cholesterol",
                "Triglycerides",
                "Blood Pressure",
                "Blood Glucose",
            ]
        );
        assert_eq!(params[4].unit, "mmHg");
        assert_eq!(params[4].normal_range, "120/80");
    }

    #[test]
    fn test_other_names_seed_nothing() {
        let db = setup_db();
        let cat = category(&db, "Hematology");

        for name in ["CBC", "lipid profile", "Lipid Profile Extended"] {
            let test = db.create_lab_test(&lab_test_input(name, cat.id)).unwrap();
            assert!(db.list_parameters_for_test(test.id).unwrap().is_empty());
        }
    }

    #[test]
    fn test_rename_to_template_name_seeds_nothing() {
        let db = setup_db();
        let cat = category(&db, "Biochemistry");
        let test = db.create_lab_test(&lab_test_input("Lipids", cat.id)).unwrap();

        let updated = db
            .update_lab_test(test.id, &lab_test_input(LIPID_PROFILE, cat.id))
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, LIPID_PROFILE);
        assert!(db.list_parameters_for_test(test.id).unwrap().is_empty());
    }

    #[test]
    fn test_lab_test_requires_existing_category() {
        let db = setup_db();
        let err = db.create_lab_test(&lab_test_input("CBC", 42)).unwrap_err();
        match err {
            DbError::Validation(errors) => assert_eq!(
                errors.get("category").unwrap()[0],
                "Invalid pk \"42\" - object does not exist."
            ),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(db.list_lab_tests().unwrap().is_empty());
    }

    #[test]
    fn test_category_delete_cascades() {
        let db = setup_db();
        let cat = category(&db, "Biochemistry");
        db.create_lab_test(&lab_test_input(LIPID_PROFILE, cat.id)).unwrap();

        db.delete_test_category(cat.id).unwrap();
        assert!(db.list_lab_tests().unwrap().is_empty());
        assert!(db.list_test_parameters().unwrap().is_empty());
    }

    #[test]
    fn test_parameter_crud() {
        let db = setup_db();
        let cat = category(&db, "Hematology");
        let test = db.create_lab_test(&lab_test_input("CBC", cat.id)).unwrap();

        let param = db
            .create_test_parameter(&TestParameterInput {
                lab_test: Some(test.id),
                name: Some("Hemoglobin".into()),
                unit: Some("g/dL".into()),
                normal_range: Some("13.5 - 17.5".into()),
            })
            .unwrap();
        assert_eq!(db.get_test_parameter(param.id).unwrap(), Some(param.clone()));

        let mut input = TestParameterInput::from(&param);
        input.normal_range = Some("13 - 17".into());
        let updated = db.update_test_parameter(param.id, &input).unwrap().unwrap();
        assert_eq!(updated.normal_range, "13 - 17");

        assert!(db.delete_test_parameter(param.id).unwrap());
        assert!(db.get_test_parameter(param.id).unwrap().is_none());
    }

    #[test]
    fn test_custom_templates() {
        static THYROID: &[ParameterTemplate] = &[ParameterTemplate {
            trigger: "Thyroid Panel",
            parameters: &[
                ParameterSpec {
                    name: "TSH",
                    unit: "mIU/L",
                    normal_range: "0.4 - 4.0",
                },
                ParameterSpec {
                    name: "Free T4",
                    unit: "ng/dL",
                    normal_range: "0.8 - 1.8",
                },
            ],
        }];

        let mut db = setup_db();
        db.set_parameter_templates(THYROID);
        let cat = category(&db, "Endocrinology");

        let thyroid = db.create_lab_test(&lab_test_input("Thyroid Panel", cat.id)).unwrap();
        assert_eq!(db.list_parameters_for_test(thyroid.id).unwrap().len(), 2);

        let lipid = db.create_lab_test(&lab_test_input(LIPID_PROFILE, cat.id)).unwrap();
        assert!(db.list_parameters_for_test(lipid.id).unwrap().is_empty());
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.conn()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_failed_seeding_rolls_back_lab_test() {
        let db = setup_db();
        let cat = category(&db, "Biochemistry");
        db.conn()
            .execute_batch(
                "CREATE TRIGGER reject_ldl BEFORE INSERT ON test_parameters
                 WHEN NEW.name = 'LDL Cholesterol'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        assert!(db.create_lab_test(&lab_test_input(LIPID_PROFILE, cat.id)).is_err());
        assert_eq!(count(&db, "lab_tests"), 0);
        assert_eq!(count(&db, "test_parameters"), 0);

        // Connection is usable afterwards
        db.conn().execute_batch("DROP TRIGGER reject_ldl").unwrap();
        db.create_lab_test(&lab_test_input(LIPID_PROFILE, cat.id)).unwrap();
        assert_eq!(count(&db, "test_parameters"), 6);
    }
}
