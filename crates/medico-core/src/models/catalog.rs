//! Lab test catalog models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::validation::ValidationErrors;

/// Grouping for lab tests (e.g., "Biochemistry").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCategory {
    pub id: i64,
    /// Unique category name
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCategoryInput {
    pub name: Option<String>,
}

impl TestCategoryInput {
    pub fn validate(&self) -> Result<String, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = errors.text("name", &self.name, 50);
        errors.into_result().map(|_| name)
    }
}

impl From<&TestCategory> for TestCategoryInput {
    fn from(c: &TestCategory) -> Self {
        Self {
            name: Some(c.name.clone()),
        }
    }
}

/// An orderable lab test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabTest {
    pub id: i64,
    pub name: String,
    /// Category row id
    pub category: i64,
    /// Category name (read-only, joined)
    pub category_name: String,
    /// Price with two decimal places, serialized as a string
    pub price: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabTestInput {
    pub name: Option<String>,
    pub category: Option<i64>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabTestFields {
    pub name: String,
    pub category: i64,
    pub price: Decimal,
}

impl LabTestInput {
    /// Shape checks only; the category's existence is checked by the store.
    pub fn validate(&self) -> Result<LabTestFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = errors.text("name", &self.name, 100);
        let category = errors.required("category", &self.category);
        let price = errors.decimal("price", &self.price, 10, 2);

        match category {
            Some(category) if errors.is_empty() => Ok(LabTestFields {
                name,
                category,
                price,
            }),
            _ => Err(errors),
        }
    }
}

impl From<&LabTest> for LabTestInput {
    fn from(t: &LabTest) -> Self {
        Self {
            name: Some(t.name.clone()),
            category: Some(t.category),
            price: Some(t.price),
        }
    }
}

/// One measured quantity of a lab test (e.g., "HDL Cholesterol").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestParameter {
    pub id: i64,
    /// Owning lab test row id
    pub lab_test: i64,
    pub name: String,
    pub unit: String,
    /// Reference range as displayed on reports (e.g., "< 200")
    pub normal_range: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestParameterInput {
    pub lab_test: Option<i64>,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub normal_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestParameterFields {
    pub lab_test: i64,
    pub name: String,
    pub unit: String,
    pub normal_range: String,
}

impl TestParameterInput {
    pub fn validate(&self) -> Result<TestParameterFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let lab_test = errors.required("lab_test", &self.lab_test);
        let name = errors.text("name", &self.name, 100);
        let unit = errors.text("unit", &self.unit, 50);
        let normal_range = errors.text("normal_range", &self.normal_range, 50);

        match lab_test {
            Some(lab_test) if errors.is_empty() => Ok(TestParameterFields {
                lab_test,
                name,
                unit,
                normal_range,
            }),
            _ => Err(errors),
        }
    }
}

impl From<&TestParameter> for TestParameterInput {
    fn from(p: &TestParameter) -> Self {
        Self {
            lab_test: Some(p.lab_test),
            name: Some(p.name.clone()),
            unit: Some(p.unit.clone()),
            normal_range: Some(p.normal_range.clone()),
        }
    }
}
