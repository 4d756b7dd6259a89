//! Patient models.

use serde::{Deserialize, Serialize};

use crate::validation::ValidationErrors;

/// Patient gender as recorded at registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Male" => Some(Gender::Male),
            "Female" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// A registered patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Storage row id
    pub id: i64,
    /// Human-readable identifier (`PAT001`), assigned once at creation
    pub patient_id: String,
    pub full_name: String,
    pub age: u32,
    pub gender: Gender,
    pub mobile_number: String,
    pub email: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// Writable patient fields as they arrive over the wire.
///
/// `patient_id` and `created_at` are read-only and therefore absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientInput {
    pub full_name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub mobile_number: Option<String>,
    pub email: Option<String>,
}

/// Validated patient fields, ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientFields {
    pub full_name: String,
    pub age: u32,
    pub gender: Gender,
    pub mobile_number: String,
    pub email: Option<String>,
}

impl PatientInput {
    pub fn validate(&self) -> Result<PatientFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let full_name = errors.text("full_name", &self.full_name, 100);
        let age = errors.required("age", &self.age);
        let gender = errors.choice("gender", &self.gender, Gender::parse);
        let mobile_number = errors.text("mobile_number", &self.mobile_number, 15);
        let email = errors.optional_email("email", &self.email);

        match (age, gender) {
            (Some(age), Some(gender)) if errors.is_empty() => Ok(PatientFields {
                full_name,
                age,
                gender,
                mobile_number,
                email,
            }),
            _ => Err(errors),
        }
    }
}

impl From<&Patient> for PatientInput {
    fn from(p: &Patient) -> Self {
        Self {
            full_name: Some(p.full_name.clone()),
            age: Some(p.age),
            gender: Some(p.gender.as_str().to_string()),
            mobile_number: Some(p.mobile_number.clone()),
            email: p.email.clone(),
        }
    }
}
