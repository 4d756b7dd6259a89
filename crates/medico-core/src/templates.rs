//! Template expansion: default parameters for lab tests, blank result rows
//! for reports.
//!
//! Both expansions run inside the transaction of the create operation that
//! triggers them, so the parent row and its children commit together.

use rusqlite::{params, Connection};
use tracing::debug;

use crate::db::DbResult;

/// One parameter row to seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub unit: &'static str,
    pub normal_range: &'static str,
}

/// Parameters seeded when a lab test named `trigger` is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterTemplate {
    /// Exact lab test name that fires the template
    pub trigger: &'static str,
    pub parameters: &'static [ParameterSpec],
}

const fn param(name: &'static str, unit: &'static str, normal_range: &'static str) -> ParameterSpec {
    ParameterSpec {
        name,
        unit,
        normal_range,
    }
}

pub const LIPID_PROFILE: &str = "Lipid Profile";

/// Templates shipped with the system.
pub static PARAMETER_TEMPLATES: &[ParameterTemplate] = &[ParameterTemplate {
    trigger: LIPID_PROFILE,
    parameters: &[
        param("Total Cholesterol", "mg/dL", "< 200"),
        param("LDL Cholesterol", "mg/dL", "< 100"),
        param("HDL Cholesterol", "mg/dL", "> 40"),
        param("Triglycerides", "mg/dL", "< 150"),
        param("Blood Pressure", "mmHg", "120/80"),
        param("Blood Glucose", "mg/dL", "< 100"),
    ],
}];

/// Find the template whose trigger equals `test_name` exactly.
pub fn template_for<'t>(
    templates: &'t [ParameterTemplate],
    test_name: &str,
) -> Option<&'t ParameterTemplate> {
    templates.iter().find(|t| t.trigger == test_name)
}

/// Insert the template parameters for a freshly created lab test.
///
/// Returns the number of parameters inserted (zero when no template matches).
pub(crate) fn seed_parameters(
    conn: &Connection,
    templates: &[ParameterTemplate],
    lab_test_id: i64,
    test_name: &str,
) -> DbResult<usize> {
    let Some(template) = template_for(templates, test_name) else {
        return Ok(0);
    };

    let mut stmt = conn.prepare(
        "INSERT INTO test_parameters (lab_test_id, name, unit, normal_range) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for p in template.parameters {
        stmt.execute(params![lab_test_id, p.name, p.unit, p.normal_range])?;
    }

    debug!(
        lab_test_id,
        template = template.trigger,
        count = template.parameters.len(),
        "seeded default parameters"
    );
    Ok(template.parameters.len())
}

/// Insert one blank result per current parameter of the report's lab test.
///
/// Returns the number of results inserted; a test without parameters yields none.
pub(crate) fn materialize_results(
    conn: &Connection,
    report_id: i64,
    lab_test_id: i64,
) -> DbResult<usize> {
    let inserted = conn.execute(
        r#"
        INSERT INTO test_results (report_id, parameter_id, value)
        SELECT ?1, id, ''
        FROM test_parameters
        WHERE lab_test_id = ?2
        ORDER BY id
        "#,
        params![report_id, lab_test_id],
    )?;

    debug!(report_id, lab_test_id, count = inserted, "materialized result rows");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lipid_profile_template() {
        let template = template_for(PARAMETER_TEMPLATES, LIPID_PROFILE).unwrap();
        assert_eq!(template.parameters.len(), 6);
        assert_eq!(
            template.parameters[2],
            param("HDL Cholesterol", "mg/dL", "> 40")
        );
        assert_eq!(template.parameters[4].unit, "mmHg");
    }

    #[test]
    fn test_trigger_is_exact() {
        assert!(template_for(PARAMETER_TEMPLATES, "lipid profile").is_none());
        assert!(template_for(PARAMETER_TEMPLATES, "Lipid Profile ").is_none());
        assert!(template_for(PARAMETER_TEMPLATES, "CBC").is_none());
    }

    #[test]
    fn test_custom_table() {
        static CUSTOM: &[ParameterTemplate] = &[ParameterTemplate {
            trigger: "Thyroid Panel",
            parameters: &[param("TSH", "mIU/L", "0.4 - 4.0")],
        }];
        assert!(template_for(CUSTOM, "Thyroid Panel").is_some());
        assert!(template_for(CUSTOM, LIPID_PROFILE).is_none());
    }
}
