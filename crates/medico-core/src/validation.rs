//! Field-level validation errors.
//!
//! Inputs arrive with every field optional; each entity's `validate` turns
//! them into a fully-typed record or a map of `field -> [messages]`.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";

/// Messages keyed by field name, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field error.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Required non-blank text with a length cap.
    pub fn text(&mut self, field: &str, value: &Option<String>, max_len: usize) -> String {
        match value {
            None => {
                self.add(field, REQUIRED);
                String::new()
            }
            Some(v) if v.trim().is_empty() => {
                self.add(field, BLANK);
                String::new()
            }
            Some(v) => {
                self.max_len(field, v, max_len);
                v.clone()
            }
        }
    }

    /// Text that may be blank or missing (defaults to empty).
    pub fn blankable_text(&mut self, field: &str, value: &Option<String>, max_len: Option<usize>) -> String {
        let v = value.clone().unwrap_or_default();
        if let Some(max) = max_len {
            self.max_len(field, &v, max);
        }
        v
    }

    /// Required value of any type.
    pub fn required<T: Clone>(&mut self, field: &str, value: &Option<T>) -> Option<T> {
        if value.is_none() {
            self.add(field, REQUIRED);
        }
        value.clone()
    }

    /// Required value parsed from one of a fixed set of strings.
    pub fn choice<T>(
        &mut self,
        field: &str,
        value: &Option<String>,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        let raw = value.as_deref().or_else(|| {
            self.add(field, REQUIRED);
            None
        })?;
        let parsed = parse(raw);
        if parsed.is_none() {
            self.add(field, format!("\"{}\" is not a valid choice.", raw));
        }
        parsed
    }

    /// Optional email address; blank is treated as absent.
    pub fn optional_email(&mut self, field: &str, value: &Option<String>) -> Option<String> {
        let v = value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        if !looks_like_email(v) {
            self.add(field, INVALID_EMAIL);
        }
        self.max_len(field, v, 254);
        Some(v.to_string())
    }

    /// Non-negative decimal with at most `max_digits` digits, `places` of them fractional.
    pub fn decimal(
        &mut self,
        field: &str,
        value: &Option<Decimal>,
        max_digits: u32,
        places: u32,
    ) -> Decimal {
        let Some(v) = *value else {
            self.add(field, REQUIRED);
            return Decimal::ZERO;
        };
        let normalized = v.normalize();
        if normalized.is_sign_negative() && !normalized.is_zero() {
            self.add(field, "Ensure this value is greater than or equal to 0.");
        }
        if normalized.scale() > places {
            self.add(
                field,
                format!("Ensure that there are no more than {} decimal places.", places),
            );
        }
        let whole_digits = normalized.trunc().abs().to_string().trim_start_matches('0').len() as u32;
        if whole_digits > max_digits - places {
            self.add(
                field,
                format!(
                    "Ensure that there are no more than {} digits before the decimal point.",
                    max_digits - places
                ),
            );
        }
        let mut rescaled = v;
        rescaled.rescale(places);
        rescaled
    }

    fn max_len(&mut self, field: &str, value: &str, max_len: usize) {
        if value.chars().count() > max_len {
            self.add(
                field,
                format!("Ensure this field has no more than {} characters.", max_len),
            );
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Message for a foreign key that points nowhere.
pub fn missing_pk(id: i64) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", id)
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !local.contains(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains(char::is_whitespace)
}
