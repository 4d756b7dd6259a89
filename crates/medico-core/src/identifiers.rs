//! Human-readable patient identifiers.
//!
//! A patient's identifier is `PAT` followed by its storage sequence number,
//! zero-padded to three digits. The sequence comes from the `patients`
//! table's AUTOINCREMENT counter, read under the write lock of the
//! inserting transaction, so two creators can never compute the same value
//! and a deleted patient's identifier is never handed out again.

/// Prefix shared by every patient identifier.
pub const PATIENT_ID_PREFIX: &str = "PAT";

/// Format a sequence number as a patient identifier.
///
/// Numbers of four or more digits widen the string (`PAT1000`).
pub fn format_patient_id(sequence: i64) -> String {
    format!("{}{:03}", PATIENT_ID_PREFIX, sequence)
}

/// Identifier that follows the highest sequence number issued so far.
pub fn next_patient_id(last_sequence: Option<i64>) -> String {
    format_patient_id(last_sequence.unwrap_or(0) + 1)
}
