//! Garde validation utilities.

use crate::domain::DomainError;
use garde::{Report, Validate};

/// Validate a request, turning a garde report into `DomainError::ValidationError`
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(describe_report(&report)))
}

/// One `path: message` entry per failed rule, comma separated
fn describe_report(report: &Report) -> String {
    let mut messages = Vec::new();
    for (path, error) in report.iter() {
        let path = path.to_string();
        if path.is_empty() {
            messages.push(error.message().to_string());
        } else {
            messages.push(format!("{}: {}", path, error.message()));
        }
    }
    messages.join(", ")
}
