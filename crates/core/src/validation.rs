//! Request validation helpers built on the `validator` crate.

use validator::{Validate, ValidationErrors};

use crate::error::CoreError;

/// Run `validator` rules on `input`, mapping failures to [`CoreError::Validation`].
///
/// Field errors are flattened into one `field: message` list sorted by
/// field name so the output is stable across runs.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), CoreError> {
    input
        .validate()
        .map_err(|errors| CoreError::Validation(flatten_errors(&errors)))
}

fn flatten_errors(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let detail = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{field}: {detail}")
        })
        .collect();
    parts.sort();
    parts.join("; ")
}
