use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::{Validate, ValidationErrors};

use crate::errors::PricingError;

const SCHEMA_FIELD: &str = "__all__";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub code: String,
    pub message: String,
}

/// Checks an input value object against its constraint set before any
/// arithmetic runs.
pub trait InputValidator: Send + Sync {
    fn violations<T: Validate>(&self, value: &T) -> Vec<Violation>;

    fn validate<T: Validate + Serialize>(
        &self,
        subject: &str,
        value: &T,
    ) -> Result<(), PricingError> {
        let violations = self.violations(value);
        if violations.is_empty() {
            return Ok(());
        }

        warn!(
            event_name = "pricing.validation.rejected",
            subject,
            violation_count = violations.len(),
            "pricing input rejected"
        );

        Err(PricingError::ValidationFailed {
            subject: subject.to_owned(),
            payload: serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
            violations,
        })
    }
}

/// Runs the `validator` derive constraints declared on the value objects.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConstraintValidator;

impl InputValidator for ConstraintValidator {
    fn violations<T: Validate>(&self, value: &T) -> Vec<Violation> {
        match value.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => flatten(&errors),
        }
    }
}

fn flatten(errors: &ValidationErrors) -> Vec<Violation> {
    let mut violations: Vec<Violation> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |error| {
                let field = if field == SCHEMA_FIELD {
                    error
                        .params
                        .get("field")
                        .and_then(|value| value.as_str())
                        .unwrap_or(field)
                        .to_owned()
                } else {
                    field.to_owned()
                };
                let message = error
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("{field} failed the `{}` constraint", error.code));

                Violation { field, code: error.code.to_string(), message }
            })
        })
        .collect();

    violations.sort_by(|left, right| {
        left.field.cmp(&right.field).then_with(|| left.code.cmp(&right.code))
    });
    violations
}
