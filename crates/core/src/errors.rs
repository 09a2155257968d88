use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::discount::DiscountKind;
use crate::pricing::validation::Violation;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("{subject} failed validation: {}", render_violations(.violations))]
    ValidationFailed { subject: String, payload: serde_json::Value, violations: Vec<Violation> },
    #[error("unsupported contract type `{0}`")]
    UnsupportedContractType(String),
    #[error("discount variant {kind:?} cannot be composed by the {stage} stage")]
    UnsupportedDiscountVariant { kind: DiscountKind, stage: &'static str },
    #[error("discount {0:?} is attached more than once")]
    DuplicateDiscount(DiscountKind),
    /// `date` is `None` when the latest known rate was requested.
    #[error("no exchange rate for {currency} {}", render_rate_date(.date))]
    MissingExchangeRate { currency: String, date: Option<NaiveDate> },
    #[error("quote has no distributor `{0}`")]
    UnknownDistributor(String),
    #[error("operation `{operation}` requires a {expected} quote")]
    ContractTypeMismatch { operation: &'static str, expected: &'static str },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

fn render_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|violation| format!("{}: {}", violation.field, violation.message))
        .collect::<Vec<_>>()
        .join("; ")
}

fn render_rate_date(date: &Option<NaiveDate>) -> String {
    match date {
        Some(date) => format!("on {date}"),
        None => "on record".to_owned(),
    }
}

impl PricingError {
    /// Fatal conditions point at corrupt upstream data rather than a bad edit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedContractType(_)
                | Self::UnsupportedDiscountVariant { .. }
                | Self::DuplicateDiscount(_)
                | Self::MissingExchangeRate { .. }
        )
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The pricing request could not be processed. Check margin, tax and discount values."
            }
            Self::Internal { .. } => {
                "An unexpected internal error occurred while pricing the quote."
            }
        }
    }
}

impl From<PricingError> for InterfaceError {
    fn from(value: PricingError) -> Self {
        let fatal = value.is_fatal();
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        if fatal {
            Self::Internal { message, correlation_id }
        } else {
            Self::BadRequest { message, correlation_id }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::discount::DiscountKind;
    use crate::errors::{InterfaceError, PricingError};
    use crate::pricing::validation::Violation;

    #[test]
    fn validation_failure_maps_to_bad_request() {
        let interface = PricingError::ValidationFailed {
            subject: "MarginTaxInput".to_owned(),
            payload: serde_json::json!({"margin_value": 400.0, "tax_value": 0.0}),
            violations: vec![Violation {
                field: "margin_value".to_owned(),
                code: "range".to_owned(),
                message: "margin_value must be between -100 and 100".to_owned(),
            }],
        }
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, ref message }
                if correlation_id == "req-1" && message.contains("margin_value")
        ));
        assert_eq!(
            interface.user_message(),
            "The pricing request could not be processed. Check margin, tax and discount values."
        );
    }

    #[test]
    fn data_integrity_errors_map_to_internal() {
        let unsupported = PricingError::UnsupportedContractType("Lease".to_owned());
        assert!(unsupported.is_fatal());
        assert!(matches!(unsupported.into_interface("req-2"), InterfaceError::Internal { .. }));

        let variant = PricingError::UnsupportedDiscountVariant {
            kind: DiscountKind::Custom,
            stage: "predefined",
        };
        assert!(matches!(variant.into_interface("req-3"), InterfaceError::Internal { .. }));
    }

    #[test]
    fn missing_rate_message_names_currency_and_day() {
        let error = PricingError::MissingExchangeRate {
            currency: "GBP".to_owned(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
        };
        assert_eq!(error.to_string(), "no exchange rate for GBP on 2024-03-01");

        let latest = PricingError::MissingExchangeRate { currency: "GBP".to_owned(), date: None };
        assert_eq!(latest.to_string(), "no exchange rate for GBP on record");
    }

    #[test]
    fn unknown_distributor_is_user_correctable() {
        let error = PricingError::UnknownDistributor("dist-9".to_owned());
        assert!(!error.is_fatal());
        assert!(matches!(error.into_interface("req-4"), InterfaceError::BadRequest { .. }));
    }
}
