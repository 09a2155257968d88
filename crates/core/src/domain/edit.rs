use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::domain::discount::{ensure_finite, ApplicablePredefinedDiscounts, CustomDiscount};
use crate::domain::distributor::DistributorId;

const MARGIN_DELTA_LIMIT: f64 = 100.0;

/// Proposed margin and tax values from a review or edit screen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "margin_tax_bounds"))]
pub struct MarginTaxInput {
    pub margin_value: f64,
    #[validate(range(min = 0.0, message = "tax_value must not be negative"))]
    pub tax_value: f64,
}

fn margin_tax_bounds(input: &MarginTaxInput) -> Result<(), ValidationError> {
    ensure_finite(&[("margin_value", input.margin_value), ("tax_value", input.tax_value)])?;

    if input.margin_value.abs() > MARGIN_DELTA_LIMIT {
        let mut error = ValidationError::new("range");
        error.message = Some(Cow::Borrowed("margin_value must be between -100 and 100"));
        error.add_param(Cow::Borrowed("field"), &"margin_value");
        return Err(error);
    }

    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountEdit {
    Custom { discount: CustomDiscount },
    Predefined { discounts: ApplicablePredefinedDiscounts },
}

/// One row of a batch margin/tax edit. `index` is echoed back so the caller
/// can align result rows with its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributorMarginTaxEdit {
    pub index: usize,
    pub distributor_id: DistributorId,
    pub margin_tax: MarginTaxInput,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributorDiscountEdit {
    pub index: usize,
    pub distributor_id: DistributorId,
    pub discount: DiscountEdit,
}
