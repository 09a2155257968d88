use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::errors::PricingError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    MultiYear,
    PrePay,
    Promotional,
    SpecialNegotiation,
    Custom,
}

/// Percentage resolved from the contract-duration table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "finite_multi_year"))]
pub struct MultiYearDiscount {
    #[validate(range(min = 0.0, max = 100.0, message = "value must be between 0 and 100"))]
    pub value: f64,
}

/// Percentage resolved from the pre-payment duration table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "finite_pre_pay"))]
pub struct PrePayDiscount {
    #[validate(range(min = 0.0, max = 100.0, message = "value must be between 0 and 100"))]
    pub value: f64,
}

/// Percentage off, only once the running price reaches `minimum_limit`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "finite_promotional"))]
pub struct PromotionalDiscount {
    #[validate(range(min = 0.0, max = 100.0, message = "value must be between 0 and 100"))]
    pub value: f64,
    #[validate(range(min = 0.0, message = "minimum_limit must not be negative"))]
    pub minimum_limit: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "finite_special_negotiation"))]
pub struct SpecialNegotiationDiscount {
    #[validate(range(min = 0.0, max = 100.0, message = "value must be between 0 and 100"))]
    pub value: f64,
}

/// Margin adjustment in percentage points. Excludes every predefined kind.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "finite_custom"))]
pub struct CustomDiscount {
    #[validate(range(min = 0.0, max = 100.0, message = "value must be between 0 and 100"))]
    pub value: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discount {
    MultiYear(MultiYearDiscount),
    PrePay(PrePayDiscount),
    Promotional(PromotionalDiscount),
    SpecialNegotiation(SpecialNegotiationDiscount),
    Custom(CustomDiscount),
}

impl Discount {
    pub fn kind(&self) -> DiscountKind {
        match self {
            Self::MultiYear(_) => DiscountKind::MultiYear,
            Self::PrePay(_) => DiscountKind::PrePay,
            Self::Promotional(_) => DiscountKind::Promotional,
            Self::SpecialNegotiation(_) => DiscountKind::SpecialNegotiation,
            Self::Custom(_) => DiscountKind::Custom,
        }
    }
}

/// At most one of each predefined kind. Field order is application order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicablePredefinedDiscounts {
    #[serde(default)]
    pub multi_year: Option<MultiYearDiscount>,
    #[serde(default)]
    pub pre_pay: Option<PrePayDiscount>,
    #[serde(default)]
    pub promotional: Option<PromotionalDiscount>,
    #[serde(default)]
    pub special_negotiation: Option<SpecialNegotiationDiscount>,
}

impl ApplicablePredefinedDiscounts {
    pub fn from_discounts(
        discounts: impl IntoIterator<Item = Discount>,
    ) -> Result<Self, PricingError> {
        let mut applicable = Self::default();

        for discount in discounts {
            let kind = discount.kind();
            let occupied = match discount {
                Discount::MultiYear(value) => applicable.multi_year.replace(value).is_some(),
                Discount::PrePay(value) => applicable.pre_pay.replace(value).is_some(),
                Discount::Promotional(value) => applicable.promotional.replace(value).is_some(),
                Discount::SpecialNegotiation(value) => {
                    applicable.special_negotiation.replace(value).is_some()
                }
                Discount::Custom(_) => {
                    return Err(PricingError::UnsupportedDiscountVariant {
                        kind,
                        stage: "predefined",
                    })
                }
            };
            if occupied {
                return Err(PricingError::DuplicateDiscount(kind));
            }
        }

        Ok(applicable)
    }

    pub fn is_empty(&self) -> bool {
        self.multi_year.is_none()
            && self.pre_pay.is_none()
            && self.promotional.is_none()
            && self.special_negotiation.is_none()
    }

    pub fn kinds(&self) -> Vec<DiscountKind> {
        let mut kinds = Vec::with_capacity(4);
        if self.multi_year.is_some() {
            kinds.push(DiscountKind::MultiYear);
        }
        if self.pre_pay.is_some() {
            kinds.push(DiscountKind::PrePay);
        }
        if self.promotional.is_some() {
            kinds.push(DiscountKind::Promotional);
        }
        if self.special_negotiation.is_some() {
            kinds.push(DiscountKind::SpecialNegotiation);
        }
        kinds
    }
}

/// Discounts currently attached to a distributor or a pack quote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachedDiscounts {
    #[serde(default)]
    pub custom: Option<CustomDiscount>,
    #[serde(default)]
    pub predefined: ApplicablePredefinedDiscounts,
}

impl AttachedDiscounts {
    pub fn custom(discount: CustomDiscount) -> Self {
        Self { custom: Some(discount), predefined: ApplicablePredefinedDiscounts::default() }
    }

    pub fn predefined(discounts: ApplicablePredefinedDiscounts) -> Self {
        Self { custom: None, predefined: discounts }
    }
}

pub(crate) fn ensure_finite(fields: &[(&'static str, f64)]) -> Result<(), ValidationError> {
    match fields.iter().find(|(_, value)| !value.is_finite()) {
        Some((field, _)) => {
            let mut error = ValidationError::new("finite");
            error.message = Some(Cow::Owned(format!("{field} must be a finite number")));
            error.add_param(Cow::Borrowed("field"), field);
            Err(error)
        }
        None => Ok(()),
    }
}

fn finite_multi_year(discount: &MultiYearDiscount) -> Result<(), ValidationError> {
    ensure_finite(&[("value", discount.value)])
}

fn finite_pre_pay(discount: &PrePayDiscount) -> Result<(), ValidationError> {
    ensure_finite(&[("value", discount.value)])
}

fn finite_promotional(discount: &PromotionalDiscount) -> Result<(), ValidationError> {
    ensure_finite(&[("value", discount.value), ("minimum_limit", discount.minimum_limit)])
}

fn finite_special_negotiation(
    discount: &SpecialNegotiationDiscount,
) -> Result<(), ValidationError> {
    ensure_finite(&[("value", discount.value)])
}

fn finite_custom(discount: &CustomDiscount) -> Result<(), ValidationError> {
    ensure_finite(&[("value", discount.value)])
}
