use tracing::{debug, trace};

use crate::domain::discount::{
    ApplicablePredefinedDiscounts, AttachedDiscounts, CustomDiscount, DiscountKind,
    MultiYearDiscount, PrePayDiscount, PromotionalDiscount, SpecialNegotiationDiscount,
};
use crate::domain::edit::{DiscountEdit, MarginTaxInput};
use crate::domain::summary::{PriceInput, PriceSummary};
use crate::errors::PricingError;
use crate::pricing::margin::{
    margin_percentage, total_price_after_bottom_up_margin, total_price_after_tax,
};
use crate::pricing::validation::InputValidator;

/// One predefined discount step. A stage only moves `final_total_price`.
pub trait DiscountStage {
    fn kind(&self) -> DiscountKind;
    fn apply(&self, summary: PriceSummary) -> PriceSummary;
}

fn percentage_off(price: f64, value: f64) -> f64 {
    price - price * value / 100.0
}

fn with_final_total(summary: PriceSummary, final_total_price: f64) -> PriceSummary {
    PriceSummary { final_total_price, ..summary }
}

impl DiscountStage for MultiYearDiscount {
    fn kind(&self) -> DiscountKind {
        DiscountKind::MultiYear
    }

    fn apply(&self, summary: PriceSummary) -> PriceSummary {
        let price = percentage_off(summary.final_total_price, self.value);
        with_final_total(summary, price)
    }
}

impl DiscountStage for PrePayDiscount {
    fn kind(&self) -> DiscountKind {
        DiscountKind::PrePay
    }

    fn apply(&self, summary: PriceSummary) -> PriceSummary {
        let price = percentage_off(summary.final_total_price, self.value);
        with_final_total(summary, price)
    }
}

impl DiscountStage for PromotionalDiscount {
    fn kind(&self) -> DiscountKind {
        DiscountKind::Promotional
    }

    fn apply(&self, summary: PriceSummary) -> PriceSummary {
        if summary.final_total_price < self.minimum_limit {
            return summary;
        }
        let price = percentage_off(summary.final_total_price, self.value);
        with_final_total(summary, price)
    }
}

impl DiscountStage for SpecialNegotiationDiscount {
    fn kind(&self) -> DiscountKind {
        DiscountKind::SpecialNegotiation
    }

    fn apply(&self, summary: PriceSummary) -> PriceSummary {
        let price = percentage_off(summary.final_total_price, self.value);
        with_final_total(summary, price)
    }
}

/// Present stages in application order.
pub fn stages(discounts: &ApplicablePredefinedDiscounts) -> Vec<&dyn DiscountStage> {
    let mut stages: Vec<&dyn DiscountStage> = Vec::with_capacity(4);
    if let Some(discount) = &discounts.multi_year {
        stages.push(discount);
    }
    if let Some(discount) = &discounts.pre_pay {
        stages.push(discount);
    }
    if let Some(discount) = &discounts.promotional {
        stages.push(discount);
    }
    if let Some(discount) = &discounts.special_negotiation {
        stages.push(discount);
    }
    stages
}

/// Summary after margin, before any discount or tax. `final_total_price`
/// equals `total_price_after_margin` at this point.
pub fn margin_summary(input: PriceInput) -> PriceSummary {
    let total_price_after_margin =
        total_price_after_bottom_up_margin(input.total_price, input.buy_price, input.margin_value);

    PriceSummary {
        total_price: input.total_price,
        total_price_after_margin,
        buy_price: input.buy_price,
        final_total_price: total_price_after_margin,
        final_total_price_excluding_tax: total_price_after_margin,
        applicable_discounts_value: 0.0,
        raw_margin: margin_percentage(input.total_price, input.buy_price),
        final_margin: margin_percentage(total_price_after_margin, input.buy_price),
        margin_after_custom_discount: None,
    }
}

/// Cascades the present predefined discounts over the running final price,
/// then records the discount total, final margin and tax.
pub fn apply_predefined_discounts(
    summary: PriceSummary,
    discounts: &ApplicablePredefinedDiscounts,
    buy_price: f64,
    tax_value: f64,
) -> PriceSummary {
    let discounted = stages(discounts).into_iter().fold(summary, |running, stage| {
        let before = running.final_total_price;
        let next = stage.apply(running);
        trace!(
            event_name = "pricing.discount.applied",
            kind = ?stage.kind(),
            before,
            after = next.final_total_price,
            "discount stage applied"
        );
        next
    });

    let final_total_price_excluding_tax = discounted.final_total_price;
    PriceSummary {
        applicable_discounts_value: discounted.total_price_after_margin
            - final_total_price_excluding_tax,
        final_margin: margin_percentage(final_total_price_excluding_tax, buy_price),
        final_total_price_excluding_tax,
        final_total_price: total_price_after_tax(final_total_price_excluding_tax, tax_value),
        ..discounted
    }
}

/// The custom discount lowers the requested margin instead of taking a
/// percentage off the price.
pub fn apply_custom_discount(input: PriceInput, discount: &CustomDiscount) -> PriceSummary {
    let total_price_after_margin =
        total_price_after_bottom_up_margin(input.total_price, input.buy_price, input.margin_value);
    let total_price_after_custom_discount = total_price_after_bottom_up_margin(
        input.total_price,
        input.buy_price,
        input.margin_value - discount.value,
    );
    let margin_after_custom_discount =
        margin_percentage(total_price_after_custom_discount, input.buy_price);

    PriceSummary {
        total_price: input.total_price,
        total_price_after_margin,
        buy_price: input.buy_price,
        final_total_price: total_price_after_tax(
            total_price_after_custom_discount,
            input.tax_value,
        ),
        final_total_price_excluding_tax: total_price_after_custom_discount,
        applicable_discounts_value: total_price_after_margin - total_price_after_custom_discount,
        raw_margin: margin_percentage(input.total_price, input.buy_price),
        final_margin: margin_after_custom_discount,
        margin_after_custom_discount: Some(margin_after_custom_discount),
    }
}

/// Validates the margin/tax values and every attached discount, then prices
/// through the custom path when a custom discount is attached and through the
/// predefined pipeline otherwise.
pub fn price_summary<V: InputValidator>(
    input: PriceInput,
    discounts: &AttachedDiscounts,
    validator: &V,
) -> Result<PriceSummary, PricingError> {
    validate_margin_tax(&input.margin_tax(), validator)?;
    validate_discounts(discounts, validator)?;
    Ok(compose(input, discounts))
}

/// Prices already-validated inputs. Attached predefined discounts are ignored
/// when a custom discount is present.
pub fn compose(input: PriceInput, discounts: &AttachedDiscounts) -> PriceSummary {
    if let Some(custom) = &discounts.custom {
        let summary = apply_custom_discount(input, custom);
        debug!(
            event_name = "pricing.summary.composed",
            path = "custom",
            final_total_price = summary.final_total_price,
            "price summary composed"
        );
        return summary;
    }

    let summary = apply_predefined_discounts(
        margin_summary(input),
        &discounts.predefined,
        input.buy_price,
        input.tax_value,
    );
    debug!(
        event_name = "pricing.summary.composed",
        path = "predefined",
        stage_count = discounts.predefined.kinds().len(),
        final_total_price = summary.final_total_price,
        "price summary composed"
    );
    summary
}

pub fn validate_margin_tax<V: InputValidator>(
    margin_tax: &MarginTaxInput,
    validator: &V,
) -> Result<(), PricingError> {
    validator.validate("MarginTaxInput", margin_tax)
}

/// Checks the custom discount and every predefined one, even those the custom
/// path will not apply.
pub fn validate_discounts<V: InputValidator>(
    discounts: &AttachedDiscounts,
    validator: &V,
) -> Result<(), PricingError> {
    if let Some(custom) = &discounts.custom {
        validator.validate("CustomDiscount", custom)?;
    }
    validate_predefined(&discounts.predefined, validator)
}

pub fn validate_predefined<V: InputValidator>(
    discounts: &ApplicablePredefinedDiscounts,
    validator: &V,
) -> Result<(), PricingError> {
    if let Some(discount) = &discounts.multi_year {
        validator.validate("MultiYearDiscount", discount)?;
    }
    if let Some(discount) = &discounts.pre_pay {
        validator.validate("PrePayDiscount", discount)?;
    }
    if let Some(discount) = &discounts.promotional {
        validator.validate("PromotionalDiscount", discount)?;
    }
    if let Some(discount) = &discounts.special_negotiation {
        validator.validate("SpecialNegotiationDiscount", discount)?;
    }
    Ok(())
}

/// A what-if value replacing part of an entity's persisted pricing inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Proposal<'a> {
    MarginTax(&'a MarginTaxInput),
    CustomDiscount(&'a CustomDiscount),
    PredefinedDiscounts(&'a ApplicablePredefinedDiscounts),
}

impl<'a> From<&'a DiscountEdit> for Proposal<'a> {
    fn from(edit: &'a DiscountEdit) -> Self {
        match edit {
            DiscountEdit::Custom { discount } => Self::CustomDiscount(discount),
            DiscountEdit::Predefined { discounts } => Self::PredefinedDiscounts(discounts),
        }
    }
}

impl Proposal<'_> {
    pub fn validate<V: InputValidator>(&self, validator: &V) -> Result<(), PricingError> {
        match self {
            Self::MarginTax(margin_tax) => validate_margin_tax(margin_tax, validator),
            Self::CustomDiscount(discount) => validator.validate("CustomDiscount", *discount),
            Self::PredefinedDiscounts(discounts) => validate_predefined(discounts, validator),
        }
    }

    /// Overlays the proposal on the persisted inputs and validates only the
    /// persisted part that is kept. The proposal itself must already be
    /// validated.
    pub fn resolve<V: InputValidator>(
        &self,
        persisted_margin_tax: MarginTaxInput,
        persisted_discounts: &AttachedDiscounts,
        validator: &V,
    ) -> Result<(MarginTaxInput, AttachedDiscounts), PricingError> {
        match self {
            Self::MarginTax(margin_tax) => {
                validate_discounts(persisted_discounts, validator)?;
                Ok((**margin_tax, *persisted_discounts))
            }
            Self::CustomDiscount(discount) => {
                validate_margin_tax(&persisted_margin_tax, validator)?;
                Ok((persisted_margin_tax, AttachedDiscounts::custom(**discount)))
            }
            Self::PredefinedDiscounts(discounts) => {
                validate_margin_tax(&persisted_margin_tax, validator)?;
                Ok((persisted_margin_tax, AttachedDiscounts::predefined(**discounts)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{
        apply_custom_discount, apply_predefined_discounts, margin_summary, price_summary, stages,
        DiscountStage,
    };
    use crate::domain::discount::{
        ApplicablePredefinedDiscounts, AttachedDiscounts, CustomDiscount, DiscountKind,
        MultiYearDiscount, PrePayDiscount, PromotionalDiscount, SpecialNegotiationDiscount,
    };
    use crate::domain::summary::{PriceInput, PriceSummary};
    use crate::errors::PricingError;
    use crate::pricing::validation::ConstraintValidator;

    fn input() -> PriceInput {
        PriceInput { total_price: 1000.0, buy_price: 700.0, margin_value: 10.0, tax_value: 50.0 }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "expected {expected}, got {actual}");
    }

    fn running(price: f64) -> PriceSummary {
        PriceSummary {
            total_price_after_margin: price,
            final_total_price: price,
            ..PriceSummary::default()
        }
    }

    #[test]
    fn no_discounts_yields_margin_and_tax_only() {
        let summary =
            price_summary(input(), &AttachedDiscounts::default(), &ConstraintValidator)
                .expect("valid input");

        assert_close(summary.raw_margin, 30.0);
        assert_close(summary.total_price_after_margin, 700.0 / 0.6);
        assert_close(summary.final_total_price_excluding_tax, 700.0 / 0.6);
        assert_close(summary.final_total_price, 700.0 / 0.6 + 50.0);
        assert_close(summary.final_margin, 40.0);
        assert_close(summary.applicable_discounts_value, 0.0);
        assert_eq!(summary.margin_after_custom_discount, None);
    }

    #[test]
    fn custom_discount_lowers_requested_margin() {
        let summary = apply_custom_discount(input(), &CustomDiscount { value: 5.0 });

        assert_close(summary.final_total_price_excluding_tax, 700.0 / 0.65);
        assert_close(summary.applicable_discounts_value, 700.0 / 0.6 - 700.0 / 0.65);
        assert!((summary.applicable_discounts_value - 89.74).abs() < 0.01);
        assert_close(summary.margin_after_custom_discount.expect("custom path"), 35.0);
        assert_close(summary.final_total_price, 700.0 / 0.65 + 50.0);
    }

    #[test]
    fn predefined_discounts_cascade_in_fixed_order() {
        let discounts = ApplicablePredefinedDiscounts {
            multi_year: Some(MultiYearDiscount { value: 10.0 }),
            pre_pay: Some(PrePayDiscount { value: 10.0 }),
            promotional: None,
            special_negotiation: Some(SpecialNegotiationDiscount { value: 50.0 }),
        };

        let kinds: Vec<_> = stages(&discounts).iter().map(|stage| stage.kind()).collect();
        assert_eq!(
            kinds,
            vec![DiscountKind::MultiYear, DiscountKind::PrePay, DiscountKind::SpecialNegotiation]
        );

        let summary = apply_predefined_discounts(running(1000.0), &discounts, 300.0, 20.0);
        // 1000 * 0.9 * 0.9 * 0.5
        assert_close(summary.final_total_price_excluding_tax, 405.0);
        assert_close(summary.applicable_discounts_value, 595.0);
        assert_close(summary.final_total_price, 425.0);
        assert_close(summary.final_margin, (405.0 - 300.0) / 405.0 * 100.0);
    }

    #[test]
    fn promotional_is_gated_by_running_price() {
        let promotional = PromotionalDiscount { value: 10.0, minimum_limit: 950.0 };
        assert_close(promotional.apply(running(1000.0)).final_total_price, 900.0);
        assert_close(promotional.apply(running(900.0)).final_total_price, 900.0);

        // a prior multi-year stage can drop the running price below the limit
        let discounts = ApplicablePredefinedDiscounts {
            multi_year: Some(MultiYearDiscount { value: 10.0 }),
            promotional: Some(promotional),
            ..ApplicablePredefinedDiscounts::default()
        };
        let summary = apply_predefined_discounts(running(1000.0), &discounts, 0.0, 0.0);
        assert_close(summary.final_total_price, 900.0);
    }

    #[test]
    fn custom_discount_excludes_predefined_pipeline() {
        let discounts = AttachedDiscounts {
            custom: Some(CustomDiscount { value: 5.0 }),
            predefined: ApplicablePredefinedDiscounts {
                special_negotiation: Some(SpecialNegotiationDiscount { value: 50.0 }),
                ..ApplicablePredefinedDiscounts::default()
            },
        };

        let summary = price_summary(input(), &discounts, &ConstraintValidator).expect("valid");
        assert_eq!(summary, apply_custom_discount(input(), &CustomDiscount { value: 5.0 }));
    }

    #[test]
    fn invalid_discount_aborts_before_pricing() {
        let discounts = AttachedDiscounts::predefined(ApplicablePredefinedDiscounts {
            pre_pay: Some(PrePayDiscount { value: 140.0 }),
            ..ApplicablePredefinedDiscounts::default()
        });

        let error =
            price_summary(input(), &discounts, &ConstraintValidator).expect_err("invalid pre-pay");
        assert!(matches!(
            error,
            PricingError::ValidationFailed { ref subject, .. } if subject == "PrePayDiscount"
        ));
    }

    #[test]
    fn invalid_predefined_discount_is_rejected_alongside_custom() {
        let discounts = AttachedDiscounts {
            custom: Some(CustomDiscount { value: 5.0 }),
            predefined: ApplicablePredefinedDiscounts {
                pre_pay: Some(PrePayDiscount { value: 500.0 }),
                ..ApplicablePredefinedDiscounts::default()
            },
        };

        let error = price_summary(input(), &discounts, &ConstraintValidator)
            .expect_err("attached pre-pay is out of range");
        assert!(matches!(
            error,
            PricingError::ValidationFailed { ref subject, .. } if subject == "PrePayDiscount"
        ));
    }

    #[test]
    fn invalid_margin_aborts_before_pricing() {
        let bad = PriceInput { margin_value: 300.0, ..input() };
        let error = price_summary(bad, &AttachedDiscounts::default(), &ConstraintValidator)
            .expect_err("margin delta out of range");
        assert!(matches!(
            error,
            PricingError::ValidationFailed { ref subject, .. } if subject == "MarginTaxInput"
        ));
    }

    #[test]
    fn margin_summary_sets_final_price_to_price_after_margin() {
        let summary = margin_summary(input());
        assert_eq!(summary.final_total_price, summary.total_price_after_margin);
    }

    proptest! {
        #[test]
        fn prop_stage_never_raises_price(
            price in 0.0f64..1_000_000.0,
            value in 0.0f64..=100.0,
            limit in 0.0f64..1_000_000.0,
        ) {
            let stages: [&dyn DiscountStage; 4] = [
                &MultiYearDiscount { value },
                &PrePayDiscount { value },
                &PromotionalDiscount { value, minimum_limit: limit },
                &SpecialNegotiationDiscount { value },
            ];
            for stage in stages {
                let after = stage.apply(running(price)).final_total_price;
                prop_assert!(
                    after <= price + 1e-9,
                    "{:?} raised {} to {}",
                    stage.kind(),
                    price,
                    after
                );
            }
        }
    }
}
