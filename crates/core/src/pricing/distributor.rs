use tracing::debug;

use crate::domain::discount::{ApplicablePredefinedDiscounts, AttachedDiscounts, CustomDiscount};
use crate::domain::distributor::Distributor;
use crate::domain::edit::{DiscountEdit, MarginTaxInput};
use crate::domain::summary::{DistributionFinalTotalPrice, PriceInput, PriceSummary};
use crate::errors::PricingError;
use crate::pricing::currency::CurrencyConverter;
use crate::pricing::pipeline::{self, Proposal};
use crate::pricing::validation::{ConstraintValidator, InputValidator};

/// Prices one distributor sub-quote.
pub struct DistributorPriceCalculator<R, V = ConstraintValidator> {
    rates: R,
    validator: V,
}

impl<R> DistributorPriceCalculator<R, ConstraintValidator> {
    pub fn with_rates(rates: R) -> Self {
        Self::new(rates, ConstraintValidator)
    }
}

impl<R, V> DistributorPriceCalculator<R, V> {
    pub fn new(rates: R, validator: V) -> Self {
        Self { rates, validator }
    }

    pub fn rates(&self) -> &R {
        &self.rates
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }
}

impl<R, V> DistributorPriceCalculator<R, V>
where
    R: CurrencyConverter,
    V: InputValidator,
{
    /// Stored buy price in the quote currency, converted at the rate in effect
    /// when the distributor was created. Without both currencies the stored
    /// value is returned as is.
    pub fn buy_price(
        &self,
        distributor: &Distributor,
        quote_currency: Option<&str>,
    ) -> Result<f64, PricingError> {
        let (Some(quote_currency), Some(buy_currency)) =
            (quote_currency, distributor.buy_currency.as_deref())
        else {
            return Ok(distributor.buy_price);
        };

        self.rates.convert(
            buy_currency,
            quote_currency,
            distributor.buy_price,
            distributor.created_at.date_naive(),
        )
    }

    pub fn total_price(&self, distributor: &Distributor) -> f64 {
        distributor.selected_rows().iter().map(|row| row.price).sum()
    }

    fn price_input(
        &self,
        distributor: &Distributor,
        quote_currency: Option<&str>,
        margin_tax: MarginTaxInput,
    ) -> Result<PriceInput, PricingError> {
        Ok(PriceInput {
            total_price: self.total_price(distributor),
            buy_price: self.buy_price(distributor, quote_currency)?,
            margin_value: margin_tax.margin_value,
            tax_value: margin_tax.tax_value,
        })
    }

    fn compose(
        &self,
        distributor: &Distributor,
        quote_currency: Option<&str>,
        margin_tax: MarginTaxInput,
        discounts: &AttachedDiscounts,
    ) -> Result<PriceSummary, PricingError> {
        let input = self.price_input(distributor, quote_currency, margin_tax)?;
        let summary = pipeline::compose(input, discounts);

        debug!(
            event_name = "pricing.distributor.summary",
            distributor_id = %distributor.id,
            total_price = summary.total_price,
            buy_price = summary.buy_price,
            final_total_price = summary.final_total_price,
            "distributor price summary computed"
        );
        Ok(summary)
    }

    pub fn price_summary(
        &self,
        distributor: &Distributor,
        quote_currency: Option<&str>,
    ) -> Result<PriceSummary, PricingError> {
        let margin_tax = persisted_margin_tax(distributor);
        pipeline::validate_margin_tax(&margin_tax, &self.validator)?;
        pipeline::validate_discounts(&distributor.discounts, &self.validator)?;
        self.compose(distributor, quote_currency, margin_tax, &distributor.discounts)
    }

    /// What-if pricing with a proposed margin and tax; attached discounts stay.
    pub fn price_summary_after_margin_tax(
        &self,
        distributor: &Distributor,
        quote_currency: Option<&str>,
        margin_tax: &MarginTaxInput,
    ) -> Result<PriceSummary, PricingError> {
        self.price_summary_after(distributor, quote_currency, Proposal::MarginTax(margin_tax))
    }

    /// What-if pricing with a proposed custom discount in place of whatever is
    /// attached.
    pub fn price_summary_after_custom_discount(
        &self,
        distributor: &Distributor,
        quote_currency: Option<&str>,
        discount: &CustomDiscount,
    ) -> Result<PriceSummary, PricingError> {
        self.price_summary_after(distributor, quote_currency, Proposal::CustomDiscount(discount))
    }

    /// What-if pricing with a proposed predefined set. Any attached custom
    /// discount is dropped so the set actually applies.
    pub fn price_summary_after_predefined_discounts(
        &self,
        distributor: &Distributor,
        quote_currency: Option<&str>,
        discounts: &ApplicablePredefinedDiscounts,
    ) -> Result<PriceSummary, PricingError> {
        self.price_summary_after(
            distributor,
            quote_currency,
            Proposal::PredefinedDiscounts(discounts),
        )
    }

    pub fn price_summary_after_discount_edit(
        &self,
        distributor: &Distributor,
        quote_currency: Option<&str>,
        edit: &DiscountEdit,
    ) -> Result<PriceSummary, PricingError> {
        self.price_summary_after(distributor, quote_currency, Proposal::from(edit))
    }

    fn price_summary_after(
        &self,
        distributor: &Distributor,
        quote_currency: Option<&str>,
        proposal: Proposal<'_>,
    ) -> Result<PriceSummary, PricingError> {
        proposal.validate(&self.validator)?;
        self.price_validated_proposal(distributor, quote_currency, proposal)
    }

    /// Prices a proposal the caller has already validated; only the persisted
    /// inputs the proposal keeps are checked here.
    pub(crate) fn price_validated_proposal(
        &self,
        distributor: &Distributor,
        quote_currency: Option<&str>,
        proposal: Proposal<'_>,
    ) -> Result<PriceSummary, PricingError> {
        let (margin_tax, discounts) = proposal.resolve(
            persisted_margin_tax(distributor),
            &distributor.discounts,
            &self.validator,
        )?;
        self.compose(distributor, quote_currency, margin_tax, &discounts)
    }

    pub fn final_total_price(
        &self,
        distributor: &Distributor,
        quote_currency: Option<&str>,
    ) -> Result<DistributionFinalTotalPrice, PricingError> {
        Ok(self.price_summary(distributor, quote_currency)?.final_totals())
    }
}

fn persisted_margin_tax(distributor: &Distributor) -> MarginTaxInput {
    MarginTaxInput { margin_value: distributor.margin_value, tax_value: distributor.tax_value }
}
