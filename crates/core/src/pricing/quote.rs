use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::discount::{ApplicablePredefinedDiscounts, AttachedDiscounts, CustomDiscount};
use crate::domain::distributor::{Distributor, DistributorId};
use crate::domain::edit::{DistributorDiscountEdit, DistributorMarginTaxEdit, MarginTaxInput};
use crate::domain::quote::{ContractType, Quote};
use crate::domain::summary::{PriceInput, PriceSummary, QuoteFinalTotalPrice};
use crate::errors::PricingError;
use crate::pricing::currency::CurrencyConverter;
use crate::pricing::distributor::DistributorPriceCalculator;
use crate::pricing::margin::margin_percentage;
use crate::pricing::pipeline::{self, Proposal};
use crate::pricing::validation::{ConstraintValidator, InputValidator};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexedDistributorSummary {
    pub index: usize,
    pub distributor_id: DistributorId,
    pub summary: PriceSummary,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteBatchSummary {
    pub distributors: Vec<IndexedDistributorSummary>,
    pub total: PriceSummary,
}

/// Sums the money fields and recomputes both margins from the sums.
pub fn aggregate_summaries<'a>(
    summaries: impl IntoIterator<Item = &'a PriceSummary>,
) -> PriceSummary {
    let mut total = summaries.into_iter().fold(PriceSummary::default(), |mut total, summary| {
        total.total_price += summary.total_price;
        total.total_price_after_margin += summary.total_price_after_margin;
        total.buy_price += summary.buy_price;
        total.final_total_price += summary.final_total_price;
        total.final_total_price_excluding_tax += summary.final_total_price_excluding_tax;
        total.applicable_discounts_value += summary.applicable_discounts_value;
        total
    });

    total.raw_margin = margin_percentage(total.total_price, total.buy_price);
    total.final_margin = margin_percentage(total.final_total_price_excluding_tax, total.buy_price);
    total
}

/// Quote-level entry point: dispatches on the contract type.
pub struct QuotePriceCalculator<R, V = ConstraintValidator> {
    distributors: DistributorPriceCalculator<R, V>,
}

impl<R> QuotePriceCalculator<R, ConstraintValidator> {
    pub fn with_rates(rates: R) -> Self {
        Self::new(rates, ConstraintValidator)
    }
}

impl<R, V> QuotePriceCalculator<R, V> {
    pub fn new(rates: R, validator: V) -> Self {
        Self { distributors: DistributorPriceCalculator::new(rates, validator) }
    }

    pub fn distributor_calculator(&self) -> &DistributorPriceCalculator<R, V> {
        &self.distributors
    }
}

impl<R, V> QuotePriceCalculator<R, V>
where
    R: CurrencyConverter,
    V: InputValidator,
{
    pub fn total_price(&self, quote: &Quote) -> f64 {
        match quote.contract_type {
            ContractType::Pack => quote.selected_assets().iter().map(|asset| asset.price).sum(),
            ContractType::Contract => quote
                .distributors
                .iter()
                .map(|distributor| self.distributors.total_price(distributor))
                .sum(),
        }
    }

    pub fn buy_price(&self, quote: &Quote) -> Result<f64, PricingError> {
        match quote.contract_type {
            ContractType::Pack => {
                Ok(quote.selected_assets().iter().map(|asset| asset.converted_buy_price()).sum())
            }
            ContractType::Contract => quote.distributors.iter().try_fold(0.0, |sum, distributor| {
                Ok(sum + self.distributors.buy_price(distributor, quote.quote_currency.as_deref())?)
            }),
        }
    }

    pub fn price_summary(&self, quote: &Quote) -> Result<PriceSummary, PricingError> {
        match quote.contract_type {
            ContractType::Pack => {
                let margin_tax = persisted_margin_tax(quote);
                let validator = self.distributors.validator();
                pipeline::validate_margin_tax(&margin_tax, validator)?;
                pipeline::validate_discounts(&quote.discounts, validator)?;
                self.pack_summary(quote, margin_tax, &quote.discounts)
            }
            ContractType::Contract => self.contract_summary(quote, |distributor, currency| {
                self.distributors.price_summary(distributor, currency)
            }),
        }
    }

    /// What-if margin/tax. A contract quote applies the proposal to every
    /// distributor.
    pub fn price_summary_after_margin_tax(
        &self,
        quote: &Quote,
        margin_tax: &MarginTaxInput,
    ) -> Result<PriceSummary, PricingError> {
        self.price_summary_after(quote, Proposal::MarginTax(margin_tax))
    }

    pub fn price_summary_after_custom_discount(
        &self,
        quote: &Quote,
        discount: &CustomDiscount,
    ) -> Result<PriceSummary, PricingError> {
        self.price_summary_after(quote, Proposal::CustomDiscount(discount))
    }

    pub fn price_summary_after_predefined_discounts(
        &self,
        quote: &Quote,
        discounts: &ApplicablePredefinedDiscounts,
    ) -> Result<PriceSummary, PricingError> {
        self.price_summary_after(quote, Proposal::PredefinedDiscounts(discounts))
    }

    fn price_summary_after(
        &self,
        quote: &Quote,
        proposal: Proposal<'_>,
    ) -> Result<PriceSummary, PricingError> {
        let validator = self.distributors.validator();
        proposal.validate(validator)?;

        match quote.contract_type {
            ContractType::Pack => {
                let (margin_tax, discounts) =
                    proposal.resolve(persisted_margin_tax(quote), &quote.discounts, validator)?;
                self.pack_summary(quote, margin_tax, &discounts)
            }
            ContractType::Contract => self.contract_summary(quote, |distributor, currency| {
                self.distributors.price_validated_proposal(distributor, currency, proposal)
            }),
        }
    }

    /// Re-prices a contract quote with per-distributor margin/tax edits.
    pub fn price_summary_after_distributor_margin_tax(
        &self,
        quote: &Quote,
        edits: &[DistributorMarginTaxEdit],
    ) -> Result<QuoteBatchSummary, PricingError> {
        self.batch_summary(
            quote,
            "price_summary_after_distributor_margin_tax",
            edits.iter().map(|edit| (edit.index, &edit.distributor_id, edit)),
            |distributor, currency, edit: &DistributorMarginTaxEdit| {
                self.distributors.price_summary_after_margin_tax(
                    distributor,
                    currency,
                    &edit.margin_tax,
                )
            },
        )
    }

    /// Re-prices a contract quote with per-distributor discount edits.
    pub fn price_summary_after_distributor_discounts(
        &self,
        quote: &Quote,
        edits: &[DistributorDiscountEdit],
    ) -> Result<QuoteBatchSummary, PricingError> {
        self.batch_summary(
            quote,
            "price_summary_after_distributor_discounts",
            edits.iter().map(|edit| (edit.index, &edit.distributor_id, edit)),
            |distributor, currency, edit: &DistributorDiscountEdit| {
                self.distributors.price_summary_after_discount_edit(
                    distributor,
                    currency,
                    &edit.discount,
                )
            },
        )
    }

    pub fn final_total_price(&self, quote: &Quote) -> Result<QuoteFinalTotalPrice, PricingError> {
        Ok(self.price_summary(quote)?.final_totals())
    }

    fn pack_summary(
        &self,
        quote: &Quote,
        margin_tax: MarginTaxInput,
        discounts: &AttachedDiscounts,
    ) -> Result<PriceSummary, PricingError> {
        let input = PriceInput {
            total_price: self.total_price(quote),
            buy_price: self.buy_price(quote)?,
            margin_value: margin_tax.margin_value,
            tax_value: margin_tax.tax_value,
        };
        let summary = pipeline::compose(input, discounts);

        debug!(
            event_name = "pricing.quote.summary",
            quote_id = %quote.id,
            contract_type = %quote.contract_type,
            final_total_price = summary.final_total_price,
            "pack quote price summary computed"
        );
        Ok(summary)
    }

    fn contract_summary<F>(&self, quote: &Quote, price: F) -> Result<PriceSummary, PricingError>
    where
        F: Fn(&Distributor, Option<&str>) -> Result<PriceSummary, PricingError>,
    {
        let currency = quote.quote_currency.as_deref();
        let summaries = quote
            .distributors
            .iter()
            .map(|distributor| price(distributor, currency))
            .collect::<Result<Vec<_>, _>>()?;

        let total = aggregate_summaries(&summaries);
        debug!(
            event_name = "pricing.quote.aggregated",
            quote_id = %quote.id,
            distributor_count = summaries.len(),
            final_total_price = total.final_total_price,
            final_margin = total.final_margin,
            "contract quote price summary aggregated"
        );
        Ok(total)
    }

    fn batch_summary<'e, E, I, F>(
        &self,
        quote: &Quote,
        operation: &'static str,
        edits: I,
        price: F,
    ) -> Result<QuoteBatchSummary, PricingError>
    where
        E: 'e,
        I: Iterator<Item = (usize, &'e DistributorId, &'e E)>,
        F: Fn(&Distributor, Option<&str>, &E) -> Result<PriceSummary, PricingError>,
    {
        if quote.contract_type != ContractType::Contract {
            return Err(PricingError::ContractTypeMismatch { operation, expected: "Contract" });
        }

        let currency = quote.quote_currency.as_deref();
        let mut edited = Vec::new();
        for (index, distributor_id, edit) in edits {
            let distributor = quote
                .distributor(distributor_id)
                .ok_or_else(|| PricingError::UnknownDistributor(distributor_id.0.clone()))?;
            let summary = price(distributor, currency, edit)?;
            edited.push(IndexedDistributorSummary {
                index,
                distributor_id: distributor_id.clone(),
                summary,
            });
        }

        // a later edit for the same distributor supersedes an earlier one
        let latest: HashMap<&DistributorId, &PriceSummary> =
            edited.iter().map(|entry| (&entry.distributor_id, &entry.summary)).collect();

        let mut summaries = Vec::with_capacity(quote.distributors.len());
        for distributor in &quote.distributors {
            match latest.get(&distributor.id) {
                Some(summary) => summaries.push((*summary).clone()),
                None => summaries.push(self.distributors.price_summary(distributor, currency)?),
            }
        }

        let total = aggregate_summaries(&summaries);
        debug!(
            event_name = "pricing.quote.batch",
            quote_id = %quote.id,
            operation,
            edit_count = edited.len(),
            final_total_price = total.final_total_price,
            "contract quote batch re-priced"
        );
        Ok(QuoteBatchSummary { distributors: edited, total })
    }
}

fn persisted_margin_tax(quote: &Quote) -> MarginTaxInput {
    MarginTaxInput { margin_value: quote.margin_value, tax_value: quote.tax_value }
}
