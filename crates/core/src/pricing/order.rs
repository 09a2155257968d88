//! Pricing handed to sales-order submission.
//!
//! Submission prices from the same summaries the review screens show, and
//! refuses quotes with nothing to price.

use serde::Serialize;
use tracing::info;

use crate::domain::distributor::DistributorId;
use crate::domain::quote::{ContractType, Quote, QuoteId};
use crate::domain::summary::PriceSummary;
use crate::errors::PricingError;
use crate::pricing::currency::CurrencyConverter;
use crate::pricing::quote::{aggregate_summaries, QuotePriceCalculator};
use crate::pricing::validation::InputValidator;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderLinePrice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributor_id: Option<DistributorId>,
    pub line_id: String,
    pub price: f64,
    pub order_price: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderPricing {
    pub quote_id: QuoteId,
    pub summary: PriceSummary,
    pub price_value_coefficient: f64,
    pub lines: Vec<OrderLinePrice>,
}

impl OrderPricing {
    pub fn prepare<R, V>(
        calculator: &QuotePriceCalculator<R, V>,
        quote: &Quote,
    ) -> Result<Self, PricingError>
    where
        R: CurrencyConverter,
        V: InputValidator,
    {
        let pricing = match quote.contract_type {
            ContractType::Pack => Self::prepare_pack(calculator, quote)?,
            ContractType::Contract => Self::prepare_contract(calculator, quote)?,
        };

        info!(
            event_name = "pricing.order.prepared",
            quote_id = %quote.id,
            contract_type = %quote.contract_type,
            line_count = pricing.lines.len(),
            final_total_price = pricing.summary.final_total_price,
            "order pricing prepared"
        );
        Ok(pricing)
    }

    fn prepare_pack<R, V>(
        calculator: &QuotePriceCalculator<R, V>,
        quote: &Quote,
    ) -> Result<Self, PricingError>
    where
        R: CurrencyConverter,
        V: InputValidator,
    {
        let assets = quote.selected_assets();
        if assets.is_empty() {
            return Err(PricingError::InvalidArgument(format!(
                "pack quote {} has no selected assets",
                quote.id
            )));
        }

        let summary = calculator.price_summary(quote)?;
        let coefficient = summary.price_value_coefficient();
        let lines = assets
            .into_iter()
            .map(|asset| OrderLinePrice {
                distributor_id: None,
                line_id: asset.id.clone(),
                price: asset.price,
                order_price: asset.price * coefficient,
            })
            .collect();

        Ok(Self {
            quote_id: quote.id.clone(),
            summary,
            price_value_coefficient: coefficient,
            lines,
        })
    }

    fn prepare_contract<R, V>(
        calculator: &QuotePriceCalculator<R, V>,
        quote: &Quote,
    ) -> Result<Self, PricingError>
    where
        R: CurrencyConverter,
        V: InputValidator,
    {
        if quote.distributors.is_empty() {
            return Err(PricingError::InvalidArgument(format!(
                "contract quote {} has no distributors",
                quote.id
            )));
        }

        let distributors = calculator.distributor_calculator();
        let currency = quote.quote_currency.as_deref();
        let mut summaries = Vec::with_capacity(quote.distributors.len());
        let mut lines = Vec::new();

        // each distributor's rows scale by that distributor's own coefficient
        for distributor in &quote.distributors {
            let summary = distributors.price_summary(distributor, currency)?;
            let coefficient = summary.price_value_coefficient();
            lines.extend(distributor.selected_rows().into_iter().map(|row| OrderLinePrice {
                distributor_id: Some(distributor.id.clone()),
                line_id: row.id.clone(),
                price: row.price,
                order_price: row.price * coefficient,
            }));
            summaries.push(summary);
        }

        let summary = aggregate_summaries(&summaries);
        Ok(Self {
            quote_id: quote.id.clone(),
            price_value_coefficient: summary.price_value_coefficient(),
            summary,
            lines,
        })
    }
}
