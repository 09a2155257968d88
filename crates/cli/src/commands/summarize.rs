use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quote_pricing_core::config::{ConfigOverrides, LoadOptions, PricingConfig};
use quote_pricing_core::{HistoricalRateTable, InterfaceError, Quote, QuotePriceCalculator};
use tracing::info;

use crate::commands::CommandResult;

const COMMAND: &str = "summarize";
const DEFAULT_BASE_CURRENCY: &str = "EUR";

pub fn run(quote_path: &Path, rates_path: Option<PathBuf>) -> CommandResult {
    let config = match PricingConfig::load(LoadOptions {
        overrides: ConfigOverrides { rates_table_path: rates_path, ..ConfigOverrides::default() },
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let (quote, rates) = match load_inputs(quote_path, &config) {
        Ok(inputs) => inputs,
        Err(error) => return CommandResult::failure(COMMAND, "input", format!("{error:#}"), 1),
    };

    let calculator = QuotePriceCalculator::with_rates(rates);
    let summary = match calculator.price_summary(&quote) {
        Ok(summary) => summary,
        Err(error) => {
            let detail = error.to_string();
            let error_class = match error.into_interface(quote.id.to_string()) {
                InterfaceError::BadRequest { .. } => "pricing_bad_request",
                InterfaceError::Internal { .. } => "pricing_internal",
            };
            return CommandResult::failure(COMMAND, error_class, detail, 1);
        }
    };

    info!(
        event_name = "cli.summarize.completed",
        quote_id = %quote.id,
        contract_type = %quote.contract_type,
        final_total_price = summary.final_total_price,
        "quote summarized"
    );

    match serde_json::to_value(summary.rounded(config.output.precision)) {
        Ok(payload) => CommandResult::success(COMMAND, payload),
        Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 1),
    }
}

fn load_inputs(quote_path: &Path, config: &PricingConfig) -> Result<(Quote, HistoricalRateTable)> {
    let raw = fs::read_to_string(quote_path)
        .with_context(|| format!("could not read quote file `{}`", quote_path.display()))?;
    let quote: Quote = serde_json::from_str(&raw)
        .with_context(|| format!("could not parse quote file `{}`", quote_path.display()))?;

    let rates = match &config.rates.table_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("could not read rate table `{}`", path.display()))?;
            HistoricalRateTable::from_json(&raw)
                .with_context(|| format!("could not load rate table `{}`", path.display()))?
        }
        None => HistoricalRateTable::new(DEFAULT_BASE_CURRENCY),
    };

    Ok((quote, rates.with_fallback(config.rates.rate_fallback())))
}
