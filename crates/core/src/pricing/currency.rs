use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::Deserialize;
use thiserror::Error;

use crate::errors::PricingError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateFallback {
    Exact,
    PreviousAvailable { max_lookback_days: u32 },
}

/// Rates are resolved by the caller's rate source; the engine only asks.
pub trait CurrencyConverter: Send + Sync {
    /// Rate of `code` against the source's base currency on `date`.
    fn rate_by_currency_code(&self, code: &str, date: NaiveDate, fallback: RateFallback)
        -> Option<f64>;

    /// Converts `amount` with the rates in effect on `as_of`.
    fn convert(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        as_of: NaiveDate,
    ) -> Result<f64, PricingError>;

    /// Latest known rate turning one unit of `source` into `target`.
    fn target_rate(&self, source: &str, target: &str) -> Result<f64, PricingError>;
}

impl<T: CurrencyConverter + ?Sized> CurrencyConverter for &T {
    fn rate_by_currency_code(
        &self,
        code: &str,
        date: NaiveDate,
        fallback: RateFallback,
    ) -> Option<f64> {
        (**self).rate_by_currency_code(code, date, fallback)
    }

    fn convert(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        as_of: NaiveDate,
    ) -> Result<f64, PricingError> {
        (**self).convert(from, to, amount, as_of)
    }

    fn target_rate(&self, source: &str, target: &str) -> Result<f64, PricingError> {
        (**self).target_rate(source, target)
    }
}

#[derive(Debug, Error)]
pub enum RateTableError {
    #[error("could not parse rate table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("rate table date `{value}` for {currency} is not YYYY-MM-DD")]
    InvalidDate { currency: String, value: String },
    #[error("rate for {currency} on {date} must be a positive finite number")]
    InvalidRate { currency: String, date: NaiveDate },
}

#[derive(Debug, Deserialize)]
struct RateTableDocument {
    base: String,
    #[serde(default)]
    rates: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Daily rates relative to one base currency, held in memory.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoricalRateTable {
    base: String,
    rates: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
    fallback: RateFallback,
}

impl HistoricalRateTable {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: normalize(&base.into()),
            rates: BTreeMap::new(),
            fallback: RateFallback::PreviousAvailable { max_lookback_days: 7 },
        }
    }

    pub fn with_fallback(mut self, fallback: RateFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_rate(mut self, code: &str, date: NaiveDate, rate: f64) -> Self {
        self.insert(code, date, rate);
        self
    }

    pub fn insert(&mut self, code: &str, date: NaiveDate, rate: f64) {
        self.rates.entry(normalize(code)).or_default().insert(date, rate);
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Parses `{"base": "EUR", "rates": {"USD": {"2024-01-02": 1.09}}}`.
    pub fn from_json(raw: &str) -> Result<Self, RateTableError> {
        let document: RateTableDocument = serde_json::from_str(raw)?;
        let mut table = Self::new(document.base);

        for (currency, days) in document.rates {
            for (day, rate) in days {
                let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|_| {
                    RateTableError::InvalidDate { currency: currency.clone(), value: day.clone() }
                })?;
                if !rate.is_finite() || rate <= 0.0 {
                    return Err(RateTableError::InvalidRate { currency, date });
                }
                table.insert(&currency, date, rate);
            }
        }

        Ok(table)
    }

    fn require_rate(&self, code: &str, date: NaiveDate) -> Result<f64, PricingError> {
        self.rate_by_currency_code(code, date, self.fallback).ok_or_else(|| {
            PricingError::MissingExchangeRate { currency: normalize(code), date: Some(date) }
        })
    }

    fn latest_rate(&self, code: &str) -> Option<f64> {
        let code = normalize(code);
        if code == self.base {
            return Some(1.0);
        }
        self.rates.get(&code)?.values().next_back().copied()
    }
}

impl CurrencyConverter for HistoricalRateTable {
    fn rate_by_currency_code(
        &self,
        code: &str,
        date: NaiveDate,
        fallback: RateFallback,
    ) -> Option<f64> {
        let code = normalize(code);
        if code == self.base {
            return Some(1.0);
        }

        let days = self.rates.get(&code)?;
        match fallback {
            RateFallback::Exact => days.get(&date).copied(),
            RateFallback::PreviousAvailable { max_lookback_days } => {
                let earliest = date
                    .checked_sub_days(Days::new(u64::from(max_lookback_days)))
                    .unwrap_or(NaiveDate::MIN);
                days.range(earliest..=date).next_back().map(|(_, rate)| *rate)
            }
        }
    }

    fn convert(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        as_of: NaiveDate,
    ) -> Result<f64, PricingError> {
        if normalize(from) == normalize(to) {
            return Ok(amount);
        }

        let from_rate = self.require_rate(from, as_of)?;
        let to_rate = self.require_rate(to, as_of)?;
        Ok(amount * to_rate / from_rate)
    }

    fn target_rate(&self, source: &str, target: &str) -> Result<f64, PricingError> {
        let missing = |code: &str| PricingError::MissingExchangeRate {
            currency: normalize(code),
            date: None,
        };
        let source_rate = self.latest_rate(source).ok_or_else(|| missing(source))?;
        let target_rate = self.latest_rate(target).ok_or_else(|| missing(target))?;
        Ok(target_rate / source_rate)
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{CurrencyConverter, HistoricalRateTable, RateFallback, RateTableError};
    use crate::errors::PricingError;

    fn day(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).expect("valid date")
    }

    fn table() -> HistoricalRateTable {
        HistoricalRateTable::new("EUR")
            .with_rate("USD", day(1, 2), 1.10)
            .with_rate("USD", day(6, 3), 1.08)
            .with_rate("GBP", day(1, 2), 0.86)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn converts_through_base_currency_on_pinned_day() {
        let table = table();
        assert_close(table.convert("USD", "EUR", 110.0, day(1, 2)).expect("rate"), 100.0);
        assert_close(table.convert("usd", "gbp", 110.0, day(1, 2)).expect("rate"), 86.0);
        // later rate change does not affect a conversion pinned in January
        assert_close(table.convert("EUR", "USD", 100.0, day(1, 3)).expect("rate"), 110.0);
        assert_close(table.convert("EUR", "USD", 100.0, day(6, 4)).expect("rate"), 108.0);
    }

    #[test]
    fn identical_currencies_short_circuit() {
        let table = HistoricalRateTable::new("EUR");
        assert_eq!(table.convert("CHF", "chf", 42.0, day(1, 1)), Ok(42.0));
    }

    #[test]
    fn lookback_window_bounds_fallback() {
        let table = table();
        let fallback = RateFallback::PreviousAvailable { max_lookback_days: 7 };
        assert_eq!(table.rate_by_currency_code("USD", day(1, 9), fallback), Some(1.10));
        assert_eq!(table.rate_by_currency_code("USD", day(1, 10), fallback), None);
        assert_eq!(table.rate_by_currency_code("USD", day(1, 3), RateFallback::Exact), None);
        assert_eq!(table.rate_by_currency_code("EUR", day(1, 3), RateFallback::Exact), Some(1.0));
    }

    #[test]
    fn missing_rate_is_reported() {
        let table = table().with_fallback(RateFallback::Exact);
        let error = table.convert("USD", "EUR", 10.0, day(3, 1)).expect_err("no march rate");
        assert_eq!(
            error,
            PricingError::MissingExchangeRate { currency: "USD".to_owned(), date: Some(day(3, 1)) }
        );
    }

    #[test]
    fn target_rate_uses_latest_rates() {
        let table = table();
        assert_close(table.target_rate("EUR", "USD").expect("rate"), 1.08);
        assert_close(table.target_rate("GBP", "EUR").expect("rate"), 1.0 / 0.86);

        let missing = table.target_rate("EUR", "JPY").expect_err("no JPY rates");
        assert_eq!(
            missing,
            PricingError::MissingExchangeRate { currency: "JPY".to_owned(), date: None }
        );
        assert_eq!(missing.to_string(), "no exchange rate for JPY on record");
    }

    #[test]
    fn loads_from_json_document() {
        let table = HistoricalRateTable::from_json(
            r#"{"base":"eur","rates":{"USD":{"2024-01-02":1.1,"2024-06-03":1.08}}}"#,
        )
        .expect("valid document");

        assert_eq!(table.base(), "EUR");
        assert_eq!(table.rate_by_currency_code("USD", day(6, 3), RateFallback::Exact), Some(1.08));
    }

    #[test]
    fn rejects_malformed_dates_and_rates() {
        let bad_date =
            HistoricalRateTable::from_json(r#"{"base":"EUR","rates":{"USD":{"02/01/2024":1.1}}}"#);
        assert!(matches!(bad_date, Err(RateTableError::InvalidDate { .. })));

        let bad_rate =
            HistoricalRateTable::from_json(r#"{"base":"EUR","rates":{"USD":{"2024-01-02":0}}}"#);
        assert!(matches!(bad_rate, Err(RateTableError::InvalidRate { .. })));
    }
}
