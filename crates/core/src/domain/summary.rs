use serde::{Deserialize, Serialize};

use crate::domain::edit::MarginTaxInput;

const DIFF_TOLERANCE: f64 = 1e-9;

/// The numeric facts a single calculation call starts from.
///
/// `margin_value` is an additive delta in percentage points on top of the
/// margin already implied by `total_price` and `buy_price`. `tax_value` is an
/// absolute money amount.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceInput {
    pub total_price: f64,
    pub buy_price: f64,
    pub margin_value: f64,
    pub tax_value: f64,
}

impl PriceInput {
    pub fn margin_tax(&self) -> MarginTaxInput {
        MarginTaxInput { margin_value: self.margin_value, tax_value: self.tax_value }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub total_price: f64,
    pub total_price_after_margin: f64,
    pub buy_price: f64,
    pub final_total_price: f64,
    pub final_total_price_excluding_tax: f64,
    pub applicable_discounts_value: f64,
    pub raw_margin: f64,
    pub final_margin: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_after_custom_discount: Option<f64>,
}

/// Reduced aggregate cached onto a distributor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionFinalTotalPrice {
    pub final_total_price_value: f64,
    pub applicable_discounts_value: f64,
}

/// Reduced aggregate cached onto a quote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteFinalTotalPrice {
    pub final_total_price_value: f64,
    pub applicable_discounts_value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryChange {
    pub field: &'static str,
    pub old_value: Option<f64>,
    pub new_value: Option<f64>,
}

impl From<&PriceSummary> for DistributionFinalTotalPrice {
    fn from(summary: &PriceSummary) -> Self {
        Self {
            final_total_price_value: summary.final_total_price,
            applicable_discounts_value: summary.applicable_discounts_value,
        }
    }
}

impl From<&PriceSummary> for QuoteFinalTotalPrice {
    fn from(summary: &PriceSummary) -> Self {
        Self {
            final_total_price_value: summary.final_total_price,
            applicable_discounts_value: summary.applicable_discounts_value,
        }
    }
}

impl PriceSummary {
    /// Ratio used by the sales-order mapper to derive order-line buy prices.
    pub fn price_value_coefficient(&self) -> f64 {
        if self.total_price == 0.0 {
            return 0.0;
        }
        self.final_total_price_excluding_tax / self.total_price
    }

    /// Reduced totals in whichever cached shape the caller stores.
    pub fn final_totals<'a, T: From<&'a PriceSummary>>(&'a self) -> T {
        T::from(self)
    }

    /// Field-level changes between `self` (old) and `other` (new), in
    /// declaration order.
    pub fn diff(&self, other: &PriceSummary) -> Vec<SummaryChange> {
        let pairs: [(&'static str, Option<f64>, Option<f64>); 9] = [
            ("total_price", Some(self.total_price), Some(other.total_price)),
            (
                "total_price_after_margin",
                Some(self.total_price_after_margin),
                Some(other.total_price_after_margin),
            ),
            ("buy_price", Some(self.buy_price), Some(other.buy_price)),
            ("final_total_price", Some(self.final_total_price), Some(other.final_total_price)),
            (
                "final_total_price_excluding_tax",
                Some(self.final_total_price_excluding_tax),
                Some(other.final_total_price_excluding_tax),
            ),
            (
                "applicable_discounts_value",
                Some(self.applicable_discounts_value),
                Some(other.applicable_discounts_value),
            ),
            ("raw_margin", Some(self.raw_margin), Some(other.raw_margin)),
            ("final_margin", Some(self.final_margin), Some(other.final_margin)),
            (
                "margin_after_custom_discount",
                self.margin_after_custom_discount,
                other.margin_after_custom_discount,
            ),
        ];

        pairs
            .into_iter()
            .filter(|(_, old, new)| !same_value(*old, *new))
            .map(|(field, old_value, new_value)| SummaryChange { field, old_value, new_value })
            .collect()
    }

    /// Rounds every money and percentage field for presentation.
    pub fn rounded(&self, precision: u32) -> PriceSummary {
        let round = |value: f64| round_to(value, precision);
        PriceSummary {
            total_price: round(self.total_price),
            total_price_after_margin: round(self.total_price_after_margin),
            buy_price: round(self.buy_price),
            final_total_price: round(self.final_total_price),
            final_total_price_excluding_tax: round(self.final_total_price_excluding_tax),
            applicable_discounts_value: round(self.applicable_discounts_value),
            raw_margin: round(self.raw_margin),
            final_margin: round(self.final_margin),
            margin_after_custom_discount: self.margin_after_custom_discount.map(round),
        }
    }
}

fn same_value(old: Option<f64>, new: Option<f64>) -> bool {
    match (old, new) {
        (Some(old), Some(new)) => (old - new).abs() <= DIFF_TOLERANCE,
        (None, None) => true,
        _ => false,
    }
}

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10_f64.powi(precision as i32);
    (value * factor).round() / factor
}
