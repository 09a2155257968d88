pub mod cache;
pub mod currency;
pub mod distributor;
pub mod margin;
pub mod order;
pub mod pipeline;
pub mod quote;
pub mod validation;

pub use cache::TotalsCache;
pub use currency::{CurrencyConverter, HistoricalRateTable, RateFallback, RateTableError};
pub use distributor::DistributorPriceCalculator;
pub use margin::{margin_percentage, total_price_after_bottom_up_margin, total_price_after_tax};
pub use order::{OrderLinePrice, OrderPricing};
pub use pipeline::{
    apply_custom_discount, apply_predefined_discounts, price_summary, DiscountStage, Proposal,
};
pub use quote::{
    aggregate_summaries, IndexedDistributorSummary, QuoteBatchSummary, QuotePriceCalculator,
};
pub use validation::{ConstraintValidator, InputValidator, Violation};
