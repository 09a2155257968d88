pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;

pub use config::{
    ConfigError, ConfigOverrides, FallbackMode, LoadOptions, LogFormat, PricingConfig,
};
pub use domain::discount::{
    ApplicablePredefinedDiscounts, AttachedDiscounts, CustomDiscount, Discount, DiscountKind,
    MultiYearDiscount, PrePayDiscount, PromotionalDiscount, SpecialNegotiationDiscount,
};
pub use domain::distributor::{Distributor, DistributorId, LineItem, RowGroup};
pub use domain::edit::{
    DiscountEdit, DistributorDiscountEdit, DistributorMarginTaxEdit, MarginTaxInput,
};
pub use domain::quote::{Asset, AssetGroup, ContractType, Quote, QuoteId};
pub use domain::summary::{
    DistributionFinalTotalPrice, PriceInput, PriceSummary, QuoteFinalTotalPrice, SummaryChange,
};
pub use errors::{InterfaceError, PricingError};
pub use pricing::{
    CurrencyConverter, DistributorPriceCalculator, HistoricalRateTable, OrderPricing,
    QuotePriceCalculator, RateFallback, TotalsCache,
};
