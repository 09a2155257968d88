use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::discount::AttachedDiscounts;
use crate::domain::distributor::{Distributor, DistributorId};
use crate::errors::PricingError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `Pack` quotes price a flat asset list; `Contract` quotes aggregate
/// distributor sub-quotes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContractType {
    Pack,
    Contract,
}

impl ContractType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pack => "Pack",
            Self::Contract => "Contract",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = PricingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pack" => Ok(Self::Pack),
            "contract" => Ok(Self::Contract),
            _ => Err(PricingError::UnsupportedContractType(value.to_owned())),
        }
    }
}

impl TryFrom<String> for ContractType {
    type Error = PricingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContractType> for String {
    fn from(value: ContractType) -> Self {
        value.as_str().to_owned()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub price: f64,
    #[serde(default)]
    pub buy_price: f64,
    /// Rate captured when the asset was imported. A missing, zero or negative rate means 1.
    #[serde(default)]
    pub exchange_rate_value: Option<f64>,
    #[serde(default)]
    pub is_selected: bool,
}

impl Asset {
    pub fn converted_buy_price(&self) -> f64 {
        let rate =
            self.exchange_rate_value.filter(|rate| rate.is_finite() && *rate > 0.0).unwrap_or(1.0);
        self.buy_price * rate
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetGroup {
    pub id: String,
    #[serde(default)]
    pub is_selected: bool,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub contract_type: ContractType,
    #[serde(default)]
    pub quote_currency: Option<String>,
    #[serde(default)]
    pub margin_value: f64,
    #[serde(default)]
    pub tax_value: f64,
    #[serde(default)]
    pub discounts: AttachedDiscounts,
    #[serde(default)]
    pub use_groups: bool,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub asset_groups: Vec<AssetGroup>,
    #[serde(default)]
    pub distributors: Vec<Distributor>,
}

impl Quote {
    /// Assets that count towards a pack quote: every asset of a selected group
    /// when `use_groups` is set, otherwise individually selected assets.
    pub fn selected_assets(&self) -> Vec<&Asset> {
        if self.use_groups {
            return self
                .asset_groups
                .iter()
                .filter(|group| group.is_selected)
                .flat_map(|group| group.assets.iter())
                .collect();
        }

        self.assets.iter().filter(|asset| asset.is_selected).collect()
    }

    pub fn distributor(&self, id: &DistributorId) -> Option<&Distributor> {
        self.distributors.iter().find(|distributor| &distributor.id == id)
    }
}
