use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::discount::AttachedDiscounts;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DistributorId(pub String);

impl std::fmt::Display for DistributorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub price: f64,
    #[serde(default)]
    pub is_selected: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowGroup {
    pub id: String,
    #[serde(default)]
    pub is_selected: bool,
    #[serde(default)]
    pub rows: Vec<LineItem>,
}

/// Snapshot of one supplier's sub-quote inside a contract quote.
///
/// `created_at` pins the exchange rate used to convert `buy_price`, so a
/// summary recomputed later still reproduces the original buy price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Distributor {
    pub id: DistributorId,
    pub buy_price: f64,
    #[serde(default)]
    pub buy_currency: Option<String>,
    #[serde(default)]
    pub margin_value: f64,
    #[serde(default)]
    pub tax_value: f64,
    #[serde(default)]
    pub discounts: AttachedDiscounts,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub use_groups: bool,
    #[serde(default)]
    pub rows: Vec<LineItem>,
    #[serde(default)]
    pub row_groups: Vec<RowGroup>,
}

impl Distributor {
    /// Rows that count towards the total: every row of a selected group when
    /// `use_groups` is set, otherwise individually selected rows.
    pub fn selected_rows(&self) -> Vec<&LineItem> {
        if self.use_groups {
            return self
                .row_groups
                .iter()
                .filter(|group| group.is_selected)
                .flat_map(|group| group.rows.iter())
                .collect();
        }

        self.rows.iter().filter(|row| row.is_selected).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Distributor, DistributorId, LineItem, RowGroup};
    use crate::domain::discount::AttachedDiscounts;

    fn row(id: &str, price: f64, is_selected: bool) -> LineItem {
        LineItem { id: id.to_owned(), price, is_selected }
    }

    fn distributor(use_groups: bool) -> Distributor {
        Distributor {
            id: DistributorId("dist-1".to_owned()),
            buy_price: 0.0,
            buy_currency: None,
            margin_value: 0.0,
            tax_value: 0.0,
            discounts: AttachedDiscounts::default(),
            created_at: Utc::now(),
            use_groups,
            rows: vec![row("r1", 10.0, true), row("r2", 20.0, false)],
            row_groups: vec![
                RowGroup {
                    id: "g1".to_owned(),
                    is_selected: true,
                    rows: vec![row("r3", 5.0, false), row("r4", 7.0, false)],
                },
                RowGroup {
                    id: "g2".to_owned(),
                    is_selected: false,
                    rows: vec![row("r5", 100.0, true)],
                },
            ],
        }
    }

    #[test]
    fn selected_rows_follow_row_flags_without_groups() {
        let ids: Vec<_> =
            distributor(false).selected_rows().iter().map(|row| row.id.clone()).collect();
        assert_eq!(ids, vec!["r1"]);
    }

    #[test]
    fn selected_rows_follow_group_flags_with_groups() {
        let distributor = distributor(true);
        let ids: Vec<_> = distributor.selected_rows().iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec!["r3", "r4"]);
    }
}
