//! Margin arithmetic shared by every calculator.
//!
//! Margins are percentages of the sell price: a 1000 sale over a 700 cost is
//! a 30% margin.

pub fn margin_percentage(total_price: f64, buy_price: f64) -> f64 {
    if total_price == 0.0 {
        return 0.0;
    }

    ((total_price - buy_price) / total_price) * 100.0
}

/// Rebuilds a sell price from `buy_price` so the resulting margin is the
/// current margin plus `margin_diff_value` percentage points.
///
/// Margins of 100% or more switch to a `1 / (m + 1)` divider so the price
/// stays finite and positive. The function is discontinuous at exactly 100%.
pub fn total_price_after_bottom_up_margin(
    total_price: f64,
    buy_price: f64,
    margin_diff_value: f64,
) -> f64 {
    if total_price == 0.0 {
        return 0.0;
    }

    let initial_margin = margin_percentage(total_price, buy_price);
    let margin_float = (initial_margin + margin_diff_value) / 100.0;

    let divider =
        if margin_float >= 1.0 { 1.0 / (margin_float + 1.0) } else { 1.0 - margin_float };

    buy_price / divider
}

/// Tax is an absolute amount, not a rate.
pub fn total_price_after_tax(total_price: f64, tax_value: f64) -> f64 {
    total_price + tax_value
}
