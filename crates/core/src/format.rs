use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::FormattedPrice;

// ---------------------------------------------------------------------------
// Price Formatter
// ---------------------------------------------------------------------------

/// Renders a quote into the strings each platform surface accepts.
///
/// Pure and deterministic: the same price always yields the same strings,
/// with no locale or wall-clock dependence.
#[derive(Debug, Clone)]
pub struct PriceFormatter {
    /// Symbol prefixed to the human-facing rendering.
    pub currency_symbol: String,
}

impl Default for PriceFormatter {
    fn default() -> Self {
        Self::new("$")
    }
}

impl PriceFormatter {
    pub fn new(currency_symbol: impl Into<String>) -> Self {
        Self {
            currency_symbol: currency_symbol.into(),
        }
    }

    /// Format a price for every surface at once.
    ///
    /// Negative input is outside the quote domain; its magnitude is used so
    /// a stray sign can never leak into a destination name.
    pub fn format(&self, price: Decimal) -> FormattedPrice {
        let magnitude = price.abs();
        FormattedPrice {
            human: format!(
                "{}{}",
                self.currency_symbol,
                group_thousands(&rounded_to(magnitude, 4))
            ),
            channel: rounded_to(magnitude, 2).replace('.', "-"),
        }
    }
}

/// Round half-to-even at `dp` fractional digits and render with exactly
/// `dp` digits after the point.
fn rounded_to(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven);
    // The value already has scale <= dp, so the precision only pads zeros.
    format!("{:.prec$}", rounded, prec = dp as usize)
}

/// Insert `,` separators into the integer part of a rendered decimal
/// ("1234.5000" becomes "1,234.5000").
fn group_thousands(rendered: &str) -> String {
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rendered, None),
    };

    let mut grouped = String::with_capacity(rendered.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{}.{}", grouped, f),
        None => grouped,
    }
}
