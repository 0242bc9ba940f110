//! Document lines and the untaxed amount.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of a document row. Only `Line` rows carry an amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    #[default]
    Line,
    Subtotal,
    Title,
    Comment,
}

/// Invoice line. Quantity and unit price may be missing on any row type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_no: u32,
    #[serde(default)]
    pub line_type: LineType,
    pub description: String,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
}

impl InvoiceLine {
    /// See [`line_amount`].
    pub fn amount(&self) -> Option<Decimal> {
        line_amount(self.line_type, self.quantity, self.unit_price)
    }
}

/// `quantity × unit_price` for `Line` rows, missing values counting as zero.
/// Every other row type contributes nothing. `None` when the product does not
/// fit a `Decimal`.
pub fn line_amount(line_type: LineType, quantity: Option<Decimal>, unit_price: Option<Decimal>) -> Option<Decimal> {
    if line_type != LineType::Line {
        return Some(Decimal::ZERO);
    }
    quantity
        .unwrap_or(Decimal::ZERO)
        .checked_mul(unit_price.unwrap_or(Decimal::ZERO))
}

/// Sum of line amounts, excluding tax. `None` on overflow.
pub fn untaxed_amount<'a>(lines: impl IntoIterator<Item = &'a InvoiceLine>) -> Option<Decimal> {
    lines
        .into_iter()
        .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.amount()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(line_type: LineType, quantity: Option<Decimal>, unit_price: Option<Decimal>) -> InvoiceLine {
        InvoiceLine {
            line_no: 1,
            line_type,
            description: "row".to_string(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn mixed_sign_lines_sum_to_negative_amount() {
        let lines = vec![
            line(LineType::Line, Some(Decimal::new(2, 0)), Some(Decimal::new(1000, 2))),
            line(LineType::Line, Some(Decimal::new(1, 0)), Some(Decimal::new(-2500, 2))),
        ];
        assert_eq!(untaxed_amount(&lines), Some(Decimal::new(-500, 2)));
    }

    #[test]
    fn missing_quantity_or_price_counts_as_zero() {
        let lines = vec![
            line(LineType::Line, None, Some(Decimal::new(999, 2))),
            line(LineType::Line, Some(Decimal::new(3, 0)), None),
            line(LineType::Line, Some(Decimal::new(3, 0)), Some(Decimal::new(150, 2))),
        ];
        assert_eq!(untaxed_amount(&lines), Some(Decimal::new(450, 2)));
    }

    #[test]
    fn non_line_rows_are_ignored() {
        let lines = vec![
            line(LineType::Title, Some(Decimal::new(5, 0)), Some(Decimal::new(100, 0))),
            line(LineType::Subtotal, Some(Decimal::new(1, 0)), Some(Decimal::new(100, 0))),
            line(LineType::Comment, None, None),
        ];
        assert_eq!(untaxed_amount(&lines), Some(Decimal::ZERO));
    }

    #[test]
    fn decimal_sum_has_no_rounding_drift() {
        let lines: Vec<_> = (0..10)
            .map(|_| line(LineType::Line, Some(Decimal::ONE), Some(Decimal::new(10, 2))))
            .collect();
        assert_eq!(untaxed_amount(&lines), Some(Decimal::ONE));
    }

    #[test]
    fn oversized_amounts_are_reported_instead_of_panicking() {
        let huge = Decimal::new(1_000_000_000_000_000, 0);
        let product = line(LineType::Line, Some(huge), Some(huge));
        assert_eq!(product.amount(), None);
        assert_eq!(untaxed_amount(&[product]), None);

        let max = line(LineType::Line, Some(Decimal::ONE), Some(Decimal::MAX));
        assert_eq!(max.amount(), Some(Decimal::MAX));
        assert_eq!(untaxed_amount(&[max.clone(), max]), None);

        assert_eq!(line_amount(LineType::Title, Some(huge), Some(huge)), Some(Decimal::ZERO));
    }

    proptest! {
        /// Property: the untaxed amount equals the sum of per-line cent products.
        #[test]
        fn untaxed_amount_matches_integer_cents(
            rows in prop::collection::vec((-1_000i64..1_000, -100_000i64..100_000), 0..12)
        ) {
            let lines: Vec<_> = rows
                .iter()
                .map(|(q, cents)| line(LineType::Line, Some(Decimal::new(*q, 0)), Some(Decimal::new(*cents, 2))))
                .collect();
            let expected: i64 = rows.iter().map(|(q, cents)| q * cents).sum();
            prop_assert_eq!(untaxed_amount(&lines), Some(Decimal::new(expected, 2)));
        }
    }
}
