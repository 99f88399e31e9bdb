//! Utility functions for formatting and common operations
//!
//! Centralized formatting for money, signed changes and percentages so the
//! terminal tables and the HTML report agree.

use rust_decimal::Decimal;

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Include "$" prefix
    Usd,
    /// No currency symbol (table cells)
    None,
}

/// Core formatting function with full control over output.
///
/// Formats a Decimal value using US conventions:
/// - Thousands separator: `,`
/// - Decimal separator: `.`
///
/// # Examples
/// ```
/// use trackport::utils::{format_currency_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234.56), 0, CurrencySymbol::Usd),
///     "$1,234.56"
/// );
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234), 12, CurrencySymbol::None),
///     "    1,234.00"
/// );
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let is_negative = value < Decimal::ZERO;
    let abs_value = value.abs().round_dp(2);

    let formatted = format!("{:.2}", abs_value);
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let with_separators = group_thousands(integer_part);

    let sign = if is_negative && !abs_value.is_zero() { "-" } else { "" };
    let prefix = match symbol {
        CurrencySymbol::Usd => "$",
        CurrencySymbol::None => "",
    };

    let result = format!("{}{}{}.{}", sign, prefix, with_separators, decimal_part);

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ============ Convenience functions ============

/// Format as dollars: "$1,234.56"
///
/// # Examples
/// ```
/// use trackport::utils::format_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency(dec!(1234.56)), "$1,234.56");
/// assert_eq!(format_currency(dec!(-500)), "-$500.00");
/// ```
pub fn format_currency(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::Usd)
}

/// Number with separators, no symbol: "1,234.56"
pub fn format_decimal(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::None)
}

/// Signed change: "+12.30" / "-4.00"
pub fn format_signed(value: Decimal) -> String {
    let formatted = format_decimal(value);
    if value.round_dp(2) > Decimal::ZERO {
        format!("+{}", formatted)
    } else {
        formatted
    }
}

/// Percentage with a fixed number of decimals: "12.3%"
pub fn format_percent(value: Decimal, decimals: u32) -> String {
    format!("{:.*}%", decimals as usize, value.round_dp(decimals))
}

/// Signed percentage: "+1.25%"
pub fn format_signed_percent(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp(decimals);
    if rounded > Decimal::ZERO {
        format!("+{}", format_percent(rounded, decimals))
    } else {
        format_percent(rounded, decimals)
    }
}

/// Share counts without trailing zeros: "10", "2.5"
pub fn format_shares(value: Decimal) -> String {
    value.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_currency_basic() {
        assert_eq!(format_currency(dec!(1234.56)), "$1,234.56");
        assert_eq!(format_currency(dec!(0.99)), "$0.99");
        assert_eq!(format_currency(dec!(1000000)), "$1,000,000.00");
    }

    #[test]
    fn test_format_currency_small_values() {
        assert_eq!(format_currency(dec!(0)), "$0.00");
        assert_eq!(format_currency(dec!(0.01)), "$0.01");
        assert_eq!(format_currency(dec!(123)), "$123.00");
        assert_eq!(format_currency(dec!(999.99)), "$999.99");
    }

    #[test]
    fn test_format_currency_negative() {
        assert_eq!(format_currency(dec!(-1234.56)), "-$1,234.56");
        assert_eq!(format_currency(dec!(-0.001)), "$0.00");
    }

    #[test]
    fn test_format_with_width() {
        let result = format_currency_with_width(dec!(100), 10, CurrencySymbol::Usd);
        assert_eq!(result, "   $100.00");

        let result = format_currency_with_width(dec!(1000000), 5, CurrencySymbol::Usd);
        assert_eq!(result, "$1,000,000.00");
    }

    #[test]
    fn test_format_signed() {
        assert_eq!(format_signed(dec!(12.3)), "+12.30");
        assert_eq!(format_signed(dec!(-4)), "-4.00");
        assert_eq!(format_signed(dec!(0)), "0.00");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(dec!(12.345), 1), "12.3%");
        assert_eq!(format_signed_percent(dec!(1.256), 2), "+1.26%");
        assert_eq!(format_signed_percent(dec!(-0.5), 1), "-0.5%");
    }

    #[test]
    fn test_format_shares() {
        assert_eq!(format_shares(dec!(10.000)), "10");
        assert_eq!(format_shares(dec!(2.50)), "2.5");
    }
}
