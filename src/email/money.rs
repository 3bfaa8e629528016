//! Display formatting for minor-unit amounts.

/// Currencies with no minor unit (amounts are already whole units).
const ZERO_DECIMAL: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

/// Currencies with three decimal places.
const THREE_DECIMAL: &[&str] = &["bhd", "jod", "kwd", "omr", "tnd"];

/// Number of decimal places for an ISO 4217 code. Unknown codes use 2.
pub fn currency_exponent(currency: &str) -> u32 {
    let code = currency.to_ascii_lowercase();
    if ZERO_DECIMAL.contains(&code.as_str()) {
        0
    } else if THREE_DECIMAL.contains(&code.as_str()) {
        3
    } else {
        2
    }
}

/// Format `amount` minor units for people, e.g. `1999, "usd"` -> `"19.99 USD"`.
///
/// Integer arithmetic only, so large amounts never pick up float rounding.
pub fn format_minor_units(amount: i64, currency: &str) -> String {
    let exponent = currency_exponent(currency);
    let code = currency.to_ascii_uppercase();
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();

    if exponent == 0 {
        return format!("{}{} {}", sign, abs, code);
    }

    let divisor = 10u64.pow(exponent);
    format!(
        "{}{}.{:0width$} {}",
        sign,
        abs / divisor,
        abs % divisor,
        code,
        width = exponent as usize
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_decimal() {
        assert_eq!(format_minor_units(1999, "usd"), "19.99 USD");
        assert_eq!(format_minor_units(5, "eur"), "0.05 EUR");
        assert_eq!(format_minor_units(0, "usd"), "0.00 USD");
        assert_eq!(format_minor_units(100_000, "gbp"), "1000.00 GBP");
    }

    #[test]
    fn test_zero_decimal() {
        assert_eq!(currency_exponent("JPY"), 0);
        assert_eq!(format_minor_units(1999, "jpy"), "1999 JPY");
    }

    #[test]
    fn test_three_decimal() {
        assert_eq!(format_minor_units(1999, "kwd"), "1.999 KWD");
        assert_eq!(format_minor_units(1, "bhd"), "0.001 BHD");
    }

    #[test]
    fn test_negative_and_extremes() {
        assert_eq!(format_minor_units(-250, "usd"), "-2.50 USD");
        assert_eq!(
            format_minor_units(i64::MIN, "jpy"),
            "-9223372036854775808 JPY"
        );
    }
}
