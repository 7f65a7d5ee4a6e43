//! Exact monetary quantities.
//!
//! Amounts are big-integer rationals scoped to a commodity. Arithmetic never
//! rounds; rounding only happens when a quantity is rendered at its
//! commodity's display scale, and both renderings round the same way.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from quantity arithmetic and parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Denominator must not be zero")]
    ZeroDenominator,

    #[error("Cannot combine {left} with {right}")]
    CommodityMismatch { left: String, right: String },

    #[error("Cannot parse amount {0:?}")]
    Parse(String),
}

/// A currency or security, identified by its mnemonic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Commodity {
    mnemonic: String,
    fraction_digits: u32,
}

impl Commodity {
    pub fn new(mnemonic: impl Into<String>, fraction_digits: u32) -> Self {
        Commodity {
            mnemonic: mnemonic.into(),
            fraction_digits,
        }
    }

    /// Resolves an ISO 4217 code to a commodity with its minor-unit count.
    ///
    /// Codes without minor units (JPY, KRW, ...) get scale 0, the dinar-like
    /// currencies get 3, everything else 2.
    pub fn from_code(code: &str) -> Self {
        let code = code.trim().to_uppercase();
        let fraction_digits = match code.as_str() {
            "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF"
            | "UGX" | "UYI" | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
            "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
            _ => 2,
        };
        Commodity::new(code, fraction_digits)
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// Number of decimal places used when displaying amounts.
    pub fn fraction_digits(&self) -> u32 {
        self.fraction_digits
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic)
    }
}

/// Locale conventions for human-facing numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberLocale {
    pub decimal_mark: char,
    pub grouping: Option<char>,
}

impl NumberLocale {
    /// `1234.50`
    pub const POSIX: Self = NumberLocale {
        decimal_mark: '.',
        grouping: None,
    };

    /// `1234,50`
    pub const DECIMAL_COMMA: Self = NumberLocale {
        decimal_mark: ',',
        grouping: None,
    };
}

impl Default for NumberLocale {
    fn default() -> Self {
        Self::POSIX
    }
}

/// An exact signed rational amount of one commodity.
///
/// Equality compares the commodity and the rational value, so `12/10` and
/// `6/5` of the same commodity are equal.
///
/// # Examples
///
/// ```
/// use ledger_export::{Commodity, ExactQuantity};
///
/// let usd = Commodity::from_code("USD");
/// let rent = ExactQuantity::new(120000, 100, usd).unwrap();
/// assert_eq!(rent.format_machine(), "1200.00");
/// assert_eq!(rent.negate().format_machine(), "-1200.00");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactQuantity {
    amount: BigRational,
    commodity: Commodity,
}

impl ExactQuantity {
    /// Creates `numerator / denominator` of `commodity`.
    pub fn new(
        numerator: impl Into<BigInt>,
        denominator: impl Into<BigInt>,
        commodity: Commodity,
    ) -> Result<Self, QuantityError> {
        let denominator = denominator.into();
        if denominator.is_zero() {
            return Err(QuantityError::ZeroDenominator);
        }
        Ok(ExactQuantity {
            amount: BigRational::new(numerator.into(), denominator),
            commodity,
        })
    }

    pub fn zero(commodity: Commodity) -> Self {
        ExactQuantity {
            amount: BigRational::zero(),
            commodity,
        }
    }

    /// Converts a decimal without loss: mantissa over `10^scale`.
    pub fn from_decimal(value: Decimal, commodity: Commodity) -> Self {
        let numerator = BigInt::from(value.mantissa());
        let denominator = BigInt::from(10u32).pow(value.scale());
        ExactQuantity {
            amount: BigRational::new(numerator, denominator),
            commodity,
        }
    }

    /// Parses a decimal literal (`"1200.00"`) or a fraction (`"120000/100"`).
    pub fn parse(text: &str, commodity: Commodity) -> Result<Self, QuantityError> {
        let trimmed = text.trim();
        if let Some((numerator, denominator)) = trimmed.split_once('/') {
            let numerator = BigInt::from_str(numerator.trim())
                .map_err(|_| QuantityError::Parse(trimmed.to_string()))?;
            let denominator = BigInt::from_str(denominator.trim())
                .map_err(|_| QuantityError::Parse(trimmed.to_string()))?;
            return Self::new(numerator, denominator, commodity);
        }

        let decimal =
            Decimal::from_str(trimmed).map_err(|_| QuantityError::Parse(trimmed.to_string()))?;
        Ok(Self::from_decimal(decimal, commodity))
    }

    pub fn commodity(&self) -> &Commodity {
        &self.commodity
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_negative()
    }

    pub fn add(&self, other: &ExactQuantity) -> Result<Self, QuantityError> {
        self.check_commodity(other)?;
        Ok(ExactQuantity {
            amount: &self.amount + &other.amount,
            commodity: self.commodity.clone(),
        })
    }

    pub fn subtract(&self, other: &ExactQuantity) -> Result<Self, QuantityError> {
        self.add(&other.negate())
    }

    pub fn negate(&self) -> Self {
        ExactQuantity {
            amount: -&self.amount,
            commodity: self.commodity.clone(),
        }
    }

    pub fn abs(&self) -> Self {
        ExactQuantity {
            amount: self.amount.abs(),
            commodity: self.commodity.clone(),
        }
    }

    /// Exact quotient `self / divisor`, in this quantity's commodity.
    ///
    /// Dividing a split's quantity by its value yields the exchange rate, so
    /// the two commodities are allowed to differ.
    pub fn divide(&self, divisor: &ExactQuantity) -> Result<Self, QuantityError> {
        if divisor.amount.is_zero() {
            return Err(QuantityError::DivisionByZero);
        }
        Ok(ExactQuantity {
            amount: &self.amount / &divisor.amount,
            commodity: self.commodity.clone(),
        })
    }

    /// Fixed-point rendering at the commodity's scale: `.` as decimal mark,
    /// no grouping, leading `-` for negative values.
    pub fn format_machine(&self) -> String {
        self.format_with(NumberLocale::POSIX)
    }

    /// Same digits and rounding as [`format_machine`](Self::format_machine),
    /// with the locale's decimal mark and grouping.
    pub fn format_locale(&self, locale: &NumberLocale) -> String {
        self.format_with(*locale)
    }

    fn format_with(&self, locale: NumberLocale) -> String {
        let scale = self.commodity.fraction_digits;
        let (negative, digits) = self.scaled_digits(scale);

        let split_at = digits.len() - scale as usize;
        let (integer_part, fraction_part) = digits.split_at(split_at);

        let mut out = String::with_capacity(digits.len() + 4);
        if negative {
            out.push('-');
        }
        out.push_str(&group_digits(integer_part, locale.grouping));
        if scale > 0 {
            out.push(locale.decimal_mark);
            out.push_str(fraction_part);
        }
        out
    }

    /// Rounds `|amount| * 10^scale` half away from zero and returns its
    /// digits, left-padded so at least one integer digit precedes the
    /// fraction.
    fn scaled_digits(&self, scale: u32) -> (bool, String) {
        let factor = BigRational::from_integer(BigInt::from(10u32).pow(scale));
        let rounded = (&self.amount * factor).round().to_integer();

        let negative = rounded.is_negative();
        let mut digits = rounded.abs().to_string();
        while digits.len() <= scale as usize {
            digits.insert(0, '0');
        }
        (negative, digits)
    }

    fn check_commodity(&self, other: &ExactQuantity) -> Result<(), QuantityError> {
        if self.commodity != other.commodity {
            return Err(QuantityError::CommodityMismatch {
                left: self.commodity.mnemonic.clone(),
                right: other.commodity.mnemonic.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ExactQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.format_machine(), self.commodity)
    }
}

fn group_digits(digits: &str, separator: Option<char>) -> String {
    let separator = match separator {
        Some(sep) if digits.len() > 3 => sep,
        _ => return digits.to_string(),
    };

    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        let remaining = digits.len() - i;
        if i > 0 && remaining % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd() -> Commodity {
        Commodity::from_code("USD")
    }

    fn q(numerator: i64, denominator: i64) -> ExactQuantity {
        ExactQuantity::new(numerator, denominator, usd()).unwrap()
    }

    #[test]
    fn test_equality_uses_cross_products() {
        assert_eq!(q(12, 10), q(6, 5));
        assert_eq!(q(-1, 2), q(1, -2));
        assert_ne!(q(1, 3), q(333, 1000));
        assert_ne!(q(1, 1), ExactQuantity::new(1, 1, Commodity::from_code("EUR")).unwrap());
    }

    #[test]
    fn test_zero_denominator_rejected() {
        assert_eq!(
            ExactQuantity::new(1, 0, usd()),
            Err(QuantityError::ZeroDenominator)
        );
    }

    #[test]
    fn test_negative_denominator_moves_sign() {
        let value = q(3, -4);
        assert!(value.is_negative());
        assert_eq!(value, q(-3, 4));
    }

    #[test]
    fn test_add_is_exact() {
        let third = q(1, 3);
        let sum = third.add(&third).unwrap().add(&third).unwrap();
        assert_eq!(sum, q(1, 1));
    }

    #[test]
    fn test_add_rejects_other_commodity() {
        let eur = ExactQuantity::new(1, 1, Commodity::from_code("EUR")).unwrap();
        assert!(matches!(
            q(1, 1).add(&eur),
            Err(QuantityError::CommodityMismatch { .. })
        ));
    }

    #[test]
    fn test_subtract_and_negate() {
        assert!(q(5, 2).subtract(&q(5, 2)).unwrap().is_zero());
        assert_eq!(q(5, 2).negate(), q(-5, 2));
        assert_eq!(q(-5, 2).abs(), q(5, 2));
    }

    #[test]
    fn test_divide_by_zero() {
        assert_eq!(
            q(1, 1).divide(&ExactQuantity::zero(usd())),
            Err(QuantityError::DivisionByZero)
        );
    }

    #[test]
    fn test_divide_across_commodities_keeps_dividend_commodity() {
        let eur = ExactQuantity::new(9000, 100, Commodity::from_code("EUR")).unwrap();
        let rate = eur.divide(&q(10000, 100)).unwrap();
        assert_eq!(rate.commodity().mnemonic(), "EUR");
        assert_eq!(rate.format_machine(), "0.90");
    }

    #[test]
    fn test_format_machine() {
        assert_eq!(q(120000, 100).format_machine(), "1200.00");
        assert_eq!(q(-120000, 100).format_machine(), "-1200.00");
        assert_eq!(q(5, 100).format_machine(), "0.05");
        assert_eq!(q(-5, 100).format_machine(), "-0.05");
        assert_eq!(q(0, 1).format_machine(), "0.00");
        assert_eq!(q(1234567, 1).format_machine(), "1234567.00");
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(q(1, 3).format_machine(), "0.33");
        assert_eq!(q(2, 3).format_machine(), "0.67");
        assert_eq!(q(5, 1000).format_machine(), "0.01");
        assert_eq!(q(25, 1000).format_machine(), "0.03");
        assert_eq!(q(-25, 1000).format_machine(), "-0.03");
        assert_eq!(q(-1, 1000).format_machine(), "0.00");
    }

    #[test]
    fn test_format_respects_commodity_scale() {
        let yen = ExactQuantity::new(15005, 10, Commodity::from_code("JPY")).unwrap();
        assert_eq!(yen.format_machine(), "1501");

        let dinar = ExactQuantity::new(1, 8, Commodity::from_code("KWD")).unwrap();
        assert_eq!(dinar.format_machine(), "0.125");
    }

    #[test]
    fn test_format_locale_shares_rounding() {
        let value = q(-1234567, 300);
        let locale = NumberLocale {
            decimal_mark: ',',
            grouping: Some('.'),
        };
        assert_eq!(value.format_machine(), "-4115.22");
        assert_eq!(value.format_locale(&locale), "-4.115,22");
        assert_eq!(value.format_locale(&NumberLocale::DECIMAL_COMMA), "-4115,22");
        assert_eq!(value.format_locale(&NumberLocale::POSIX), value.format_machine());
    }

    #[test]
    fn test_grouping() {
        assert_eq!(group_digits("1", Some(',')), "1");
        assert_eq!(group_digits("123", Some(',')), "123");
        assert_eq!(group_digits("1234", Some(',')), "1,234");
        assert_eq!(group_digits("123456", Some(',')), "123,456");
        assert_eq!(group_digits("1234567", Some(',')), "1,234,567");
        assert_eq!(group_digits("1234567", None), "1234567");
    }

    #[test]
    fn test_parse_decimal_and_fraction() {
        assert_eq!(ExactQuantity::parse("1200.00", usd()).unwrap(), q(1200, 1));
        assert_eq!(ExactQuantity::parse(" 120000/100 ", usd()).unwrap(), q(1200, 1));
        assert_eq!(ExactQuantity::parse("-0.125", usd()).unwrap(), q(-1, 8));
        assert!(matches!(
            ExactQuantity::parse("12,5", usd()),
            Err(QuantityError::Parse(_))
        ));
        assert_eq!(
            ExactQuantity::parse("1/0", usd()),
            Err(QuantityError::ZeroDenominator)
        );
    }

    #[test]
    fn test_from_decimal_is_exact() {
        let decimal = Decimal::from_str("0.1").unwrap();
        let tenth = ExactQuantity::from_decimal(decimal, usd());
        let sum = (0..10).try_fold(ExactQuantity::zero(usd()), |acc, _| acc.add(&tenth));
        assert_eq!(sum.unwrap(), q(1, 1));
    }

    #[test]
    fn test_commodity_scales() {
        assert_eq!(Commodity::from_code("usd").mnemonic(), "USD");
        assert_eq!(Commodity::from_code("USD").fraction_digits(), 2);
        assert_eq!(Commodity::from_code("JPY").fraction_digits(), 0);
        assert_eq!(Commodity::from_code("BHD").fraction_digits(), 3);
    }
}
