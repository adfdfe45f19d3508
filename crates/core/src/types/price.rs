//! Type-safe price representation.
//!
//! Catalog prices are stored as integers in the currency's minor unit
//! (kopecks, cents, pence). [`Price::display`] renders them the way a shop
//! assistant would read them out, using the separators and symbol placement
//! customary for the currency.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the smallest currency unit (e.g., cents for USD).
    pub minor_units: i64,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a price from an amount in minor units.
    #[must_use]
    pub const fn from_minor_units(minor_units: i64, currency_code: CurrencyCode) -> Self {
        Self {
            minor_units,
            currency_code,
        }
    }

    /// Multiply by a quantity, saturating on overflow.
    #[must_use]
    pub const fn times(&self, quantity: i64) -> Self {
        Self {
            minor_units: self.minor_units.saturating_mul(quantity),
            currency_code: self.currency_code,
        }
    }

    /// Format for display (e.g., `$1,299.00`, `1 299 ₽`).
    #[must_use]
    pub fn display(&self) -> String {
        let style = self.currency_code.style();
        let magnitude = self.minor_units.unsigned_abs();
        let whole = group_digits(magnitude / 100, style.thousands);
        let cents = magnitude % 100;

        let number = if cents == 0 && !style.always_show_cents {
            whole
        } else {
            format!("{whole}{}{cents:02}", style.decimal)
        };
        let sign = if self.minor_units < 0 { "-" } else { "" };

        if style.symbol_first {
            format!("{sign}{}{number}", style.symbol)
        } else {
            format!("{sign}{number} {}", style.symbol)
        }
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    RUB,
    USD,
    EUR,
    GBP,
}

struct CurrencyStyle {
    symbol: &'static str,
    symbol_first: bool,
    thousands: char,
    decimal: char,
    always_show_cents: bool,
}

impl CurrencyCode {
    /// ISO 4217 code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RUB => "RUB",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }

    const fn style(self) -> CurrencyStyle {
        match self {
            Self::RUB => CurrencyStyle {
                symbol: "₽",
                symbol_first: false,
                thousands: ' ',
                decimal: ',',
                always_show_cents: false,
            },
            Self::USD => CurrencyStyle {
                symbol: "$",
                symbol_first: true,
                thousands: ',',
                decimal: '.',
                always_show_cents: true,
            },
            Self::GBP => CurrencyStyle {
                symbol: "£",
                symbol_first: true,
                thousands: ',',
                decimal: '.',
                always_show_cents: true,
            },
            Self::EUR => CurrencyStyle {
                symbol: "€",
                symbol_first: false,
                thousands: '.',
                decimal: ',',
                always_show_cents: true,
            },
        }
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUB" => Ok(Self::RUB),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

fn group_digits(value: u64, separator: char) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rub_drops_zero_kopecks() {
        let price = Price::from_minor_units(12_999_000, CurrencyCode::RUB);
        assert_eq!(price.display(), "129 990 ₽");
    }

    #[test]
    fn test_rub_keeps_non_zero_kopecks() {
        let price = Price::from_minor_units(150_050, CurrencyCode::RUB);
        assert_eq!(price.display(), "1 500,50 ₽");
    }

    #[test]
    fn test_usd_formatting() {
        assert_eq!(
            Price::from_minor_units(129_900, CurrencyCode::USD).display(),
            "$1,299.00"
        );
        assert_eq!(Price::from_minor_units(5, CurrencyCode::USD).display(), "$0.05");
    }

    #[test]
    fn test_eur_symbol_after_amount() {
        assert_eq!(
            Price::from_minor_units(1_234_567, CurrencyCode::EUR).display(),
            "12.345,67 €"
        );
    }

    #[test]
    fn test_negative_amount() {
        assert_eq!(
            Price::from_minor_units(-2_500, CurrencyCode::GBP).display(),
            "-£25.00"
        );
    }

    #[test]
    fn test_times() {
        let price = Price::from_minor_units(1_999, CurrencyCode::USD);
        assert_eq!(price.times(3).minor_units, 5_997);
        assert_eq!(price.times(i64::MAX).minor_units, i64::MAX);
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("usd".parse::<CurrencyCode>(), Ok(CurrencyCode::USD));
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
