//! Type-safe price representation using decimal arithmetic.
//!
//! The commerce API reports every price as a decimal string ("12.50"), and
//! an empty string when a price is not set. [`Price::parse`] turns those into
//! exact decimals so discount maths never goes through floating point.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., euros, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Parse a commerce API price string.
    ///
    /// Returns `None` for empty, whitespace-only, negative or unparsable
    /// input. The commerce API uses an empty string for "no sale price".
    #[must_use]
    pub fn parse(raw: &str, currency_code: CurrencyCode) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let amount = Decimal::from_str(trimmed).ok()?;
        if amount.is_sign_negative() {
            return None;
        }
        Some(Self::new(amount, currency_code))
    }

    /// Multiply by a line quantity.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }

    /// Add two prices of the same currency.
    ///
    /// Returns `None` when currencies differ or the sum overflows.
    #[must_use]
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        if self.currency_code != other.currency_code {
            return None;
        }
        self.amount
            .checked_add(other.amount)
            .map(|amount| Self::new(amount, self.currency_code))
    }

    /// Format for display (e.g., "€19.99").
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let symbol = self.currency_code.symbol();
        if symbol.len() > 1 && symbol.chars().all(char::is_alphabetic) {
            format!("{symbol} {rounded:.2}")
        } else {
            format!("{symbol}{rounded:.2}")
        }
    }

    /// Whole-number discount percentage between a regular and a sale price.
    ///
    /// Returns `None` unless `0 < sale < regular` in the same currency. The
    /// result is rounded half away from zero and clamped to `1..=99` so a
    /// real discount never displays as "0% off" or "100% off".
    #[must_use]
    pub fn discount_percentage(regular: &Self, sale: &Self) -> Option<u32> {
        if regular.currency_code != sale.currency_code
            || sale.amount <= Decimal::ZERO
            || sale.amount >= regular.amount
        {
            return None;
        }

        let ratio = (regular.amount - sale.amount) / regular.amount * Decimal::ONE_HUNDRED;
        let rounded = ratio.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let percent = rounded.to_u32()?;
        Some(percent.clamp(1, 99))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    USD,
    #[default]
    EUR,
    GBP,
    CAD,
    AUD,
    CHF,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
            Self::CHF => "CHF",
        }
    }

    /// ISO 4217 code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
            Self::CHF => "CHF",
        }
    }
}

/// Error returned when a currency code is not supported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported currency code: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for CurrencyCode {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            "CHF" => Ok(Self::CHF),
            other => Err(UnknownCurrency(other.to_string())),
        }
    }
}
