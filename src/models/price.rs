use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inclusive bounds of a raw, client-submitted price.
pub const RAW_PRICE_MIN: i64 = 0;
pub const RAW_PRICE_MAX: i64 = 1000;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("raw price {0} outside [0, 1000]")]
pub struct InvalidPriceError(pub i64);

/// A price in the engine's internal fixed-point representation.
///
/// Stored as the raw client-submitted integer (0..=1000, hundredths of a
/// dollar), which is the same quantity as `internal_price * 100`. Keeping
/// the raw integer as the canonical form — rather than a `Decimal` or a
/// `f64` — makes the complementary-price identity exact: `raw +
/// (1000 - raw) == 1000` always holds in integer arithmetic, which is the
/// property the internal price (`raw / 100`) needs after it's divided
/// down for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    pub fn from_raw(raw: i64) -> Result<Self, InvalidPriceError> {
        if (RAW_PRICE_MIN..=RAW_PRICE_MAX).contains(&raw) {
            Ok(Self(raw))
        } else {
            Err(InvalidPriceError(raw))
        }
    }

    /// The raw integer this price was constructed from.
    pub fn raw(&self) -> i64 {
        self.0
    }

    /// The complementary price, `1000 - raw`, used to book a reverted ask
    /// on the opposite side. Always in range since `raw` is.
    pub fn complement(&self) -> Price {
        Price(RAW_PRICE_MAX - self.0)
    }

    /// The internal price as a decimal in [0, 10], for display and wire
    /// payloads only — never used as a map key.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// The raw integer as a `Decimal`, i.e. `to_decimal() * 100`. Cash
    /// locked against a resting order is always sized at this scale, not
    /// the internal price's — see the reverted-order lock and its
    /// cancel/mint counterparts.
    pub fn raw_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}
