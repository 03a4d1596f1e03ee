//! RDK Amount
//!
//! Token amounts are kept in base units (the smallest on-chain denomination of the token), so a
//! token with 18 decimals represents `1.5` as `1_500_000_000_000_000_000`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Basis points in one whole (100%)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Amount Error
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Amount overflow
    #[error("Amount Overflow")]
    AmountOverflow,
    /// Invalid amount
    #[error("Invalid Amount: {0}")]
    InvalidAmount(String),
    /// Too many fractional digits for the token
    #[error("Amount `{0}` has more than {1} fractional digits")]
    TooManyDecimals(String, u8),
    /// Slippage outside of `0..=100` percent
    #[error("Invalid slippage tolerance: {0}%")]
    InvalidSlippage(f64),
}

/// Token amount in base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Amount(u128);

impl Amount {
    /// Amount zero
    pub const ZERO: Amount = Amount(0);

    /// Largest amount that fits a 32 byte ABI word we accept
    pub const MAX: Amount = Amount(u128::MAX);

    /// Parse a human readable decimal amount (`"1.25"`) into base units
    pub fn from_decimal_str(value: &str, decimals: u8) -> Result<Self, Error> {
        let value = value.trim();
        let (int_part, frac_part) = match value.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (value, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(Error::InvalidAmount(value.to_owned()));
        }

        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(Error::InvalidAmount(value.to_owned()));
        }

        if frac_part.len() > decimals as usize {
            return Err(Error::TooManyDecimals(value.to_owned(), decimals));
        }

        let scale = 10u128
            .checked_pow(decimals as u32)
            .ok_or(Error::AmountOverflow)?;

        let int_value = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse::<u128>()
                .map_err(|_| Error::InvalidAmount(value.to_owned()))?
        };

        let frac_value = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{frac_part:0<width$}", width = decimals as usize);
            padded
                .parse::<u128>()
                .map_err(|_| Error::InvalidAmount(value.to_owned()))?
        };

        int_value
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_value))
            .map(Amount)
            .ok_or(Error::AmountOverflow)
    }

    /// Format as a human readable decimal string, trimming trailing zeros
    pub fn to_decimal_string(&self, decimals: u8) -> String {
        if decimals == 0 {
            return self.0.to_string();
        }

        let digits = format!("{:0>width$}", self.0, width = decimals as usize + 1);
        let (int_part, frac_part) = digits.split_at(digits.len() - decimals as usize);
        let frac_part = frac_part.trim_end_matches('0');

        if frac_part.is_empty() {
            int_part.to_string()
        } else {
            format!("{int_part}.{frac_part}")
        }
    }

    /// Reduce the amount by a slippage tolerance expressed in percent.
    ///
    /// `expected × (1 − percent / 100)`, computed in basis points so `0.5%` on `100` base
    /// units of an 18 decimal token is exact.
    pub fn apply_slippage(&self, slippage_tolerance_percent: f64) -> Result<Amount, Error> {
        let bps = slippage_to_bps(slippage_tolerance_percent)?;

        self.0
            .checked_mul(BPS_DENOMINATOR - bps)
            .map(|v| Amount(v / BPS_DENOMINATOR))
            .or_else(|| {
                // Very large amounts: divide first and accept the rounding
                (self.0 / BPS_DENOMINATOR)
                    .checked_mul(BPS_DENOMINATOR - bps)
                    .map(Amount)
            })
            .ok_or(Error::AmountOverflow)
    }

    /// Encode as a 32 byte big endian ABI word
    pub fn to_be_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[16..].copy_from_slice(&self.0.to_be_bytes());
        word
    }

    /// Decode a 32 byte big endian ABI word
    pub fn from_be_word(word: &[u8]) -> Result<Self, Error> {
        if word.len() != 32 {
            return Err(Error::InvalidAmount(format!("{} byte word", word.len())));
        }

        if word[..16].iter().any(|b| *b != 0) {
            return Err(Error::AmountOverflow);
        }

        let mut low = [0u8; 16];
        low.copy_from_slice(&word[16..]);
        Ok(Amount(u128::from_be_bytes(low)))
    }

    /// Decode a 32 byte big endian ABI word, clamping values above [`Amount::MAX`].
    ///
    /// Meant for allowances, where `type(uint256).max` is the usual "unlimited" approval.
    pub fn from_be_word_saturating(word: &[u8]) -> Result<Self, Error> {
        match Self::from_be_word(word) {
            Err(Error::AmountOverflow) => Ok(Amount::MAX),
            result => result,
        }
    }

    /// Checked addition for Amount. Returns None if overflow occurs.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction for Amount. Returns None if overflow occurs.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Convert to u128
    pub fn to_u128(self) -> u128 {
        self.0
    }
}

/// Convert a percent slippage tolerance into basis points.
///
/// The resolution is one basis point (`0.01%`). Finer values such as `0.005` are rejected
/// rather than rounded.
pub fn slippage_to_bps(slippage_tolerance_percent: f64) -> Result<u128, Error> {
    if !slippage_tolerance_percent.is_finite()
        || !(0.0..=100.0).contains(&slippage_tolerance_percent)
    {
        return Err(Error::InvalidSlippage(slippage_tolerance_percent));
    }

    let bps = slippage_tolerance_percent * 100.0;
    // Tolerate float noise such as 0.1 * 100 = 10.000000000000002
    if (bps - bps.round()).abs() > 1e-6 {
        return Err(Error::InvalidSlippage(slippage_tolerance_percent));
    }

    Ok(bps.round() as u128)
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .parse::<u128>()
            .map_err(|_| Error::InvalidAmount(s.to_owned()))?;
        Ok(Amount(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value as u128)
    }
}

impl From<Amount> for u128 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

// Base unit amounts routinely exceed 2^53, so they travel as decimal strings
impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Num(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Str(s) => Amount::from_str(&s).map_err(serde::de::Error::custom),
            Raw::Num(n) => Ok(Amount::from(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_from_decimal_str() {
        assert_eq!(
            Amount::from_decimal_str("1.5", 18).unwrap(),
            Amount::from(ONE_TOKEN + ONE_TOKEN / 2)
        );
        assert_eq!(Amount::from_decimal_str("100", 6).unwrap(), Amount::from(100_000_000u128));
        assert_eq!(Amount::from_decimal_str(".25", 2).unwrap(), Amount::from(25u128));
        assert!(Amount::from_decimal_str("1.234", 2).is_err());
        assert!(Amount::from_decimal_str("1,5", 18).is_err());
        assert!(Amount::from_decimal_str("", 18).is_err());
    }

    #[test]
    fn test_to_decimal_string() {
        let amount = Amount::from(99 * ONE_TOKEN + ONE_TOKEN / 2);
        assert_eq!(amount.to_decimal_string(18), "99.5");
        assert_eq!(Amount::from(5u128).to_decimal_string(2), "0.05");
        assert_eq!(Amount::from(500u128).to_decimal_string(2), "5");
        assert_eq!(Amount::from(42u128).to_decimal_string(0), "42");
    }

    #[test]
    fn test_min_output_with_half_percent_slippage() {
        let expected = Amount::from(100 * ONE_TOKEN);
        let min_output = expected.apply_slippage(0.5).unwrap();

        assert_eq!(min_output, Amount::from(99 * ONE_TOKEN + ONE_TOKEN / 2));
        assert_eq!(min_output.to_decimal_string(18), "99.5");
    }

    #[test]
    fn test_invalid_slippage() {
        let expected = Amount::from(100u128);
        assert!(expected.apply_slippage(-1.0).is_err());
        assert!(expected.apply_slippage(101.0).is_err());
        assert!(expected.apply_slippage(f64::NAN).is_err());
        assert_eq!(expected.apply_slippage(0.0).unwrap(), expected);
    }

    #[test]
    fn test_slippage_resolution() {
        assert_eq!(slippage_to_bps(0.01).unwrap(), 1);
        assert_eq!(slippage_to_bps(0.1).unwrap(), 10);
        assert_eq!(slippage_to_bps(0.5).unwrap(), 50);
        assert_eq!(slippage_to_bps(100.0).unwrap(), 10_000);
        assert_eq!(slippage_to_bps(0.004), Err(Error::InvalidSlippage(0.004)));
        assert_eq!(slippage_to_bps(0.005), Err(Error::InvalidSlippage(0.005)));
    }

    #[test]
    fn test_be_word() {
        let amount = Amount::from(123_456_789u128);
        let word = amount.to_be_word();
        assert_eq!(Amount::from_be_word(&word).unwrap(), amount);

        let mut too_big = [0u8; 32];
        too_big[0] = 1;
        assert_eq!(Amount::from_be_word(&too_big), Err(Error::AmountOverflow));
        assert_eq!(Amount::from_be_word_saturating(&too_big).unwrap(), Amount::MAX);
        assert_eq!(Amount::from_be_word_saturating(&[0xff; 32]).unwrap(), Amount::MAX);
        assert_eq!(Amount::from_be_word_saturating(&word).unwrap(), amount);
        assert!(Amount::from_be_word_saturating(&[0xff; 31]).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let amount = Amount::from(ONE_TOKEN * 1_000);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1000000000000000000000\"");

        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);

        let from_number: Amount = serde_json::from_str("42").unwrap();
        assert_eq!(from_number, Amount::from(42u128));
    }
}
