use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlexError {
    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid asset: {0}")]
    InvalidAsset(String),

    #[error("asset mismatch: {0} vs {1}")]
    AssetMismatch(String, String),

    #[error("asset arithmetic overflow")]
    Overflow,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum256([u8; 32]);

impl Checksum256 {
    pub fn digest(data: &[u8]) -> Self {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(data));
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Checksum256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum256({})", self.to_hex())
    }
}

impl FromStr for Checksum256 {
    type Err = FlexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| FlexError::InvalidChecksum(s.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| FlexError::InvalidChecksum(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Checksum256 {
    type Error = FlexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Checksum256> for String {
    fn from(value: Checksum256) -> Self {
        value.to_hex()
    }
}

/// Account or identifier: 1 to 12 characters drawn from `a-z`, `1-5` and `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(String);

impl Name {
    pub fn new(value: impl Into<String>) -> Result<Self, FlexError> {
        let value = value.into();
        let valid = !value.is_empty()
            && value.len() <= 12
            && value
                .chars()
                .all(|c| c.is_ascii_lowercase() || ('1'..='5').contains(&c) || c == '.');
        if !valid {
            return Err(FlexError::InvalidName(value));
        }
        Ok(Self(value))
    }

    pub(crate) fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Name {
    type Err = FlexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Name::new(s)
    }
}

impl TryFrom<String> for Name {
    type Error = FlexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Name::new(value)
    }
}

impl From<Name> for String {
    fn from(value: Name) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    amount: i64,
    precision: u8,
    symbol: String,
}

impl Asset {
    pub fn new(amount: i64, precision: u8, symbol: impl Into<String>) -> Result<Self, FlexError> {
        let symbol = symbol.into();
        if symbol.is_empty() || symbol.len() > 7 || !symbol.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(FlexError::InvalidAsset(symbol));
        }
        if precision > 18 {
            return Err(FlexError::InvalidAsset(format!("precision {precision}")));
        }
        Ok(Self { amount, precision, symbol })
    }

    pub fn zero(precision: u8, symbol: impl Into<String>) -> Result<Self, FlexError> {
        Self::new(0, precision, symbol)
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    fn ensure_compatible(&self, other: &Asset) -> Result<(), FlexError> {
        if self.symbol != other.symbol || self.precision != other.precision {
            return Err(FlexError::AssetMismatch(self.to_string(), other.to_string()));
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Asset) -> Result<Asset, FlexError> {
        self.ensure_compatible(other)?;
        let amount = self.amount.checked_add(other.amount).ok_or(FlexError::Overflow)?;
        Ok(Asset { amount, ..self.clone() })
    }

    pub fn checked_sub(&self, other: &Asset) -> Result<Asset, FlexError> {
        self.ensure_compatible(other)?;
        let amount = self.amount.checked_sub(other.amount).ok_or(FlexError::Overflow)?;
        Ok(Asset { amount, ..self.clone() })
    }

    /// `self * numerator / denominator`, truncated toward zero.
    pub fn scale(&self, numerator: i128, denominator: i128) -> Result<Asset, FlexError> {
        if denominator == 0 {
            return Err(FlexError::Overflow);
        }
        let scaled = (self.amount as i128)
            .checked_mul(numerator)
            .ok_or(FlexError::Overflow)?
            / denominator;
        let amount = i64::try_from(scaled).map_err(|_| FlexError::Overflow)?;
        Ok(Asset { amount, ..self.clone() })
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        if self.precision == 0 {
            return write!(f, "{sign}{abs} {}", self.symbol);
        }
        let unit = 10u64.pow(self.precision as u32);
        write!(
            f,
            "{sign}{}.{:0width$} {}",
            abs / unit,
            abs % unit,
            self.symbol,
            width = self.precision as usize
        )
    }
}

impl FromStr for Asset {
    type Err = FlexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FlexError::InvalidAsset(s.to_string());
        let (number, symbol) = s.trim().split_once(' ').ok_or_else(invalid)?;
        let (negative, digits) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() || !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let precision = u8::try_from(fraction.len()).map_err(|_| invalid())?;
        let magnitude: i64 = format!("{whole}{fraction}").parse().map_err(|_| invalid())?;
        let amount = if negative { -magnitude } else { magnitude };
        Asset::new(amount, precision, symbol.trim())
    }
}

impl TryFrom<String> for Asset {
    type Error = FlexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(value: Asset) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FlexValue {
    Monostate,
    Name(Name),
    String(String),
    Asset(Asset),
    TimePoint(DateTime<Utc>),
    Int64(i64),
    Checksum256(Checksum256),
}

impl FlexValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FlexValue::Monostate => "monostate",
            FlexValue::Name(_) => "name",
            FlexValue::String(_) => "string",
            FlexValue::Asset(_) => "asset",
            FlexValue::TimePoint(_) => "time_point",
            FlexValue::Int64(_) => "int64",
            FlexValue::Checksum256(_) => "checksum256",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlexValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            FlexValue::Name(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_asset(&self) -> Option<&Asset> {
        match self {
            FlexValue::Asset(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_time_point(&self) -> Option<DateTime<Utc>> {
        match self {
            FlexValue::TimePoint(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FlexValue::Int64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_checksum(&self) -> Option<Checksum256> {
        match self {
            FlexValue::Checksum256(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for FlexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlexValue::Monostate => f.write_str("-"),
            FlexValue::Name(value) => value.fmt(f),
            FlexValue::String(value) => f.write_str(value),
            FlexValue::Asset(value) => value.fmt(f),
            FlexValue::TimePoint(value) => f.write_str(&value.to_rfc3339()),
            FlexValue::Int64(value) => value.fmt(f),
            FlexValue::Checksum256(value) => value.fmt(f),
        }
    }
}

impl From<&str> for FlexValue {
    fn from(value: &str) -> Self {
        FlexValue::String(value.to_string())
    }
}

impl From<String> for FlexValue {
    fn from(value: String) -> Self {
        FlexValue::String(value)
    }
}

impl From<Name> for FlexValue {
    fn from(value: Name) -> Self {
        FlexValue::Name(value)
    }
}

impl From<Asset> for FlexValue {
    fn from(value: Asset) -> Self {
        FlexValue::Asset(value)
    }
}

impl From<DateTime<Utc>> for FlexValue {
    fn from(value: DateTime<Utc>) -> Self {
        FlexValue::TimePoint(value)
    }
}

impl From<i64> for FlexValue {
    fn from(value: i64) -> Self {
        FlexValue::Int64(value)
    }
}

impl From<Checksum256> for FlexValue {
    fn from(value: Checksum256) -> Self {
        FlexValue::Checksum256(value)
    }
}
