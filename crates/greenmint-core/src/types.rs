//! Core type definitions for GreenMint
//!
//! Identifiers, activity categories and token units shared by the ledger,
//! achievement engine and simulator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EconomicsError;

/// Token amount in whole GRN units
pub type TokenAmount = u128;

/// UserId - Stable identifier derived from a wallet or identity string
///
/// UserId = BLAKE3(identity)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId {
    id: [u8; 32],
}

impl UserId {
    /// Create a new UserId from raw bytes
    pub fn new(id: [u8; 32]) -> Self {
        Self { id }
    }

    /// Derive a UserId from an identity string (wallet address, account id)
    pub fn from_identity(identity: &str) -> Self {
        let hash = blake3::hash(identity.as_bytes());
        Self {
            id: *hash.as_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.id
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Parse from a 64-character hex string
    pub fn from_hex(s: &str) -> Result<Self, EconomicsError> {
        let bytes = hex::decode(s)
            .map_err(|e| EconomicsError::InvalidInput(format!("user id: {}", e)))?;
        let id: [u8; 32] = bytes.try_into().map_err(|_| {
            EconomicsError::InvalidInput("user id must be 32 bytes".to_string())
        })?;
        Ok(Self { id })
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

/// Activity category
///
/// Adding a category here is a compile-time checked change: every match in
/// the achievement engine and the mint ledger is exhaustive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Solar production (kWh)
    Solar,
    /// Home battery discharge (kWh)
    Battery,
    /// Electric vehicle miles driven
    EvMiles,
    /// EV charging energy, home charger plus supercharger (kWh)
    Charging,
}

impl Category {
    /// All categories in stable order
    pub const ALL: [Category; 4] = [
        Category::Solar,
        Category::Battery,
        Category::EvMiles,
        Category::Charging,
    ];

    /// Unit of the cumulative reading
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Solar | Self::Battery | Self::Charging => "kWh",
            Self::EvMiles => "mi",
        }
    }

    /// Get name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Solar => "Solar",
            Self::Battery => "Battery",
            Self::EvMiles => "EV Miles",
            Self::Charging => "Charging",
        }
    }

    /// Machine-readable tag used in config files and the CLI
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Solar => "solar",
            Self::Battery => "battery",
            Self::EvMiles => "ev_miles",
            Self::Charging => "charging",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Category {
    type Err = EconomicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "solar" => Ok(Self::Solar),
            "battery" => Ok(Self::Battery),
            "ev_miles" | "miles" => Ok(Self::EvMiles),
            "charging" => Ok(Self::Charging),
            other => Err(EconomicsError::InvalidInput(format!(
                "unknown category: {}",
                other
            ))),
        }
    }
}

/// Charging energy from the two physically distinct meters
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChargingReading {
    /// Home charger energy (kWh)
    pub home_kwh: f64,
    /// Public supercharger energy (kWh)
    pub supercharger_kwh: f64,
}

impl ChargingReading {
    pub fn new(home_kwh: f64, supercharger_kwh: f64) -> Self {
        Self {
            home_kwh,
            supercharger_kwh,
        }
    }

    /// Combined charging energy; the only value the ledger ever sees
    pub fn total(&self) -> f64 {
        self.home_kwh + self.supercharger_kwh
    }
}

/// Protocol constants
pub mod constants {
    /// Token symbol
    pub const SYMBOL: &str = "GRN";

    /// Token name
    pub const NAME: &str = "GreenMint Energy Token";

    /// Basis point denominator (100%)
    pub const BPS_DENOMINATOR: u32 = 10_000;

    /// Default tokens awarded per whole activity unit
    pub const DEFAULT_TOKENS_PER_UNIT: u64 = 1;

    /// Reading drop (in units) tolerated before a regression is reported
    pub const DEFAULT_READING_TOLERANCE: f64 = 0.5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_from_identity() {
        let a = UserId::from_identity("0xabc");
        let b = UserId::from_identity("0xabc");
        let c = UserId::from_identity("0xdef");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_user_id_hex_roundtrip() {
        let id = UserId::from_identity("wallet-1");
        let parsed = UserId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
        assert!(UserId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("solar".parse::<Category>().unwrap(), Category::Solar);
        assert_eq!("ev-miles".parse::<Category>().unwrap(), Category::EvMiles);
        assert_eq!("Charging".parse::<Category>().unwrap(), Category::Charging);
        assert!("wind".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serde_tag() {
        let json = serde_json::to_string(&Category::EvMiles).unwrap();
        assert_eq!(json, "\"ev_miles\"");
        for category in Category::ALL {
            assert_eq!(category.tag().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn test_charging_total() {
        let reading = ChargingReading::new(120.5, 79.5);
        assert_eq!(reading.total(), 200.0);
    }
}
