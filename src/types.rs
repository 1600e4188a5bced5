//! Shared types for chain interaction

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chain material required to build signable payloads.
///
/// Fetched from the node once per connection; a runtime upgrade mid-run
/// invalidates it and submissions will be rejected until reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    /// Chain genesis hash
    pub genesis_hash: [u8; 32],
    /// Chain name as reported by the node (e.g. "Rococo Local Testnet")
    pub chain_name: String,
    /// Runtime spec version
    pub spec_version: u32,
    /// Transaction format version
    pub tx_version: u32,
}

/// Transaction era (mortal or immortal)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Era {
    /// Immortal transaction (never expires)
    Immortal,
    /// Mortal transaction with period and phase
    Mortal { period: u32, phase: u32 },
}

impl Era {
    /// Check if this is an immortal era
    pub fn is_immortal(&self) -> bool {
        matches!(self, Era::Immortal)
    }

    /// Era for a validity window. A zero-length window means immortal.
    pub fn from_validity(validity: &Validity) -> Era {
        if validity.max_duration == 0 {
            Era::Immortal
        } else {
            let period = validity.max_duration.next_power_of_two().clamp(4, 65536);
            let phase = validity.first_valid % period;
            Era::Mortal { period, phase }
        }
    }
}

/// Validity window for mortal transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validity {
    /// Block number when the transaction becomes valid
    pub first_valid: u32,
    /// Maximum duration in blocks
    pub max_duration: u32,
}

/// Outcome of a submission
#[derive(Debug, Clone)]
pub struct Receipt {
    /// Blake2-256 hash of the signed extrinsic bytes
    pub extrinsic_hash: [u8; 32],
    /// Hash of the including block, when inclusion was awaited
    pub block_hash: Option<[u8; 32]>,
}

impl Receipt {
    pub fn included(&self) -> bool {
        self.block_hash.is_some()
    }
}

/// Options controlling a single submission
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Block until the node reports inclusion (or definite rejection)
    pub wait_for_inclusion: bool,
    /// Patience for the inclusion wait
    pub timeout: Duration,
    pub era: Era,
    pub tip: u128,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            wait_for_inclusion: true,
            timeout: Duration::from_secs(60),
            era: Era::Immortal,
            tip: 0,
        }
    }
}

/// Which ledger module the device-registration workflow targets.
///
/// The service-side chain registers devices without a parachain id; the
/// parachain-side chain carries one. A deployment-role decision, not two
/// code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRole {
    Service,
    Parachain,
}

impl MarketRole {
    /// Pallet name the role targets by default
    pub fn default_market_pallet(self) -> &'static str {
        match self {
            MarketRole::Service => "ServiceModule",
            MarketRole::Parachain => "XchangePallet",
        }
    }
}

impl std::str::FromStr for MarketRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "service" => Ok(MarketRole::Service),
            "parachain" => Ok(MarketRole::Parachain),
            other => Err(Error::InvalidInput(format!(
                "unknown market role '{}', expected 'service' or 'parachain'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_era_is_immortal() {
        assert!(Era::Immortal.is_immortal());
        assert!(!Era::Mortal {
            period: 64,
            phase: 0
        }
        .is_immortal());
    }

    #[test]
    fn test_era_from_validity() {
        let era = Era::from_validity(&Validity {
            first_valid: 1000,
            max_duration: 2400,
        });
        // 2400 rounds up to a 4096-block period
        assert_eq!(
            era,
            Era::Mortal {
                period: 4096,
                phase: 1000
            }
        );

        let era = Era::from_validity(&Validity {
            first_valid: 0,
            max_duration: 0,
        });
        assert!(era.is_immortal());
    }

    #[test]
    fn test_market_role_parsing() {
        assert_eq!("service".parse::<MarketRole>().unwrap(), MarketRole::Service);
        assert_eq!(
            "Parachain".parse::<MarketRole>().unwrap(),
            MarketRole::Parachain
        );
        assert!("relay".parse::<MarketRole>().is_err());
    }

    #[test]
    fn test_role_default_pallets() {
        assert_eq!(MarketRole::Service.default_market_pallet(), "ServiceModule");
        assert_eq!(
            MarketRole::Parachain.default_market_pallet(),
            "XchangePallet"
        );
    }
}
