//! Marketplace domain types and their SCALE schemas
//!
//! These mirror the ledger-side definitions byte for byte: fixed field
//! order, no padding, no optional fields. Decoding is strict — truncated
//! input, trailing bytes, or an unknown discriminant is a codec error,
//! never a silent default.

use crate::error::{Error, Result};
use parity_scale_codec::{Decode, DecodeAll, Encode};
use scale_info::TypeInfo;
use serde::Serialize;

/// Authoritative status of a leasable device.
///
/// Transitions only in response to marketplace commands; the ledger is the
/// authority, this client only mirrors the declared variant order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode, TypeInfo, Serialize)]
pub enum DeviceState {
    /// Device is off
    #[default]
    Off,
    /// Device is ready to accept orders
    Ready,
    /// Device has an order
    Busy,
    /// Device has accepted the order
    Accepted,
    /// Cooldown after service; unavailable for new orders
    Timewait,
}

impl DeviceState {
    /// Construct from a raw discriminant, rejecting out-of-range values.
    pub fn from_discriminant(d: u8) -> Result<Self> {
        match d {
            0 => Ok(DeviceState::Off),
            1 => Ok(DeviceState::Ready),
            2 => Ok(DeviceState::Busy),
            3 => Ok(DeviceState::Accepted),
            4 => Ok(DeviceState::Timewait),
            other => Err(Error::Codec(format!(
                "unknown DeviceState discriminant {}",
                other
            ))),
        }
    }

    pub fn discriminant(self) -> u8 {
        self as u8
    }

    /// Whether a new order may be placed against a device in this state
    pub fn accepts_orders(self) -> bool {
        matches!(self, DeviceState::Ready)
    }

    /// Whether the device holds an order it may still accept or reject
    pub fn has_pending_order(self) -> bool {
        matches!(self, DeviceState::Busy | DeviceState::Accepted)
    }
}

/// On-chain profile of a registered device.
///
/// Created at registration, mutated only by state transitions, never
/// deleted — a retired device simply stays `Off`.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, TypeInfo, Serialize)]
pub struct DeviceProfile {
    pub state: DeviceState,
    /// Amount reserved against the device misbehaving
    pub penalty: u128,
    /// Worst-case service duration
    pub wcd: u64,
    /// Parachain the device is anchored to
    pub paraid: u32,
}

impl DeviceProfile {
    /// Strict decode of a storage value; trailing bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::decode_all(&mut &bytes[..])?)
    }
}

/// Client-side order record: includes the ordering client's account.
///
/// Immutable once created; the ledger enforces the `until` deadline rather
/// than mutating the order.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, TypeInfo, Serialize)]
pub struct Order {
    /// Absolute on-chain deadline
    pub until: u64,
    /// Opaque numeric payload
    pub args: u64,
    pub fee: u128,
    pub client: [u8; 32],
    pub paraid: u32,
}

/// Device-side order payload, as submitted with `order` calls.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, TypeInfo, Serialize)]
pub struct OrderBase {
    pub until: u64,
    pub args: u64,
    pub fee: u128,
    pub device: [u8; 32],
}

impl OrderBase {
    /// Promote to a full order once the placing client is known.
    pub fn into_order(self, client: [u8; 32], paraid: u32) -> Order {
        Order {
            until: self.until,
            args: self.args,
            fee: self.fee,
            client,
            paraid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_state_discriminants() {
        assert_eq!(DeviceState::Off.discriminant(), 0);
        assert_eq!(DeviceState::Ready.discriminant(), 1);
        assert_eq!(DeviceState::Busy.discriminant(), 2);
        assert_eq!(DeviceState::Accepted.discriminant(), 3);
        assert_eq!(DeviceState::Timewait.discriminant(), 4);
    }

    #[test]
    fn test_device_state_roundtrip() {
        for state in [
            DeviceState::Off,
            DeviceState::Ready,
            DeviceState::Busy,
            DeviceState::Accepted,
            DeviceState::Timewait,
        ] {
            let encoded = state.encode();
            assert_eq!(encoded, vec![state.discriminant()]);
            assert_eq!(DeviceState::decode(&mut &encoded[..]).unwrap(), state);
        }
    }

    #[test]
    fn test_device_state_rejects_unknown_discriminant() {
        assert!(DeviceState::decode(&mut &[5u8][..]).is_err());
        assert!(DeviceState::from_discriminant(5).is_err());
        assert_eq!(
            DeviceState::from_discriminant(4).unwrap(),
            DeviceState::Timewait
        );
    }

    #[test]
    fn test_profile_roundtrip() {
        let profile = DeviceProfile {
            state: DeviceState::Ready,
            penalty: 1_000_000_000,
            wcd: 3_600_000,
            paraid: 2000,
        };
        let encoded = profile.encode();
        // state discriminant leads, fields follow in declared order
        assert_eq!(encoded[0], 1);
        assert_eq!(DeviceProfile::from_bytes(&encoded).unwrap(), profile);
    }

    #[test]
    fn test_profile_rejects_truncated_and_trailing() {
        let encoded = DeviceProfile {
            state: DeviceState::Busy,
            penalty: 1,
            wcd: 2,
            paraid: 3,
        }
        .encode();

        assert!(DeviceProfile::from_bytes(&encoded[..encoded.len() - 1]).is_err());

        let mut padded = encoded.clone();
        padded.push(0);
        assert!(DeviceProfile::from_bytes(&padded).is_err());
    }

    #[test]
    fn test_order_roundtrip() {
        let order = Order {
            until: 10_000_000,
            args: 7,
            fee: 200_000_000_000,
            client: [3u8; 32],
            paraid: 2000,
        };
        let encoded = order.encode();
        assert_eq!(Order::decode_all(&mut &encoded[..]).unwrap(), order);
    }

    #[test]
    fn test_order_base_roundtrip_and_promotion() {
        let base = OrderBase {
            until: 99,
            args: 0,
            fee: 200_000_000_000,
            device: [9u8; 32],
        };
        let encoded = base.encode();
        assert_eq!(OrderBase::decode_all(&mut &encoded[..]).unwrap(), base);

        let order = base.clone().into_order([1u8; 32], 2001);
        assert_eq!(order.until, base.until);
        assert_eq!(order.fee, base.fee);
        assert_eq!(order.client, [1u8; 32]);
        assert_eq!(order.paraid, 2001);
    }

    #[test]
    fn test_order_layouts_differ_only_by_counterparty() {
        // Both schemas share the leading until/args/fee bytes
        let base = OrderBase {
            until: 5,
            args: 6,
            fee: 7,
            device: [0u8; 32],
        };
        let order = Order {
            until: 5,
            args: 6,
            fee: 7,
            client: [0u8; 32],
            paraid: 0,
        };
        let shared = 8 + 8 + 16;
        assert_eq!(base.encode()[..shared], order.encode()[..shared]);
    }

    #[test]
    fn test_state_machine_predicates() {
        assert!(DeviceState::Ready.accepts_orders());
        assert!(!DeviceState::Busy.accepts_orders());
        assert!(DeviceState::Busy.has_pending_order());
        assert!(DeviceState::Accepted.has_pending_order());
        assert!(!DeviceState::Timewait.has_pending_order());
    }
}
