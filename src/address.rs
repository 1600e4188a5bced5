//! SS58 address encoding and sovereign-address derivation
//!
//! Uses the official bs58 crate for base58 encoding, matching the Substrate
//! ecosystem. See: https://docs.substrate.io/reference/address-formats/
//!
//! A parachain's sovereign account is `b"para"` (in the relay chain) or
//! `b"sibl"` (in a sibling chain) followed by the three low-order bytes of
//! the parachain id little-endian, zero-padded to 32 bytes.

use crate::error::{Error, Result};
use blake2::{Blake2b512, Digest};

/// SS58 prefix for checksum calculation
const SS58_PREFIX: &[u8] = b"SS58PRE";

/// Sovereign derivation covers ids that fit in three bytes.
pub const PARA_ID_LIMIT: u32 = 1 << 24;

/// Whose perspective a sovereign address is derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The parachain's account in its parent (relay) chain
    Parent,
    /// The parachain's account in a sibling parachain
    Sibling,
}

impl Relation {
    fn prefix(self) -> &'static [u8; 4] {
        match self {
            Relation::Parent => b"para",
            Relation::Sibling => b"sibl",
        }
    }

    /// Short tag used in summaries
    pub fn tag(self) -> &'static str {
        match self {
            Relation::Parent => "para",
            Relation::Sibling => "sibl",
        }
    }
}

/// Derive the 32-byte sovereign account for a parachain id.
///
/// Ids needing a fourth byte are out of contract and rejected, never
/// truncated.
pub fn sovereign_account(para_id: u32, relation: Relation) -> Result<[u8; 32]> {
    if para_id >= PARA_ID_LIMIT {
        return Err(Error::InvalidAddress(format!(
            "parachain id {} does not fit in three bytes",
            para_id
        )));
    }
    let mut account = [0u8; 32];
    account[..4].copy_from_slice(relation.prefix());
    account[4..7].copy_from_slice(&para_id.to_le_bytes()[..3]);
    Ok(account)
}

/// Derive a parachain's sovereign account, rendered in SS58.
pub fn sovereign_ss58(para_id: u32, relation: Relation, version: u16) -> Result<String> {
    encode_ss58(&sovereign_account(para_id, relation)?, version)
}

/// Encode a 32-byte account to SS58 address format
///
/// # Arguments
/// * `account` - 32-byte account id
/// * `version` - Network version (0 for Polkadot, 2 for Kusama, 42 for generic Substrate)
pub fn encode_ss58(account: &[u8], version: u16) -> Result<String> {
    if account.len() != 32 {
        return Err(Error::InvalidAddress(format!(
            "account must be 32 bytes, got {}",
            account.len()
        )));
    }

    // Build payload: version prefix + account id
    let mut payload = encode_prefix(version)?;
    payload.extend_from_slice(account);

    // Checksum is the first 2 bytes of Blake2b-512("SS58PRE" || payload)
    let checksum = ss58_checksum(&payload);
    payload.extend_from_slice(&checksum[..2]);

    Ok(bs58::encode(&payload).into_string())
}

/// Decode an SS58 address to a 32-byte account id and network version
pub fn decode_ss58(address: &str) -> Result<([u8; 32], u16)> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|e| Error::InvalidAddress(format!("invalid base58: {}", e)))?;

    if decoded.len() < 35 {
        return Err(Error::InvalidAddress("address too short".to_string()));
    }

    let (version, prefix_len) = decode_prefix(&decoded)?;

    let checksum_start = decoded.len() - 2;
    let body = &decoded[prefix_len..checksum_start];
    let checksum = &decoded[checksum_start..];

    if body.len() != 32 {
        return Err(Error::InvalidAddress(format!(
            "invalid account id length: {}",
            body.len()
        )));
    }

    let expected = ss58_checksum(&decoded[..checksum_start]);
    if checksum != &expected[..2] {
        return Err(Error::InvalidAddress("invalid checksum".to_string()));
    }

    let mut account = [0u8; 32];
    account.copy_from_slice(body);
    Ok((account, version))
}

/// Validate an SS58 address
pub fn validate_address(address: &str, expected_version: Option<u16>) -> bool {
    match decode_ss58(address) {
        Ok((_, version)) => expected_version.map_or(true, |expected| version == expected),
        Err(_) => false,
    }
}

/// Encode SS58 version prefix (supports single and two-byte prefixes)
fn encode_prefix(version: u16) -> Result<Vec<u8>> {
    if version < 64 {
        Ok(vec![version as u8])
    } else if version < 16384 {
        // Two-byte encoding per SS58 spec
        let first = ((version & 0b0000_0000_1111_1100) as u8) >> 2 | 0b0100_0000;
        let second = ((version >> 8) as u8) | ((version & 0b0000_0000_0000_0011) as u8) << 6;
        Ok(vec![first, second])
    } else {
        Err(Error::InvalidAddress(format!(
            "invalid network version: {}",
            version
        )))
    }
}

/// Decode SS58 version prefix from raw bytes
fn decode_prefix(data: &[u8]) -> Result<(u16, usize)> {
    if data[0] < 64 {
        Ok((data[0] as u16, 1))
    } else if data[0] < 128 {
        if data.len() < 2 {
            return Err(Error::InvalidAddress(
                "address too short for two-byte prefix".to_string(),
            ));
        }
        let lower = (data[0] & 0b0011_1111) << 2 | (data[1] >> 6);
        let upper = data[1] & 0b0011_1111;
        Ok((((upper as u16) << 8) | (lower as u16), 2))
    } else {
        Err(Error::InvalidAddress(format!(
            "invalid prefix byte: {}",
            data[0]
        )))
    }
}

/// Calculate SS58 checksum (Blake2b-512 of "SS58PRE" || payload)
fn ss58_checksum(payload: &[u8]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_PREFIX);
    hasher.update(payload);
    let result = hasher.finalize();
    let mut checksum = [0u8; 64];
    checksum.copy_from_slice(&result);
    checksum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let account: [u8; 32] =
            hex::decode("61b18c6dc02ddcabdeac56cb4f21a971cc41cc97640f6f85b073480008c53a0d")
                .unwrap()
                .try_into()
                .unwrap();

        let address = encode_ss58(&account, 42).unwrap();
        assert_eq!(address, "5EGoFA95omzemRssELLDjVenNZ68aXyUeqtKQScXSEBvVJkr");

        let (decoded, version) = decode_ss58(&address).unwrap();
        assert_eq!(decoded, account);
        assert_eq!(version, 42);
    }

    #[test]
    fn test_validate_address() {
        let valid = "5EGoFA95omzemRssELLDjVenNZ68aXyUeqtKQScXSEBvVJkr";
        assert!(validate_address(valid, Some(42)));
        assert!(validate_address(valid, None));
        assert!(!validate_address(valid, Some(0))); // Wrong version

        assert!(!validate_address("invalid", None));
    }

    #[test]
    fn test_invalid_account_length() {
        let short = vec![0u8; 16];
        assert!(encode_ss58(&short, 42).is_err());
    }

    #[test]
    fn test_sovereign_preimage_layout() {
        // para 2000: prefix, then 0xD0 0x07 0x00, then 25 zero bytes
        let account = sovereign_account(2000, Relation::Parent).unwrap();
        assert_eq!(&account[..4], b"para");
        assert_eq!(&account[4..7], &[0xD0, 0x07, 0x00]);
        assert!(account[7..].iter().all(|&b| b == 0));

        let sibling = sovereign_account(2000, Relation::Sibling).unwrap();
        assert_eq!(&sibling[..4], b"sibl");
        assert_eq!(&sibling[4..], &account[4..]);
    }

    #[test]
    fn test_sovereign_relations_never_collide() {
        for id in [0u32, 1, 100, 2000, 2001, PARA_ID_LIMIT - 1] {
            let parent = sovereign_account(id, Relation::Parent).unwrap();
            let sibling = sovereign_account(id, Relation::Sibling).unwrap();
            assert_ne!(parent, sibling);
        }
    }

    #[test]
    fn test_sovereign_injective_per_relation() {
        let a = sovereign_account(2000, Relation::Parent).unwrap();
        let b = sovereign_account(2001, Relation::Parent).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_sovereign_rejects_wide_ids() {
        assert!(sovereign_account(PARA_ID_LIMIT, Relation::Parent).is_err());
        assert!(sovereign_account(u32::MAX, Relation::Sibling).is_err());
        assert!(sovereign_account(PARA_ID_LIMIT - 1, Relation::Parent).is_ok());
    }

    #[test]
    fn test_sovereign_ss58_roundtrip() {
        let address = sovereign_ss58(2000, Relation::Parent, 42).unwrap();
        let (account, version) = decode_ss58(&address).unwrap();
        assert_eq!(version, 42);
        assert_eq!(account, sovereign_account(2000, Relation::Parent).unwrap());
    }
}
