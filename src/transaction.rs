//! Signed extrinsic envelope assembly
//!
//! Version-4 extrinsic layout: compact length, `0x84`, `MultiAddress::Id`
//! signer, `MultiSignature::Sr25519` signature, era, compact nonce, compact
//! tip, call data. The signable payload appends the chain material and is
//! hashed when longer than 256 bytes.

use crate::types::{Era, Material};
use blake2::{digest::consts::U32, Blake2b, Digest};

const SIGNED_V4: u8 = 0x84;
const MULTI_ADDRESS_ID: u8 = 0x00;
const MULTI_SIGNATURE_SR25519: u8 = 0x01;

/// An unsigned transaction envelope.
///
/// Built for exactly one submission: the nonce it carries is consumed
/// whether or not the node accepts the bytes, so retries need a fresh
/// envelope, never a resend.
#[derive(Debug, Clone)]
pub struct Envelope {
    call_data: Vec<u8>,
    era: Era,
    nonce: u64,
    tip: u128,
    material: Material,
    era_block_hash: [u8; 32],
}

impl Envelope {
    pub fn new(call_data: Vec<u8>, era: Era, nonce: u64, tip: u128, material: Material) -> Self {
        // Immortal transactions anchor to the genesis hash
        let era_block_hash = material.genesis_hash;
        Self {
            call_data,
            era,
            nonce,
            tip,
            material,
            era_block_hash,
        }
    }

    /// Anchor a mortal era to its reference block.
    pub fn with_era_block(mut self, hash: [u8; 32]) -> Self {
        self.era_block_hash = hash;
        self
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn call_data(&self) -> &[u8] {
        &self.call_data
    }

    /// The payload to be signed.
    pub fn signable_payload(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&self.call_data);
        payload.extend_from_slice(&encode_era(&self.era));
        payload.extend_from_slice(&encode_compact(self.nonce as u128));
        payload.extend_from_slice(&encode_compact(self.tip));
        payload.extend_from_slice(&self.material.spec_version.to_le_bytes());
        payload.extend_from_slice(&self.material.tx_version.to_le_bytes());
        payload.extend_from_slice(&self.material.genesis_hash);
        payload.extend_from_slice(&self.era_block_hash);

        // Payloads over 256 bytes are signed by hash
        if payload.len() > 256 {
            blake2_256(&payload).to_vec()
        } else {
            payload
        }
    }

    /// Assemble the signed extrinsic.
    pub fn into_signed(self, signer: &[u8; 32], signature: &[u8; 64]) -> SignedExtrinsic {
        let mut body = Vec::new();
        body.push(SIGNED_V4);
        body.push(MULTI_ADDRESS_ID);
        body.extend_from_slice(signer);
        body.push(MULTI_SIGNATURE_SR25519);
        body.extend_from_slice(signature);
        body.extend_from_slice(&encode_era(&self.era));
        body.extend_from_slice(&encode_compact(self.nonce as u128));
        body.extend_from_slice(&encode_compact(self.tip));
        body.extend_from_slice(&self.call_data);

        let mut bytes = encode_compact(body.len() as u128);
        bytes.extend_from_slice(&body);
        SignedExtrinsic { bytes }
    }
}

/// A fully signed, ready-to-submit extrinsic.
#[derive(Debug, Clone)]
pub struct SignedExtrinsic {
    bytes: Vec<u8>,
}

impl SignedExtrinsic {
    /// Extrinsic id (Blake2-256 of the signed bytes)
    pub fn hash(&self) -> [u8; 32] {
        blake2_256(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encode compact
pub fn encode_compact(value: u128) -> Vec<u8> {
    if value < 0x40 {
        vec![(value as u8) << 2]
    } else if value < 0x4000 {
        let v = ((value as u16) << 2) | 0b01;
        v.to_le_bytes().to_vec()
    } else if value < 0x4000_0000 {
        let v = ((value as u32) << 2) | 0b10;
        v.to_le_bytes().to_vec()
    } else {
        let bytes_needed = (128 - value.leading_zeros()).div_ceil(8);
        let mut result = vec![((bytes_needed - 4) << 2 | 0b11) as u8];
        for i in 0..bytes_needed {
            result.push((value >> (8 * i)) as u8);
        }
        result
    }
}

/// Decode a compact integer, returning the value and bytes consumed.
pub fn decode_compact(bytes: &[u8]) -> Option<(u128, usize)> {
    let mode = *bytes.first()? & 0b11;
    match mode {
        0b00 => Some(((bytes[0] >> 2) as u128, 1)),
        0b01 => {
            let value = u16::from_le_bytes([bytes[0], *bytes.get(1)?]) >> 2;
            Some((value as u128, 2))
        }
        0b10 => {
            if bytes.len() < 4 {
                return None;
            }
            let value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) >> 2;
            Some((value as u128, 4))
        }
        _ => {
            let len = (bytes[0] >> 2) as usize + 4;
            if bytes.len() < 1 + len {
                return None;
            }
            let mut value = 0u128;
            for i in 0..len {
                value |= (bytes[1 + i] as u128) << (8 * i);
            }
            Some((value, 1 + len))
        }
    }
}

/// Encode era
pub fn encode_era(era: &Era) -> Vec<u8> {
    match era {
        Era::Immortal => vec![0x00],
        Era::Mortal { period, phase } => {
            let period = (*period).next_power_of_two().clamp(4, 65536);
            let period_log = period.trailing_zeros();
            // phase quantization matches the on-chain era codec
            let quantize_factor = (period >> 12).max(1);
            let quantized_phase = phase / quantize_factor;
            let encoded = ((quantized_phase << 4) | (period_log - 1)) as u16;
            encoded.to_le_bytes().to_vec()
        }
    }
}

/// Decode an era, returning the era and bytes consumed.
pub fn decode_era(bytes: &[u8]) -> Option<(Era, usize)> {
    match *bytes.first()? {
        0x00 => Some((Era::Immortal, 1)),
        first => {
            let encoded = u16::from_le_bytes([first, *bytes.get(1)?]);
            // low nibble holds period_log - 1
            let period = 2u32 << (encoded & 0b1111);
            let quantize_factor = (period >> 12).max(1);
            let phase = ((encoded >> 4) as u32) * quantize_factor;
            Some((Era::Mortal { period, phase }, 2))
        }
    }
}

/// Blake2-256 hash
pub(crate) fn blake2_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material() -> Material {
        Material {
            genesis_hash: [0xAA; 32],
            chain_name: "Rococo Local Testnet".to_string(),
            spec_version: 9150,
            tx_version: 9,
        }
    }

    #[test]
    fn test_compact_encoding_roundtrip() {
        for value in [0u128, 1, 63, 64, 16383, 16384, 1073741823, 1073741824] {
            let encoded = encode_compact(value);
            let (decoded, consumed) = decode_compact(&encoded).unwrap();
            assert_eq!(decoded, value, "failed for value {}", value);
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn test_era_encoding_roundtrip() {
        let immortal_bytes = encode_era(&Era::Immortal);
        let (decoded, _) = decode_era(&immortal_bytes).unwrap();
        assert!(decoded.is_immortal());

        // phases aligned to the quantize factor survive the round trip
        for (period, phase) in [
            (64u32, 0u32),
            (64, 3),
            (64, 63),
            (256, 199),
            (4096, 4095),
            (65536, 16384),
        ] {
            let bytes = encode_era(&Era::Mortal { period, phase });
            let (decoded, consumed) = decode_era(&bytes).unwrap();
            assert_eq!(consumed, 2);
            assert_eq!(decoded, Era::Mortal { period, phase });
        }
    }

    #[test]
    fn test_mortal_era_known_encoding() {
        // period 64 phase 3: low nibble log2(64)-1, phase in the high bits
        assert_eq!(
            encode_era(&Era::Mortal {
                period: 64,
                phase: 3,
            }),
            vec![0x35, 0x00]
        );
        // past period 4096 the phase is quantized
        assert_eq!(
            encode_era(&Era::Mortal {
                period: 65536,
                phase: 16384,
            }),
            encode_era(&Era::Mortal {
                period: 65536,
                phase: 16399,
            })
        );
    }

    #[test]
    fn test_signable_payload_layout() {
        let call = vec![0x05, 0x00, 0x01, 0x02];
        let envelope = Envelope::new(call.clone(), Era::Immortal, 7, 0, material());
        let payload = envelope.signable_payload();

        assert_eq!(&payload[..4], &call[..]);
        assert_eq!(payload[4], 0x00); // immortal era
        assert_eq!(payload[5], 7 << 2); // compact nonce
        assert_eq!(payload[6], 0); // compact tip
        assert_eq!(&payload[7..11], &9150u32.to_le_bytes());
        assert_eq!(&payload[11..15], &9u32.to_le_bytes());
        assert_eq!(&payload[15..47], &[0xAA; 32]); // genesis
        assert_eq!(&payload[47..79], &[0xAA; 32]); // era block = genesis
    }

    #[test]
    fn test_long_payload_is_hashed() {
        let envelope = Envelope::new(vec![0u8; 300], Era::Immortal, 0, 0, material());
        assert_eq!(envelope.signable_payload().len(), 32);
    }

    #[test]
    fn test_signed_extrinsic_layout() {
        let call = vec![0x05, 0x00];
        let signer = [0x11; 32];
        let signature = [0x22; 64];
        let envelope = Envelope::new(call.clone(), Era::Immortal, 1, 0, material());
        let signed = envelope.into_signed(&signer, &signature);
        let bytes = signed.as_bytes();

        let (length, len_size) = decode_compact(bytes).unwrap();
        assert_eq!(length as usize, bytes.len() - len_size);

        let body = &bytes[len_size..];
        assert_eq!(body[0], 0x84); // signed, version 4
        assert_eq!(body[1], 0x00); // MultiAddress::Id
        assert_eq!(&body[2..34], &signer);
        assert_eq!(body[34], 0x01); // MultiSignature::Sr25519
        assert_eq!(&body[35..99], &signature[..]);
        assert_eq!(body[99], 0x00); // era
        assert_eq!(body[100], 1 << 2); // nonce
        assert_eq!(body[101], 0); // tip
        assert_eq!(&body[102..], &call[..]);
    }

    #[test]
    fn test_extrinsic_hash_is_stable() {
        let envelope = Envelope::new(vec![1, 2, 3], Era::Immortal, 0, 0, material());
        let signed = envelope.into_signed(&[0; 32], &[0; 64]);
        assert_eq!(signed.hash(), blake2_256(signed.as_bytes()));
    }

    #[test]
    fn test_mortal_era_anchor() {
        let envelope = Envelope::new(
            vec![],
            Era::Mortal {
                period: 64,
                phase: 3,
            },
            0,
            0,
            material(),
        )
        .with_era_block([0xBB; 32]);
        let payload = envelope.signable_payload();
        assert_eq!(&payload[payload.len() - 32..], &[0xBB; 32]);
        assert_eq!(
            &payload[payload.len() - 64..payload.len() - 32],
            &[0xAA; 32]
        );
    }
}
