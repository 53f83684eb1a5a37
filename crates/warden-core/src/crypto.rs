//! Cryptographic primitives for Warden
//!
//! Keccak hashing, personal-message hashing, and secp256k1 public key
//! recovery. Signatures use the 65-byte `r || s || v` layout where `v` is
//! either the raw recovery id (`0`/`1`) or its legacy form (`27`/`28`).

use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::error::{Error, Result};
use crate::types::{Address, Bytes32};

/// Length of a recoverable `r || s || v` signature
pub const RECOVERABLE_SIGNATURE_LEN: usize = 65;

/// Length of an uncompressed SEC1 public key
pub const UNCOMPRESSED_PUBLIC_KEY_LEN: usize = 65;

const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Hash data using Keccak-256
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Hash multiple pieces of data using Keccak-256
pub fn keccak256_multi(data: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for d in data {
        hasher.update(d);
    }
    hasher.finalize().into()
}

/// Personal-message hash of a 32-byte digest
pub fn personal_message_hash(hash: &Bytes32) -> Bytes32 {
    Bytes32::new(keccak256_multi(&[PERSONAL_MESSAGE_PREFIX, hash.as_bytes()]))
}

/// Derive the address of a verifying key (last 20 bytes of the keccak of
/// the uncompressed point without its `0x04` tag)
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::new(bytes)
}

/// Parse an uncompressed SEC1 public key and return its address
pub fn address_from_public_key(public_key: &[u8]) -> Result<Address> {
    if public_key.len() != UNCOMPRESSED_PUBLIC_KEY_LEN || public_key[0] != 0x04 {
        return Err(Error::InvalidPublicKey(format!(
            "expected {} byte uncompressed key",
            UNCOMPRESSED_PUBLIC_KEY_LEN
        )));
    }
    let key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    Ok(address_of(&key))
}

/// Recover the signer address of a 65-byte signature over a prehashed digest
pub fn recover_address(hash: &Bytes32, signature: &[u8]) -> Result<Address> {
    if signature.len() != RECOVERABLE_SIGNATURE_LEN {
        return Err(Error::InvalidSignature(format!(
            "expected {} bytes, got {}",
            RECOVERABLE_SIGNATURE_LEN,
            signature.len()
        )));
    }

    let v = match signature[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        other => {
            return Err(Error::InvalidSignature(format!(
                "invalid recovery byte: {}",
                other
            )))
        }
    };
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| Error::InvalidSignature(format!("invalid recovery id: {}", v)))?;

    let sig = K256Signature::from_slice(&signature[..64])
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;

    let key = VerifyingKey::recover_from_prehash(hash.as_bytes(), &sig, recovery_id)
        .map_err(|e| Error::Crypto(format!("recovery failed: {}", e)))?;

    Ok(address_of(&key))
}

/// Whether `signature` over `hash` recovers to `expected`
pub fn is_signed_by(hash: &Bytes32, signature: &[u8], expected: &Address) -> bool {
    matches!(recover_address(hash, signature), Ok(signer) if signer == *expected)
}

/// Local secp256k1 key used to produce approval signatures off-chain
#[derive(Clone)]
pub struct LocalSigner {
    key: SigningKey,
}

impl LocalSigner {
    /// Create a signer from a 32-byte secret scalar
    pub fn from_bytes(secret: &[u8; 32]) -> Result<Self> {
        let key = SigningKey::from_slice(secret).map_err(|e| Error::Crypto(e.to_string()))?;
        Ok(Self { key })
    }

    /// Generate a fresh random signer
    pub fn random<R: k256::elliptic_curve::rand_core::CryptoRngCore>(rng: &mut R) -> Self {
        Self {
            key: SigningKey::random(rng),
        }
    }

    pub fn address(&self) -> Address {
        address_of(self.key.verifying_key())
    }

    /// Uncompressed SEC1 public key (65 bytes)
    pub fn public_key(&self) -> Vec<u8> {
        self.key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Sign a prehashed digest, returning `r || s || v` with `v` in `{27, 28}`
    pub fn sign_hash(&self, hash: &Bytes32) -> Result<[u8; 65]> {
        let (sig, recovery_id) = self
            .key
            .sign_prehash_recoverable(hash.as_bytes())
            .map_err(|e| Error::Crypto(format!("signing failed: {}", e)))?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recovery_id.to_byte() + 27;
        Ok(out)
    }

    /// Sign the personal-message hash of `hash`
    pub fn sign_personal(&self, hash: &Bytes32) -> Result<[u8; 65]> {
        self.sign_hash(&personal_message_hash(hash))
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
