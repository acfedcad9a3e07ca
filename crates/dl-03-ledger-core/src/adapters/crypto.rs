//! # Ed25519 Crypto Adapter
//!
//! Signatures are Ed25519 over the 32-byte transaction hash. An address is
//! the first 20 bytes of SHA-256 of the public key.

use crate::domain::transaction::sha256;
use crate::ports::CryptoService;
use ed25519_dalek::{Verifier, VerifyingKey};
use shared_types::{Address, Hash, PublicKey, Signature};

#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Crypto;

impl CryptoService for Ed25519Crypto {
    fn verify(&self, hash: &Hash, signature: &Signature, public_key: &PublicKey) -> bool {
        // Keys that are not valid curve points never verify.
        let Ok(key) = VerifyingKey::from_bytes(public_key) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(signature);
        key.verify(hash, &signature).is_ok()
    }

    fn derive_address(&self, public_key: &PublicKey) -> Address {
        let digest = sha256(public_key);
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest[..20]);
        address
    }
}
