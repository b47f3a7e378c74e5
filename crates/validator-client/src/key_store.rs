//! Key store - holds the validator's signing credential

use crate::config::ValidatorClientConfig;
use crate::error::ValidatorError;
use ed25519_dalek::{Signer, SigningKey};
use l2_types::{Address, Signature};
use std::fmt;

/// Signing contract used by the validation service
pub trait ValidatorKeyStore: Send + Sync {
    /// Address derived from the public key
    fn address(&self) -> Address;

    /// Sign arbitrary bytes
    fn sign(&self, message: &[u8]) -> Signature;
}

/// Key store backed by an in-memory ed25519 key
pub struct LocalKeyStore {
    signing_key: SigningKey,
    address: Address,
}

impl LocalKeyStore {
    pub fn new(secret: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&secret);
        let address = Address::from_public_key(&signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    /// Build from the configured private key
    pub fn from_config(config: &ValidatorClientConfig) -> Result<Self, ValidatorError> {
        Ok(Self::new(config.parse_private_key()?))
    }

    /// Fresh random key
    pub fn random() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        Self::new(signing_key.to_bytes())
    }
}

impl fmt::Debug for LocalKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeyStore")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl ValidatorKeyStore for LocalKeyStore {
    fn address(&self) -> Address {
        self.address
    }

    fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing_key.sign(message);
        Signature {
            public_key: self.signing_key.verifying_key().to_bytes(),
            bytes: sig.to_bytes().to_vec(),
        }
    }
}
