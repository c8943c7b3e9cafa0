//! Signing identities.
//!
//! A [`Keypair`] is the authentication capability: presenting `&Keypair`
//! to an operation proves the call carries the authority of
//! [`Keypair::address`].

use std::fmt;

use ed25519_dalek::SigningKey;

use crate::Address;

/// An ed25519 signing key together with its public address.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the operating system RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Rebuild a keypair from its 32-byte secret seed.
    #[must_use]
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// The public address controlled by this keypair.
    #[must_use]
    pub fn address(&self) -> Address {
        Address(self.signing_key.verifying_key().to_bytes())
    }
}

// Never print the secret half.
impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Deterministic keypairs for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Keypair {
    /// Keypair whose secret is `SHA-256(label)`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        use sha2::{Digest, Sha256};
        let secret: [u8; 32] = Sha256::digest(label.as_bytes()).into();
        Self::from_secret_bytes(&secret)
    }
}
