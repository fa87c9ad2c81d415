//! The signer: one exclusive signing path per key.

use std::sync::Mutex;

use ledger_anchor_core::{PublicKey, Signature};
use tracing::debug;

use crate::error::{Result, SignerError};
use crate::source::KeySource;

/// Produces detached Ed25519 signatures over commitments.
///
/// Signing calls on one `Signer` are serialized. The key is loaded from the
/// source for each call and dropped (and zeroized) before the call returns.
/// Distinct signers never contend with each other.
pub struct Signer<K: KeySource> {
    source: K,
    public_key: PublicKey,
    lock: Mutex<()>,
}

impl<K: KeySource> Signer<K> {
    /// Create a signer, loading the key once to learn its public half.
    pub fn new(source: K) -> Result<Self> {
        let public_key = source.load()?.public_key();
        debug!(source = %source.describe(), %public_key, "signer ready");
        Ok(Self {
            source,
            public_key,
            lock: Mutex::new(()),
        })
    }

    /// Public key of the signing key.
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn source(&self) -> &K {
        &self.source
    }

    /// Sign the exact commitment bytes.
    ///
    /// An empty commitment is a caller bug and is rejected. If the key
    /// material behind the source changed since construction, signing fails
    /// rather than producing a signature under an unexpected key.
    pub fn sign(&self, commitment: &[u8]) -> Result<Signature> {
        if commitment.is_empty() {
            return Err(SignerError::MalformedCommitment("commitment is empty"));
        }

        let _guard = self.lock.lock().map_err(|_| SignerError::Poisoned)?;
        let keypair = self.source.load()?;
        if keypair.public_key() != self.public_key {
            return Err(SignerError::InvalidKey(format!(
                "key at {} no longer matches {}",
                self.source.describe(),
                self.public_key
            )));
        }
        Ok(keypair.sign(commitment))
    }
}

impl<K: KeySource> std::fmt::Debug for Signer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("source", &self.source.describe())
            .field("public_key", &self.public_key)
            .finish()
    }
}
