//! Where signing keys come from.
//!
//! A [`KeySource`] hands out a fresh [`Keypair`] on every call. The signer
//! keeps it only for the duration of one signature.

use std::fs;
use std::path::{Path, PathBuf};

use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::SigningKey;
use ledger_anchor_core::{Keypair, PublicKey};

use crate::error::{Result, SignerError};

const PEM_PREFIX: &str = "-----BEGIN";

/// Supplies Ed25519 key material on demand.
pub trait KeySource: Send + Sync {
    /// Load the keypair. Called once per signature.
    fn load(&self) -> Result<Keypair>;

    /// Human-readable origin, for logs. Never contains key material.
    fn describe(&self) -> String;
}

/// A key stored in a file.
///
/// Accepted contents:
/// - 32 raw seed bytes
/// - 64 hex characters encoding the seed (surrounding whitespace ignored)
/// - a PKCS#8 PEM Ed25519 private key
#[derive(Debug, Clone)]
pub struct FileKeySource {
    path: PathBuf,
}

impl FileKeySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeySource for FileKeySource {
    fn load(&self) -> Result<Keypair> {
        let bytes = fs::read(&self.path).map_err(|source| SignerError::KeyUnavailable {
            path: self.path.clone(),
            source,
        })?;
        parse_key_material(&bytes)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// An in-memory seed. Intended for tests and fixtures.
#[derive(Clone)]
pub struct SeedKeySource {
    seed: [u8; 32],
}

impl SeedKeySource {
    pub fn new(seed: [u8; 32]) -> Self {
        Self { seed }
    }

    pub fn public_key(&self) -> PublicKey {
        Keypair::from_seed(&self.seed).public_key()
    }
}

impl KeySource for SeedKeySource {
    fn load(&self) -> Result<Keypair> {
        Ok(Keypair::from_seed(&self.seed))
    }

    fn describe(&self) -> String {
        format!("seed:{}", self.public_key())
    }
}

impl std::fmt::Debug for SeedKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SeedKeySource({:?})", self.public_key())
    }
}

/// Decode key file contents.
pub fn parse_key_material(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() == 32 {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(bytes);
        return Ok(Keypair::from_seed(&seed));
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|_| SignerError::InvalidKey("expected 32 raw bytes, hex, or PEM".into()))?
        .trim();

    if text.starts_with(PEM_PREFIX) {
        let signing_key = SigningKey::from_pkcs8_pem(text)
            .map_err(|e| SignerError::InvalidKey(format!("PKCS#8 PEM: {}", e)))?;
        return Ok(Keypair::from_signing_key(signing_key));
    }

    let decoded =
        hex::decode(text).map_err(|e| SignerError::InvalidKey(format!("hex seed: {}", e)))?;
    let seed: [u8; 32] = decoded.as_slice().try_into().map_err(|_| {
        SignerError::InvalidKey(format!("seed must be 32 bytes, got {}", decoded.len()))
    })?;
    Ok(Keypair::from_seed(&seed))
}

/// Write a keypair's seed as hex, readable by [`FileKeySource`].
///
/// On Unix the file is created owner-read/write only.
pub fn write_hex_seed(path: &Path, keypair: &Keypair) -> Result<()> {
    let mut contents = hex::encode(keypair.seed());
    contents.push('\n');
    fs::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}
