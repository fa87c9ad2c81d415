//! # Ledger Anchor Signer
//!
//! Detached Ed25519 signing of batch commitments.
//!
//! A [`Signer`] is built from an explicit [`KeySource`]; there is no global
//! key state. Key material is loaded per signature and released afterwards.
//!
//! ```rust,no_run
//! use ledger_anchor_signer::{FileKeySource, Signer};
//!
//! let signer = Signer::new(FileKeySource::new("signer.key")).unwrap();
//! let signature = signer.sign(&[0u8; 32]).unwrap();
//! ```

pub mod error;
pub mod signer;
pub mod source;

pub use error::{Result, SignerError};
pub use signer::Signer;
pub use source::{parse_key_material, write_hex_seed, FileKeySource, KeySource, SeedKeySource};
