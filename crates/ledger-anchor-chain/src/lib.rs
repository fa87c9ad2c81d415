//! # Ledger Anchor Chain
//!
//! The boundary between the integrity pipeline and the external ledger.
//!
//! The pipeline hands a [`SignedBatch`](ledger_anchor_core::SignedBatch) to a
//! [`ChainWriter`] and gets back an opaque
//! [`AckToken`](ledger_anchor_core::AckToken). Writers are injected; nothing
//! in the signer or core knows they exist.
//!
//! [`MemoryChainWriter`] is provided for dry runs and tests.

pub mod error;
pub mod writer;

pub use error::{ChainError, Result};
pub use writer::memory::{MemoryChainWriter, Submission};
pub use writer::{decode_submission, encode_submission, ChainWriter};
