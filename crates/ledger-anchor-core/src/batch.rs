//! Fixed-capacity batching of an ordered entry sequence.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Deref;

use crate::error::{CoreError, Result};

/// Default maximum number of entries per batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;

/// An ordered, non-empty group of items. Immutable once built.
///
/// Serialized as a plain sequence; decoding an empty sequence fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T>(Vec<T>);

impl<T> Batch<T> {
    /// Wrap a non-empty vector.
    pub fn new(items: Vec<T>) -> Result<Self> {
        if items.is_empty() {
            return Err(CoreError::EmptyBatch);
        }
        Ok(Self(items))
    }

    /// The items, in order.
    pub fn items(&self) -> &[T] {
        &self.0
    }

    /// Consume the batch.
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> Deref for Batch<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T: Serialize> Serialize for Batch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Batch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        Batch::new(items).map_err(serde::de::Error::custom)
    }
}

/// Partition `items` into consecutive, non-overlapping batches of at most
/// `max_batch_size`. Only the last batch may be smaller.
///
/// Empty input yields no batches. A zero size is rejected.
pub fn chunk<T: Clone>(items: &[T], max_batch_size: usize) -> Result<Vec<Batch<T>>> {
    if max_batch_size == 0 {
        return Err(CoreError::InvalidBatchSize(max_batch_size));
    }
    Ok(items
        .chunks(max_batch_size)
        .map(|window| Batch(window.to_vec()))
        .collect())
}
