use super::{BitStore, BloomError, BloomResult};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

/// Bit storage driven by the concurrent
/// [`AsyncHashStrategy`](super::AsyncHashStrategy).
///
/// Methods take `&self` so that all per-offset operations of one call can be
/// in flight at once.
#[async_trait]
pub trait AsyncBitStore: Send + Sync {
    fn bit_size(&self) -> usize;

    async fn get(&self, offset: usize) -> BloomResult<bool>;

    /// Returns true if the bit was previously unset
    async fn set(&self, offset: usize) -> BloomResult<bool>;

    fn can_batch(&self) -> bool {
        false
    }

    async fn get_batch(&self, offsets: &[usize]) -> BloomResult<Vec<bool>> {
        let mut bits = Vec::with_capacity(offsets.len());
        for &offset in offsets {
            bits.push(self.get(offset).await?);
        }
        Ok(bits)
    }

    async fn set_batch(&self, offsets: &[usize]) -> BloomResult<Vec<bool>> {
        let mut changed = Vec::with_capacity(offsets.len());
        for &offset in offsets {
            changed.push(self.set(offset).await?);
        }
        Ok(changed)
    }
}

pub(crate) fn lock<S>(store: &Mutex<S>) -> BloomResult<MutexGuard<'_, S>> {
    store.lock().map_err(|e| {
        BloomError::StorageError(format!("Bit set lock error: {e}"))
    })
}

/// Lets a blocking store serve the concurrent model. The lock is held for a
/// single bit access and never across an await point.
#[async_trait]
impl<S> AsyncBitStore for Mutex<S>
where
    S: BitStore + Send,
{
    fn bit_size(&self) -> usize {
        match self.lock() {
            Ok(store) => store.bit_size(),
            Err(poisoned) => poisoned.into_inner().bit_size(),
        }
    }

    async fn get(&self, offset: usize) -> BloomResult<bool> {
        lock(self)?.get(offset)
    }

    async fn set(&self, offset: usize) -> BloomResult<bool> {
        lock(self)?.set(offset)
    }
}

/// Read-only view of a filter's sizing
pub trait BloomFilterStats {
    fn capacity(&self) -> usize;
    fn false_positive_rate(&self) -> f64;
    fn bit_size(&self) -> usize;
    fn num_hashes(&self) -> usize;
}
