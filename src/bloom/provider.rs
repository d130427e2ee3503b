use super::ProviderError;
use async_trait::async_trait;
use bitvec::{order::Lsb0, vec::BitVec};
use std::collections::HashMap;
use std::sync::Mutex;

/// Remote bit-addressable storage, such as Redis `SETBIT`/`GETBIT`.
///
/// All bits of one filter live under a single caller-chosen key. The
/// provider is responsible for durability and atomicity of single bit
/// writes.
#[async_trait]
pub trait BitProvider: Send + Sync {
    /// Reads bit `offset` of `key`
    async fn get(&self, key: &str, offset: usize)
    -> Result<bool, ProviderError>;

    /// Sets bit `offset` of `key`, returning true if it was previously zero
    async fn set(&self, key: &str, offset: usize)
    -> Result<bool, ProviderError>;
}

/// A provider that can read or write many bits in one request.
///
/// Replies must contain exactly one entry per requested offset, in request
/// order.
#[async_trait]
pub trait BatchBitProvider: BitProvider {
    async fn get_batch(
        &self,
        key: &str,
        offsets: &[usize],
    ) -> Result<Vec<bool>, ProviderError>;

    /// Returns, per offset, whether the bit changed from zero to one
    async fn set_batch(
        &self,
        key: &str,
        offsets: &[usize],
    ) -> Result<Vec<bool>, ProviderError>;
}

/// In-process provider keeping one growable bit vector per key.
///
/// Reads past the end of a key return false and writes grow it, the way
/// Redis treats string bitmaps.
#[derive(Default)]
pub struct MemoryProvider {
    keys: Mutex<HashMap<String, BitVec<u8, Lsb0>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_keys<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, BitVec<u8, Lsb0>>) -> T,
    ) -> Result<T, ProviderError> {
        let mut keys = self
            .keys
            .lock()
            .map_err(|e| format!("Memory provider lock error: {e}"))?;
        Ok(f(&mut keys))
    }

    fn get_bit(
        keys: &HashMap<String, BitVec<u8, Lsb0>>,
        key: &str,
        offset: usize,
    ) -> bool {
        keys.get(key)
            .and_then(|bits| bits.get(offset).map(|bit| *bit))
            .unwrap_or(false)
    }

    fn set_bit(
        keys: &mut HashMap<String, BitVec<u8, Lsb0>>,
        key: &str,
        offset: usize,
    ) -> bool {
        let bits = keys.entry(key.to_string()).or_default();
        if bits.len() <= offset {
            // grow in whole bytes
            bits.resize((offset / 8 + 1) * 8, false);
        }
        !bits.replace(offset, true)
    }

    /// Raw bytes stored under `key`, if any bit was ever written
    pub fn dump(&self, key: &str) -> Option<Vec<u8>> {
        self.with_keys(|keys| {
            keys.get(key).map(|bits| bits.as_raw_slice().to_vec())
        })
        .ok()
        .flatten()
    }

    /// Removes `key`, returning whether it existed
    pub fn remove(&self, key: &str) -> bool {
        self.with_keys(|keys| keys.remove(key).is_some())
            .unwrap_or(false)
    }
}

#[async_trait]
impl BitProvider for MemoryProvider {
    async fn get(
        &self,
        key: &str,
        offset: usize,
    ) -> Result<bool, ProviderError> {
        self.with_keys(|keys| Self::get_bit(keys, key, offset))
    }

    async fn set(
        &self,
        key: &str,
        offset: usize,
    ) -> Result<bool, ProviderError> {
        self.with_keys(|keys| Self::set_bit(keys, key, offset))
    }
}

#[async_trait]
impl BatchBitProvider for MemoryProvider {
    async fn get_batch(
        &self,
        key: &str,
        offsets: &[usize],
    ) -> Result<Vec<bool>, ProviderError> {
        self.with_keys(|keys| {
            offsets
                .iter()
                .map(|&offset| Self::get_bit(keys, key, offset))
                .collect()
        })
    }

    async fn set_batch(
        &self,
        key: &str,
        offsets: &[usize],
    ) -> Result<Vec<bool>, ProviderError> {
        self.with_keys(|keys| {
            offsets
                .iter()
                .map(|&offset| Self::set_bit(keys, key, offset))
                .collect()
        })
    }
}
