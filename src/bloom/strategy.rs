//! Offset derivation and the two execution forms driving it.
//!
//! [`offsets_for`] is the one place where keys become bit offsets. The
//! blocking [`HashStrategy`] and the concurrent [`AsyncHashStrategy`] only
//! differ in how they hand those offsets to a store.
use super::{AsyncBitStore, BitStore, BloomError, BloomResult};
use crate::hash::{DigestOutput, HashFunction};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::trace;

/// Suffixes appended to a key (in decimal) to obtain further digests under
/// [`OffsetScheme::Seeded`]
pub const HASH_SEEDS: [u32; 10] = [5, 7, 11, 13, 31, 37, 61, 71, 89, 107];

/// Hash function cap honored by the blocking strategy
pub const DEFAULT_MAX_HASHES: usize = 100;
/// Hash function cap honored by the concurrent strategy
pub const DEFAULT_ASYNC_MAX_HASHES: usize = 20;

/// How a key's digests become offsets.
///
/// The two schemes set different bits for the same key, so a stored bit
/// array is only readable with the scheme that wrote it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetScheme {
    /// Every word of the key's digest is an offset; when more are needed the
    /// key is digested again with each of [`HASH_SEEDS`] appended.
    #[default]
    Seeded,
    /// Kirsch-Mitzenmacher double hashing from a single digest:
    /// `hash1 + i * hash2`.
    DoubleHashing,
}

impl OffsetScheme {
    /// Largest offset count a digest of `words_per_digest` words can feed,
    /// `None` when unbounded.
    pub fn max_offsets(&self, words_per_digest: usize) -> Option<usize> {
        match self {
            OffsetScheme::Seeded => {
                Some(words_per_digest * (HASH_SEEDS.len() + 1))
            }
            OffsetScheme::DoubleHashing => None,
        }
    }
}

/// Derives exactly `num_hashes` offsets in `[0, bit_size)` for `key`.
///
/// Pure: the same arguments always give the same offsets.
pub fn offsets_for(
    hash_function: &HashFunction,
    scheme: OffsetScheme,
    key: &str,
    num_hashes: usize,
    bit_size: usize,
) -> BloomResult<Vec<usize>> {
    if bit_size == 0 {
        return Err(BloomError::InvalidConfig(
            "Bit size must be > 0".into(),
        ));
    }

    let primary = hash_function.digest(key.as_bytes())?;
    let raw = match scheme {
        OffsetScheme::Seeded => {
            seeded_words(hash_function, key, &primary, num_hashes)?
        }
        OffsetScheme::DoubleHashing => {
            double_hashing_words(&primary, num_hashes)?
        }
    };

    let bit_size = bit_size as u64;
    Ok(raw
        .into_iter()
        .map(|word| (word.unsigned_abs() % bit_size) as usize)
        .collect())
}

fn seeded_words(
    hash_function: &HashFunction,
    key: &str,
    primary: &DigestOutput,
    num_hashes: usize,
) -> BloomResult<Vec<i64>> {
    let mut words: Vec<i64> =
        primary.words().into_iter().map(i64::from).collect();
    if words.is_empty() {
        return Err(BloomError::EmptyDigest);
    }

    let mut seeds = HASH_SEEDS.iter();
    while words.len() < num_hashes {
        let Some(seed) = seeds.next() else {
            return Err(BloomError::SeedTableExhausted {
                required: num_hashes,
                produced: words.len(),
            });
        };
        let seeded = format!("{key}{seed}");
        let digest = hash_function.digest(seeded.as_bytes())?;
        words.extend(digest.words().into_iter().map(i64::from));
    }

    words.truncate(num_hashes);
    Ok(words)
}

fn double_hashing_words(
    primary: &DigestOutput,
    num_hashes: usize,
) -> BloomResult<Vec<i64>> {
    let (hash1, hash2) = primary.hash_pair().ok_or(BloomError::EmptyDigest)?;
    let (hash1, hash2) = (i64::from(hash1), i64::from(hash2));
    Ok((0..num_hashes as i64).map(|i| hash1 + i * hash2).collect())
}

/// Blocking strategy: bits are read and written in offset order on the
/// calling thread.
#[derive(Debug, Clone, Copy)]
pub struct HashStrategy {
    hash_function: HashFunction,
    scheme: OffsetScheme,
    max_hashes: usize,
}

impl HashStrategy {
    pub fn new(hash_function: HashFunction) -> Self {
        Self {
            hash_function,
            scheme: OffsetScheme::default(),
            max_hashes: DEFAULT_MAX_HASHES,
        }
    }

    pub fn with_scheme(mut self, scheme: OffsetScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_max_hashes(mut self, max_hashes: usize) -> Self {
        self.max_hashes = max_hashes;
        self
    }

    pub fn hash_function(&self) -> HashFunction {
        self.hash_function
    }

    pub fn scheme(&self) -> OffsetScheme {
        self.scheme
    }

    pub fn max_hashes(&self) -> usize {
        self.max_hashes
    }

    /// Offsets for `key`, with `num_hashes` capped at `max_hashes`
    pub fn offsets(
        &self,
        key: &str,
        num_hashes: usize,
        bit_size: usize,
    ) -> BloomResult<Vec<usize>> {
        offsets_for(
            &self.hash_function,
            self.scheme,
            key,
            num_hashes.min(self.max_hashes),
            bit_size,
        )
    }

    /// Sets the key's bits. Returns true if any bit changed.
    pub fn put<S>(
        &self,
        key: &str,
        num_hashes: usize,
        store: &mut S,
    ) -> BloomResult<bool>
    where
        S: BitStore + ?Sized,
    {
        let offsets = self.offsets(key, num_hashes, store.bit_size())?;
        trace!(key, offsets = offsets.len(), "put");

        if store.can_batch() {
            let changed = store.set_batch(&offsets)?;
            return Ok(changed.into_iter().any(|c| c));
        }

        let mut changed = false;
        for offset in offsets {
            changed |= store.set(offset)?;
        }
        Ok(changed)
    }

    /// Returns true if all of the key's bits are set.
    pub fn contains<S>(
        &self,
        key: &str,
        num_hashes: usize,
        store: &S,
    ) -> BloomResult<bool>
    where
        S: BitStore + ?Sized,
    {
        let offsets = self.offsets(key, num_hashes, store.bit_size())?;
        trace!(key, offsets = offsets.len(), "contains");

        if store.can_batch() {
            let bits = store.get_batch(&offsets)?;
            return Ok(bits.into_iter().all(|b| b));
        }

        for offset in offsets {
            if !store.get(offset)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Default for HashStrategy {
    fn default() -> Self {
        Self::new(HashFunction::default())
    }
}

/// Concurrent strategy.
///
/// Without batching every per-offset operation is started at once and all of
/// them are awaited; the first error is reported only after every operation
/// has settled. With batching exactly one request is issued.
#[derive(Debug, Clone, Copy)]
pub struct AsyncHashStrategy {
    inner: HashStrategy,
}

impl AsyncHashStrategy {
    pub fn new(hash_function: HashFunction) -> Self {
        Self {
            inner: HashStrategy::new(hash_function)
                .with_max_hashes(DEFAULT_ASYNC_MAX_HASHES),
        }
    }

    pub fn with_scheme(self, scheme: OffsetScheme) -> Self {
        Self {
            inner: self.inner.with_scheme(scheme),
        }
    }

    pub fn with_max_hashes(self, max_hashes: usize) -> Self {
        Self {
            inner: self.inner.with_max_hashes(max_hashes),
        }
    }

    pub fn hash_function(&self) -> HashFunction {
        self.inner.hash_function()
    }

    pub fn scheme(&self) -> OffsetScheme {
        self.inner.scheme()
    }

    pub fn max_hashes(&self) -> usize {
        self.inner.max_hashes()
    }

    pub fn offsets(
        &self,
        key: &str,
        num_hashes: usize,
        bit_size: usize,
    ) -> BloomResult<Vec<usize>> {
        self.inner.offsets(key, num_hashes, bit_size)
    }

    pub async fn put<S>(
        &self,
        key: &str,
        num_hashes: usize,
        store: &S,
    ) -> BloomResult<bool>
    where
        S: AsyncBitStore + ?Sized,
    {
        let offsets = self.offsets(key, num_hashes, store.bit_size())?;
        trace!(
            key,
            offsets = offsets.len(),
            batched = store.can_batch(),
            "put"
        );

        let changed = if store.can_batch() {
            store.set_batch(&offsets).await?
        } else {
            settle(offsets.iter().map(|&offset| store.set(offset))).await?
        };
        Ok(changed.into_iter().any(|c| c))
    }

    pub async fn contains<S>(
        &self,
        key: &str,
        num_hashes: usize,
        store: &S,
    ) -> BloomResult<bool>
    where
        S: AsyncBitStore + ?Sized,
    {
        let offsets = self.offsets(key, num_hashes, store.bit_size())?;
        trace!(
            key,
            offsets = offsets.len(),
            batched = store.can_batch(),
            "contains"
        );

        let bits = if store.can_batch() {
            store.get_batch(&offsets).await?
        } else {
            settle(offsets.iter().map(|&offset| store.get(offset))).await?
        };
        Ok(bits.into_iter().all(|b| b))
    }
}

impl Default for AsyncHashStrategy {
    fn default() -> Self {
        Self::new(HashFunction::default())
    }
}

impl From<HashStrategy> for AsyncHashStrategy {
    fn from(inner: HashStrategy) -> Self {
        Self { inner }
    }
}

async fn settle<F>(
    operations: impl IntoIterator<Item = F>,
) -> BloomResult<Vec<bool>>
where
    F: Future<Output = BloomResult<bool>>,
{
    join_all(operations).await.into_iter().collect()
}
