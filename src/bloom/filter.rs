use super::config::{
    DEFAULT_MAX_HASH_FUNCTIONS, DEFAULT_REMOTE_MAX_HASH_FUNCTIONS,
};
use super::traits::lock;
use super::{
    AsyncBitStore, AsyncHashStrategy, BatchBitProvider, BitProvider, BitStore,
    BloomError, BloomFilterConfig, BloomFilterStats, BloomParams, BloomResult,
    FilterSnapshot, HashStrategy, LocalBitSet, OffsetScheme, RemoteBitSet,
};
use crate::hash::HashFunction;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Caps the hash count at what the strategy honors and at what the seed
/// table can feed for the digest's width. A filter left with no hash
/// function is rejected.
fn fit_hash_count(
    mut params: BloomParams,
    hash_function: HashFunction,
    scheme: OffsetScheme,
    strategy_max: usize,
) -> BloomResult<BloomParams> {
    let mut limit = strategy_max;
    if let Some(seeded_max) =
        scheme.max_offsets(hash_function.digest_width()?)
    {
        limit = limit.min(seeded_max);
    }

    if params.num_hashes > limit {
        warn!(
            requested = params.num_hashes,
            limit,
            hash_function = %hash_function,
            "Clamping number of hash functions"
        );
        params.num_hashes = limit;
    }
    if params.num_hashes == 0 {
        return Err(BloomError::InvalidConfig(
            "Number of hash functions must be > 0".into(),
        ));
    }
    Ok(params)
}

/// Params a restored filter runs with. The snapshot's hash count is kept
/// as is, since it decides which bits were set.
fn restore_params(snapshot: &FilterSnapshot) -> BloomResult<BloomParams> {
    snapshot.params.validate()?;
    fit_hash_count(
        snapshot.params,
        snapshot.hash_function,
        snapshot.scheme,
        snapshot.params.num_hashes,
    )
}

fn check_store_size(
    params: &BloomParams,
    store_bits: usize,
) -> BloomResult<()> {
    if store_bits != params.bit_size {
        return Err(BloomError::InvalidConfig(format!(
            "Store holds {store_bits} bits, filter needs {}",
            params.bit_size
        )));
    }
    Ok(())
}

fn log_created(
    params: &BloomParams,
    hash_function: HashFunction,
    model: &str,
) {
    debug!(
        capacity = params.capacity,
        false_positive_rate = params.false_positive_rate,
        bit_size = params.bit_size,
        num_hashes = params.num_hashes,
        min_bytes = params.byte_len(),
        hash_function = %hash_function,
        model,
        "Bloom filter created"
    );
}

/// Bloom filter using the blocking execution model.
///
/// Every bit operation runs on the caller's thread, in offset order. The
/// store is exclusively owned, so `put` needs `&mut self`.
pub struct BloomFilter<S: BitStore = LocalBitSet> {
    params: BloomParams,
    strategy: Option<HashStrategy>,
    store: Option<S>,
}

impl BloomFilter<LocalBitSet> {
    /// Filter over a fresh in-memory bit set
    pub fn new(config: BloomFilterConfig) -> BloomResult<Self> {
        Self::with_store_fn(config, LocalBitSet::new)
    }

    /// Filter over a previously dumped bit buffer. `config` must match the
    /// one the buffer was written with.
    pub fn from_bytes(
        config: BloomFilterConfig,
        bytes: Vec<u8>,
    ) -> BloomResult<Self> {
        Self::with_store_fn(config, |bit_size| {
            LocalBitSet::with_buffer(bit_size, bytes)
        })
    }

    /// Filter restored from a dumped buffer and its out-of-band description
    pub fn from_snapshot(
        snapshot: &FilterSnapshot,
        bytes: Vec<u8>,
    ) -> BloomResult<Self> {
        let params = restore_params(snapshot)?;
        let store = LocalBitSet::with_buffer(params.bit_size, bytes)?;
        let strategy = HashStrategy::new(snapshot.hash_function)
            .with_scheme(snapshot.scheme)
            .with_max_hashes(params.num_hashes);
        log_created(&params, snapshot.hash_function, "blocking");

        Ok(Self {
            params,
            strategy: Some(strategy),
            store: Some(store),
        })
    }

    /// Raw bit buffer, to be persisted together with [`Self::snapshot`]
    pub fn to_bytes(&self) -> BloomResult<&[u8]> {
        self.store
            .as_ref()
            .map(LocalBitSet::as_bytes)
            .ok_or(BloomError::Disposed)
    }

    /// Share of bits currently set
    pub fn fill_ratio(&self) -> BloomResult<f64> {
        let store = self.store.as_ref().ok_or(BloomError::Disposed)?;
        Ok(store.count_ones() as f64 / self.params.bit_size as f64)
    }
}

impl<S: BitStore> BloomFilter<S> {
    /// Filter over a caller-supplied store, e.g. a view over bits that were
    /// stored earlier. The store must hold exactly the evaluated bit size.
    pub fn with_store(
        config: BloomFilterConfig,
        store: S,
    ) -> BloomResult<Self> {
        let strategy = HashStrategy::new(config.hash_function)
            .with_scheme(config.scheme);
        Self::with_strategy(config, strategy, store)
    }

    /// Filter over a store built from the evaluated bit size
    pub fn with_store_fn<F>(
        config: BloomFilterConfig,
        build: F,
    ) -> BloomResult<Self>
    where
        F: FnOnce(usize) -> BloomResult<S>,
    {
        config.validate()?;
        let bit_size = config.evaluate(DEFAULT_MAX_HASH_FUNCTIONS).bit_size;
        let store = build(bit_size)?;
        Self::with_store(config, store)
    }

    /// Filter using a caller-supplied strategy instead of the config's hash
    /// function and scheme
    pub fn with_strategy(
        config: BloomFilterConfig,
        strategy: HashStrategy,
        store: S,
    ) -> BloomResult<Self> {
        config.validate()?;
        let params = fit_hash_count(
            config.evaluate(DEFAULT_MAX_HASH_FUNCTIONS),
            strategy.hash_function(),
            strategy.scheme(),
            strategy.max_hashes(),
        )?;
        check_store_size(&params, store.bit_size())?;
        log_created(&params, strategy.hash_function(), "blocking");

        Ok(Self {
            params,
            strategy: Some(strategy),
            store: Some(store),
        })
    }

    /// Adds `key`. Returns true if any bit changed, i.e. the key was not
    /// already fully represented.
    pub fn put(&mut self, key: &str) -> BloomResult<bool> {
        let (Some(strategy), Some(store)) =
            (self.strategy.as_ref(), self.store.as_mut())
        else {
            return Err(BloomError::Disposed);
        };
        strategy.put(key, self.params.num_hashes, store)
    }

    /// Returns true if `key` may have been added, false if it definitely
    /// was not.
    pub fn contains(&self, key: &str) -> BloomResult<bool> {
        let (Some(strategy), Some(store)) =
            (self.strategy.as_ref(), self.store.as_ref())
        else {
            return Err(BloomError::Disposed);
        };
        strategy.contains(key, self.params.num_hashes, store)
    }

    /// Releases the strategy and the store. Calling it again is a no-op.
    pub fn dispose(&mut self) {
        let had_strategy = self.strategy.take().is_some();
        let had_store = self.store.take().is_some();
        if had_strategy || had_store {
            debug!("Bloom filter disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.store.is_none()
    }

    pub fn params(&self) -> &BloomParams {
        &self.params
    }

    pub fn strategy(&self) -> Option<&HashStrategy> {
        self.strategy.as_ref()
    }

    pub fn store(&self) -> Option<&S> {
        self.store.as_ref()
    }

    pub fn into_store(self) -> Option<S> {
        self.store
    }

    /// Out-of-band description needed to reinterpret the dumped bits
    pub fn snapshot(&self) -> BloomResult<FilterSnapshot> {
        let strategy = self.strategy.as_ref().ok_or(BloomError::Disposed)?;
        Ok(FilterSnapshot {
            params: self.params,
            hash_function: strategy.hash_function(),
            scheme: strategy.scheme(),
        })
    }
}

impl<S: BitStore> BloomFilterStats for BloomFilter<S> {
    fn capacity(&self) -> usize {
        self.params.capacity
    }

    fn false_positive_rate(&self) -> f64 {
        self.params.false_positive_rate
    }

    fn bit_size(&self) -> usize {
        self.params.bit_size
    }

    fn num_hashes(&self) -> usize {
        self.params.num_hashes
    }
}

impl<S: BitStore> std::fmt::Debug for BloomFilter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("capacity", &self.params.capacity)
            .field("false_positive_rate", &self.params.false_positive_rate)
            .field("bit_size", &self.params.bit_size)
            .field("num_hashes", &self.params.num_hashes)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Bloom filter using the concurrent execution model.
///
/// Mandatory for remote stores. `put` and `contains` take `&self`; concurrent
/// puts of different keys may race on the same bit, which is harmless since
/// bits are only ever set.
pub struct AsyncBloomFilter<S: AsyncBitStore = RemoteBitSet> {
    params: BloomParams,
    strategy: Option<AsyncHashStrategy>,
    store: Option<S>,
}

impl AsyncBloomFilter<RemoteBitSet> {
    /// Filter whose bits live under `key` in `provider`, one provider call
    /// per bit. Reconnecting with the same config and key gives a view over
    /// the bits stored earlier.
    pub fn remote(
        config: BloomFilterConfig,
        provider: Arc<dyn BitProvider>,
        key: impl Into<String>,
    ) -> BloomResult<Self> {
        config.validate()?;
        let bit_size =
            config.evaluate(DEFAULT_REMOTE_MAX_HASH_FUNCTIONS).bit_size;
        let store = RemoteBitSet::new(bit_size, provider, key)?;
        Self::build(config, DEFAULT_REMOTE_MAX_HASH_FUNCTIONS, store)
    }

    /// Like [`Self::remote`], issuing one batched call per operation
    pub fn remote_batched<P>(
        config: BloomFilterConfig,
        provider: Arc<P>,
        key: impl Into<String>,
    ) -> BloomResult<Self>
    where
        P: BatchBitProvider + 'static,
    {
        config.validate()?;
        let bit_size =
            config.evaluate(DEFAULT_REMOTE_MAX_HASH_FUNCTIONS).bit_size;
        let store = RemoteBitSet::batched(bit_size, provider, key)?;
        Self::build(config, DEFAULT_REMOTE_MAX_HASH_FUNCTIONS, store)
    }
}

impl AsyncBloomFilter<Mutex<LocalBitSet>> {
    /// Concurrent filter over an in-memory bit set
    pub fn local(config: BloomFilterConfig) -> BloomResult<Self> {
        config.validate()?;
        let bit_size = config.evaluate(DEFAULT_MAX_HASH_FUNCTIONS).bit_size;
        let store = Mutex::new(LocalBitSet::new(bit_size)?);
        Self::build(config, DEFAULT_MAX_HASH_FUNCTIONS, store)
    }

    /// Concurrent filter restored from a dumped buffer and its out-of-band
    /// description
    pub fn from_snapshot(
        snapshot: &FilterSnapshot,
        bytes: Vec<u8>,
    ) -> BloomResult<Self> {
        let params = restore_params(snapshot)?;
        let store =
            Mutex::new(LocalBitSet::with_buffer(params.bit_size, bytes)?);
        let strategy = AsyncHashStrategy::new(snapshot.hash_function)
            .with_scheme(snapshot.scheme)
            .with_max_hashes(params.num_hashes);
        log_created(&params, snapshot.hash_function, "concurrent");

        Ok(Self {
            params,
            strategy: Some(strategy),
            store: Some(store),
        })
    }

    /// Copy of the raw bit buffer, taken under the store lock
    pub fn to_bytes(&self) -> BloomResult<Vec<u8>> {
        let store = self.store.as_ref().ok_or(BloomError::Disposed)?;
        Ok(lock(store)?.as_bytes().to_vec())
    }
}

impl<S: AsyncBitStore> AsyncBloomFilter<S> {
    /// Filter over a caller-supplied store holding exactly the evaluated
    /// number of bits. Without an explicit cap in `config` the in-memory
    /// default of 100 hash functions applies.
    pub fn with_store(
        config: BloomFilterConfig,
        store: S,
    ) -> BloomResult<Self> {
        Self::build(config, DEFAULT_MAX_HASH_FUNCTIONS, store)
    }

    pub fn with_strategy(
        config: BloomFilterConfig,
        strategy: AsyncHashStrategy,
        store: S,
    ) -> BloomResult<Self> {
        Self::assemble(config, DEFAULT_MAX_HASH_FUNCTIONS, strategy, store)
    }

    fn build(
        config: BloomFilterConfig,
        default_max: usize,
        store: S,
    ) -> BloomResult<Self> {
        let strategy = AsyncHashStrategy::new(config.hash_function)
            .with_scheme(config.scheme);
        Self::assemble(config, default_max, strategy, store)
    }

    fn assemble(
        config: BloomFilterConfig,
        default_max: usize,
        strategy: AsyncHashStrategy,
        store: S,
    ) -> BloomResult<Self> {
        config.validate()?;
        let params = fit_hash_count(
            config.evaluate(default_max),
            strategy.hash_function(),
            strategy.scheme(),
            strategy.max_hashes(),
        )?;
        check_store_size(&params, store.bit_size())?;
        log_created(&params, strategy.hash_function(), "concurrent");

        Ok(Self {
            params,
            strategy: Some(strategy),
            store: Some(store),
        })
    }

    /// Adds `key`. Returns true if any bit changed.
    pub async fn put(&self, key: &str) -> BloomResult<bool> {
        let (Some(strategy), Some(store)) =
            (self.strategy.as_ref(), self.store.as_ref())
        else {
            return Err(BloomError::Disposed);
        };
        strategy.put(key, self.params.num_hashes, store).await
    }

    pub async fn contains(&self, key: &str) -> BloomResult<bool> {
        let (Some(strategy), Some(store)) =
            (self.strategy.as_ref(), self.store.as_ref())
        else {
            return Err(BloomError::Disposed);
        };
        strategy.contains(key, self.params.num_hashes, store).await
    }

    /// Releases the strategy and the store. Calling it again is a no-op.
    pub fn dispose(&mut self) {
        let had_strategy = self.strategy.take().is_some();
        let had_store = self.store.take().is_some();
        if had_strategy || had_store {
            debug!("Bloom filter disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.store.is_none()
    }

    pub fn params(&self) -> &BloomParams {
        &self.params
    }

    pub fn strategy(&self) -> Option<&AsyncHashStrategy> {
        self.strategy.as_ref()
    }

    pub fn store(&self) -> Option<&S> {
        self.store.as_ref()
    }

    pub fn into_store(self) -> Option<S> {
        self.store
    }

    /// Out-of-band description needed to reinterpret the stored bits
    pub fn snapshot(&self) -> BloomResult<FilterSnapshot> {
        let strategy = self.strategy.as_ref().ok_or(BloomError::Disposed)?;
        Ok(FilterSnapshot {
            params: self.params,
            hash_function: strategy.hash_function(),
            scheme: strategy.scheme(),
        })
    }
}

impl<S: AsyncBitStore> BloomFilterStats for AsyncBloomFilter<S> {
    fn capacity(&self) -> usize {
        self.params.capacity
    }

    fn false_positive_rate(&self) -> f64 {
        self.params.false_positive_rate
    }

    fn bit_size(&self) -> usize {
        self.params.bit_size
    }

    fn num_hashes(&self) -> usize {
        self.params.num_hashes
    }
}
