//! Standard Bloom filter over string keys
pub mod bitset;
pub mod config;
pub mod error;
pub mod filter;
pub mod provider;
#[cfg(feature = "redis")]
pub mod redis_provider;
pub mod remote;
pub mod strategy;
pub mod traits;

pub use bitset::{BitStore, LocalBitSet, MAX_BIT_SIZE, MIN_BIT_SIZE};
pub use config::{
    BloomFilterConfig, BloomFilterConfigBuilder, BloomFilterConfigBuilderError,
    BloomParams, FilterSnapshot,
};
pub use error::{BloomError, BloomResult, ProviderError};
pub use filter::{AsyncBloomFilter, BloomFilter};
pub use provider::{BatchBitProvider, BitProvider, MemoryProvider};
#[cfg(feature = "redis")]
pub use redis_provider::RedisProvider;
pub use remote::{DEFAULT_KEY, RemoteBitSet};
pub use strategy::{
    AsyncHashStrategy, HASH_SEEDS, HashStrategy, OffsetScheme, offsets_for,
};
pub use traits::{AsyncBitStore, BloomFilterStats};
