//! Bloom filter over string keys with in-memory or remote bit storage.
//!
//! This crate answers "possibly contains" queries for a stream of string keys
//! with a bounded false positive rate and no false negatives.
//!
//! HowTo:
//!    * Sizing: expected insertions `n` and target rate `p` give the bit array
//!      size `m = floor(-n ln p / ln(2)^2)` and `k = round(m / n ln 2)` hash
//!      functions, capped per store.
//!    * Offsets: a single digest (SHA-1, MD5, times33, murmur3+FNV) yields
//!      several 32-bit words. Missing offsets come from digesting the key with
//!      a seed appended, or from double hashing `h1 + i * h2`.
//!    * Storage: bits live in a local byte buffer or behind a provider such as
//!      Redis `SETBIT`/`GETBIT`, optionally batched.
//!
//! Execution:
//!     * [`BloomFilter`] is blocking and owns its store.
//!     * [`AsyncBloomFilter`] fans per-bit operations out concurrently, or
//!       sends one batched request, and is the only choice for remote stores.
//!
//! Persistence:
//!     * A local filter dumps to `ceil(m / 8)` raw bytes without a header. The
//!       [`FilterSnapshot`] describing the sizing, digest and offset scheme has
//!       to be stored next to it.
//!
//! Obvious problems:
//!     * The seeded and double-hashing schemes set different bits for the same
//!       key. Never mix buffers across schemes.
//!     * Bits are never cleared, so a failed partial `put` leaves its bits set.

pub mod bloom;
pub mod common;
mod hash;

pub use bloom::{
    AsyncBitStore, AsyncBloomFilter, AsyncHashStrategy, BatchBitProvider,
    BitProvider, BitStore, BloomError, BloomFilter, BloomFilterConfig,
    BloomFilterConfigBuilder, BloomFilterConfigBuilderError, BloomFilterStats,
    BloomParams, BloomResult, FilterSnapshot, HashStrategy, LocalBitSet,
    MemoryProvider, OffsetScheme, ProviderError, RemoteBitSet, offsets_for,
};
#[cfg(feature = "redis")]
pub use bloom::RedisProvider;
pub use hash::{
    DigestFn, DigestOutput, HashFunction, optimal_num_bits, optimal_num_hashes,
};
