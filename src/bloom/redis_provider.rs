use super::{
    BatchBitProvider, BitProvider, BloomError, BloomResult, ProviderError,
};
use async_trait::async_trait;
use redis::Client;
use redis::aio::MultiplexedConnection;
use tracing::debug;

/// Stores filter bits in a Redis string with `SETBIT`/`GETBIT`.
///
/// Batches go out as a single pipeline. Redis pads the string with zero bytes
/// up to the highest written offset, so the value under a key has the same
/// layout as [`LocalBitSet::as_bytes`](super::LocalBitSet::as_bytes) except
/// that Redis numbers bits from the most significant end of each byte.
#[derive(Clone)]
pub struct RedisProvider {
    conn: MultiplexedConnection,
}

impl RedisProvider {
    pub async fn connect(redis_url: &str) -> BloomResult<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            BloomError::StorageError(format!("Redis connection error: {e}"))
        })?;
        let conn =
            client.get_multiplexed_async_connection().await.map_err(|e| {
                BloomError::StorageError(format!(
                    "Redis connection error: {e}"
                ))
            })?;
        debug!(url = redis_url, "connected bit provider");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl BitProvider for RedisProvider {
    async fn get(
        &self,
        key: &str,
        offset: usize,
    ) -> Result<bool, ProviderError> {
        let mut conn = self.conn.clone();
        let bit: i64 = redis::cmd("GETBIT")
            .arg(key)
            .arg(offset)
            .query_async(&mut conn)
            .await?;
        Ok(bit == 1)
    }

    async fn set(
        &self,
        key: &str,
        offset: usize,
    ) -> Result<bool, ProviderError> {
        let mut conn = self.conn.clone();
        // SETBIT replies with the previous value
        let previous: i64 = redis::cmd("SETBIT")
            .arg(key)
            .arg(offset)
            .arg(1)
            .query_async(&mut conn)
            .await?;
        Ok(previous == 0)
    }
}

#[async_trait]
impl BatchBitProvider for RedisProvider {
    async fn get_batch(
        &self,
        key: &str,
        offsets: &[usize],
    ) -> Result<Vec<bool>, ProviderError> {
        let mut pipe = redis::pipe();
        for &offset in offsets {
            pipe.cmd("GETBIT").arg(key).arg(offset);
        }
        let mut conn = self.conn.clone();
        let bits: Vec<i64> = pipe.query_async(&mut conn).await?;
        debug!(key, requested = offsets.len(), "pipelined GETBIT");
        Ok(bits.into_iter().map(|bit| bit == 1).collect())
    }

    async fn set_batch(
        &self,
        key: &str,
        offsets: &[usize],
    ) -> Result<Vec<bool>, ProviderError> {
        let mut pipe = redis::pipe();
        for &offset in offsets {
            pipe.cmd("SETBIT").arg(key).arg(offset).arg(1);
        }
        let mut conn = self.conn.clone();
        let previous: Vec<i64> = pipe.query_async(&mut conn).await?;
        debug!(key, requested = offsets.len(), "pipelined SETBIT");
        Ok(previous.into_iter().map(|bit| bit == 0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloom::{
        AsyncBloomFilter, BloomFilterConfigBuilder, RemoteBitSet,
    };
    use std::sync::Arc;

    fn redis_url() -> String {
        std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    #[tokio::test]
    #[ignore = "needs a running Redis server"]
    async fn test_filter_over_redis() {
        let provider =
            Arc::new(RedisProvider::connect(&redis_url()).await.unwrap());
        let key = "bitbloom:test:filter_over_redis";
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut provider.conn.clone())
            .await
            .unwrap();

        let config = BloomFilterConfigBuilder::default()
            .capacity(1000)
            .false_positive_rate(0.001)
            .max_hash_functions(10)
            .build()
            .unwrap();
        let filter = AsyncBloomFilter::remote_batched(
            config.clone(),
            provider.clone(),
            key,
        )
        .unwrap();
        filter.put("alpha").await.unwrap();
        assert!(filter.contains("alpha").await.unwrap());
        assert!(!filter.contains("beta").await.unwrap());

        // single-call view over the same key
        let store =
            RemoteBitSet::new(filter.params().bit_size, provider, key).unwrap();
        let view = AsyncBloomFilter::with_store(config, store).unwrap();
        assert!(view.contains("alpha").await.unwrap());
    }
}
