use super::bitset::check_bit_size;
use super::{
    AsyncBitStore, BatchBitProvider, BitProvider, BloomError, BloomResult,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Key used when the caller does not pick one
pub const DEFAULT_KEY: &str = "bloomfilter";

#[derive(Clone)]
enum Backend {
    Single(Arc<dyn BitProvider>),
    Batched {
        single: Arc<dyn BitProvider>,
        batch: Arc<dyn BatchBitProvider>,
    },
}

/// Bit store delegating every bit to a [`BitProvider`] under one key.
///
/// It holds no bits itself; two `RemoteBitSet`s over the same provider, key
/// and size see the same filter.
#[derive(Clone)]
pub struct RemoteBitSet {
    bit_size: usize,
    key: String,
    backend: Backend,
}

impl RemoteBitSet {
    /// Store issuing one provider call per bit
    pub fn new(
        bit_size: usize,
        provider: Arc<dyn BitProvider>,
        key: impl Into<String>,
    ) -> BloomResult<Self> {
        Self::build(bit_size, Backend::Single(provider), key.into())
    }

    /// Store issuing one provider call per `put`/`contains`
    pub fn batched<P>(
        bit_size: usize,
        provider: Arc<P>,
        key: impl Into<String>,
    ) -> BloomResult<Self>
    where
        P: BatchBitProvider + 'static,
    {
        let backend = Backend::Batched {
            single: provider.clone(),
            batch: provider,
        };
        Self::build(bit_size, backend, key.into())
    }

    fn build(
        bit_size: usize,
        backend: Backend,
        key: String,
    ) -> BloomResult<Self> {
        check_bit_size(bit_size)?;
        if key.is_empty() {
            return Err(BloomError::ProviderContract(
                "Provider key must not be empty".into(),
            ));
        }
        Ok(Self {
            bit_size,
            key,
            backend,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn single(&self) -> &dyn BitProvider {
        match &self.backend {
            Backend::Single(provider) => provider.as_ref(),
            Backend::Batched { single, .. } => single.as_ref(),
        }
    }

    fn check_reply(
        &self,
        reply: Vec<bool>,
        requested: usize,
    ) -> BloomResult<Vec<bool>> {
        if reply.len() != requested {
            return Err(BloomError::ProviderContract(format!(
                "Batch reply for key '{}' has {} entries, expected {}",
                self.key,
                reply.len(),
                requested
            )));
        }
        Ok(reply)
    }
}

#[async_trait]
impl AsyncBitStore for RemoteBitSet {
    fn bit_size(&self) -> usize {
        self.bit_size
    }

    async fn get(&self, offset: usize) -> BloomResult<bool> {
        self.single()
            .get(&self.key, offset)
            .await
            .map_err(BloomError::Provider)
    }

    async fn set(&self, offset: usize) -> BloomResult<bool> {
        self.single()
            .set(&self.key, offset)
            .await
            .map_err(BloomError::Provider)
    }

    fn can_batch(&self) -> bool {
        matches!(self.backend, Backend::Batched { .. })
    }

    async fn get_batch(&self, offsets: &[usize]) -> BloomResult<Vec<bool>> {
        match &self.backend {
            Backend::Batched { batch, .. } => {
                let reply = batch
                    .get_batch(&self.key, offsets)
                    .await
                    .map_err(BloomError::Provider)?;
                self.check_reply(reply, offsets.len())
            }
            Backend::Single(_) => {
                let mut bits = Vec::with_capacity(offsets.len());
                for &offset in offsets {
                    bits.push(self.get(offset).await?);
                }
                Ok(bits)
            }
        }
    }

    async fn set_batch(&self, offsets: &[usize]) -> BloomResult<Vec<bool>> {
        match &self.backend {
            Backend::Batched { batch, .. } => {
                let reply = batch
                    .set_batch(&self.key, offsets)
                    .await
                    .map_err(BloomError::Provider)?;
                self.check_reply(reply, offsets.len())
            }
            Backend::Single(_) => {
                let mut changed = Vec::with_capacity(offsets.len());
                for &offset in offsets {
                    changed.push(self.set(offset).await?);
                }
                Ok(changed)
            }
        }
    }
}

impl std::fmt::Debug for RemoteBitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RemoteBitSet {{ bit_size: {}, key: {:?}, batched: {} }}",
            self.bit_size,
            self.key,
            self.can_batch()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloom::{MAX_BIT_SIZE, MemoryProvider, ProviderError};

    struct ShortReplies;

    #[async_trait]
    impl BitProvider for ShortReplies {
        async fn get(
            &self,
            _key: &str,
            _offset: usize,
        ) -> Result<bool, ProviderError> {
            Ok(true)
        }

        async fn set(
            &self,
            _key: &str,
            _offset: usize,
        ) -> Result<bool, ProviderError> {
            Ok(true)
        }
    }

    #[async_trait]
    impl BatchBitProvider for ShortReplies {
        async fn get_batch(
            &self,
            _key: &str,
            _offsets: &[usize],
        ) -> Result<Vec<bool>, ProviderError> {
            Ok(vec![true])
        }

        async fn set_batch(
            &self,
            _key: &str,
            _offsets: &[usize],
        ) -> Result<Vec<bool>, ProviderError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_construction_validates() {
        let provider = Arc::new(MemoryProvider::new());
        assert!(matches!(
            RemoteBitSet::new(4, provider.clone(), DEFAULT_KEY),
            Err(BloomError::SizeOutOfRange { bits: 4, .. })
        ));
        assert!(matches!(
            RemoteBitSet::batched(MAX_BIT_SIZE + 8, provider.clone(), "k"),
            Err(BloomError::SizeOutOfRange { .. })
        ));
        assert!(matches!(
            RemoteBitSet::new(64, provider.clone(), ""),
            Err(BloomError::ProviderContract(_))
        ));

        let single = RemoteBitSet::new(64, provider.clone(), "k").unwrap();
        assert!(!single.can_batch());
        let batched = RemoteBitSet::batched(64, provider, "k").unwrap();
        assert!(batched.can_batch());
        assert_eq!(batched.key(), "k");
    }

    #[tokio::test]
    async fn test_bits_are_scoped_by_key() {
        let provider = Arc::new(MemoryProvider::new());
        let a = RemoteBitSet::new(64, provider.clone(), "a").unwrap();
        let b = RemoteBitSet::batched(64, provider.clone(), "b").unwrap();

        assert!(a.set(5).await.unwrap());
        assert!(a.get(5).await.unwrap());
        assert!(!b.get(5).await.unwrap());
        assert_eq!(b.set_batch(&[5, 6]).await.unwrap(), vec![true, true]);

        // a second view over the same key sees the stored bits
        let a_again = RemoteBitSet::batched(64, provider, "a").unwrap();
        assert_eq!(
            a_again.get_batch(&[5, 6]).await.unwrap(),
            vec![true, false]
        );
    }

    #[tokio::test]
    async fn test_batch_reply_length_is_checked() {
        let store =
            RemoteBitSet::batched(64, Arc::new(ShortReplies), "k").unwrap();
        assert!(matches!(
            store.get_batch(&[1, 2]).await,
            Err(BloomError::ProviderContract(_))
        ));
        assert!(matches!(
            store.set_batch(&[1]).await,
            Err(BloomError::ProviderContract(_))
        ));
    }
}
