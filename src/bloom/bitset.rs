use super::{BloomError, BloomResult};
use bitvec::{order::Lsb0, vec::BitVec};

/// Smallest bit array a store accepts
pub const MIN_BIT_SIZE: usize = 8;
/// Largest bit array a store accepts (512 MiB of backing bytes)
pub const MAX_BIT_SIZE: usize = 512 * 1024 * 1024 * 8;

pub(crate) fn check_bit_size(bits: usize) -> BloomResult<()> {
    if !(MIN_BIT_SIZE..=MAX_BIT_SIZE).contains(&bits) {
        return Err(BloomError::SizeOutOfRange {
            bits,
            min: MIN_BIT_SIZE,
            max: MAX_BIT_SIZE,
        });
    }
    Ok(())
}

/// Bit storage driven by the blocking [`HashStrategy`](super::HashStrategy).
pub trait BitStore {
    /// Number of addressable bits
    fn bit_size(&self) -> usize;

    /// Returns whether the bit at `offset` is set
    fn get(&self, offset: usize) -> BloomResult<bool>;

    /// Sets the bit at `offset`, returning true if it was previously unset
    fn set(&mut self, offset: usize) -> BloomResult<bool>;

    /// Whether `get_batch`/`set_batch` should be preferred over per-offset
    /// calls
    fn can_batch(&self) -> bool {
        false
    }

    fn get_batch(&self, offsets: &[usize]) -> BloomResult<Vec<bool>> {
        offsets.iter().map(|&offset| self.get(offset)).collect()
    }

    fn set_batch(&mut self, offsets: &[usize]) -> BloomResult<Vec<bool>> {
        offsets.iter().map(|&offset| self.set(offset)).collect()
    }
}

/// In-process bit array backed by a byte buffer.
///
/// Bit `n` lives in byte `n / 8` under mask `1 << (n % 8)`, so the raw
/// buffer can be dumped and restored as is. Offsets are reduced modulo
/// `bit_size` before access.
///
/// The buffer is owned by a single filter; sharing it across threads needs
/// external synchronization.
#[derive(Clone)]
pub struct LocalBitSet {
    bit_size: usize,
    bits: BitVec<u8, Lsb0>,
}

impl LocalBitSet {
    pub fn new(bit_size: usize) -> BloomResult<Self> {
        check_bit_size(bit_size)?;
        Ok(Self {
            bit_size,
            bits: BitVec::from_vec(vec![0u8; bit_size.div_ceil(8)]),
        })
    }

    /// Builds a bit set over previously dumped bytes. Bytes past
    /// `ceil(bit_size / 8)` are dropped.
    pub fn with_buffer(bit_size: usize, buffer: Vec<u8>) -> BloomResult<Self> {
        check_bit_size(bit_size)?;
        Ok(Self {
            bit_size,
            bits: BitVec::from_vec(Self::fit_buffer(bit_size, buffer)?),
        })
    }

    fn fit_buffer(
        bit_size: usize,
        mut buffer: Vec<u8>,
    ) -> BloomResult<Vec<u8>> {
        let expected = bit_size.div_ceil(8);
        if buffer.len() < expected {
            return Err(BloomError::BufferTooSmall {
                expected,
                actual: buffer.len(),
            });
        }
        buffer.truncate(expected);
        Ok(buffer)
    }

    /// Replaces the backing buffer, e.g. with state restored from disk.
    pub fn load_buffer(&mut self, buffer: Vec<u8>) -> BloomResult<()> {
        self.bits = BitVec::from_vec(Self::fit_buffer(self.bit_size, buffer)?);
        Ok(())
    }

    /// Raw backing bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bits.into_vec()
    }

    /// Number of set bits within `bit_size`
    pub fn count_ones(&self) -> usize {
        self.bits[..self.bit_size].count_ones()
    }
}

impl BitStore for LocalBitSet {
    fn bit_size(&self) -> usize {
        self.bit_size
    }

    fn get(&self, offset: usize) -> BloomResult<bool> {
        Ok(self.bits[offset % self.bit_size])
    }

    fn set(&mut self, offset: usize) -> BloomResult<bool> {
        let was_set = self.bits.replace(offset % self.bit_size, true);
        Ok(!was_set)
    }
}

impl std::fmt::Debug for LocalBitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LocalBitSet {{ bit_size: {}, bytes: {}, ones: {} }}",
            self.bit_size,
            self.as_bytes().len(),
            self.count_ones()
        )
    }
}
