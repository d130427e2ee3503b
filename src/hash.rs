use crate::bloom::{BloomError, BloomResult};
use fnv::FnvHasher;
use md5::Md5;
use murmur3::murmur3_32;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::hash::Hasher;
use std::io::Cursor;
use std::str::FromStr;

/// Output of a digest function.
///
/// - `Bytes` carries a byte digest whose length should be a positive multiple
///   of 4. Every complete 4-byte chunk is read as a big-endian `i32`.
/// - `Pair` carries two ready-made words, used as exactly two offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestOutput {
    Bytes(Vec<u8>),
    Pair(i32, i32),
}

impl DigestOutput {
    /// Raw (signed, unreduced) offsets carried by this digest.
    pub fn words(&self) -> Vec<i32> {
        match self {
            DigestOutput::Bytes(bytes) => {
                bytes.chunks_exact(4).map(read_i32_be).collect()
            }
            DigestOutput::Pair(a, b) => vec![*a, *b],
        }
    }

    /// Base pair for double hashing: first and last word of a byte digest,
    /// or the pair itself.
    pub fn hash_pair(&self) -> Option<(i32, i32)> {
        match self {
            DigestOutput::Bytes(bytes) if bytes.len() >= 4 => Some((
                read_i32_be(&bytes[..4]),
                read_i32_be(&bytes[bytes.len() - 4..]),
            )),
            DigestOutput::Bytes(_) => None,
            DigestOutput::Pair(a, b) => Some((*a, *b)),
        }
    }
}

fn read_i32_be(chunk: &[u8]) -> i32 {
    i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
}

/// A caller-supplied digest function.
///
/// It must be deterministic: the same input always yields the same output,
/// otherwise a filter would report false negatives.
pub type DigestFn = fn(&[u8]) -> DigestOutput;

/// Digest function used to derive bit offsets from a key.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashFunction {
    /// SHA-1, 160 bits, five words per digest
    #[default]
    Sha1,
    /// MD5, 128 bits, four words per digest
    Md5,
    /// Two 31-bit "times 33" rolling hashes with different start values
    Times33,
    /// murmur3_32 paired with FNV-1a 32
    Murmur3Fnv,
    #[serde(skip)]
    Custom(DigestFn),
}

impl HashFunction {
    pub fn digest(&self, data: &[u8]) -> BloomResult<DigestOutput> {
        match self {
            HashFunction::Sha1 => Ok(DigestOutput::Bytes(sha1_hash(data))),
            HashFunction::Md5 => Ok(DigestOutput::Bytes(md5_hash(data))),
            HashFunction::Times33 => {
                let (upper, lower) = times33_hash(data);
                Ok(DigestOutput::Pair(upper, lower))
            }
            HashFunction::Murmur3Fnv => {
                let h1 = hash_murmur32(data)?;
                let h2 = hash_fnv32(data);
                Ok(DigestOutput::Pair(h1 as i32, h2 as i32))
            }
            HashFunction::Custom(f) => Ok(f(data)),
        }
    }

    /// Number of words a single digest yields, when known up front.
    pub fn words_per_digest(&self) -> Option<usize> {
        match self {
            HashFunction::Sha1 => Some(5),
            HashFunction::Md5 => Some(4),
            HashFunction::Times33 | HashFunction::Murmur3Fnv => Some(2),
            HashFunction::Custom(_) => None,
        }
    }

    /// Words per digest. Custom digests are measured on an empty input, so
    /// a digest whose width depends on its input is only checked at call
    /// time.
    pub fn digest_width(&self) -> BloomResult<usize> {
        let words = match self.words_per_digest() {
            Some(words) => words,
            None => self.digest(&[])?.words().len(),
        };
        if words == 0 {
            return Err(BloomError::EmptyDigest);
        }
        Ok(words)
    }

    pub fn name(&self) -> &'static str {
        match self {
            HashFunction::Sha1 => "sha1",
            HashFunction::Md5 => "md5",
            HashFunction::Times33 => "times33",
            HashFunction::Murmur3Fnv => "murmur3_fnv",
            HashFunction::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for HashFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashFunction {
    type Err = BloomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(HashFunction::Sha1),
            "md5" => Ok(HashFunction::Md5),
            "times33" => Ok(HashFunction::Times33),
            "murmur3_fnv" | "murmur3" => Ok(HashFunction::Murmur3Fnv),
            other => Err(BloomError::InvalidConfig(format!(
                "Unknown hash function '{other}', expected one of \
                 sha1, md5, times33, murmur3_fnv"
            ))),
        }
    }
}

pub(crate) fn sha1_hash(data: &[u8]) -> Vec<u8> {
    Sha1::digest(data).to_vec()
}

pub(crate) fn md5_hash(data: &[u8]) -> Vec<u8> {
    Md5::digest(data).to_vec()
}

fn times33_with_start(data: &[u8], start: u32) -> u32 {
    data.iter().fold(start, |code, &byte| {
        code.wrapping_shl(5)
            .wrapping_add(code)
            .wrapping_add(byte as u32)
            & 0x7fff_ffff
    })
}

pub(crate) fn times33_hash(data: &[u8]) -> (i32, i32) {
    // Both words are masked to 31 bits, so the casts never go negative.
    let upper = times33_with_start(data, 5381) as i32;
    let lower = times33_with_start(data, 7457) as i32;
    (upper, lower)
}

pub(crate) fn hash_murmur32(key: &[u8]) -> BloomResult<u32> {
    let mut cursor = Cursor::new(key);
    murmur3_32(&mut cursor, 0).map_err(|e| {
        BloomError::DigestError(format!("Failed to compute Murmur3 hash: {e}"))
    })
}

pub(crate) fn hash_fnv32(key: &[u8]) -> u32 {
    let mut hasher = FnvHasher::default();
    hasher.write(key);
    hasher.finish() as u32
}

/// Bits needed for `n` insertions at false positive rate `fpr`:
/// `floor(-n * ln(fpr) / ln(2)^2)`.
pub fn optimal_num_bits(n: usize, fpr: f64) -> usize {
    let ln2 = std::f64::consts::LN_2;
    ((-(n as f64) * fpr.ln()) / (ln2 * ln2)).floor() as usize
}

/// Hash functions minimizing the false positive rate for `m` bits and `n`
/// insertions: `max(1, round(m / n * ln(2)))`.
pub fn optimal_num_hashes(n: usize, m: usize) -> usize {
    ((m as f64 / n as f64) * std::f64::consts::LN_2)
        .round()
        .max(1.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_words() {
        let out = HashFunction::Sha1.digest(b"abc").unwrap();
        assert_eq!(
            out.words(),
            vec![-1449574858, 1191608682, -1170332303, 2018558572, -1664034659]
        );
    }

    #[test]
    fn test_md5_words() {
        let out = HashFunction::Md5.digest(b"abc").unwrap();
        assert_eq!(
            out.words(),
            vec![-1878962024, 1020415920, -694796419, 685866866]
        );
        assert_eq!(out.hash_pair(), Some((-1878962024, 685866866)));
    }

    #[test]
    fn test_times33_known_values() {
        assert_eq!(times33_hash(b"1234"), (2088290703, 255295403));
        assert_eq!(times33_hash(b""), (5381, 7457));
    }

    #[test]
    fn test_times33_stays_non_negative() {
        let long = "x".repeat(10_000);
        let (a, b) = times33_hash(long.as_bytes());
        assert!(a >= 0 && b >= 0);
    }

    #[test]
    fn test_bytes_ignore_trailing_partial_word() {
        let out = DigestOutput::Bytes(vec![0, 0, 0, 1, 0xff, 0xff]);
        assert_eq!(out.words(), vec![1]);
        assert!(DigestOutput::Bytes(vec![1, 2]).words().is_empty());
        assert_eq!(DigestOutput::Bytes(vec![1, 2]).hash_pair(), None);
    }

    #[test]
    fn test_digest_width() {
        fn three_words(_data: &[u8]) -> DigestOutput {
            DigestOutput::Bytes(vec![7; 12])
        }
        fn short(_data: &[u8]) -> DigestOutput {
            DigestOutput::Bytes(vec![7; 3])
        }

        assert_eq!(HashFunction::Sha1.digest_width().unwrap(), 5);
        assert_eq!(HashFunction::Times33.digest_width().unwrap(), 2);
        let custom = HashFunction::Custom(three_words);
        assert_eq!(custom.digest_width().unwrap(), 3);
        assert!(matches!(
            HashFunction::Custom(short).digest_width(),
            Err(BloomError::EmptyDigest)
        ));
    }

    #[test]
    fn test_parse_hash_function() {
        assert!(matches!("md5".parse::<HashFunction>(), Ok(HashFunction::Md5)));
        assert!(matches!(
            "MURMUR3_FNV".parse::<HashFunction>(),
            Ok(HashFunction::Murmur3Fnv)
        ));
        assert!(matches!(
            "crc32".parse::<HashFunction>(),
            Err(BloomError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_optimal_sizes() {
        assert_eq!(optimal_num_bits(100_000, 1e-7), 3_354_770);
        assert_eq!(optimal_num_hashes(100_000, 3_354_770), 23);
        assert_eq!(optimal_num_bits(1_000, 0.01), 9_585);
        assert_eq!(optimal_num_hashes(1_000, 9_585), 7);
        // never below one hash function
        assert_eq!(optimal_num_hashes(1_000, 10), 1);
    }
}
