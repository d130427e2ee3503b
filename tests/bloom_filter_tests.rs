mod common;

use bitbloom_rs::{
    BloomError, BloomFilter, BloomFilterConfigBuilder, BloomFilterStats,
    BloomParams, DigestOutput, HashFunction, OffsetScheme,
    common::{absent_cuid, cuid},
    offsets_for, optimal_num_bits, optimal_num_hashes,
};
use common::test_utils::create_filter;

#[cfg(test)]
mod sizing_tests {
    use super::*;

    #[test]
    fn test_known_sizes() {
        let cases = [
            (100_000, 0.0000001, 3_354_770, 23),
            (10_000, 0.0001, 191_701, 13),
            (1, 0.0000001, 33, 23),
            (100_000, 0.00001, 2_396_264, 17),
            (1_000, 0.01, 9_585, 7),
        ];
        for (capacity, fpr, bits, hashes) in cases {
            assert_eq!(optimal_num_bits(capacity, fpr), bits);
            assert_eq!(optimal_num_hashes(capacity, bits), hashes);
        }
    }

    #[test]
    fn test_filter_reports_evaluated_params() {
        let filter = create_filter(10_000, 0.0001, HashFunction::Sha1);
        assert_eq!(filter.capacity(), 10_000);
        assert_eq!(filter.false_positive_rate(), 0.0001);
        assert_eq!(filter.bit_size(), 191_701);
        assert_eq!(filter.num_hashes(), 13);
        assert_eq!(filter.to_bytes().unwrap().len(), 23_963);
    }

    #[test]
    fn test_rate_too_high_for_minimum_size() {
        let config = BloomFilterConfigBuilder::default()
            .capacity(1)
            .false_positive_rate(0.5)
            .build()
            .unwrap();
        assert!(matches!(
            BloomFilter::new(config),
            Err(BloomError::SizeOutOfRange { bits: 1, .. })
        ));
    }

    #[test]
    fn test_hash_cap_applies() {
        let config = BloomFilterConfigBuilder::default()
            .capacity(100_000)
            .false_positive_rate(0.0000001)
            .max_hash_functions(5)
            .build()
            .unwrap();
        let filter = BloomFilter::new(config).unwrap();
        assert_eq!(
            *filter.params(),
            BloomParams {
                capacity: 100_000,
                false_positive_rate: 0.0000001,
                bit_size: 3_354_770,
                num_hashes: 5,
            }
        );
    }
}

#[cfg(test)]
mod membership_tests {
    use super::*;

    #[test]
    fn test_ten_thousand_keys() {
        let mut filter = create_filter(10_000, 0.0001, HashFunction::Sha1);
        for i in 0..10_000 {
            filter.put(&i.to_string()).unwrap();
        }
        for i in 0..10_000 {
            assert!(
                filter.contains(&i.to_string()).unwrap(),
                "No false negatives allowed for key {i}"
            );
        }
        assert!(!filter.contains("not-inserted-9999999").unwrap());
    }

    #[test]
    fn test_every_digest_has_no_false_negatives() {
        for hash_function in [
            HashFunction::Sha1,
            HashFunction::Md5,
            HashFunction::Times33,
            HashFunction::Murmur3Fnv,
        ] {
            for scheme in [OffsetScheme::Seeded, OffsetScheme::DoubleHashing]
            {
                let config = BloomFilterConfigBuilder::default()
                    .capacity(2_000)
                    .false_positive_rate(0.001)
                    .hash_function(hash_function)
                    .scheme(scheme)
                    .build()
                    .unwrap();
                let mut filter = BloomFilter::new(config).unwrap();
                for i in 0..2_000 {
                    filter.put(&cuid(i)).unwrap();
                }
                for i in 0..2_000 {
                    assert!(
                        filter.contains(&cuid(i)).unwrap(),
                        "{hash_function}/{scheme:?} lost key {i}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_false_positive_rate_bound() {
        let capacity = 20_000;
        let target = 0.0001;
        let probes = 100_000;

        for hash_function in [HashFunction::Sha1, HashFunction::Md5] {
            let mut filter = create_filter(capacity, target, hash_function);
            for i in 0..capacity {
                filter.put(&cuid(i)).unwrap();
            }
            let false_positives = (0..probes)
                .filter(|&i| filter.contains(&absent_cuid(i)).unwrap())
                .count();
            let observed = false_positives as f64 / probes as f64;
            assert!(
                observed < target * 10.0,
                "{hash_function}: observed rate {observed} too far above \
                 target {target}"
            );
        }
    }

    #[test]
    fn test_empty_key() {
        let mut filter = create_filter(100, 0.01, HashFunction::Sha1);
        assert!(!filter.contains("").unwrap());
        assert!(filter.put("").unwrap());
        assert!(filter.contains("").unwrap());
    }

    #[test]
    fn test_unicode_keys() {
        let mut filter = create_filter(100, 0.01, HashFunction::Md5);
        filter.put("ключ").unwrap();
        filter.put("鍵🔑").unwrap();
        assert!(filter.contains("ключ").unwrap());
        assert!(filter.contains("鍵🔑").unwrap());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;

    #[test]
    fn test_offsets_are_deterministic_and_in_range() {
        for hash_function in [
            HashFunction::Sha1,
            HashFunction::Md5,
            HashFunction::Times33,
            HashFunction::Murmur3Fnv,
        ] {
            for scheme in [OffsetScheme::Seeded, OffsetScheme::DoubleHashing]
            {
                let first =
                    offsets_for(&hash_function, scheme, "key", 20, 1_000)
                        .unwrap();
                let second =
                    offsets_for(&hash_function, scheme, "key", 20, 1_000)
                        .unwrap();
                assert_eq!(first, second);
                assert_eq!(first.len(), 20);
                assert!(first.iter().all(|&offset| offset < 1_000));
            }
        }
    }

    #[test]
    fn test_same_keys_give_same_bits() {
        let mut a = create_filter(1_000, 0.01, HashFunction::Sha1);
        let mut b = create_filter(1_000, 0.01, HashFunction::Sha1);
        for i in 0..500 {
            a.put(&cuid(i)).unwrap();
        }
        // insertion order does not matter
        for i in (0..500).rev() {
            b.put(&cuid(i)).unwrap();
        }
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
    }

    #[test]
    fn test_put_is_idempotent() {
        let mut filter = create_filter(1_000, 0.01, HashFunction::Sha1);
        assert!(filter.put("apple").unwrap());
        let before = filter.to_bytes().unwrap().to_vec();
        assert!(!filter.put("apple").unwrap());
        assert_eq!(filter.to_bytes().unwrap(), before.as_slice());
    }

    #[test]
    fn test_bits_only_accumulate() {
        let mut filter = create_filter(1_000, 0.01, HashFunction::Times33);
        let mut ratio = filter.fill_ratio().unwrap();
        assert_eq!(ratio, 0.0);
        for i in 0..1_000 {
            filter.put(&cuid(i)).unwrap();
            let next = filter.fill_ratio().unwrap();
            assert!(next >= ratio);
            ratio = next;
            // earlier keys stay present
            assert!(filter.contains(&cuid(i / 2)).unwrap());
        }
        assert!(ratio > 0.0 && ratio < 1.0);
    }

    #[test]
    fn test_times33_vectors() {
        assert_eq!(
            HashFunction::Times33.digest(b"1234").unwrap(),
            DigestOutput::Pair(2_088_290_703, 255_295_403)
        );
        assert_eq!(
            HashFunction::Times33.digest(b"").unwrap(),
            DigestOutput::Pair(5381, 7457)
        );
    }

    #[test]
    fn test_schemes_set_different_bits() {
        let seeded = offsets_for(
            &HashFunction::Sha1,
            OffsetScheme::Seeded,
            "apple",
            8,
            1 << 20,
        )
        .unwrap();
        let double = offsets_for(
            &HashFunction::Sha1,
            OffsetScheme::DoubleHashing,
            "apple",
            8,
            1 << 20,
        )
        .unwrap();
        // both start from the first digest word
        assert_eq!(seeded[0], double[0]);
        assert_ne!(seeded, double);
    }
}

#[cfg(test)]
mod custom_digest_tests {
    use super::*;

    fn xor_fold(data: &[u8]) -> DigestOutput {
        let mut out = vec![0u8; 8];
        for (i, byte) in data.iter().enumerate() {
            out[i % 8] ^= byte.rotate_left(i as u32 % 7);
        }
        DigestOutput::Bytes(out)
    }

    fn empty(_: &[u8]) -> DigestOutput {
        DigestOutput::Bytes(Vec::new())
    }

    #[test]
    fn test_custom_digest() {
        let config = BloomFilterConfigBuilder::default()
            .capacity(100)
            .false_positive_rate(0.01)
            .hash_function(HashFunction::Custom(xor_fold))
            .build()
            .unwrap();
        let mut filter = BloomFilter::new(config).unwrap();
        assert_eq!(filter.num_hashes(), 7);
        filter.put("custom").unwrap();
        assert!(filter.contains("custom").unwrap());
        // a custom digest cannot be described out of band
        assert_eq!(filter.snapshot().unwrap().hash_function.name(), "custom");
    }

    #[test]
    fn test_custom_digest_is_clamped_at_construction() {
        let config = BloomFilterConfigBuilder::default()
            .capacity(1)
            .hash_function(HashFunction::Custom(xor_fold))
            .build()
            .unwrap();
        // 23 offsets wanted, two words per digest and ten seeds give 22
        let mut filter = BloomFilter::new(config).unwrap();
        assert_eq!(filter.num_hashes(), 22);
        assert!(filter.put("key").unwrap());
        assert!(filter.contains("key").unwrap());
    }

    #[test]
    fn test_empty_digest_is_rejected() {
        let config = BloomFilterConfigBuilder::default()
            .capacity(100)
            .false_positive_rate(0.01)
            .hash_function(HashFunction::Custom(empty))
            .build()
            .unwrap();
        assert!(matches!(
            BloomFilter::new(config),
            Err(BloomError::EmptyDigest)
        ));
    }
}
