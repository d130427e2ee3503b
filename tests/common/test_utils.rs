use bitbloom_rs::{BloomFilter, BloomFilterConfigBuilder, HashFunction};
use std::{fs, path::PathBuf};

/// Dump file pair (bit buffer plus `.json` description) removed on drop
#[allow(dead_code)]
pub struct TestDump {
    path: PathBuf,
}

impl TestDump {
    /// Create a dump location named after the test
    #[allow(dead_code)]
    pub fn new(test_name: &str) -> Self {
        let name = format!(
            "bitbloom_test_{}_{}.bin",
            test_name,
            std::process::id()
        );
        let path = std::env::temp_dir().join(name);
        Self { path }
    }

    #[allow(dead_code)]
    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }

    #[allow(dead_code)]
    pub fn snapshot_path(&self) -> PathBuf {
        self.path.with_extension("bin.json")
    }
}

impl Drop for TestDump {
    fn drop(&mut self) {
        for path in [self.path(), self.snapshot_path()] {
            if path.exists() {
                let _ = fs::remove_file(path);
            }
        }
    }
}

#[allow(dead_code)]
pub fn create_filter(
    capacity: usize,
    fpr: f64,
    hash_function: HashFunction,
) -> BloomFilter {
    let config = BloomFilterConfigBuilder::default()
        .capacity(capacity)
        .false_positive_rate(fpr)
        .hash_function(hash_function)
        .build()
        .expect("Failed to build test config");
    BloomFilter::new(config).expect("Failed to create test filter")
}
