use bitbloom_rs::{
    BloomFilter, BloomFilterConfig, BloomFilterConfigBuilder, FilterSnapshot,
    HashFunction, OffsetScheme,
    bloom::config::DEFAULT_MAX_HASH_FUNCTIONS,
    common::{absent_cuid, bits2hr, cuid},
};
use clap::{Parser, Subcommand, ValueEnum};
use std::{
    fs,
    io::{self, BufRead},
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scheme {
    Seeded,
    DoubleHashing,
}

impl From<Scheme> for OffsetScheme {
    fn from(scheme: Scheme) -> Self {
        match scheme {
            Scheme::Seeded => OffsetScheme::Seeded,
            Scheme::DoubleHashing => OffsetScheme::DoubleHashing,
        }
    }
}

#[derive(clap::Args)]
struct Sizing {
    /// Expected number of insertions
    #[arg(short, long, default_value = "10000")]
    capacity: usize,

    /// False positive rate (between 0 and 1)
    #[arg(short, long, default_value = "0.0000001")]
    fpr: f64,

    /// Digest function: sha1, md5, times33 or murmur3_fnv
    #[arg(long = "hash", default_value = "sha1")]
    hash_function: HashFunction,

    /// How offsets are derived from digests
    #[arg(long, value_enum, default_value = "seeded")]
    scheme: Scheme,
}

impl Sizing {
    fn config(
        &self,
    ) -> Result<BloomFilterConfig, Box<dyn std::error::Error>> {
        Ok(BloomFilterConfigBuilder::default()
            .capacity(self.capacity)
            .false_positive_rate(self.fpr)
            .hash_function(self.hash_function)
            .scheme(self.scheme.into())
            .build()?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bit array size and hash count for a configuration
    Size {
        #[command(flatten)]
        sizing: Sizing,
    },

    /// Build a filter from keys, one per line, and dump it to a file
    Build {
        #[command(flatten)]
        sizing: Sizing,

        /// File with keys; reads stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output path for the bit buffer; the description goes next to it
        /// with a `.json` suffix
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Check keys against a dumped filter
    Check {
        /// Path of the dumped bit buffer
        #[arg(short = 'F', long)]
        filter: PathBuf,

        /// Keys to check
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Measure the observed false positive rate with synthetic keys
    Fpr {
        #[command(flatten)]
        sizing: Sizing,

        /// Number of keys to insert; defaults to the capacity
        #[arg(short, long)]
        inserts: Option<usize>,

        /// Number of absent keys to probe
        #[arg(short, long, default_value = "100000")]
        probes: usize,
    },

    /// Add or check keys in a filter kept in Redis
    #[cfg(feature = "redis")]
    Redis {
        #[command(flatten)]
        sizing: Sizing,

        #[arg(
            long,
            env = "REDIS_URL",
            default_value = "redis://127.0.0.1:6379"
        )]
        redis_url: String,

        /// Redis key holding the filter bits
        #[arg(short, long, default_value = bitbloom_rs::bloom::DEFAULT_KEY)]
        key: String,

        /// Insert the keys instead of checking them
        #[arg(long)]
        add: bool,

        #[arg(required = true)]
        keys: Vec<String>,
    },
}

#[cfg(feature = "redis")]
async fn run_redis(
    config: BloomFilterConfig,
    redis_url: &str,
    key: &str,
    add: bool,
    keys: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    use bitbloom_rs::{AsyncBloomFilter, RedisProvider};
    use std::sync::Arc;

    let provider = Arc::new(RedisProvider::connect(redis_url).await?);
    let filter = AsyncBloomFilter::remote_batched(config, provider, key)?;
    for item in keys {
        if add {
            let changed = filter.put(item).await?;
            println!("{item}: {}", if changed { "added" } else { "present" });
        } else {
            let verdict = if filter.contains(item).await? {
                "possibly present"
            } else {
                "absent"
            };
            println!("{item}: {verdict}");
        }
    }
    Ok(())
}

fn snapshot_path(out: &Path) -> PathBuf {
    let mut name = out.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

fn read_keys(
    input: Option<&Path>,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let lines: Vec<String> = match input {
        Some(path) => fs::read_to_string(path)?
            .lines()
            .map(str::to_string)
            .collect(),
        None => io::stdin().lock().lines().collect::<Result<_, _>>()?,
    };
    Ok(lines.into_iter().filter(|line| !line.is_empty()).collect())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Size { sizing } => {
            let params =
                sizing.config()?.evaluate(DEFAULT_MAX_HASH_FUNCTIONS);
            println!("Capacity: {}", params.capacity);
            println!("False positive rate: {}", params.false_positive_rate);
            println!("Bits: {}", params.bit_size);
            println!("Hash functions: {}", params.num_hashes);
            println!("Memory: {}", bits2hr(params.bit_size));
        }
        Commands::Build { sizing, input, out } => {
            let keys = read_keys(input.as_deref())?;
            let mut filter = BloomFilter::new(sizing.config()?)?;
            let started = Instant::now();
            for key in &keys {
                filter.put(key)?;
            }
            info!(
                keys = keys.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Inserted keys"
            );

            fs::write(&out, filter.to_bytes()?)?;
            let sidecar = snapshot_path(&out);
            fs::write(&sidecar, filter.snapshot()?.to_json()?)?;
            println!(
                "Wrote {} ({}) and {}",
                out.display(),
                bits2hr(filter.params().bit_size),
                sidecar.display()
            );
        }
        Commands::Check { filter, keys } => {
            let json = fs::read_to_string(snapshot_path(&filter))?;
            let snapshot = FilterSnapshot::from_json(&json)?;
            let filter =
                BloomFilter::from_snapshot(&snapshot, fs::read(&filter)?)?;
            for key in &keys {
                let verdict = if filter.contains(key)? {
                    "possibly present"
                } else {
                    "absent"
                };
                println!("{key}: {verdict}");
            }
        }
        Commands::Fpr {
            sizing,
            inserts,
            probes,
        } => {
            let inserts = inserts.unwrap_or(sizing.capacity);
            let mut filter = BloomFilter::new(sizing.config()?)?;
            let started = Instant::now();
            for i in 0..inserts {
                filter.put(&cuid(i))?;
            }
            let insert_time = started.elapsed();

            let started = Instant::now();
            let mut false_positives = 0usize;
            for i in 0..probes {
                if filter.contains(&absent_cuid(i))? {
                    false_positives += 1;
                }
            }
            let probe_time = started.elapsed();

            let observed = false_positives as f64 / probes.max(1) as f64;
            println!("Hash function: {}", sizing.hash_function);
            println!(
                "Bits: {} ({}), hash functions: {}",
                filter.params().bit_size,
                bits2hr(filter.params().bit_size),
                filter.params().num_hashes
            );
            println!("Inserted {inserts} keys in {insert_time:?}");
            println!("Probed {probes} absent keys in {probe_time:?}");
            println!(
                "False positives: {false_positives}, \
                 observed rate {observed:.8}, target {}",
                sizing.fpr
            );
            println!("Fill ratio: {:.4}", filter.fill_ratio()?);
        }
        #[cfg(feature = "redis")]
        Commands::Redis {
            sizing,
            redis_url,
            key,
            add,
            keys,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_redis(
                sizing.config()?,
                &redis_url,
                &key,
                add,
                &keys,
            ))?;
        }
    }

    Ok(())
}
