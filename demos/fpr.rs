use bitbloom_rs::{
    BloomFilter, BloomFilterConfigBuilder, HashFunction, OffsetScheme,
    common::{absent_cuid, bits2hr, cuid},
};
use comfy_table::{
    Cell, CellAlignment, ContentArrangement, Table,
    modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};
use std::time::Instant;

const PROBES: usize = 100_000;
const CAPACITIES: [usize; 2] = [10_000, 100_000];
const TARGET_FPRS: [f64; 2] = [0.01, 0.0001];

fn header(title: &str) -> Cell {
    Cell::new(title).set_alignment(CellAlignment::Center)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Observed false positive rate per digest and offset scheme");
    println!("Each filter is filled to capacity with synthetic client ids,");
    println!("then probed with {PROBES} ids that were never inserted.\n");

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header("Digest"),
            header("Scheme"),
            header("Capacity"),
            header("Target FPR"),
            header("k"),
            header("Memory"),
            header("False Positives"),
            header("Observed FPR"),
            header("Insert time"),
        ]);

    for hash_function in [
        HashFunction::Sha1,
        HashFunction::Md5,
        HashFunction::Times33,
        HashFunction::Murmur3Fnv,
    ] {
        for scheme in [OffsetScheme::Seeded, OffsetScheme::DoubleHashing] {
            for capacity in CAPACITIES {
                for target in TARGET_FPRS {
                    let config = BloomFilterConfigBuilder::default()
                        .capacity(capacity)
                        .false_positive_rate(target)
                        .hash_function(hash_function)
                        .scheme(scheme)
                        .build()?;
                    let mut filter = BloomFilter::new(config)?;

                    let started = Instant::now();
                    for i in 0..capacity {
                        filter.put(&cuid(i))?;
                    }
                    let insert_time = started.elapsed();

                    let mut false_positives = 0;
                    for i in 0..PROBES {
                        if filter.contains(&absent_cuid(i))? {
                            false_positives += 1;
                        }
                    }
                    let observed = false_positives as f64 / PROBES as f64;

                    table.add_row(vec![
                        Cell::new(hash_function),
                        Cell::new(format!("{scheme:?}")),
                        Cell::new(capacity),
                        Cell::new(format!("{:.2}%", target * 100.0)),
                        Cell::new(filter.params().num_hashes),
                        Cell::new(bits2hr(filter.params().bit_size)),
                        Cell::new(format!("{false_positives}/{PROBES}")),
                        Cell::new(format!("{:.4}%", observed * 100.0)),
                        Cell::new(format!("{insert_time:.2?}")),
                    ]);
                }
            }
        }
    }

    println!("{table}");
    Ok(())
}
