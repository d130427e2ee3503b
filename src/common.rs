// Helper method to format bytes in human-readable form
pub fn bytes2hr(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Backing storage needed for `bits` bits, in human-readable form
pub fn bits2hr(bits: usize) -> String {
    bytes2hr(bits.div_ceil(8))
}

/// Synthetic 51 character identifier, shaped like a client id, used by load
/// tests and demos. Distinct `i` give distinct keys.
pub fn cuid(i: usize) -> String {
    let raw =
        format!("{:0>51}{}000000000{}0000000000{}", "", i, i % 56789, i);
    raw[raw.len() - 51..].to_string()
}

/// Synthetic identifier that never collides with [`cuid`]
pub fn absent_cuid(i: usize) -> String {
    let raw = format!("{:0>51}299900000000000000{}", "", i);
    raw[raw.len() - 51..].to_string()
}
