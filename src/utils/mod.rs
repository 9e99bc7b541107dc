use rand::{distributions::Alphanumeric, Rng};
use std::path::PathBuf;

pub fn generate_random_ascii_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// A fresh, not yet created, directory under the system temp dir. Used by tests to isolate bucket files.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("bucketdb-{}", generate_random_ascii_string(16)))
}
