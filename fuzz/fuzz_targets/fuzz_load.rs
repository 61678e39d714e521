#![no_main]

use fuzzmap::{Limits, TrigramMap};
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;
use tempfile::TempDir;

static SCRATCH: OnceLock<TempDir> = OnceLock::new();

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must load cleanly or fail with an error, never panic
    let dir = SCRATCH.get_or_init(|| TempDir::new().expect("scratch dir"));
    let path = dir.path().join("input.trigrams");
    std::fs::write(&path, data).expect("write input");

    if let Ok(map) = TrigramMap::load(&path, Limits::default()) {
        let stats = map.stats().expect("open map");
        let matches = map.find("a", 1024).expect("find");
        assert!(matches.len() <= stats.references as usize);
    }
});
