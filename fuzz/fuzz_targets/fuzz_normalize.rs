#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let normalized = fuzzmap::normalize(text);
    assert!(normalized.bytes().all(|b| b.is_ascii_lowercase() || b == b' '));
    assert_eq!(fuzzmap::normalize(&normalized), normalized);

    let trigrams = fuzzmap::utils::needle_trigrams(&normalized);
    assert!(trigrams.iter().all(|&t| fuzzmap::utils::is_valid_trigram(t)));
});
