use crate::index::types::Trigram;

/// Symbol radix of a trigram code. Only 27 symbols are produced (boundary
/// plus `a`..=`z`); the stored format keeps base 28.
pub const TRIGRAM_BASE: u16 = 28;

/// Number of distinct trigram codes (28^3)
pub const TRIGRAM_COUNT: u16 = TRIGRAM_BASE * TRIGRAM_BASE * TRIGRAM_BASE;

/// Boundary symbol: pads every needle and stands in for spaces, so each
/// word contributes its own prefix and suffix trigrams
const SENTINEL: u8 = 0;

/// Map one byte of a normalized needle to its symbol (letters take 1..=26)
#[inline]
fn symbol(byte: u8) -> u8 {
    match byte {
        b'a'..=b'z' => byte - b'a' + 1,
        _ => SENTINEL,
    }
}

/// Convert 3 symbols to a trigram code
#[inline]
pub fn symbols_to_trigram(s0: u8, s1: u8, s2: u8) -> Trigram {
    s0 as u16 + TRIGRAM_BASE * s1 as u16 + TRIGRAM_BASE * TRIGRAM_BASE * s2 as u16
}

/// Extract the distinct trigrams of an already-normalized needle.
///
/// The needle is padded with two leading and one trailing sentinel, so a
/// needle of `n` bytes has `n + 1` windows; the empty needle yields the
/// single all-sentinel trigram. The result is sorted and deduplicated.
pub fn needle_trigrams(normalized: &str) -> Vec<Trigram> {
    let mut padded = Vec::with_capacity(normalized.len() + 3);
    padded.push(SENTINEL);
    padded.push(SENTINEL);
    padded.extend(normalized.bytes().map(symbol));
    padded.push(SENTINEL);

    let mut trigrams: Vec<Trigram> = padded
        .windows(3)
        .map(|w| symbols_to_trigram(w[0], w[1], w[2]))
        .collect();
    trigrams.sort_unstable();
    trigrams.dedup();
    trigrams
}

/// Whether `code` can have been produced by [`symbols_to_trigram`]
#[inline]
pub fn is_valid_trigram(code: Trigram) -> bool {
    code < TRIGRAM_COUNT
}

/// Render a trigram for diagnostics, `*` marking a boundary
pub fn trigram_to_string(code: Trigram) -> String {
    let mut out = String::with_capacity(3);
    let mut rest = code;
    for _ in 0..3 {
        let sym = (rest % TRIGRAM_BASE) as u8;
        rest /= TRIGRAM_BASE;
        out.push(match sym {
            SENTINEL => '*',
            letter @ 1..=26 => (b'a' + letter - 1) as char,
            _ => '?',
        });
    }
    out
}
