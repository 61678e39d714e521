//! Needle normalization.
//!
//! Every needle is folded into a canonical form before trigrams are taken
//! from it: lowercase ASCII letters separated by single spaces. Accented
//! letters lose their marks (`é` becomes `e`), anything else that is not a
//! letter becomes a word break.

use unicode_normalization::UnicodeNormalization;

/// Fold `text` into lowercase ASCII letters and single spaces.
///
/// Never fails; the result may be empty.
pub fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();

    let folded = if is_plain(&lower) {
        lower
    } else {
        lower
            .nfkd()
            .filter(char::is_ascii)
            .map(|c| if c.is_ascii_lowercase() { c } else { ' ' })
            .collect()
    };

    collapse_spaces(&folded)
}

/// Already lowercase letters and spaces only (the common case).
#[inline]
fn is_plain(text: &str) -> bool {
    text.bytes().all(|b| b.is_ascii_lowercase() || b == b' ')
}

/// Squeeze whitespace runs to one space and trim both ends
fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
