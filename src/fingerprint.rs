//! Canonical request fingerprints used as throttle cache keys.

use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;

/// 64-bit digest of a request path and its query parameters.
///
/// Path and parameters are compared after percent-decoding, and parameter
/// order does not matter: `?q=1&z=2`, `?z=2&q=1` and `?z=2&q=%31` produce the
/// same fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn compute(path: &str, query: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        // Decoded text may contain any delimiter, so every field is length-prefixed.
        update_field(&mut hasher, &percent_decode_str(path).decode_utf8_lossy());

        let pairs = canonical_pairs(query.unwrap_or_default());
        hasher.update((pairs.len() as u64).to_be_bytes());
        for (key, value) in &pairs {
            update_field(&mut hasher, key);
            update_field(&mut hasher, value);
        }

        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Fingerprint(u64::from_be_bytes(prefix))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

fn update_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field.as_bytes());
}

/// Decodes a raw query string into `(key, value)` pairs sorted by key, then
/// value. A pair without `=` gets an empty value; empty segments are skipped.
fn canonical_pairs(query: &str) -> Vec<(Cow<'_, str>, Cow<'_, str>)> {
    let mut pairs: Vec<_> = url::form_urlencoded::parse(query.as_bytes()).collect();
    pairs.sort_unstable();
    pairs
}
