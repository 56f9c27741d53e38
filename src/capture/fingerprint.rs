//! Duplicate-detection fingerprints.
//!
//! A fingerprint is derived from the URL with its query string removed, so
//! the same manifest fetched with rotating tokens counts once.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

// ============================================================================
// FingerprintScheme
// ============================================================================

/// How fingerprints are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintScheme {
    /// 31-multiplier rolling hash folded into an `i32`, rendered base 36.
    ///
    /// Distinct URLs can collide; the later one is then dropped as a
    /// duplicate.
    Legacy,
    /// Hex SHA-256 digest of the normalized URL.
    #[default]
    Sha256,
}

impl FingerprintScheme {
    /// Computes the fingerprint of `url` under this scheme.
    #[must_use]
    pub fn fingerprint(self, url: &str) -> Fingerprint {
        let base = strip_query(url);
        let value = match self {
            Self::Legacy => to_base36(u64::from(folded_hash(base).unsigned_abs())),
            Self::Sha256 => hex::encode(Sha256::digest(base.as_bytes())),
        };
        Fingerprint(value)
    }
}

impl FromStr for FingerprintScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "sha256" => Ok(Self::Sha256),
            other => Err(Error::invalid_argument(format!(
                "unknown fingerprint scheme: {other}"
            ))),
        }
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Short identifier used to detect duplicate submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Returns the fingerprint text.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Returns the URL up to (not including) the first `?`.
#[inline]
#[must_use]
pub fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

/// `h = h * 31 + unit` over UTF-16 code units, wrapping at 32 bits.
fn folded_hash(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if n == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_query() {
        assert_eq!(strip_query("https://a/b.m3u8?x=1?y=2"), "https://a/b.m3u8");
        assert_eq!(strip_query("https://a/b.m3u8"), "https://a/b.m3u8");
    }

    #[test]
    fn test_folded_hash_reference_values() {
        assert_eq!(folded_hash(""), 0);
        assert_eq!(folded_hash("a"), 97);
        assert_eq!(folded_hash("ab"), 97 * 31 + 98);
        // "hello".hashCode() in the 31-multiplier scheme.
        assert_eq!(folded_hash("hello"), 99_162_322);
    }

    #[test]
    fn test_folded_hash_wraps() {
        // Long inputs overflow 32 bits and must not panic.
        let long = "x".repeat(10_000);
        let _ = folded_hash(&long);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(99_162_322), "1n1e4y");
    }

    #[test]
    fn test_legacy_min_value_is_positive() {
        // |i32::MIN| does not fit in i32; the fingerprint still renders.
        assert_eq!(to_base36(u64::from(i32::MIN.unsigned_abs())), "zik0zk");
    }

    #[test]
    fn test_query_is_ignored() {
        for scheme in [FingerprintScheme::Legacy, FingerprintScheme::Sha256] {
            let a = scheme.fingerprint("https://cdn.example.com/master.m3u8?token=abc");
            let b = scheme.fingerprint("https://cdn.example.com/master.m3u8?token=xyz");
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_distinct_paths_differ() {
        let a = FingerprintScheme::Sha256.fingerprint("https://cdn.example.com/a.m3u8");
        let b = FingerprintScheme::Sha256.fingerprint("https://cdn.example.com/b.m3u8");
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!(
            "legacy".parse::<FingerprintScheme>().expect("parse"),
            FingerprintScheme::Legacy
        );
        assert!("md5".parse::<FingerprintScheme>().is_err());
        assert_eq!(FingerprintScheme::default(), FingerprintScheme::Sha256);
    }
}
