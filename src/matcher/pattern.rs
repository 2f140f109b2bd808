//! Prefix pattern over the textual address form.
//!
//! Case-insensitive patterns compare against the lowercase rendering.
//! Case-sensitive patterns compare against the EIP-55 checksum rendering,
//! which is what users see and copy.

use crate::crypto::Address;

/// Number of hex digits in an address.
const ADDRESS_DIGITS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Match,
    NoMatch,
}

impl MatchResult {
    #[inline]
    pub fn is_match(self) -> bool {
        matches!(self, MatchResult::Match)
    }
}

#[derive(Debug, Clone)]
pub struct Pattern {
    /// Normalized prefix digits, without the 0x marker.
    prefix: String,
    case_sensitive: bool,
    /// Pre-parsed nibbles for allocation-free matching; `None` when the prefix
    /// holds a non-hex character and can never match.
    nibbles: Option<Vec<u8>>,
    /// Only mixed-case work pays for a checksum hash per candidate.
    needs_checksum: bool,
}

fn hex_to_nibbles(hex: &str) -> Option<Vec<u8>> {
    hex.bytes()
        .map(|b| match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        })
        .collect()
}

/// Convert 20-byte address to 40 nibbles on the stack (no heap allocation).
#[inline]
fn addr_to_nibbles(bytes: &[u8; 20]) -> [u8; ADDRESS_DIGITS] {
    let mut nibbles = [0u8; ADDRESS_DIGITS];
    for i in 0..20 {
        nibbles[i * 2] = bytes[i] >> 4;
        nibbles[i * 2 + 1] = bytes[i] & 0x0f;
    }
    nibbles
}

/// Strips a leading `0x`/`0X` address marker.
fn strip_marker(prefix: &str) -> &str {
    prefix
        .strip_prefix("0x")
        .or_else(|| prefix.strip_prefix("0X"))
        .unwrap_or(prefix)
}

impl Pattern {
    /// Creates a prefix pattern. A leading `0x` is accepted and ignored, so
    /// `"0x92e9"` matches the first four hex digits.
    pub fn new(prefix: impl AsRef<str>, case_sensitive: bool) -> Self {
        let digits = strip_marker(prefix.as_ref());
        let prefix = if case_sensitive {
            digits.to_string()
        } else {
            digits.to_lowercase()
        };
        let nibbles = hex_to_nibbles(&prefix);
        let needs_checksum = case_sensitive && prefix.bytes().any(|b| b.is_ascii_alphabetic());
        Self {
            prefix,
            case_sensitive,
            nibbles,
            needs_checksum,
        }
    }

    /// The normalized prefix digits.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// An empty prefix matches every address.
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty()
    }

    /// False when no address can ever match (non-hex characters, or longer
    /// than an address).
    pub fn is_satisfiable(&self) -> bool {
        self.nibbles.is_some() && self.prefix.len() <= ADDRESS_DIGITS
    }

    #[inline]
    pub fn matches(&self, address: &Address) -> MatchResult {
        let Some(needle) = self.nibbles.as_deref() else {
            return MatchResult::NoMatch;
        };
        if needle.len() > ADDRESS_DIGITS {
            return MatchResult::NoMatch;
        }

        let nibbles = addr_to_nibbles(address.as_bytes());
        let mut matched = nibbles[..needle.len()] == *needle;
        if matched && self.needs_checksum {
            let digits = address.checksum_digits();
            matched = digits[..needle.len()] == *self.prefix.as_bytes();
        }

        if matched {
            MatchResult::Match
        } else {
            MatchResult::NoMatch
        }
    }

    /// Expected attempts for one match.
    ///
    /// Each hex digit has 16 values; in case-sensitive mode every letter also
    /// has to land on the right case, which halves the odds again.
    pub fn estimated_difficulty(&self) -> u64 {
        let letters = if self.case_sensitive {
            self.prefix.bytes().filter(|b| b.is_ascii_alphabetic()).count()
        } else {
            0
        };
        16u64
            .saturating_pow(self.prefix.len() as u32)
            .saturating_mul(2u64.saturating_pow(letters as u32))
    }

    pub fn difficulty_description(&self) -> String {
        match self.estimated_difficulty() {
            0..=1_000 => "Very Easy (< 1 second)".into(),
            1_001..=100_000 => "Easy (seconds)".into(),
            100_001..=10_000_000 => "Medium (minutes)".into(),
            10_000_001..=1_000_000_000 => "Hard (hours)".into(),
            _ => "Very Hard (days or more)".into(),
        }
    }
}
