//! Vanity prefix matching over the hex form of 20-byte addresses.

mod pattern;

pub use pattern::{MatchResult, Pattern};
