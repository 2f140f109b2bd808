//! Deterministic iteration -> salt mapping.
//!
//! The iteration index is written big-endian into the low bytes of the salt.
//! With a caller prefix the first 20 bytes carry the caller's address and the
//! counter keeps the remaining 12 bytes, so the mapping stays injective for
//! every `u64` index either way.

use crate::crypto::{Address, Salt};

/// Encodes `iteration` as a salt, optionally behind a 20-byte caller prefix.
#[inline]
pub fn salt_for_iteration(prefix: Option<&Address>, iteration: u64) -> Salt {
    let mut salt = [0u8; 32];
    if let Some(prefix) = prefix {
        salt[0..20].copy_from_slice(prefix.as_bytes());
    }
    salt[24..32].copy_from_slice(&iteration.to_be_bytes());
    Salt(salt)
}

/// Lazy, restartable sequence of `(iteration, salt)` pairs.
#[derive(Debug, Clone)]
pub struct SaltGenerator {
    next: Option<u64>,
    prefix: Option<Address>,
}

impl SaltGenerator {
    /// Starts the sequence at `starting_iteration`.
    pub fn new(starting_iteration: u64) -> Self {
        Self {
            next: Some(starting_iteration),
            prefix: None,
        }
    }

    /// Places `caller` in the first 20 salt bytes, so that only that account's
    /// salts are searched.
    pub fn with_caller(mut self, caller: Address) -> Self {
        self.prefix = Some(caller);
        self
    }

    pub fn prefix(&self) -> Option<&Address> {
        self.prefix.as_ref()
    }

    /// The iteration the next call to `next()` will yield, if any.
    pub fn position(&self) -> Option<u64> {
        self.next
    }

    /// Salt at an arbitrary iteration, independent of the generator's position.
    #[inline]
    pub fn salt_at(&self, iteration: u64) -> Salt {
        salt_for_iteration(self.prefix.as_ref(), iteration)
    }
}

impl Iterator for SaltGenerator {
    type Item = (u64, Salt);

    fn next(&mut self) -> Option<Self::Item> {
        let iteration = self.next?;
        self.next = iteration.checked_add(1);
        Some((iteration, self.salt_at(iteration)))
    }
}
