// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes and the short-hash used in job, worktree, and
//! branch names.
//!
//! Skybridge ids embed human-readable context (`github-issues.opened-…`)
//! so they are string-backed rather than fixed-width buffers. The
//! [`ShortHash`] suffix carries the entropy: eight hex characters taken
//! from a random 128-bit value, enough to keep directory and branch
//! names distinct across retries and duplicated webhooks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returns a string slice truncated to at most `n` characters.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

/// Number of hex characters in a [`ShortHash`].
pub const SHORT_HASH_LEN: usize = 8;

/// Errors from parsing a [`ShortHash`] out of an existing name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShortHashError {
    #[error("short hash must be exactly {SHORT_HASH_LEN} characters, got {0}")]
    BadLength(usize),
    #[error("short hash must be lowercase hex, got {0:?}")]
    NotHex(String),
}

/// Eight lowercase hex characters derived from a random 128-bit value.
///
/// Stable for the lifetime of one job attempt; regenerated for retries so
/// that worktree and branch names never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortHash([u8; SHORT_HASH_LEN]);

impl ShortHash {
    /// Generate a fresh hash from a random 128-bit value.
    pub fn generate() -> Self {
        let hex = format!("{:032x}", uuid::Uuid::new_v4().as_u128());
        let mut buf = [0u8; SHORT_HASH_LEN];
        buf.copy_from_slice(&hex.as_bytes()[..SHORT_HASH_LEN]);
        Self(buf)
    }

    /// Derive a hash deterministically from a seed string.
    ///
    /// Used at intake so a redelivered webhook (same delivery id) maps to
    /// the same job id and the queue's enqueue idempotency applies.
    pub fn derive(seed: &str) -> Self {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(seed.as_bytes());
        let hex = format!("{:02x}{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2], digest[3]);
        let mut buf = [0u8; SHORT_HASH_LEN];
        buf.copy_from_slice(hex.as_bytes());
        Self(buf)
    }

    /// Parse a hash from an existing name segment.
    pub fn parse(s: &str) -> Result<Self, ShortHashError> {
        if s.len() != SHORT_HASH_LEN {
            return Err(ShortHashError::BadLength(s.len()));
        }
        if !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(ShortHashError::NotHex(s.to_string()));
        }
        let mut buf = [0u8; SHORT_HASH_LEN];
        buf.copy_from_slice(s.as_bytes());
        Ok(Self(buf))
    }

    pub fn as_str(&self) -> &str {
        // Invariant: only constructed from ASCII hex.
        std::str::from_utf8(&self.0).unwrap_or("00000000")
    }
}

impl std::fmt::Display for ShortHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ShortHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ShortHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ShortHash::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Define a string-backed newtype identifier.
///
/// Generates `new()`, `random()` (UUID v4), `as_str()`, `short()`,
/// `is_empty()`, `Display`, `From` conversions, `PartialEq<str>`,
/// `Borrow<str>`, and `Deref` implementations.
///
/// ```ignore
/// crate::define_id! {
///     /// Doc comment for the ID type.
///     pub struct JobId;
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an id from an existing string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a random id (UUID v4, hyphenated).
            pub fn random() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns a string slice truncated to at most `n` characters.
            pub fn short(&self, n: usize) -> &str {
                $crate::id::short(&self.0, n)
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }
    };
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
