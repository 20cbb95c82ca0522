// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HMAC-SHA256 webhook signature verification.
//!
//! Verification runs over the exact raw body bytes as received — any
//! decode/re-encode round trip would change them and break the
//! contract. Comparison goes through `Mac::verify_slice`, which is
//! constant-time.

use hmac::{Hmac, Mac};
use sb_core::EventSource;
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Outcome of verifying one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Ok,
    InvalidSignature,
    /// The source has no secret configured; the request cannot be
    /// authenticated at all.
    UnconfiguredSource,
}

pub struct SignatureVerifier {
    secrets: HashMap<EventSource, String>,
}

impl SignatureVerifier {
    pub fn new(secrets: HashMap<EventSource, String>) -> Self {
        Self { secrets }
    }

    /// Build from `WEBHOOK_{SOURCE}_SECRET` for the enabled sources.
    pub fn from_env(sources: &[EventSource]) -> Self {
        let secrets = sources
            .iter()
            .filter_map(|source| crate::env::webhook_secret(*source).map(|s| (*source, s)))
            .collect();
        Self::new(secrets)
    }

    /// Verify `header_value` (e.g. `sha256=ab12…`) against the raw body.
    pub fn verify(
        &self,
        source: EventSource,
        raw_body: &[u8],
        header_value: Option<&str>,
    ) -> SignatureCheck {
        let Some(secret) = self.secrets.get(&source) else {
            return SignatureCheck::UnconfiguredSource;
        };
        let Some(header) = header_value else {
            return SignatureCheck::InvalidSignature;
        };
        let Some(hex_digest) = header.strip_prefix(SIGNATURE_PREFIX) else {
            return SignatureCheck::InvalidSignature;
        };
        let Ok(expected) = hex::decode(hex_digest) else {
            return SignatureCheck::InvalidSignature;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return SignatureCheck::InvalidSignature;
        };
        mac.update(raw_body);
        match mac.verify_slice(&expected) {
            Ok(()) => SignatureCheck::Ok,
            Err(_) => SignatureCheck::InvalidSignature,
        }
    }
}

/// Compute the signature header an authentic sender would attach. Used
/// by tests and the redelivery tooling.
pub fn sign(secret: &str, raw_body: &[u8]) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return SIGNATURE_PREFIX.to_string();
    };
    mac.update(raw_body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
