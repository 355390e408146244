//! # SHA-256 Digest Computation
//!
//! Digests are computed only from [`CanonicalBytes`], so every signed or
//! verified payload has gone through canonicalization first.

use fedlic_core::CanonicalBytes;
use sha2::{Digest, Sha256};

/// SHA-256 of canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> [u8; 32] {
    Sha256::digest(data.as_bytes()).into()
}

/// SHA-256 of canonical bytes as lowercase hex.
pub fn sha256_hex(data: &CanonicalBytes) -> String {
    to_hex(&sha256_digest(data))
}

/// SHA-256 fingerprint of arbitrary DER material (keys, certificates).
pub(crate) fn fingerprint(der: &[u8]) -> String {
    to_hex(&Sha256::digest(der))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
