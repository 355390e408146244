//! # fedlic-crypto — Cryptographic Primitives
//!
//! Provides the cryptographic building blocks for license verification:
//!
//! - **RSA PKCS#1 v1.5 / SHA-256** signing and verification over
//!   `CanonicalBytes` (the only accepted input type).
//! - **[`TrustAnchor`]**: the issuer public key, loaded from a certificate
//!   or public-key PEM and injected wherever signatures are checked.
//! - **SHA-256** digests of canonical payloads.
//!
//! ## Crate Policy
//!
//! - Depends only on `fedlic-core` internally.
//! - No mocking of cryptographic operations in tests: all tests use real
//!   keys from `testdata/`, real SHA-256 and real RSA.

pub mod anchor;
pub mod error;
pub mod sha256;
pub mod signing;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use anchor::TrustAnchor;
pub use error::CryptoError;
pub use sha256::{sha256_digest, sha256_hex};
pub use signing::{sign_record, signed, verify, verify_record, SigningKey, DEFAULT_KEY_BITS};
