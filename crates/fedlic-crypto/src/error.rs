//! Error types for key handling, signing and verification.
//!
//! The `Display` text of these errors is surfaced verbatim as the `reason`
//! of an `InvalidSignature` violation, so messages name the failing step.

use fedlic_core::CanonicalizationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    /// Private or public key material could not be parsed.
    #[error("key format error: {0}")]
    KeyFormat(String),

    /// The trust certificate could not be parsed or holds no RSA key.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// The RSA signing operation failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The signature does not match the payload under the trust anchor.
    #[error("verification failed: {0}")]
    Verification(String),

    /// The signature field is not valid base64.
    #[error("signature encoding error: {0}")]
    SignatureEncoding(String),

    /// The record could not be brought into canonical form.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
