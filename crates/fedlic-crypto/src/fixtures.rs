//! RSA fixtures for tests: an issuer key (PKCS#8 and PKCS#1 encodings), its
//! self-signed certificate and public key, and an unrelated certificate.
//!
//! Available to other crates through the `test-support` feature.

use crate::anchor::TrustAnchor;
use crate::signing::SigningKey;

pub const PRIVATE_KEY_PEM: &str = include_str!("../testdata/signing.key");
pub const PKCS1_PRIVATE_KEY_PEM: &str = include_str!("../testdata/signing-pkcs1.key");
pub const CERTIFICATE_PEM: &str = include_str!("../testdata/signing.crt");
pub const PUBLIC_KEY_PEM: &str = include_str!("../testdata/signing.pub");
pub const OTHER_CERTIFICATE_PEM: &str = include_str!("../testdata/other.crt");

/// The issuer key matching [`CERTIFICATE_PEM`].
pub fn signing_key() -> SigningKey {
    SigningKey::from_pem(PRIVATE_KEY_PEM).expect("fixture key parses")
}

/// The anchor built from [`CERTIFICATE_PEM`].
pub fn trust_anchor() -> TrustAnchor {
    TrustAnchor::from_pem(CERTIFICATE_PEM).expect("fixture certificate parses")
}
