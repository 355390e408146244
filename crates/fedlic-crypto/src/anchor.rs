//! # Trust Anchor
//!
//! The RSA public key every license signature is verified against. It is
//! loaded once at startup from the issuer's certificate and injected into
//! the verifier; there is no global instance.
//!
//! Accepted PEM inputs:
//!
//! - `CERTIFICATE`: an X.509 certificate carrying an RSA subject key.
//! - `PUBLIC KEY`: a SubjectPublicKeyInfo-wrapped RSA key.
//! - `RSA PUBLIC KEY`: a bare PKCS#1 RSA key.

use std::fmt;
use std::path::Path;

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::RsaPublicKey;
use x509_cert::der::{DecodePem, Encode};
use x509_cert::Certificate;

use crate::error::CryptoError;
use crate::sha256::fingerprint;

const CERTIFICATE_LABEL: &str = "-----BEGIN CERTIFICATE-----";
const SPKI_LABEL: &str = "-----BEGIN PUBLIC KEY-----";
const PKCS1_PUBLIC_LABEL: &str = "-----BEGIN RSA PUBLIC KEY-----";

/// The issuer's public key.
#[derive(Clone)]
pub struct TrustAnchor {
    public_key: RsaPublicKey,
    fingerprint: String,
}

impl TrustAnchor {
    /// Wrap an already-parsed RSA public key.
    pub fn from_public_key(public_key: RsaPublicKey) -> Result<Self, CryptoError> {
        let der = public_key
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyFormat(format!("cannot encode public key: {e}")))?;
        Ok(Self {
            fingerprint: fingerprint(der.as_bytes()),
            public_key,
        })
    }

    /// Parse a certificate or public key from PEM text.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let pem = pem.trim();
        if pem.contains(CERTIFICATE_LABEL) {
            let cert = Certificate::from_pem(pem.as_bytes())
                .map_err(|e| CryptoError::Certificate(format!("cannot parse certificate: {e}")))?;
            let spki = cert
                .tbs_certificate
                .subject_public_key_info
                .to_der()
                .map_err(|e| CryptoError::Certificate(format!("cannot encode subject key: {e}")))?;
            let key = RsaPublicKey::from_public_key_der(&spki).map_err(|e| {
                CryptoError::Certificate(format!("certificate does not hold an RSA key: {e}"))
            })?;
            Self::from_public_key(key)
        } else if pem.contains(SPKI_LABEL) {
            let key = RsaPublicKey::from_public_key_pem(pem)
                .map_err(|e| CryptoError::KeyFormat(format!("invalid public key: {e}")))?;
            Self::from_public_key(key)
        } else if pem.contains(PKCS1_PUBLIC_LABEL) {
            let key = RsaPublicKey::from_pkcs1_pem(pem)
                .map_err(|e| CryptoError::KeyFormat(format!("invalid RSA public key: {e}")))?;
            Self::from_public_key(key)
        } else {
            Err(CryptoError::Certificate(
                "expected a CERTIFICATE, PUBLIC KEY or RSA PUBLIC KEY PEM block".to_string(),
            ))
        }
    }

    /// Read and parse a certificate or public key file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|source| CryptoError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_pem(&pem)
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Hex SHA-256 of the DER-encoded public key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrustAnchor({}...)", &self.fingerprint[..16])
    }
}

impl PartialEq for TrustAnchor {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key
    }
}

impl Eq for TrustAnchor {}
