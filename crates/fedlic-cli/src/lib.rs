//! # fedlic-cli — Operator CLI for fedlic
//!
//! Provides the `fedlic` command-line interface used by license issuers and
//! operators.
//!
//! ## Subcommands
//!
//! - `fedlic keygen` — RSA issuer key pair (PKCS#8 private key, SPKI public key).
//! - `fedlic sign` — Sign a license record JSON file.
//! - `fedlic verify` — Evaluate a record against a trust certificate,
//!   optionally against resource counts.
//! - `fedlic check` — Ask a running server whether the license is compliant.
//!
//! Handlers return the process exit code: `0` when the operation succeeded
//! and the license is compliant, `1` when a violation was reported.
//!
//! ```bash
//! fedlic keygen --output keys --prefix issuer
//! fedlic sign --key keys/issuer.key record.json --output license.json
//! fedlic verify --cert issuer.crt license.json --clusters 2 --nodes 12
//! fedlic check --server http://fedlic.fedlic-system:8080
//! ```

pub mod check;
pub mod signing;
pub mod verify;

/// Render a value as pretty JSON for terminal output.
pub(crate) fn to_pretty_json(value: &impl serde::Serialize) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
