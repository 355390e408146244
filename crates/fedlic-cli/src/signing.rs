//! # Key Generation and Record Signing
//!
//! Wraps `fedlic-crypto` so issuers can produce key pairs and signed
//! license records from the command line.
//!
//! The signature always covers the canonical form of the record without its
//! `signature` field, so a record can be re-signed in place and pretty
//! printing of the output does not affect verification.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use fedlic_core::LicenseRecord;
use fedlic_crypto::{signed, SigningKey, DEFAULT_KEY_BITS};

/// Smallest modulus accepted by `keygen`.
pub const MIN_KEY_BITS: usize = 1024;

/// Arguments for `fedlic keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Output directory for the key files.
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,
    /// Prefix for the key file names.
    #[arg(long, default_value = "fedlic")]
    pub prefix: String,
    /// RSA modulus size in bits.
    #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
    pub bits: usize,
}

/// Arguments for `fedlic sign`.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Issuer private key (PKCS#8 or PKCS#1 PEM).
    #[arg(long)]
    pub key: PathBuf,
    /// License record JSON to sign.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// Write the signed record here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    cmd_keygen(&args.output, &args.prefix, args.bits)
}

pub fn run_sign(args: &SignArgs) -> Result<u8> {
    let signed = cmd_sign(&args.key, &args.file)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{signed}\n"))
                .with_context(|| format!("failed to write signed record: {}", path.display()))?;
            println!("OK: signed record written to {}", path.display());
        }
        None => println!("{signed}"),
    }
    Ok(0)
}

/// Generate an RSA key pair and write `{prefix}.key` and `{prefix}.pub`.
fn cmd_keygen(output_dir: &Path, prefix: &str, bits: usize) -> Result<u8> {
    if bits < MIN_KEY_BITS {
        bail!("key size {bits} is below the minimum of {MIN_KEY_BITS} bits");
    }
    std::fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "failed to create output directory: {}",
            output_dir.display()
        )
    })?;

    tracing::info!(bits, "generating RSA key pair");
    let key = SigningKey::generate(bits).context("key generation failed")?;
    let private_pem = key.to_pkcs8_pem()?;
    let public_pem = key.public_key_pem()?;
    let fingerprint = key.trust_anchor()?.fingerprint().to_string();

    let key_path = output_dir.join(format!("{prefix}.key"));
    let pub_path = output_dir.join(format!("{prefix}.pub"));

    write_private(&key_path, &private_pem)
        .with_context(|| format!("failed to write private key: {}", key_path.display()))?;
    std::fs::write(&pub_path, &public_pem)
        .with_context(|| format!("failed to write public key: {}", pub_path.display()))?;

    println!("OK: generated {bits}-bit RSA key pair");
    println!("  Private key: {}", key_path.display());
    println!("  Public key:  {}", pub_path.display());
    println!("  Fingerprint: {fingerprint}");

    Ok(0)
}

/// Sign the record in `file_path`, returning the signed record as JSON.
fn cmd_sign(key_path: &Path, file_path: &Path) -> Result<String> {
    if !key_path.exists() {
        bail!("private key file not found: {}", key_path.display());
    }
    let key = SigningKey::from_file(key_path)
        .with_context(|| format!("failed to load private key: {}", key_path.display()))?;

    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read record: {}", file_path.display()))?;
    let record = LicenseRecord::from_json(&content)
        .with_context(|| format!("invalid license record: {}", file_path.display()))?;
    if record.is_empty() {
        bail!("record has no id: {}", file_path.display());
    }
    if record.license_type().is_none() {
        tracing::warn!(
            license_type = %record.license_type,
            "unknown license type; the record will evaluate to InvalidType"
        );
    }

    let signed = signed(&record, &key)?;
    tracing::debug!(license_id = %signed.id, "record signed");
    crate::to_pretty_json(&signed)
}

#[cfg(unix)]
fn write_private(path: &Path, pem: &str) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(pem.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, pem: &str) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(pem.as_bytes())
}
