//! # Record Verification
//!
//! Runs the same ordered evaluation the server applies: empty record,
//! signature, validity windows and, when counts are given, entitlement
//! limits. Prints the resulting violation as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use fedlic_core::{ResourceCount, ResourceCounts, Violation};
use fedlic_crypto::TrustAnchor;
use fedlic_policy::{Checker, LicenseVerifier, ViolationPolicyEvaluator};

/// Arguments for `fedlic verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Trust certificate or public key PEM.
    #[arg(long)]
    pub cert: PathBuf,
    /// Signed license record JSON.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// Number of clusters in the federation.
    #[arg(long)]
    pub clusters: Option<u64>,
    /// Total node count.
    #[arg(long)]
    pub nodes: Option<u64>,
    /// Total core count.
    #[arg(long)]
    pub cores: Option<u64>,
    /// Evaluate at this RFC 3339 instant instead of now.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

impl VerifyArgs {
    /// Counts to evaluate limits against; `None` when no count was given.
    fn counts(&self) -> Option<ResourceCounts> {
        if self.clusters.is_none() && self.nodes.is_none() && self.cores.is_none() {
            return None;
        }
        Some(ResourceCounts {
            host: ResourceCount {
                core_num: self.cores.unwrap_or(0),
                node_num: self.nodes.unwrap_or(0),
            },
            member: ResourceCount::default(),
            cluster_num: self.clusters.unwrap_or(1),
        })
    }
}

pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let violation = evaluate(args)?;
    println!("{}", crate::to_pretty_json(&violation)?);
    if violation.is_none() {
        Ok(0)
    } else {
        tracing::warn!(%violation, "license is not compliant");
        Ok(1)
    }
}

/// Evaluate the record in `args.file`.
pub fn evaluate(args: &VerifyArgs) -> Result<Violation> {
    let anchor = TrustAnchor::from_file(&args.cert)
        .with_context(|| format!("failed to load trust anchor: {}", args.cert.display()))?;
    tracing::debug!(fingerprint = anchor.fingerprint(), "trust anchor loaded");
    let verifier = LicenseVerifier::new(Arc::new(anchor));

    let payload = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read record: {}", args.file.display()))?;

    let evaluator = args.counts().map(ViolationPolicyEvaluator::new);
    let checkers: Vec<&dyn Checker> = evaluator
        .as_ref()
        .map(|e| e as &dyn Checker)
        .into_iter()
        .collect();

    let now = args.at.unwrap_or_else(Utc::now);
    let (_, violation) = verifier.check_payload(Some(&payload), now, &checkers);
    Ok(violation)
}
