//! # License Verifier
//!
//! Turns a license record into exactly one [`Violation`]. Evaluation is
//! ordered and stops at the first failure:
//!
//! 1. Empty record (no id) gives `EmptyLicense`.
//! 2. Signature check against the trust anchor gives `InvalidSignature`.
//! 3. The record's validity window, then each component's window in order,
//!    gives `TimeNotStart` / `TimeExpired`.
//! 4. Each [`Checker`] in order.
//!
//! Nothing here performs I/O or reads the clock; `now` is always passed in.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fedlic_core::{LicenseRecord, Violation, ViolationType};
use fedlic_crypto::TrustAnchor;

use crate::checker::Checker;

/// Verifies records against an injected trust anchor.
#[derive(Debug, Clone)]
pub struct LicenseVerifier {
    anchor: Arc<TrustAnchor>,
}

impl LicenseVerifier {
    pub fn new(anchor: Arc<TrustAnchor>) -> Self {
        Self { anchor }
    }

    pub fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    /// Check the record's signature. The failure reason is the underlying
    /// crypto error text.
    pub fn verify(&self, record: &LicenseRecord) -> Result<(), Violation> {
        fedlic_crypto::verify_record(record, &self.anchor)
            .map_err(|e| Violation::invalid_signature(e.to_string()))
    }

    /// Check the record's validity window, then each component's window in
    /// array order. Window bounds are inclusive.
    pub fn is_expired(record: &LicenseRecord, now: DateTime<Utc>) -> Violation {
        if let Some(v) = window_violation(record.not_before, record.not_after, now) {
            return v;
        }
        for component in &record.components {
            if let Some(v) = window_violation(component.not_before, component.not_after, now) {
                return v.with_component(component.name.clone());
            }
        }
        Violation::none()
    }

    /// The next instant after `now` at which [`is_expired`](Self::is_expired)
    /// can change its answer, over the record's own window and every
    /// component window. `None` when no bound lies ahead.
    ///
    /// A start bound takes effect at the bound itself; an end bound once
    /// it has passed, so the instant returned for it is just after it.
    pub fn next_transition(record: &LicenseRecord, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        std::iter::once((record.not_before, record.not_after))
            .chain(record.components.iter().map(|c| (c.not_before, c.not_after)))
            .flat_map(|(start, end)| [start, end.map(|e| e + Duration::milliseconds(1))])
            .flatten()
            .filter(|t| *t > now)
            .min()
    }

    /// Full ordered evaluation.
    pub fn check(
        &self,
        record: &LicenseRecord,
        now: DateTime<Utc>,
        checkers: &[&dyn Checker],
    ) -> Violation {
        if record.is_empty() {
            return Violation::empty_license();
        }
        if let Err(v) = self.verify(record) {
            tracing::debug!(license_id = %record.id, violation = %v, "signature rejected");
            return v;
        }
        let expiry = Self::is_expired(record, now);
        if !expiry.is_none() {
            return expiry;
        }
        checkers
            .iter()
            .map(|c| c.check(record))
            .find(|v| !v.is_none())
            .unwrap_or_default()
    }

    /// Evaluate a raw stored payload. A missing or blank payload is an empty
    /// license; a payload that does not decode is a format error. The record
    /// is returned whenever it decoded.
    pub fn check_payload(
        &self,
        payload: Option<&str>,
        now: DateTime<Utc>,
        checkers: &[&dyn Checker],
    ) -> (Option<LicenseRecord>, Violation) {
        let Some(raw) = payload.filter(|s| !s.trim().is_empty()) else {
            return (None, Violation::empty_license());
        };
        match LicenseRecord::from_json(raw) {
            Ok(record) => {
                let violation = self.check(&record, now, checkers);
                (Some(record), violation)
            }
            Err(e) => (None, Violation::format_error(e.to_string())),
        }
    }
}

fn window_violation(
    not_before: Option<DateTime<Utc>>,
    not_after: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<Violation> {
    let kind = match (not_before, not_after) {
        (Some(start), _) if now < start => ViolationType::TimeNotStart,
        (_, Some(end)) if now > end => ViolationType::TimeExpired,
        _ => return None,
    };
    Some(Violation::time(kind, not_before, not_after))
}
