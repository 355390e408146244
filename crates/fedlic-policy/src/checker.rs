//! Extension point for evaluations that run after a record has passed
//! signature and validity-window checks.

use fedlic_core::{LicenseRecord, Violation};

/// A post-verification check. Returns [`Violation::none()`] when satisfied.
///
/// Checkers run in the order they are passed to
/// [`LicenseVerifier::check`](crate::LicenseVerifier::check); the first one
/// to report a violation ends the evaluation.
pub trait Checker: Send + Sync {
    fn check(&self, record: &LicenseRecord) -> Violation;
}

impl<F> Checker for F
where
    F: Fn(&LicenseRecord) -> Violation + Send + Sync,
{
    fn check(&self, record: &LicenseRecord) -> Violation {
        self(record)
    }
}
