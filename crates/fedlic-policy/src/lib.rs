//! # fedlic-policy — License Evaluation
//!
//! Pure evaluation of a license record into a single
//! [`Violation`](fedlic_core::Violation):
//!
//! - [`LicenseVerifier`]: emptiness, signature, validity windows, then any
//!   number of [`Checker`]s in order.
//! - [`ViolationPolicyEvaluator`]: the per-type resource limit rules, as a
//!   [`Checker`] bound to one set of aggregated counts.
//!
//! No I/O and no clock reads: the trust anchor is injected and `now` is a
//! parameter, so the same inputs always produce the same outcome.

pub mod checker;
pub mod evaluator;
pub mod verifier;

pub use checker::Checker;
pub use evaluator::ViolationPolicyEvaluator;
pub use verifier::LicenseVerifier;
