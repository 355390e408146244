//! # Resource Limit Policy
//!
//! Compares aggregated resource counts against the record's entitlement
//! limits. Which limits apply depends on the license type:
//!
//! | Type | Rules (first match wins) |
//! |------|--------------------------|
//! | `subscription` | `clusterNum > maxCluster` then `host+member nodes > maxNode` |
//! | `maintenance` | `host+member cores > maxCore` |
//! | `managed` | `clusterNum > maxCluster` then `host cores > maxCore` |
//!
//! Any other type is `InvalidType`. At most one rule fires per evaluation.

use fedlic_core::{LicenseRecord, LicenseType, ResourceCounts, Violation, ViolationType};

use crate::checker::Checker;

/// Limit checker bound to one set of counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViolationPolicyEvaluator {
    counts: ResourceCounts,
}

impl ViolationPolicyEvaluator {
    pub fn new(counts: ResourceCounts) -> Self {
        Self { counts }
    }

    pub fn counts(&self) -> &ResourceCounts {
        &self.counts
    }

    pub fn evaluate(&self, record: &LicenseRecord) -> Violation {
        let Some(kind) = record.license_type() else {
            return Violation::invalid_type(&record.license_type);
        };
        let c = &self.counts;
        let violation = match kind {
            LicenseType::Subscription => {
                over(ViolationType::ClusterOverflow, c.cluster_num, record.max_cluster)
                    .or_else(|| over(ViolationType::NodeOverflow, c.total_nodes(), record.max_node))
            }
            LicenseType::Maintenance => {
                over(ViolationType::CoreOverflow, c.total_cores(), record.max_core)
            }
            LicenseType::Managed => {
                over(ViolationType::ClusterOverflow, c.cluster_num, record.max_cluster)
                    .or_else(|| over(ViolationType::CoreOverflow, c.host.core_num, record.max_core))
            }
        };
        violation.unwrap_or_default()
    }
}

impl Checker for ViolationPolicyEvaluator {
    fn check(&self, record: &LicenseRecord) -> Violation {
        self.evaluate(record)
    }
}

fn over(kind: ViolationType, current: u64, expected: u64) -> Option<Violation> {
    (current > expected).then(|| Violation::overflow(kind, current, expected))
}
