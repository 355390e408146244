//! # Verification Properties
//!
//! Signature verification must accept exactly the records the issuer signed:
//! any change to a signed field is detected, and repeated or interleaved
//! verification never changes the outcome.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use fedlic_core::{
    ComponentConstraint, LicenseRecord, ResourceCount, ResourceCounts, ViolationType,
};
use fedlic_crypto::{fixtures, signed, SigningKey};
use fedlic_policy::{LicenseVerifier, ViolationPolicyEvaluator};
use proptest::prelude::*;

fn key() -> &'static SigningKey {
    static KEY: std::sync::OnceLock<SigningKey> = std::sync::OnceLock::new();
    KEY.get_or_init(fixtures::signing_key)
}

fn verifier() -> LicenseVerifier {
    LicenseVerifier::new(Arc::new(fixtures::trust_anchor()))
}

fn record_strategy() -> impl Strategy<Value = LicenseRecord> {
    (
        "[a-z0-9]{1,12}",
        prop::sample::select(vec!["subscription", "managed", "maintenance"]),
        0u64..100,
        0u64..1000,
        0u64..10_000,
        prop::collection::vec("[a-z]{1,6}", 0..3),
    )
        .prop_map(|(id, kind, max_cluster, max_node, max_core, comps)| LicenseRecord {
            id,
            license_type: kind.to_string(),
            subject: "acme".into(),
            issuer: "fedlic".into(),
            max_cluster,
            max_node,
            max_core,
            components: comps
                .into_iter()
                .map(|name| ComponentConstraint {
                    name,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })
}

/// Applies one of several field mutations, all of which change the payload.
fn tamper(record: &mut LicenseRecord, which: usize) {
    match which % 7 {
        0 => record.id.push('x'),
        1 => record.max_cluster += 1,
        2 => record.max_node += 1,
        3 => record.max_core += 1,
        4 => record.subject.push('x'),
        5 => {
            record.not_after = Utc.timestamp_opt(4_102_444_800, 0).single();
        }
        _ => record.components.push(ComponentConstraint {
            name: "extra".into(),
            ..Default::default()
        }),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn signed_records_verify(record in record_strategy()) {
        let rec = signed(&record, key()).unwrap();
        prop_assert!(verifier().verify(&rec).is_ok());
    }

    #[test]
    fn any_mutation_after_signing_is_detected(record in record_strategy(), which in 0usize..7) {
        let mut rec = signed(&record, key()).unwrap();
        tamper(&mut rec, which);
        let v = verifier().verify(&rec).unwrap_err();
        prop_assert_eq!(v.kind, ViolationType::InvalidSignature);
    }

    #[test]
    fn verification_is_stable_and_order_independent(
        a in record_strategy(),
        b in record_strategy(),
        which in 0usize..7,
    ) {
        let good = signed(&a, key()).unwrap();
        let mut bad = signed(&b, key()).unwrap();
        tamper(&mut bad, which);
        let v = verifier();

        let first = (v.verify(&good), v.verify(&bad));
        let second = (v.verify(&bad), v.verify(&good));
        prop_assert_eq!(&first.0, &second.1);
        prop_assert_eq!(&first.1, &second.0);
        prop_assert!(first.0.is_ok());
    }

    #[test]
    fn at_most_one_rule_fires(record in record_strategy(), nodes in 0u64..2000, cores in 0u64..20_000, clusters in 1u64..200) {
        let counts = ResourceCounts {
            host: ResourceCount { node_num: nodes, core_num: cores },
            member: ResourceCount::default(),
            cluster_num: clusters,
        };
        let rec = signed(&record, key()).unwrap();
        let now = Utc::now();
        let evaluator = ViolationPolicyEvaluator::new(counts);
        let v = verifier().check(&rec, now, &[&evaluator]);
        prop_assert_eq!(v, evaluator.evaluate(&rec));
    }
}
