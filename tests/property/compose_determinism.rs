//! Composition depends only on its inputs and always follows the storage table

use chrono::{TimeZone, Utc};
use clustermaker::compose::{compose, storage_row, FragmentId, PackageRoot};
use clustermaker::identity::{Serial, StackIdentity, StackKind};
use clustermaker::params::{ConfigurationInput, Pricing, StorageFeatures};
use clustermaker::provider::InMemoryCloud;
use clustermaker::validate::validate;
use proptest::prelude::*;

fn identity() -> StackIdentity {
    let created_at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 5).unwrap();
    StackIdentity {
        kind: StackKind::Cluster,
        logical_name: "dev01".to_string(),
        owner: "alice".to_string(),
        stack_name: "alice-dev01".to_string(),
        serial: Serial::mint("alice-dev01", &created_at),
        created_at,
    }
}

fn cloud() -> InMemoryCloud {
    InMemoryCloud::new()
        .with_zone("us-east-1a")
        .with_spot_price("c5.xlarge", 0.0612)
}

fn input(features: StorageFeatures, scheduler: &str, pricing: &str) -> ConfigurationInput {
    ConfigurationInput {
        az: "us-east-1a".to_string(),
        owner_email: "alice@example.com".to_string(),
        scheduler: scheduler.to_string(),
        pricing: pricing.to_string(),
        enable_external_nfs: features.external_nfs,
        external_nfs_server: features.external_nfs.then(|| "10.0.0.5".to_string()),
        enable_efs: features.efs,
        enable_fsx: features.fsx,
        ..ConfigurationInput::default()
    }
}

fn features() -> impl Strategy<Value = StorageFeatures> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(external_nfs, efs, fsx)| {
        StorageFeatures {
            external_nfs,
            efs,
            fsx,
        }
    })
}

fn scheduler() -> impl Strategy<Value = &'static str> {
    proptest::sample::select(vec!["sge", "slurm", "torque", "awsbatch"])
}

fn pricing() -> impl Strategy<Value = &'static str> {
    proptest::sample::select(vec!["spot", "ondemand"])
}

/// Composing the same inputs twice yields the same document
#[test]
fn test_compose_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let cloud = cloud();

    runner
        .run(
            &(features(), scheduler(), pricing()),
            |(features, scheduler, pricing)| {
                prop_assume!(!(features.fsx && scheduler == "awsbatch"));
                let params = validate(&input(features, scheduler, pricing), &cloud).unwrap();

                let first = compose(&identity(), &params).unwrap();
                let second = compose(&identity(), &params).unwrap();
                prop_assert_eq!(first.to_text(), second.to_text());
                prop_assert!(
                    !first.to_text().contains("${"),
                    "unrendered placeholder in document"
                );
                Ok(())
            },
        )
        .unwrap();
}

/// Storage fragments match the enabled features and exactly one package
/// root closes the document
#[test]
fn test_storage_fragments_follow_features_property() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let cloud = cloud();

    runner
        .run(&(features(), scheduler()), |(features, scheduler)| {
            prop_assume!(!(features.fsx && scheduler == "awsbatch"));
            let params = validate(&input(features, scheduler, "spot"), &cloud).unwrap();
            let document = compose(&identity(), &params).unwrap();

            prop_assert_eq!(document.contains(FragmentId::Efs), features.efs);
            prop_assert_eq!(document.contains(FragmentId::Fsx), features.fsx);
            prop_assert_eq!(
                document.contains(FragmentId::ExternalNfs),
                features.external_nfs
            );
            prop_assert!(document.contains(FragmentId::EbsPerformance));

            let ids = document.fragment_ids();
            let roots: Vec<_> = ids
                .iter()
                .filter(|id| matches!(id, FragmentId::PackageRoot(_)))
                .collect();
            prop_assert_eq!(roots.len(), 1);
            let expected = FragmentId::PackageRoot(PackageRoot::select(features));
            prop_assert_eq!(ids.last(), Some(&expected));
            prop_assert_eq!(storage_row(features).package_root, PackageRoot::select(features));

            let pkg_dirs = document.keys().into_iter().filter(|k| *k == "pkg_dir").count();
            prop_assert_eq!(pkg_dirs, 1);
            Ok(())
        })
        .unwrap();
}

/// A spot pricing fragment is present exactly when the cluster runs on spot
#[test]
fn test_spot_fragment_tracks_pricing_property() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let cloud = cloud();

    runner
        .run(&(scheduler(), pricing()), |(scheduler, pricing)| {
            let params = validate(&input(features_none(), scheduler, pricing), &cloud).unwrap();
            let document = compose(&identity(), &params).unwrap();

            let spot = matches!(params.pricing, Pricing::Spot { .. });
            let has_spot = document.contains(FragmentId::BatchSpotPricing)
                || document.contains(FragmentId::QueueSpotPricing);
            prop_assert_eq!(has_spot, spot);
            prop_assert_eq!(
                document.contains(FragmentId::BatchScheduler),
                scheduler == "awsbatch"
            );
            Ok(())
        })
        .unwrap();
}

fn features_none() -> StorageFeatures {
    StorageFeatures {
        external_nfs: false,
        efs: false,
        fsx: false,
    }
}
