//! Serial and resource names can always be taken apart again

use chrono::{DateTime, TimeZone, Utc};
use clustermaker::identity::{datestamp, parse_datestamp, stack_name, Serial};
use clustermaker::naming::{parse_resource_name, resource_name, ResourceSlot};
use proptest::prelude::*;

fn owner() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,11}"
}

fn logical_name() -> impl Strategy<Value = String> {
    "[a-z0-9]([a-z0-9-]{0,10}[a-z0-9])?"
}

/// Instants between 2000 and 2099 at microsecond precision
fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800i64..4_102_444_799i64, 0u32..1_000_000u32)
        .prop_map(|(secs, micros)| Utc.timestamp_opt(secs, micros * 1_000).unwrap())
}

#[test]
fn test_datestamp_round_trip_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&instant(), |at| {
            let stamp = datestamp(&at);
            prop_assert_eq!(stamp.len(), 20);
            prop_assert_eq!(parse_datestamp(&stamp), Some(at));
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_resource_name_round_trip_property() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let slots = proptest::sample::select(ResourceSlot::ALL.to_vec());

    runner
        .run(
            &(owner(), logical_name(), instant(), slots),
            |(owner, name, at, slot)| {
                let stack = stack_name(&owner, &name).unwrap();
                let serial = Serial::mint(&stack, &at);

                prop_assert_eq!(Serial::parse(serial.as_str()), Some(serial.clone()));
                prop_assert_eq!(serial.stack_name(), stack.as_str());

                let resource = resource_name(slot, &serial);
                prop_assert!(resource.starts_with(slot.prefix()));
                prop_assert_eq!(parse_resource_name(&resource), Some((slot, serial)));
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn test_stack_name_splits_at_first_dash_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(owner(), logical_name()), |(owner, name)| {
            let stack = stack_name(&owner, &name).unwrap();
            let (head, tail) = stack.split_once('-').unwrap();
            prop_assert_eq!(head, owner.as_str());
            prop_assert_eq!(tail, name.as_str());
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_distinct_instants_mint_distinct_serials_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(instant(), instant()), |(a, b)| {
            prop_assume!(a != b);
            let first = Serial::mint("alice-dev01", &a);
            let second = Serial::mint("alice-dev01", &b);
            prop_assert_ne!(first, second);
            Ok(())
        })
        .unwrap();
}
