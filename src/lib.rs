//! ClusterMaker: named, versioned HPC cluster stacks
//!
//! Provisions and decommissions compute-cluster stacks and their jump hosts.
//! Each stack gets a serial minted once from its name and creation time; the
//! serial names every identity resource created for it, keys its on-disk
//! record, and lets teardown or a cancelled build remove exactly what the
//! stack owns.

pub mod access;
pub mod catalog;
pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod identity;
pub mod invoke;
pub mod logging;
pub mod naming;
pub mod params;
pub mod provider;
pub mod provision;
pub mod validate;
pub mod window;
pub mod workflow;
