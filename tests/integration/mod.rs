//! Integration tests for the build and teardown workflows

mod build_workflow;
mod config_integration;
mod identity_claim;
mod rollback;
mod scenarios;
mod teardown_workflow;
mod test_utils;
