//! Property-based tests entry point
//!
//! Includes the modules under property/ so they build as one test binary.

mod property;
