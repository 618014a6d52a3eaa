//! Property-based tests for naming and composition guarantees

mod compose_determinism;
mod naming_roundtrip;
