//! Driver-level integration tests.

mod determinism;
mod thorough;
