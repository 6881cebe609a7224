//! Shared utilities.
//!
//! Filesystem helpers for timestamps and temporary outputs, plus test helpers.

pub mod fs;

#[cfg(test)]
pub mod testutil;
