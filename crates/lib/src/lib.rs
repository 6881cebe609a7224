//! stepmake-lib: Core types and logic for stepmake
//!
//! This crate builds families of numbered step programs:
//! - `Project`: the loaded project file, toolchain settings and step table
//! - `StepTable`: per-step paths and target aliases, derived once at startup
//! - `execute`: staleness-driven regeneration and compilation of steps
//! - `filter`: the built-in template filter that emits one step's source

pub mod config;
pub mod consts;
pub mod discovery;
pub mod execute;
pub mod filter;
pub mod housekeeping;
pub mod project;
pub mod rules;
pub mod util;
