//! # mqha-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the failover harness workspace.
//!
//! This crate is the leaf of the dependency graph. It knows nothing about
//! how containers are driven; it only names the things the runtime and the
//! scenarios talk about.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
