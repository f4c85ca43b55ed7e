//! Container runtime client for the failover harness.
//!
//! The harness never manages containers itself; it drives an external
//! runtime through the [`backend::ContainerRuntime`] trait.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod backend;
pub mod exec;
pub mod logs;
