//! Core types and trait definitions for the ShieldLLM guard service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod alert;
pub mod defense;
pub mod lifecycle;
pub mod policy;
pub mod processor;
pub mod session;
pub mod store;
pub mod turn;

pub use defense::{DefenseClient, DefenseError};
pub use processor::{TurnError, TurnProcessor};
