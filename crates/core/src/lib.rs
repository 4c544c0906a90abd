//! RQ Analytics Core - Shared types library.
//!
//! This crate provides the types used across all RQ Analytics components:
//! - `api` - Read-only analytics HTTP service
//! - `cli` - Command-line tools for migrations, seeding and offline reports
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Intervals, bucket keys, coercion rules, typed IDs and the
//!   documents stored in the Customers, Orders and Products collections

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
