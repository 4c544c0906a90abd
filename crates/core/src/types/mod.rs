//! Core types for RQ Analytics.
//!
//! This module provides type-safe wrappers for the analytics domain.

pub mod bucket;
pub mod coerce;
pub mod document;
pub mod id;
pub mod interval;
pub mod price;

pub use bucket::BucketKey;
pub use coerce::{CoercionError, CoercionPolicy, coerce_amount, parse_timestamp};
pub use document::{Address, Collection, Customer, Order, Product};
pub use id::*;
pub use interval::{Interval, IntervalError};
pub use price::{Money, MoneySet};
