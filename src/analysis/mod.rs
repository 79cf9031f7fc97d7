//! Accumulation and statistics over harvested card lines.

pub mod aggregator;

pub use aggregator::*;
