//! Decklist parsing.

pub mod splitter;

pub use splitter::*;
