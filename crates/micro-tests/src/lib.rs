//! Integration and property test suite for microwallet.
//!
//! Tests drive the wallet core end to end against an in-memory indexer:
//! published derivation vectors, gap-limit discovery, coin selection laws,
//! and the portable transaction format.

pub mod helpers;
