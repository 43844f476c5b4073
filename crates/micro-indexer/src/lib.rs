//! # micro-indexer
//!
//! HTTP backends implementing [`Indexer`](micro_core::traits::Indexer).
//!
//! - [`blockbook`]: Blockbook REST API v2

pub mod blockbook;

pub use blockbook::BlockbookClient;
