//! # micro-core
//! Foundation types and traits for microwallet.

pub mod amount;
pub mod coins;
pub mod constants;
pub mod error;
pub mod traits;
pub mod types;
