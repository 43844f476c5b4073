//! Trait interfaces for microwallet.
//!
//! - [`Indexer`]: read-only address and fee data (micro-indexer implements)

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::AddressInfo;

/// Read-only view of an address indexing service.
///
/// Implementations answer for a single coin; the caller picks the backend
/// that matches the account being loaded. Retries and timeouts are applied
/// by the caller, so a single call should make a single attempt.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Usage flag and unspent outputs of an address.
    async fn address_info(&self, address: &str) -> Result<AddressInfo, IndexerError>;

    /// Estimated fee rate, in smallest units per 1000 virtual bytes, for
    /// confirmation within `target_blocks` blocks.
    ///
    /// Returns `Ok(None)` when the backend has no estimate.
    async fn estimate_fee_rate(&self, target_blocks: u32) -> Result<Option<u64>, IndexerError>;
}
