//! Account aggregation with gap-limit discovery.
//!
//! Both chains of an account are scanned from index 0 in batches. Each batch
//! holds exactly as many addresses as are still needed to reach the gap
//! limit, so a chain stops after precisely `gap_limit` consecutive unused
//! addresses. Queries inside a batch run concurrently with a bounded
//! fan-out and are merged back in index order.

use futures::stream::{self, StreamExt, TryStreamExt};
use micro_core::constants::{DEFAULT_GAP_LIMIT, DEFAULT_SCAN_CONCURRENCY};
use micro_core::error::{ConfigError, WalletError};
use micro_core::traits::Indexer;
use micro_core::types::{AddressInfo, Chain};
use tracing::{debug, info};

use crate::coin_selection::WalletUtxo;
use crate::derivation::{AccountKey, DerivedAddress};
use crate::retry::RetryPolicy;

/// How addresses are discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Consecutive unused addresses that end a chain.
    pub gap_limit: u32,
    /// Indexer queries in flight at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            gap_limit: DEFAULT_GAP_LIMIT,
            concurrency: DEFAULT_SCAN_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

impl ScanConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.gap_limit == 0 {
            return Err(ConfigError::Invalid("gap limit must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("scan concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

/// A scanned address and what the indexer reported for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedAddress {
    pub derived: DerivedAddress,
    pub info: AddressInfo,
}

impl ScannedAddress {
    pub fn is_used(&self) -> bool {
        self.info.used || !self.info.utxos.is_empty()
    }
}

/// Snapshot of an account. Rebuilt on every load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    key: AccountKey,
    external: Vec<ScannedAddress>,
    internal: Vec<ScannedAddress>,
    balance: u64,
}

impl Account {
    pub fn key(&self) -> &AccountKey {
        &self.key
    }

    /// Scanned addresses of `chain`, in index order.
    pub fn addresses(&self, chain: Chain) -> &[ScannedAddress] {
        match chain {
            Chain::External => &self.external,
            Chain::Internal => &self.internal,
        }
    }

    /// Sum of every UTXO amount on both chains.
    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Every UTXO of the account with its owning address, external chain first.
    pub fn utxos(&self) -> Vec<WalletUtxo> {
        Chain::BOTH
            .iter()
            .flat_map(|&chain| self.addresses(chain))
            .flat_map(|scanned| {
                scanned.info.utxos.iter().map(|utxo| WalletUtxo {
                    utxo: utxo.clone(),
                    owner: scanned.derived.clone(),
                })
            })
            .collect()
    }

    /// First address on `chain` the indexer has never seen used.
    ///
    /// A completed scan always ends in unused addresses, so this only fails
    /// for accounts built by hand.
    pub fn first_unused(&self, chain: Chain) -> Result<&DerivedAddress, WalletError> {
        self.addresses(chain)
            .iter()
            .find(|a| !a.is_used())
            .map(|a| &a.derived)
            .ok_or_else(|| {
                ConfigError::Invalid(format!("no unused {chain} address in scanned range")).into()
            })
    }
}

/// Discover the addresses of an account and fetch their UTXOs.
///
/// Any indexer failure that survives the retry policy aborts the whole
/// load; a partially scanned account is never returned.
pub async fn load_account(
    indexer: &dyn Indexer,
    key: AccountKey,
    config: &ScanConfig,
) -> Result<Account, WalletError> {
    config.validate()?;

    let external = scan_chain(indexer, &key, Chain::External, config).await?;
    let internal = scan_chain(indexer, &key, Chain::Internal, config).await?;

    let balance = external
        .iter()
        .chain(&internal)
        .flat_map(|a| &a.info.utxos)
        .try_fold(0u64, |acc, u| acc.checked_add(u.amount))
        .ok_or_else(|| ConfigError::InvalidAmount("account balance overflows".into()))?;

    info!(
        coin = %key.coin(),
        account = %key.account_path(),
        external = external.len(),
        internal = internal.len(),
        balance,
        "Account loaded"
    );

    Ok(Account {
        key,
        external,
        internal,
        balance,
    })
}

async fn scan_chain(
    indexer: &dyn Indexer,
    key: &AccountKey,
    chain: Chain,
    config: &ScanConfig,
) -> Result<Vec<ScannedAddress>, WalletError> {
    let mut scanned: Vec<ScannedAddress> = Vec::new();
    let mut trailing_unused: u32 = 0;
    let mut next: u32 = 0;

    while trailing_unused < config.gap_limit {
        let batch = config.gap_limit - trailing_unused;
        let derived = key.derive_range(chain, next, batch)?;
        debug!(%chain, start = next, count = batch, "Scanning address batch");

        let infos: Vec<AddressInfo> = stream::iter(derived.iter().map(|d| {
            let address = d.address.to_string();
            async move {
                config
                    .retry
                    .run("address_info", || indexer.address_info(&address))
                    .await
            }
        }))
        .buffered(config.concurrency)
        .try_collect()
        .await?;

        for (derived, info) in derived.into_iter().zip(infos) {
            let entry = ScannedAddress { derived, info };
            if entry.is_used() {
                trailing_unused = 0;
            } else {
                trailing_unused += 1;
            }
            scanned.push(entry);
        }
        next += batch;
    }

    Ok(scanned)
}
