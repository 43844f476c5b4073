//! Request-scoped wallet context.
//!
//! A [`WalletSession`] bundles the account key, the indexer handle and the
//! scan configuration for one operation. Nothing survives between sessions:
//! every call reloads the account from the indexer.

use std::sync::Arc;

use bitcoin::Transaction;
use micro_core::constants::{DEFAULT_FEE_TARGET_BLOCKS, DEFAULT_MAX_INPUTS, DEFAULT_MAX_SELECTION_ITERATIONS};
use micro_core::error::WalletError;
use micro_core::traits::Indexer;
use micro_core::types::Chain;
use tracing::{debug, info};

use crate::account::{load_account, Account, ScanConfig};
use crate::address::Address;
use crate::builder::{TransactionBuilder, UnsignedTransaction};
use crate::coin_selection::{CoinSelection, CoinSelector, InputOrdering, SelectionPolicy, SelectionTarget};
use crate::derivation::{AccountKey, DerivedAddress};
use crate::fees;
use crate::portable::to_portable;
use crate::signer::{verify_signed, Signer};

/// Caller choices for a spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendOptions {
    /// Fixed fee rate per 1000 virtual bytes; estimated by the indexer when unset.
    pub fee_rate: Option<u64>,
    /// Confirmation target for indexer estimates.
    pub fee_target_blocks: u32,
    pub ordering: InputOrdering,
    pub min_confirmations: u32,
    pub max_inputs: usize,
    pub max_iterations: usize,
    pub lock_time: u32,
}

impl Default for SpendOptions {
    fn default() -> Self {
        Self {
            fee_rate: None,
            fee_target_blocks: DEFAULT_FEE_TARGET_BLOCKS,
            ordering: InputOrdering::default(),
            min_confirmations: 0,
            max_inputs: DEFAULT_MAX_INPUTS,
            max_iterations: DEFAULT_MAX_SELECTION_ITERATIONS,
            lock_time: 0,
        }
    }
}

/// An unsigned transaction together with how it was funded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundedTransaction {
    pub tx: UnsignedTransaction,
    pub selection: CoinSelection,
    /// Fee rate the selection ran at, after the relay floor.
    pub fee_rate: u64,
}

impl FundedTransaction {
    /// Portable form for a detached signer.
    pub fn to_portable(&self) -> Result<Vec<u8>, WalletError> {
        Ok(to_portable(&self.tx)?)
    }
}

/// Everything one wallet operation needs.
#[derive(Clone)]
pub struct WalletSession {
    key: AccountKey,
    indexer: Arc<dyn Indexer>,
    scan: ScanConfig,
}

impl WalletSession {
    pub fn new(key: AccountKey, indexer: Arc<dyn Indexer>) -> Self {
        Self {
            key,
            indexer,
            scan: ScanConfig::default(),
        }
    }

    pub fn with_scan_config(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    pub fn key(&self) -> &AccountKey {
        &self.key
    }

    pub fn scan_config(&self) -> &ScanConfig {
        &self.scan
    }

    /// Scan both chains and collect balances and UTXOs.
    pub async fn load_account(&self) -> Result<Account, WalletError> {
        load_account(self.indexer.as_ref(), self.key.clone(), &self.scan).await
    }

    /// First unused receiving address.
    pub async fn receive_address(&self) -> Result<DerivedAddress, WalletError> {
        let account = self.load_account().await?;
        Ok(account.first_unused(Chain::External)?.clone())
    }

    /// Fee rate to spend at.
    ///
    /// A fixed rate is only raised to the relay floor. Otherwise the indexer
    /// is asked; when it has no estimate, the coin's default rate is used.
    pub async fn fee_rate(&self, options: &SpendOptions) -> Result<u64, WalletError> {
        let params = self.key.coin().params();
        if let Some(rate) = options.fee_rate {
            return Ok(fees::effective_rate(rate, params.min_relay_fee_per_kb));
        }
        let blocks = options.fee_target_blocks;
        let estimate = self
            .scan
            .retry
            .run("estimate_fee_rate", || self.indexer.estimate_fee_rate(blocks))
            .await?;
        let rate = match estimate {
            Some(rate) => fees::effective_rate(rate, params.min_relay_fee_per_kb),
            None => {
                debug!(blocks, "No fee estimate, using coin default");
                params.default_fee_per_kb
            }
        };
        Ok(rate)
    }

    /// Select inputs and build an unsigned transaction paying `amount` to
    /// `destination`. Change, if any, goes to the first unused internal address.
    pub async fn fund(
        &self,
        destination: &str,
        amount: u64,
        options: &SpendOptions,
    ) -> Result<FundedTransaction, WalletError> {
        let coin = self.key.coin();
        let destination = Address::parse(destination, coin)?;
        let account = self.load_account().await?;
        let fee_rate = self.fee_rate(options).await?;
        let change = account.first_unused(Chain::Internal)?.clone();

        let policy = SelectionPolicy {
            fee_rate,
            ordering: options.ordering,
            min_confirmations: options.min_confirmations,
            max_inputs: options.max_inputs,
            max_iterations: options.max_iterations,
            ..SelectionPolicy::for_coin(coin.params())
        };
        let target = SelectionTarget {
            amount,
            destination_script_len: destination.script_pubkey().len(),
            change_script_len: change.address.script_pubkey().len(),
        };
        let selection = CoinSelector::select(&account.utxos(), &target, &policy)?;

        let tx = TransactionBuilder::from_selection(coin, &selection, Some(&change))
            .pay_to(destination, amount)
            .lock_time(options.lock_time)
            .master_fingerprint(self.key.master_fingerprint())
            .build()?;

        info!(
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            fee = tx.fee,
            fee_rate,
            txid = %tx.unsigned_txid(),
            "Transaction funded"
        );
        Ok(FundedTransaction {
            tx,
            selection,
            fee_rate,
        })
    }

    /// Fund, then have `signer` sign. The signed transaction has been checked
    /// against the unsigned one.
    pub async fn send(
        &self,
        destination: &str,
        amount: u64,
        options: &SpendOptions,
        signer: &dyn Signer,
    ) -> Result<(FundedTransaction, Transaction), WalletError> {
        let funded = self.fund(destination, amount, options).await?;
        let signed = signer.sign(&funded.tx).await?;
        verify_signed(&funded.tx, &signed)?;
        info!(txid = %signed.compute_txid(), "Transaction signed");
        Ok((funded, signed))
    }
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("coin", &self.key.coin())
            .field("account", &self.key.account_path().to_string())
            .field("scan", &self.scan)
            .finish()
    }
}
