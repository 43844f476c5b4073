//! Unsigned transaction assembly.
//!
//! Provides a builder pattern for constructing transactions:
//! 1. Add the selected inputs
//! 2. Set the destination, the optional change output and the fee
//! 3. Build a validated [`UnsignedTransaction`]
//!
//! Every input carries its full derivation path and script type so a
//! detached signer can find the key and sign without network access.

use std::collections::HashSet;

use bitcoin::bip32::Fingerprint;
use bitcoin::transaction::Version;
use bitcoin::{absolute, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use micro_core::coins::CoinType;
use micro_core::constants::{RBF_SEQUENCE, TX_VERSION};
use micro_core::error::{AddressError, BuildError, WalletError};
use micro_core::types::ScriptType;

use crate::address::Address;
use crate::coin_selection::{CoinSelection, WalletUtxo};
use crate::derivation::DerivedAddress;
use crate::fees;
use crate::path::DerivationPath;

/// An input to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedInput {
    pub txid: Txid,
    pub vout: u32,
    /// Value of the spent output; segwit signatures commit to it.
    pub amount: u64,
    /// Full path of the spending key from the master key.
    pub path: DerivationPath,
    pub script_type: ScriptType,
    pub sequence: u32,
}

impl UnsignedInput {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }
}

/// An output of the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedOutput {
    pub address: Address,
    pub amount: u64,
    /// Set on change outputs, so the signer can verify they come back to
    /// the same account.
    pub change_path: Option<DerivationPath>,
}

impl UnsignedOutput {
    pub fn is_change(&self) -> bool {
        self.change_path.is_some()
    }
}

/// A transaction ready for signing.
///
/// Outputs are ordered destination first, change last. Invariant:
/// `total_in == total_out + fee`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub coin: CoinType,
    pub version: i32,
    pub lock_time: u32,
    pub inputs: Vec<UnsignedInput>,
    pub outputs: Vec<UnsignedOutput>,
    pub fee: u64,
    pub master_fingerprint: Option<Fingerprint>,
}

impl UnsignedTransaction {
    pub fn total_in(&self) -> Option<u64> {
        self.inputs
            .iter()
            .try_fold(0u64, |acc, i| acc.checked_add(i.amount))
    }

    pub fn total_out(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.amount))
    }

    /// The change output, if any.
    pub fn change(&self) -> Option<&UnsignedOutput> {
        self.outputs.last().filter(|o| o.is_change())
    }

    /// Estimated virtual size once signed.
    pub fn estimated_vsize(&self) -> u64 {
        fees::estimate_vsize(
            self.inputs.iter().map(|i| i.script_type),
            self.outputs.iter().map(|o| o.address.script_pubkey().len()),
        )
    }

    /// Minimum fee the coin relays a transaction of this size for.
    pub fn min_relay_fee(&self) -> u64 {
        fees::fee_for_vsize(
            self.estimated_vsize(),
            self.coin.params().min_relay_fee_per_kb,
        )
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.inputs.is_empty() {
            return Err(BuildError::NoInputs);
        }
        let mut seen = HashSet::new();
        for input in &self.inputs {
            if !seen.insert(input.outpoint()) {
                return Err(BuildError::DuplicateInput(input.outpoint().to_string()));
            }
        }
        for (index, output) in self.outputs.iter().enumerate() {
            if output.address.coin() != self.coin {
                return Err(BuildError::CoinMismatch {
                    index,
                    expected: self.coin.to_string(),
                    found: output.address.coin().to_string(),
                });
            }
            if output.amount == 0 {
                return Err(BuildError::InvalidAmount(format!("output {index} is zero")));
            }
        }
        if self.outputs.iter().rev().skip(1).any(|o| o.is_change()) {
            return Err(BuildError::InvalidAmount("change output must be last".into()));
        }

        let overflow = || BuildError::InvalidAmount("amounts overflow".into());
        let inputs = self.total_in().ok_or_else(overflow)?;
        let outputs = self.total_out().ok_or_else(overflow)?;
        if outputs.checked_add(self.fee) != Some(inputs) {
            return Err(BuildError::AmountMismatch {
                inputs,
                outputs,
                fee: self.fee,
            });
        }

        let minimum = self.min_relay_fee();
        if self.fee < minimum {
            return Err(BuildError::FeeBelowMinimum {
                fee: self.fee,
                minimum,
            });
        }
        Ok(())
    }

    /// Consensus transaction with empty script sigs and witnesses.
    pub fn to_bitcoin_tx(&self) -> Transaction {
        Transaction {
            version: Version(self.version),
            lock_time: absolute::LockTime::from_consensus(self.lock_time),
            input: self
                .inputs
                .iter()
                .map(|i| TxIn {
                    previous_output: i.outpoint(),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence(i.sequence),
                    witness: Witness::new(),
                })
                .collect(),
            output: self
                .outputs
                .iter()
                .map(|o| TxOut {
                    value: Amount::from_sat(o.amount),
                    script_pubkey: o.address.script_pubkey(),
                })
                .collect(),
        }
    }

    /// Txid of the unsigned form. Equal to the signed txid when every input
    /// is native segwit, since witnesses are not hashed into it.
    pub fn unsigned_txid(&self) -> Txid {
        self.to_bitcoin_tx().compute_txid()
    }
}

/// Builder for unsigned transactions.
///
/// # Example
/// ```ignore
/// let tx = TransactionBuilder::new(CoinType::Bitcoin)
///     .add_inputs(selection.selected)
///     .pay_to(destination, 40_000)
///     .change_to(&change_address, selection.change)
///     .fee(selection.fee)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    coin: CoinType,
    inputs: Vec<WalletUtxo>,
    destination: Option<(Address, u64)>,
    change: Option<(DerivedAddress, u64)>,
    fee: u64,
    lock_time: u32,
    master_fingerprint: Option<Fingerprint>,
}

impl TransactionBuilder {
    pub fn new(coin: CoinType) -> Self {
        Self {
            coin,
            inputs: Vec::new(),
            destination: None,
            change: None,
            fee: 0,
            lock_time: 0,
            master_fingerprint: None,
        }
    }

    /// Start from a coin selection: its inputs, fee, and change amount (if any)
    /// routed to `change_address`.
    pub fn from_selection(
        coin: CoinType,
        selection: &CoinSelection,
        change_address: Option<&DerivedAddress>,
    ) -> Self {
        let mut builder = Self::new(coin)
            .add_inputs(selection.selected.iter().cloned())
            .fee(selection.fee);
        if let (true, Some(address)) = (selection.has_change(), change_address) {
            builder = builder.change_to(address, selection.change);
        }
        builder
    }

    pub fn add_input(mut self, utxo: WalletUtxo) -> Self {
        self.inputs.push(utxo);
        self
    }

    pub fn add_inputs(mut self, utxos: impl IntoIterator<Item = WalletUtxo>) -> Self {
        self.inputs.extend(utxos);
        self
    }

    /// The destination output. Always the first output.
    pub fn pay_to(mut self, address: Address, amount: u64) -> Self {
        self.destination = Some((address, amount));
        self
    }

    /// The change output. Always the last output.
    pub fn change_to(mut self, address: &DerivedAddress, amount: u64) -> Self {
        self.change = Some((address.clone(), amount));
        self
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    pub fn lock_time(mut self, lock_time: u32) -> Self {
        self.lock_time = lock_time;
        self
    }

    pub fn master_fingerprint(mut self, fingerprint: Option<Fingerprint>) -> Self {
        self.master_fingerprint = fingerprint;
        self
    }

    /// Assemble and validate.
    pub fn build(self) -> Result<UnsignedTransaction, WalletError> {
        let (destination, amount) = self
            .destination
            .ok_or_else(|| BuildError::InvalidAmount("no destination".into()))?;
        if amount == 0 {
            return Err(BuildError::InvalidAmount("amount must be non-zero".into()).into());
        }
        if destination.coin() != self.coin {
            return Err(AddressError::WrongNetwork {
                address: destination.to_string(),
                coin: self.coin.to_string(),
            }
            .into());
        }

        let mut outputs = vec![UnsignedOutput {
            address: destination,
            amount,
            change_path: None,
        }];
        if let Some((change, change_amount)) = self.change {
            if change_amount == 0 {
                return Err(BuildError::InvalidAmount("change amount is zero".into()).into());
            }
            outputs.push(UnsignedOutput {
                address: change.address,
                amount: change_amount,
                change_path: Some(change.path),
            });
        }

        for (index, utxo) in self.inputs.iter().enumerate() {
            if utxo.owner.address.coin() != self.coin {
                return Err(BuildError::CoinMismatch {
                    index,
                    expected: self.coin.to_string(),
                    found: utxo.owner.address.coin().to_string(),
                }
                .into());
            }
        }

        let tx = UnsignedTransaction {
            coin: self.coin,
            version: TX_VERSION,
            lock_time: self.lock_time,
            inputs: self
                .inputs
                .into_iter()
                .map(|u| UnsignedInput {
                    txid: u.utxo.txid,
                    vout: u.utxo.vout,
                    amount: u.utxo.amount,
                    path: u.owner.path,
                    script_type: u.owner.script_type,
                    sequence: RBF_SEQUENCE,
                })
                .collect(),
            outputs,
            fee: self.fee,
            master_fingerprint: self.master_fingerprint,
        };
        tx.validate()?;
        Ok(tx)
    }
}
