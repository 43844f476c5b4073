//! Coin selection.
//!
//! Deterministic accumulation: candidates are sorted by the policy ordering
//! and added one at a time, recomputing the fee for the current input count
//! until the inputs cover target plus fee. Excess above the dust threshold
//! becomes change; excess at or below it is left to the fee.

use std::cmp::Ordering;

use micro_core::coins::CoinParams;
use micro_core::constants::{DEFAULT_MAX_INPUTS, DEFAULT_MAX_SELECTION_ITERATIONS};
use micro_core::error::SelectionError;
use micro_core::types::{ScriptType, UnspentOutput};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::derivation::DerivedAddress;
use crate::fees;

/// A UTXO owned by the account, with the address that can spend it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletUtxo {
    pub utxo: UnspentOutput,
    pub owner: DerivedAddress,
}

impl WalletUtxo {
    pub fn amount(&self) -> u64 {
        self.utxo.amount
    }

    pub fn script_type(&self) -> ScriptType {
        self.owner.script_type
    }
}

/// Order in which candidates are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputOrdering {
    /// Fewest inputs: largest amounts first.
    #[default]
    LargestFirst,
    /// Consolidating: smallest amounts first.
    SmallestFirst,
    /// Most confirmations first.
    OldestFirst,
}

impl InputOrdering {
    fn compare(self, a: &WalletUtxo, b: &WalletUtxo) -> Ordering {
        let primary = match self {
            Self::LargestFirst => b.amount().cmp(&a.amount()),
            Self::SmallestFirst => a.amount().cmp(&b.amount()),
            Self::OldestFirst => b.utxo.confirmations.cmp(&a.utxo.confirmations),
        };
        primary
            .then_with(|| a.utxo.txid.cmp(&b.utxo.txid))
            .then_with(|| a.utxo.vout.cmp(&b.utxo.vout))
    }
}

/// Knobs of a selection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Requested fee rate per 1000 virtual bytes.
    pub fee_rate: u64,
    /// Rates below this are raised to it.
    pub min_relay_fee_rate: u64,
    /// Absolute fee floor.
    pub min_fee: u64,
    /// Change at or below this is not worth an output.
    pub dust_threshold: u64,
    pub max_inputs: usize,
    pub ordering: InputOrdering,
    /// Bound on fee evaluations before giving up. Every added input costs
    /// one, and pricing the change output once the target is covered costs
    /// another.
    pub max_iterations: usize,
    /// UTXOs with fewer confirmations are ignored.
    pub min_confirmations: u32,
}

impl SelectionPolicy {
    /// Defaults for a coin: its default fee rate, relay floor and dust limit.
    pub fn for_coin(params: &CoinParams) -> Self {
        Self {
            fee_rate: params.default_fee_per_kb,
            min_relay_fee_rate: params.min_relay_fee_per_kb,
            min_fee: 0,
            dust_threshold: params.dust_limit,
            max_inputs: DEFAULT_MAX_INPUTS,
            ordering: InputOrdering::default(),
            max_iterations: DEFAULT_MAX_SELECTION_ITERATIONS,
            min_confirmations: 0,
        }
    }

    /// Fee for a transaction of `vsize` virtual bytes under this policy.
    pub fn fee_for_vsize(&self, vsize: u64) -> u64 {
        let rate = fees::effective_rate(self.fee_rate, self.min_relay_fee_rate);
        fees::fee_for_vsize(vsize, rate).max(self.min_fee)
    }

    fn validate(&self) -> Result<(), SelectionError> {
        if self.max_inputs == 0 {
            return Err(SelectionError::InvalidPolicy("max_inputs must be at least 1".into()));
        }
        if self.max_iterations == 0 {
            return Err(SelectionError::InvalidPolicy(
                "max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// What the selection pays for: one destination and possibly change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTarget {
    pub amount: u64,
    /// Script length of the destination output.
    pub destination_script_len: usize,
    /// Script length of a change output, if one is added.
    pub change_script_len: usize,
}

/// Result of coin selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Inputs, in selection order.
    pub selected: Vec<WalletUtxo>,
    /// Sum of the selected amounts.
    pub total_in: u64,
    pub fee: u64,
    /// Zero when the excess was left to the fee.
    pub change: u64,
    /// Estimated virtual size of the resulting transaction.
    pub vsize: u64,
    /// Fee evaluations performed.
    pub iterations: usize,
}

impl CoinSelection {
    pub fn has_change(&self) -> bool {
        self.change > 0
    }
}

/// Greedy accumulating coin selector.
pub struct CoinSelector;

impl CoinSelector {
    /// Choose inputs paying `target` under `policy`.
    ///
    /// On success `total_in == target.amount + fee + change` and `change` is
    /// either 0 or above the dust threshold.
    ///
    /// Failures are reported in a fixed order: `InsufficientFunds` when all
    /// candidates together fall short, then whichever bound is hit first
    /// while accumulating. Within a step the input bound is checked before
    /// the fee is re-evaluated.
    pub fn select(
        utxos: &[WalletUtxo],
        target: &SelectionTarget,
        policy: &SelectionPolicy,
    ) -> Result<CoinSelection, SelectionError> {
        policy.validate()?;
        if target.amount == 0 {
            return Err(SelectionError::InvalidTarget("amount must be non-zero".into()));
        }

        let mut candidates: Vec<&WalletUtxo> = utxos
            .iter()
            .filter(|u| u.utxo.confirmations >= policy.min_confirmations)
            .collect();
        candidates.sort_by(|a, b| policy.ordering.compare(a, b));

        // Funds are judged against every candidate before any bound applies,
        // so a short wallet always reports what it lacks.
        let available = candidates
            .iter()
            .fold(0u64, |acc, u| acc.saturating_add(u.amount()));
        // an empty wallet is priced as a single native segwit input
        let vsize = if candidates.is_empty() {
            fees::estimate_vsize([ScriptType::P2wpkh], [target.destination_script_len])
        } else {
            fees::estimate_vsize(
                candidates.iter().map(|u| u.script_type()),
                [target.destination_script_len],
            )
        };
        let required = target.amount.saturating_add(policy.fee_for_vsize(vsize));
        let insufficient = || SelectionError::InsufficientFunds {
            target: target.amount,
            required,
            available,
        };
        if available < required {
            return Err(insufficient());
        }

        let mut selected: Vec<WalletUtxo> = Vec::new();
        let mut total_in: u64 = 0;
        let mut iterations = 0usize;
        let mut evaluate = |total_in: u64, vsize: u64| {
            iterations += 1;
            if iterations > policy.max_iterations {
                return Err(SelectionError::DidNotConverge {
                    iterations: policy.max_iterations,
                    target: target.amount,
                    selected: total_in,
                });
            }
            Ok(policy.fee_for_vsize(vsize))
        };

        for utxo in &candidates {
            if selected.len() == policy.max_inputs {
                return Err(SelectionError::TooManyInputs {
                    max_inputs: policy.max_inputs,
                    target: target.amount,
                });
            }
            selected.push((*utxo).clone());
            total_in = total_in.checked_add(utxo.amount()).ok_or_else(|| {
                SelectionError::InvalidTarget("selected amounts overflow".into())
            })?;

            let input_types = || selected.iter().map(WalletUtxo::script_type);
            let vsize_no_change = fees::estimate_vsize(input_types(), [target.destination_script_len]);
            let fee_no_change = evaluate(total_in, vsize_no_change)?;
            let Some(excess) = total_in
                .checked_sub(target.amount)
                .and_then(|v| v.checked_sub(fee_no_change))
            else {
                continue;
            };

            let vsize_change = fees::estimate_vsize(
                input_types(),
                [target.destination_script_len, target.change_script_len],
            );
            let fee_change = evaluate(total_in, vsize_change)?;
            let change = (excess + fee_no_change).saturating_sub(fee_change);

            let selection = if change > policy.dust_threshold {
                CoinSelection {
                    selected,
                    total_in,
                    fee: fee_change,
                    change,
                    vsize: vsize_change,
                    iterations,
                }
            } else {
                CoinSelection {
                    selected,
                    total_in,
                    fee: total_in - target.amount,
                    change: 0,
                    vsize: vsize_no_change,
                    iterations,
                }
            };
            debug!(
                inputs = selection.selected.len(),
                total_in = selection.total_in,
                fee = selection.fee,
                change = selection.change,
                iterations = selection.iterations,
                "Coin selection converged"
            );
            return Ok(selection);
        }

        Err(insufficient())
    }
}
