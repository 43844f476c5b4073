//! Shared wallet types.

use std::fmt;

use bitcoin::{OutPoint, Txid};
use serde::{Deserialize, Serialize};

/// Address chain within an account (the fourth BIP-44 path segment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Receiving addresses, chain 0.
    External,
    /// Change addresses, chain 1.
    Internal,
}

impl Chain {
    /// Both chains in scan order.
    pub const BOTH: [Chain; 2] = [Chain::External, Chain::Internal];

    /// Path segment of this chain.
    pub fn index(self) -> u32 {
        match self {
            Self::External => 0,
            Self::Internal => 1,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External => f.write_str("external"),
            Self::Internal => f.write_str("internal"),
        }
    }
}

/// Output script family of an account's addresses.
///
/// The BIP-43 purpose field of an account path selects one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptType {
    /// Legacy pay-to-pubkey-hash (BIP-44).
    P2pkh,
    /// P2WPKH wrapped in pay-to-script-hash (BIP-49).
    P2shP2wpkh,
    /// Native segwit v0 pay-to-witness-pubkey-hash (BIP-84).
    P2wpkh,
}

impl ScriptType {
    /// BIP-43 purpose of accounts using this script type.
    pub fn purpose(self) -> u32 {
        match self {
            Self::P2pkh => 44,
            Self::P2shP2wpkh => 49,
            Self::P2wpkh => 84,
        }
    }

    /// Script type selected by a BIP-43 purpose.
    pub fn from_purpose(purpose: u32) -> Option<Self> {
        match purpose {
            44 => Some(Self::P2pkh),
            49 => Some(Self::P2shP2wpkh),
            84 => Some(Self::P2wpkh),
            _ => None,
        }
    }

    /// Whether spending this script type produces witness data.
    pub fn is_segwit(self) -> bool {
        !matches!(self, Self::P2pkh)
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::P2pkh => f.write_str("p2pkh"),
            Self::P2shP2wpkh => f.write_str("p2sh-p2wpkh"),
            Self::P2wpkh => f.write_str("p2wpkh"),
        }
    }
}

/// An unspent output as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnspentOutput {
    /// Transaction that created the output.
    pub txid: Txid,
    /// Output index within that transaction.
    pub vout: u32,
    /// Value in smallest units.
    pub amount: u64,
    /// Confirmations; 0 for mempool outputs.
    pub confirmations: u32,
}

impl UnspentOutput {
    /// Outpoint referencing this output.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }
}

/// Indexer view of a single address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressInfo {
    /// Whether the address ever appeared in a transaction.
    pub used: bool,
    /// Unspent outputs currently paying to the address.
    pub utxos: Vec<UnspentOutput>,
}

impl AddressInfo {
    /// An address that never received anything.
    pub fn unused() -> Self {
        Self::default()
    }

    /// Sum of the address's unspent output values.
    ///
    /// Returns `None` on overflow.
    pub fn balance(&self) -> Option<u64> {
        self.utxos
            .iter()
            .try_fold(0u64, |acc, u| acc.checked_add(u.amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;

    #[test]
    fn chain_indices() {
        assert_eq!(Chain::External.index(), 0);
        assert_eq!(Chain::Internal.index(), 1);
        assert!(Chain::External < Chain::Internal);
    }

    #[test]
    fn purpose_round_trip() {
        for st in [ScriptType::P2pkh, ScriptType::P2shP2wpkh, ScriptType::P2wpkh] {
            assert_eq!(ScriptType::from_purpose(st.purpose()), Some(st));
        }
        assert_eq!(ScriptType::from_purpose(86), None);
    }

    #[test]
    fn script_type_serde_names() {
        let json = serde_json::to_string(&ScriptType::P2shP2wpkh).unwrap();
        assert_eq!(json, "\"p2sh-p2wpkh\"");
        assert_eq!(ScriptType::P2shP2wpkh.to_string(), "p2sh-p2wpkh");
    }

    #[test]
    fn address_info_balance() {
        let utxo = |amount| UnspentOutput {
            txid: Txid::all_zeros(),
            vout: 0,
            amount,
            confirmations: 1,
        };
        let info = AddressInfo {
            used: true,
            utxos: vec![utxo(50_000), utxo(30_000)],
        };
        assert_eq!(info.balance(), Some(80_000));

        let overflow = AddressInfo {
            used: true,
            utxos: vec![utxo(u64::MAX), utxo(1)],
        };
        assert_eq!(overflow.balance(), None);
    }

    #[test]
    fn unused_has_no_utxos() {
        let info = AddressInfo::unused();
        assert!(!info.used);
        assert_eq!(info.balance(), Some(0));
    }
}
