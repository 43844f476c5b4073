//! Coin table.
//!
//! Every supported coin is a [`CoinType`] variant with a static
//! [`CoinParams`] record: SLIP-44 id, base58 version bytes, bech32 HRP,
//! SLIP-132 extended key magics, dust limit and fee-rate floor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::ScriptType;

/// Static parameters of a Bitcoin-family coin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinParams {
    /// Human-readable coin name.
    pub name: &'static str,
    /// Ticker symbol used when printing amounts.
    pub shortcut: &'static str,
    /// SLIP-44 coin type, the second hardened segment of account paths.
    pub slip44: u32,
    /// Base58 version of P2PKH addresses.
    pub address_type: u32,
    /// Base58 version of P2SH addresses.
    pub address_type_p2sh: u32,
    /// Bech32 human-readable part, if the coin has native segwit.
    pub bech32_prefix: Option<&'static str>,
    /// Extended public key magic of legacy (BIP-44) accounts.
    pub xpub_magic: u32,
    /// Extended public key magic of wrapped-segwit (BIP-49) accounts.
    pub xpub_magic_segwit_p2sh: Option<u32>,
    /// Extended public key magic of native-segwit (BIP-84) accounts.
    pub xpub_magic_segwit_native: Option<u32>,
    /// Outputs at or below this value are not worth creating.
    pub dust_limit: u64,
    /// Minimum relay fee rate in smallest units per 1000 virtual bytes.
    pub min_relay_fee_per_kb: u64,
    /// Fee rate used when no estimate is available, per 1000 virtual bytes.
    pub default_fee_per_kb: u64,
}

impl CoinParams {
    /// Whether the coin supports segregated witness.
    pub fn segwit(&self) -> bool {
        self.xpub_magic_segwit_p2sh.is_some() || self.xpub_magic_segwit_native.is_some()
    }

    /// Whether addresses of the given script type can be produced for this coin.
    pub fn supports(&self, script_type: ScriptType) -> bool {
        match script_type {
            ScriptType::P2pkh => true,
            ScriptType::P2shP2wpkh => self.xpub_magic_segwit_p2sh.is_some(),
            ScriptType::P2wpkh => {
                self.xpub_magic_segwit_native.is_some() && self.bech32_prefix.is_some()
            }
        }
    }

    /// Extended key magic used to encode accounts of the given script type.
    pub fn xpub_magic_for(&self, script_type: ScriptType) -> Option<u32> {
        match script_type {
            ScriptType::P2pkh => Some(self.xpub_magic),
            ScriptType::P2shP2wpkh => self.xpub_magic_segwit_p2sh,
            ScriptType::P2wpkh => self.xpub_magic_segwit_native,
        }
    }

    /// Script type implied by an extended key magic, if the magic belongs to this coin.
    pub fn script_type_for_magic(&self, magic: u32) -> Option<ScriptType> {
        if magic == self.xpub_magic {
            Some(ScriptType::P2pkh)
        } else if Some(magic) == self.xpub_magic_segwit_p2sh {
            Some(ScriptType::P2shP2wpkh)
        } else if Some(magic) == self.xpub_magic_segwit_native {
            Some(ScriptType::P2wpkh)
        } else {
            None
        }
    }

    /// Account type used when the caller does not pick one.
    pub fn default_script_type(&self) -> ScriptType {
        if self.xpub_magic_segwit_p2sh.is_some() {
            ScriptType::P2shP2wpkh
        } else {
            ScriptType::P2pkh
        }
    }
}

static BITCOIN: CoinParams = CoinParams {
    name: "Bitcoin",
    shortcut: "BTC",
    slip44: 0,
    address_type: 0,
    address_type_p2sh: 5,
    bech32_prefix: Some("bc"),
    xpub_magic: 0x0488_b21e,
    xpub_magic_segwit_p2sh: Some(0x049d_7cb2),
    xpub_magic_segwit_native: Some(0x04b2_4746),
    dust_limit: 546,
    min_relay_fee_per_kb: 1_000,
    default_fee_per_kb: 10_000,
};

static TESTNET: CoinParams = CoinParams {
    name: "Testnet",
    shortcut: "TEST",
    slip44: 1,
    address_type: 111,
    address_type_p2sh: 196,
    bech32_prefix: Some("tb"),
    xpub_magic: 0x0435_87cf,
    xpub_magic_segwit_p2sh: Some(0x044a_5262),
    xpub_magic_segwit_native: Some(0x045f_1cf6),
    dust_limit: 546,
    min_relay_fee_per_kb: 1_000,
    default_fee_per_kb: 10_000,
};

static LITECOIN: CoinParams = CoinParams {
    name: "Litecoin",
    shortcut: "LTC",
    slip44: 2,
    address_type: 48,
    address_type_p2sh: 50,
    bech32_prefix: Some("ltc"),
    xpub_magic: 0x019d_a462,
    xpub_magic_segwit_p2sh: Some(0x01b2_6ef6),
    xpub_magic_segwit_native: Some(0x04b2_4746),
    dust_limit: 54_600,
    min_relay_fee_per_kb: 1_000,
    default_fee_per_kb: 10_000,
};

static DOGECOIN: CoinParams = CoinParams {
    name: "Dogecoin",
    shortcut: "DOGE",
    slip44: 3,
    address_type: 30,
    address_type_p2sh: 22,
    bech32_prefix: None,
    xpub_magic: 0x02fa_cafd,
    xpub_magic_segwit_p2sh: None,
    xpub_magic_segwit_native: None,
    dust_limit: 10_000_000,
    min_relay_fee_per_kb: 1_000_000,
    default_fee_per_kb: 1_000_000,
};

/// Supported coins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinType {
    Bitcoin,
    Testnet,
    Litecoin,
    Dogecoin,
}

impl CoinType {
    /// Every supported coin, in table order.
    pub const ALL: [CoinType; 4] = [
        CoinType::Bitcoin,
        CoinType::Testnet,
        CoinType::Litecoin,
        CoinType::Dogecoin,
    ];

    /// Static parameters of this coin.
    pub fn params(self) -> &'static CoinParams {
        match self {
            Self::Bitcoin => &BITCOIN,
            Self::Testnet => &TESTNET,
            Self::Litecoin => &LITECOIN,
            Self::Dogecoin => &DOGECOIN,
        }
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.params().name)
    }
}

impl FromStr for CoinType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bitcoin" | "btc" => Ok(Self::Bitcoin),
            "testnet" | "test" | "tbtc" => Ok(Self::Testnet),
            "litecoin" | "ltc" => Ok(Self::Litecoin),
            "dogecoin" | "doge" => Ok(Self::Dogecoin),
            _ => Err(ConfigError::UnknownCoin(s.to_string())),
        }
    }
}
