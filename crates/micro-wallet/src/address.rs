//! Address encoding for Bitcoin-family coins.
//!
//! Base58check for P2PKH/P2SH with per-coin version prefixes, bech32 (and
//! bech32m for witness v1+) with the coin's human-readable part.

use std::fmt;

use bitcoin::base58;
use bitcoin::bech32::{segwit, Fe32, Hrp};
use bitcoin::hashes::Hash;
use bitcoin::{CompressedPublicKey, PubkeyHash, ScriptBuf, ScriptHash};
use micro_core::coins::CoinType;
use micro_core::error::AddressError;
use micro_core::types::ScriptType;

/// Decoded address payload. Closed set of the output kinds the wallet pays to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    PubkeyHash(PubkeyHash),
    ScriptHash(ScriptHash),
    /// Segwit output of any version; v0 programs are 20 or 32 bytes.
    WitnessProgram { version: u8, program: Vec<u8> },
}

/// An address bound to the coin whose encoding it uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    coin: CoinType,
    payload: Payload,
}

impl Address {
    /// Address of `script_type` for a public key.
    pub fn from_public_key(
        coin: CoinType,
        script_type: ScriptType,
        public_key: &CompressedPublicKey,
    ) -> Result<Self, AddressError> {
        let params = coin.params();
        let payload = match script_type {
            ScriptType::P2pkh => Payload::PubkeyHash(public_key.pubkey_hash()),
            ScriptType::P2shP2wpkh => {
                let redeem = ScriptBuf::new_p2wpkh(&public_key.wpubkey_hash());
                Payload::ScriptHash(ScriptHash::hash(redeem.as_bytes()))
            }
            ScriptType::P2wpkh => {
                if params.bech32_prefix.is_none() {
                    return Err(AddressError::SegwitUnsupported {
                        coin: coin.to_string(),
                    });
                }
                Payload::WitnessProgram {
                    version: 0,
                    program: public_key.wpubkey_hash().to_byte_array().to_vec(),
                }
            }
        };
        Ok(Self { coin, payload })
    }

    /// Parse an address string for `coin`.
    ///
    /// Addresses that are well-formed but belong to another coin or network
    /// fail with [`AddressError::WrongNetwork`].
    pub fn parse(s: &str, coin: CoinType) -> Result<Self, AddressError> {
        let s = s.trim();
        let params = coin.params();
        let wrong_network = || AddressError::WrongNetwork {
            address: s.to_string(),
            coin: coin.to_string(),
        };

        if let Ok(data) = base58::decode_check(s) {
            let hash = |prefix: &[u8]| -> Option<[u8; 20]> {
                let rest = data.strip_prefix(prefix)?;
                rest.try_into().ok()
            };
            if let Some(h) = hash(&version_bytes(params.address_type)) {
                return Ok(Self {
                    coin,
                    payload: Payload::PubkeyHash(PubkeyHash::from_byte_array(h)),
                });
            }
            if let Some(h) = hash(&version_bytes(params.address_type_p2sh)) {
                return Ok(Self {
                    coin,
                    payload: Payload::ScriptHash(ScriptHash::from_byte_array(h)),
                });
            }
            return Err(wrong_network());
        }

        match segwit::decode(s) {
            Ok((hrp, version, program)) => {
                let Some(prefix) = params.bech32_prefix else {
                    return Err(AddressError::SegwitUnsupported {
                        coin: coin.to_string(),
                    });
                };
                if !hrp.as_str().eq_ignore_ascii_case(prefix) {
                    return Err(wrong_network());
                }
                Ok(Self {
                    coin,
                    payload: Payload::WitnessProgram {
                        version: version.to_u8(),
                        program,
                    },
                })
            }
            Err(e) => Err(AddressError::InvalidEncoding(format!("{s}: {e}"))),
        }
    }

    pub fn coin(&self) -> CoinType {
        self.coin
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Output script paying to this address.
    pub fn script_pubkey(&self) -> ScriptBuf {
        match &self.payload {
            Payload::PubkeyHash(h) => ScriptBuf::new_p2pkh(h),
            Payload::ScriptHash(h) => ScriptBuf::new_p2sh(h),
            Payload::WitnessProgram { version, program } => {
                // OP_0 or OP_1..OP_16, then a single direct push
                let mut bytes = Vec::with_capacity(program.len() + 2);
                bytes.push(if *version == 0 { 0x00 } else { 0x50 + version });
                bytes.push(program.len() as u8);
                bytes.extend_from_slice(program);
                ScriptBuf::from_bytes(bytes)
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self.coin.params();
        match &self.payload {
            Payload::PubkeyHash(h) => {
                let mut data = version_bytes(params.address_type);
                data.extend_from_slice(h.as_byte_array());
                f.write_str(&base58::encode_check(&data))
            }
            Payload::ScriptHash(h) => {
                let mut data = version_bytes(params.address_type_p2sh);
                data.extend_from_slice(h.as_byte_array());
                f.write_str(&base58::encode_check(&data))
            }
            Payload::WitnessProgram { version, program } => {
                let prefix = params.bech32_prefix.ok_or(fmt::Error)?;
                let hrp = Hrp::parse(prefix).map_err(|_| fmt::Error)?;
                let version = Fe32::try_from(*version).map_err(|_| fmt::Error)?;
                let encoded = segwit::encode(hrp, version, program).map_err(|_| fmt::Error)?;
                f.write_str(&encoded)
            }
        }
    }
}

/// Big-endian version prefix, at least one byte.
fn version_bytes(version: u32) -> Vec<u8> {
    let bytes = version.to_be_bytes();
    let skip = bytes.iter().take(3).take_while(|&&b| b == 0).count();
    bytes[skip..].to_vec()
}
