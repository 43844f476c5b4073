//! Portable JSON form of unsigned transactions, for offline signing.
//!
//! The envelope carries a format tag and version. Decoding checks both,
//! re-parses every address for the declared coin, and rejects documents
//! whose amounts, scripts or paths contradict each other, so a decoded
//! transaction satisfies the same invariants as a built one.

use bitcoin::bip32::Fingerprint;
use bitcoin::{ScriptBuf, Txid};
use micro_core::coins::CoinType;
use micro_core::constants::{PORTABLE_FORMAT, PORTABLE_VERSION};
use micro_core::error::SerializationError;
use micro_core::types::ScriptType;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::builder::{UnsignedInput, UnsignedOutput, UnsignedTransaction};
use crate::derivation::script_type_for_path;
use crate::path::DerivationPath;

#[derive(Debug, Deserialize)]
struct Header {
    format: String,
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct PortableTransaction {
    format: String,
    version: u32,
    coin: CoinType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    master_fingerprint: Option<String>,
    tx_version: i32,
    lock_time: u32,
    inputs: Vec<PortableInput>,
    outputs: Vec<PortableOutput>,
    fee: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PortableInput {
    txid: Txid,
    vout: u32,
    amount: u64,
    path: DerivationPath,
    script_type: ScriptType,
    sequence: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct PortableOutput {
    address: String,
    /// Hex; redundant with `address`, kept for signers without address codecs.
    script_pubkey: String,
    amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    change_path: Option<DerivationPath>,
}

/// Encode as pretty-printed JSON.
pub fn to_portable(tx: &UnsignedTransaction) -> Result<Vec<u8>, SerializationError> {
    let doc = PortableTransaction {
        format: PORTABLE_FORMAT.to_string(),
        version: PORTABLE_VERSION,
        coin: tx.coin,
        master_fingerprint: tx.master_fingerprint.map(|f| f.to_string()),
        tx_version: tx.version,
        lock_time: tx.lock_time,
        inputs: tx
            .inputs
            .iter()
            .map(|i| PortableInput {
                txid: i.txid,
                vout: i.vout,
                amount: i.amount,
                path: i.path.clone(),
                script_type: i.script_type,
                sequence: i.sequence,
            })
            .collect(),
        outputs: tx
            .outputs
            .iter()
            .map(|o| PortableOutput {
                address: o.address.to_string(),
                script_pubkey: hex::encode(o.address.script_pubkey().as_bytes()),
                amount: o.amount,
                change_path: o.change_path.clone(),
            })
            .collect(),
        fee: tx.fee,
    };
    Ok(serde_json::to_vec_pretty(&doc)?)
}

/// Decode and validate a portable transaction.
pub fn from_portable(bytes: &[u8]) -> Result<UnsignedTransaction, SerializationError> {
    let header: Header = serde_json::from_slice(bytes)?;
    if header.format != PORTABLE_FORMAT {
        return Err(SerializationError::UnsupportedFormat(header.format));
    }
    if header.version != PORTABLE_VERSION {
        return Err(SerializationError::UnsupportedVersion(header.version));
    }
    let doc: PortableTransaction = serde_json::from_slice(bytes)?;
    let coin = doc.coin;

    let master_fingerprint = doc
        .master_fingerprint
        .map(|f| {
            f.parse::<Fingerprint>()
                .map_err(|e| SerializationError::Malformed(format!("master fingerprint {f}: {e}")))
        })
        .transpose()?;

    let inputs = doc
        .inputs
        .into_iter()
        .enumerate()
        .map(|(index, i)| {
            let implied = script_type_for_path(&i.path)
                .map_err(|e| SerializationError::Inconsistent(format!("input {index}: {e}")))?;
            if implied != i.script_type {
                return Err(SerializationError::Inconsistent(format!(
                    "input {index}: path {} is not a {} path",
                    i.path, i.script_type
                )));
            }
            Ok(UnsignedInput {
                txid: i.txid,
                vout: i.vout,
                amount: i.amount,
                path: i.path,
                script_type: i.script_type,
                sequence: i.sequence,
            })
        })
        .collect::<Result<Vec<_>, SerializationError>>()?;

    let outputs = doc
        .outputs
        .into_iter()
        .enumerate()
        .map(|(index, o)| {
            let address = Address::parse(&o.address, coin)
                .map_err(|e| SerializationError::Inconsistent(format!("output {index}: {e}")))?;
            let script = hex::decode(&o.script_pubkey)
                .map(ScriptBuf::from_bytes)
                .map_err(|e| SerializationError::Malformed(format!("output {index} script: {e}")))?;
            if script != address.script_pubkey() {
                return Err(SerializationError::Inconsistent(format!(
                    "output {index}: script does not pay to {}",
                    o.address
                )));
            }
            Ok(UnsignedOutput {
                address,
                amount: o.amount,
                change_path: o.change_path,
            })
        })
        .collect::<Result<Vec<_>, SerializationError>>()?;

    let tx = UnsignedTransaction {
        coin,
        version: doc.tx_version,
        lock_time: doc.lock_time,
        inputs,
        outputs,
        fee: doc.fee,
        master_fingerprint,
    };
    tx.validate()
        .map_err(|e| SerializationError::Inconsistent(e.to_string()))?;
    Ok(tx)
}
