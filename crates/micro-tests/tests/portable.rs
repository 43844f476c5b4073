//! Portable form of funded transactions for every account type.

use bitcoin::bip32::Fingerprint;
use micro_core::constants::{PORTABLE_FORMAT, PORTABLE_VERSION};
use micro_core::error::SerializationError;
use micro_core::types::Chain;
use micro_tests::helpers::*;
use micro_wallet::{
    from_portable, to_portable, Address, CoinSelector, SelectionPolicy, SelectionTarget,
    TransactionBuilder, UnsignedTransaction, WalletUtxo,
};
use proptest::prelude::*;
use serde_json::Value;

/// Spend `amounts` held at the vector's first external addresses, paying
/// `share` percent of them to its last external address.
fn funded(
    vector: &AccountVector,
    amounts: &[u64],
    share: u64,
    fingerprint: Option<Fingerprint>,
) -> Option<UnsignedTransaction> {
    let key = vector.key();
    let wallet: Vec<WalletUtxo> = amounts
        .iter()
        .enumerate()
        .map(|(i, &amount)| wallet_utxo(&key, i as u32, amount, 1))
        .collect();
    let destination = Address::parse(vector.external[5], vector.coin).unwrap();
    let change = key.derive(Chain::Internal, 0).unwrap();
    let amount = amounts.iter().sum::<u64>() * share / 100;
    let target = SelectionTarget {
        amount,
        destination_script_len: destination.script_pubkey().len(),
        change_script_len: change.address.script_pubkey().len(),
    };
    let policy = SelectionPolicy::for_coin(vector.coin.params());
    let selection = CoinSelector::select(&wallet, &target, &policy).ok()?;
    let tx = TransactionBuilder::from_selection(vector.coin, &selection, Some(&change))
        .pay_to(destination, amount)
        .lock_time(800_000)
        .master_fingerprint(fingerprint)
        .build()
        .unwrap();
    Some(tx)
}

#[test]
fn litecoin_wrapped_segwit_document() {
    let tx = funded(&LITECOIN_P2SH, &[5_000_000, 2_000_000], 50, None).unwrap();
    let doc: Value = serde_json::from_slice(&to_portable(&tx).unwrap()).unwrap();

    assert_eq!(doc["format"], PORTABLE_FORMAT);
    assert_eq!(doc["version"], PORTABLE_VERSION);
    assert_eq!(doc["coin"], "litecoin");
    assert_eq!(doc["lock_time"], 800_000);
    assert!(doc.get("master_fingerprint").is_none());
    assert_eq!(doc["inputs"][0]["path"], "m/49'/2'/15'/0/0");
    assert_eq!(doc["inputs"][0]["script_type"], "p2sh-p2wpkh");
    assert_eq!(doc["outputs"][0]["address"], LITECOIN_P2SH.external[5]);
    assert_eq!(doc["outputs"][1]["address"], LITECOIN_P2SH.internal[0]);
    assert_eq!(doc["outputs"][1]["change_path"], "m/49'/2'/15'/1/0");
    // OP_HASH160 <20> OP_EQUAL
    let script = doc["outputs"][0]["script_pubkey"].as_str().unwrap();
    assert!(script.starts_with("a914") && script.ends_with("87"));
}

#[test]
fn dogecoin_legacy_round_trip() {
    let fingerprint = Fingerprint::from([0xd3, 0x4d, 0xb3, 0x3f]);
    let tx = funded(
        &DOGECOIN_LEGACY,
        &[5_000_000_000, 1_000_000_000],
        40,
        Some(fingerprint),
    )
    .unwrap();
    let bytes = to_portable(&tx).unwrap();
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(doc["master_fingerprint"], "d34db33f");
    assert_eq!(doc["inputs"][0]["script_type"], "p2pkh");
    assert_eq!(from_portable(&bytes).unwrap(), tx);
}

#[test]
fn document_for_another_coin_is_rejected() {
    let tx = funded(&DOGECOIN_LEGACY, &[5_000_000_000], 40, None).unwrap();
    let mut doc: Value = serde_json::from_slice(&to_portable(&tx).unwrap()).unwrap();
    doc["coin"] = Value::from("bitcoin");
    let err = from_portable(&serde_json::to_vec(&doc).unwrap()).unwrap_err();
    assert!(matches!(err, SerializationError::Inconsistent(_)), "{err:?}");
}

#[test]
fn non_json_input_is_malformed() {
    let err = from_portable(b"not json at all").unwrap_err();
    assert!(matches!(err, SerializationError::Malformed(_)), "{err:?}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Whatever the coin and shape of the spend, decoding the portable
    /// form gives back the transaction that was encoded.
    #[test]
    fn portable_round_trip(
        which in 0usize..VECTORS.len(),
        amounts in proptest::collection::vec(20_000_000u64..5_000_000_000, 1..5),
        share in 1u64..95,
        fingerprint in proptest::option::of(any::<[u8; 4]>()),
    ) {
        let vector = VECTORS[which];
        let fingerprint = fingerprint.map(Fingerprint::from);
        let Some(tx) = funded(vector, &amounts, share, fingerprint) else {
            return Ok(());
        };
        let bytes = to_portable(&tx).unwrap();
        let decoded = from_portable(&bytes).unwrap();
        prop_assert_eq!(&decoded, &tx);
        prop_assert_eq!(decoded.unsigned_txid(), tx.unsigned_txid());
        prop_assert_eq!(to_portable(&decoded).unwrap(), bytes);
    }
}
