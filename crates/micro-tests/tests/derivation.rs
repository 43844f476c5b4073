//! Address derivation against published account vectors.

use micro_core::coins::CoinType;
use micro_core::error::{DerivationError, WalletError};
use micro_core::types::{Chain, ScriptType};
use micro_tests::helpers::*;
use micro_wallet::path::hardened;
use micro_wallet::{derive, Address, DerivationPath, ExtendedPublicKey};

#[test]
fn vectors_match_on_both_chains() {
    for vector in VECTORS {
        let key = vector.key();
        assert_eq!(key.account_path().to_string(), vector.account_path);
        for chain in Chain::BOTH {
            let derived = key.derive_range(chain, 0, 6).unwrap();
            let got: Vec<String> = derived.iter().map(|d| d.address.to_string()).collect();
            let want: Vec<&str> = (0..6).map(|i| vector.address(chain, i)).collect();
            assert_eq!(got, want, "{} {chain}", vector.coin);
        }
    }
}

#[test]
fn derived_paths_extend_account_path() {
    let key = LITECOIN_P2SH.key();
    let d = key.derive(Chain::Internal, 4).unwrap();
    assert_eq!(d.path.to_string(), "m/49'/2'/15'/1/4");
    assert_eq!(d.script_type, ScriptType::P2shP2wpkh);
    assert_eq!(d.chain, Chain::Internal);
    assert_eq!(d.index, 4);
}

#[test]
fn derivation_is_deterministic() {
    let key = BITCOIN_NATIVE.key();
    let a = key.derive(Chain::External, 3).unwrap();
    let b = BITCOIN_NATIVE.key().derive(Chain::External, 3).unwrap();
    assert_eq!(a, b);

    let root = ExtendedPublicKey::parse(BITCOIN_NATIVE.xpub, CoinType::Bitcoin).unwrap().0;
    let path: DerivationPath = "0/3".parse().unwrap();
    let (pk1, addr1) = derive(&root, CoinType::Bitcoin, ScriptType::P2wpkh, &path).unwrap();
    let (pk2, addr2) = derive(&root, CoinType::Bitcoin, ScriptType::P2wpkh, &path).unwrap();
    assert_eq!(pk1, pk2);
    assert_eq!(addr1, addr2);
    assert_eq!(addr1.to_string(), BITCOIN_NATIVE.external[3]);
    assert_eq!(pk1, a.public_key);
}

#[test]
fn hardened_segment_is_rejected() {
    let root = ExtendedPublicKey::parse(BITCOIN_NATIVE.xpub, CoinType::Bitcoin).unwrap().0;
    let path = DerivationPath::from(vec![0, hardened(1)]);
    let err = derive(&root, CoinType::Bitcoin, ScriptType::P2wpkh, &path).unwrap_err();
    assert_eq!(
        err,
        WalletError::Derivation(DerivationError::HardenedDerivationUnsupported {
            index: hardened(1)
        })
    );
}

#[test]
fn wrong_coin_key_is_rejected() {
    let err = ExtendedPublicKey::parse(DOGECOIN_LEGACY.xpub, CoinType::Bitcoin).unwrap_err();
    assert!(matches!(err, DerivationError::UnknownKeyVersion { .. }));
}

#[test]
fn extended_key_reencodes_with_original_prefix() {
    for vector in VECTORS {
        let (key, _) = ExtendedPublicKey::parse(vector.xpub, vector.coin).unwrap();
        assert_eq!(key.encode(), vector.xpub);
    }
}

#[test]
fn vector_addresses_parse_back() {
    for vector in VECTORS {
        for s in vector.external.iter().chain(&vector.internal) {
            let address = Address::parse(s, vector.coin).unwrap();
            assert_eq!(address.to_string(), *s);
        }
    }
}
