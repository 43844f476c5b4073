//! Account keys and address derivation.
//!
//! An [`AccountKey`] is the account-level extended public key plus what is
//! needed to rebuild full paths from the master key: coin, script type and
//! account index (and optionally the master fingerprint). Derivation below
//! the account is public-only, so only normal (unhardened) segments work.

use bitcoin::bip32::{ChildNumber, Fingerprint};
use bitcoin::CompressedPublicKey;
use micro_core::coins::CoinType;
use micro_core::error::{DerivationError, WalletError};
use micro_core::types::{Chain, ScriptType};

use crate::address::Address;
use crate::path::DerivationPath;
use crate::xpub::ExtendedPublicKey;

/// Derive the address at `path` below `root`, encoded as `script_type`.
///
/// Pure and deterministic. A hardened segment anywhere in `path` fails with
/// [`DerivationError::HardenedDerivationUnsupported`].
pub fn derive(
    root: &ExtendedPublicKey,
    coin: CoinType,
    script_type: ScriptType,
    path: &DerivationPath,
) -> Result<(CompressedPublicKey, Address), WalletError> {
    let public_key = root.derive_path(path)?.public_key();
    let address = Address::from_public_key(coin, script_type, &public_key)?;
    Ok((public_key, address))
}

/// Script type selected by the purpose field of a full path.
pub fn script_type_for_path(path: &DerivationPath) -> Result<ScriptType, DerivationError> {
    let purpose = path
        .purpose()
        .ok_or_else(|| DerivationError::InvalidPath(format!("{path}: no hardened purpose")))?;
    ScriptType::from_purpose(purpose)
        .ok_or_else(|| DerivationError::InvalidPath(format!("{path}: unsupported purpose {purpose}")))
}

/// Account index recorded in a key at depth 3 (`m/purpose'/coin'/account'`).
fn embedded_account(key: &ExtendedPublicKey) -> Option<u32> {
    match (key.depth(), key.child_number()) {
        (3, ChildNumber::Hardened { index }) => Some(index),
        _ => None,
    }
}

/// A derived address with everything a detached signer needs to find its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAddress {
    pub chain: Chain,
    pub index: u32,
    /// Full path from the master key.
    pub path: DerivationPath,
    pub script_type: ScriptType,
    pub public_key: CompressedPublicKey,
    pub address: Address,
}

/// Account root: the account-level key and its position in the key tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountKey {
    coin: CoinType,
    script_type: ScriptType,
    account: u32,
    xpub: ExtendedPublicKey,
    master_fingerprint: Option<Fingerprint>,
}

impl AccountKey {
    /// Parse an account extended public key.
    ///
    /// The key's SLIP-132 magic selects the script type. An explicit
    /// `script_type` may override a plain legacy magic (wallets commonly
    /// export every account as `xpub`), but must agree with a segwit magic.
    ///
    /// Without an explicit `account`, the index is read from the key itself
    /// when it sits at account depth, and is 0 otherwise.
    pub fn from_xpub(
        coin: CoinType,
        xpub: &str,
        account: Option<u32>,
        script_type: Option<ScriptType>,
    ) -> Result<Self, DerivationError> {
        let (key, implied) = ExtendedPublicKey::parse(xpub, coin)?;
        let account = account.or_else(|| embedded_account(&key)).unwrap_or(0);
        let script_type = match script_type {
            None => implied,
            Some(explicit) if explicit == implied || implied == ScriptType::P2pkh => explicit,
            Some(explicit) => {
                return Err(DerivationError::InvalidExtendedKey(format!(
                    "{implied} key cannot be used as a {explicit} account"
                )));
            }
        };
        Self::new(coin, script_type, account, key)
    }

    /// Build an account key from already decoded parts.
    ///
    /// A key at account depth must have been derived for `account`, or every
    /// path handed to a signer would point at a different key.
    pub fn new(
        coin: CoinType,
        script_type: ScriptType,
        account: u32,
        xpub: ExtendedPublicKey,
    ) -> Result<Self, DerivationError> {
        if !coin.params().supports(script_type) {
            return Err(DerivationError::UnsupportedScriptType {
                script_type: script_type.to_string(),
                coin: coin.to_string(),
            });
        }
        if crate::path::is_hardened(account) {
            return Err(DerivationError::InvalidPath(format!(
                "account index {account} out of range"
            )));
        }
        if let Some(key) = embedded_account(&xpub).filter(|&key| key != account) {
            return Err(DerivationError::AccountMismatch {
                requested: account,
                key,
            });
        }
        Ok(Self {
            coin,
            script_type,
            account,
            xpub,
            master_fingerprint: None,
        })
    }

    /// Attach the fingerprint of the master key the account descends from.
    pub fn with_master_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.master_fingerprint = Some(fingerprint);
        self
    }

    pub fn coin(&self) -> CoinType {
        self.coin
    }

    pub fn script_type(&self) -> ScriptType {
        self.script_type
    }

    pub fn account(&self) -> u32 {
        self.account
    }

    pub fn xpub(&self) -> &ExtendedPublicKey {
        &self.xpub
    }

    pub fn master_fingerprint(&self) -> Option<Fingerprint> {
        self.master_fingerprint
    }

    /// `m/purpose'/slip44'/account'`.
    pub fn account_path(&self) -> DerivationPath {
        DerivationPath::account(
            self.script_type.purpose(),
            self.coin.params().slip44,
            self.account,
        )
    }

    /// Address `index` on `chain`.
    pub fn derive(&self, chain: Chain, index: u32) -> Result<DerivedAddress, WalletError> {
        let relative = DerivationPath::from(vec![chain.index(), index]);
        let (public_key, address) = derive(&self.xpub, self.coin, self.script_type, &relative)?;
        Ok(DerivedAddress {
            chain,
            index,
            path: self.account_path().extend(&relative),
            script_type: self.script_type,
            public_key,
            address,
        })
    }

    /// Addresses `start..start + count` on `chain`.
    ///
    /// The chain key is derived once and reused for every index.
    pub fn derive_range(
        &self,
        chain: Chain,
        start: u32,
        count: u32,
    ) -> Result<Vec<DerivedAddress>, WalletError> {
        let chain_key = self.xpub.child(chain.index())?;
        let chain_path = self.account_path().child(chain.index());
        let end = start.checked_add(count).ok_or_else(|| {
            DerivationError::InvalidPath(format!("address index {start} + {count} overflows"))
        })?;
        (start..end)
            .map(|index| -> Result<DerivedAddress, WalletError> {
                let public_key = chain_key.child(index)?.public_key();
                let address = Address::from_public_key(self.coin, self.script_type, &public_key)?;
                Ok(DerivedAddress {
                    chain,
                    index,
                    path: chain_path.child(index),
                    script_type: self.script_type,
                    public_key,
                    address,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::hardened;

    const MTUB: &str = "Mtub2syZtptY6mWDbfUYxStNwpWfnC1GCjgn94i7LACu9euPviukSSVptfWu8kC7LKjD2pEUAf4Tk78zEG3eNEeFp1vdCuEaWu4thgYCiTP5fiA";
    const DGUB: &str = "dgub8sbe5Mi8LA4eBLHDvNhQWYu8awPXZThRPr4B4o3yzUYx4HswUunt8C5pTCQS45ZGcEaTbeJ1NuwyTfD8hERktZw3r3r3iypBnAAxhNxQLFM";
    const ZPUB: &str = "zpub6rszzdAK6RubKxxKxydVq6Bpjz1mt8BBitik5JMBy3QZeegBLHYp9Nw5UR6xa6PrMdn4hfF79rQcfri7pvqo5jJdrYj1WowiVDtGBjD9nbS";

    #[test]
    fn litecoin_wrapped_segwit_addresses() {
        let key = AccountKey::from_xpub(CoinType::Litecoin, MTUB, Some(15), None).unwrap();
        assert_eq!(key.script_type(), ScriptType::P2shP2wpkh);
        assert_eq!(
            key.derive(Chain::External, 0).unwrap().address.to_string(),
            "MCbzx1zB9ArzrcW5ZRmynMXEjLaYrxp33h"
        );
        assert_eq!(
            key.derive(Chain::External, 1).unwrap().address.to_string(),
            "M9uuC491JF577P7A2BF7kRQSqC3kqKgP2y"
        );
        assert_eq!(
            key.derive(Chain::Internal, 0).unwrap().address.to_string(),
            "MMq3nsjgxSmo567SY9onBE7mZZLzF7d7oa"
        );
    }

    #[test]
    fn dogecoin_legacy_addresses() {
        let key = AccountKey::from_xpub(CoinType::Dogecoin, DGUB, Some(15), None).unwrap();
        assert_eq!(key.script_type(), ScriptType::P2pkh);
        let external = key.derive_range(Chain::External, 0, 2).unwrap();
        assert_eq!(external[0].address.to_string(), "DBvD76yuDdqSRKXh65pyFbL3bJuqY2jnbX");
        assert_eq!(external[1].address.to_string(), "D7vFBCNtnsZXtK2TshbqUzgvHT7GXWo8Yq");
        assert_eq!(
            key.derive(Chain::Internal, 0).unwrap().address.to_string(),
            "DBnLen5bVcRDFAeYJ4ny4G1anM1L3zSJjN"
        );
    }

    #[test]
    fn bitcoin_native_segwit_addresses() {
        let key = AccountKey::from_xpub(CoinType::Bitcoin, ZPUB, Some(15), None).unwrap();
        let ext = key.derive_range(Chain::External, 0, 2).unwrap();
        assert_eq!(ext[0].address.to_string(), "bc1q9yjrygcxx93ur9jgmjle60l8kqwwcxllld3d7s");
        assert_eq!(ext[1].address.to_string(), "bc1qdpupdw26jrhav4hflaljgvk8r7c0z284prlpwe");
        let change = key.derive_range(Chain::Internal, 0, 2).unwrap();
        assert_eq!(change[0].address.to_string(), "bc1qa9rdzekzgzykr73aswftf0pxwng5xpryklyd9l");
        assert_eq!(change[1].address.to_string(), "bc1qut7auk2zsr790qhzf7y4wfq5sts5urvuzzmc88");
        assert_eq!(change[1].path.to_string(), "m/84'/0'/15'/1/1");
    }

    #[test]
    fn derive_is_deterministic() {
        let key = AccountKey::from_xpub(CoinType::Bitcoin, ZPUB, None, None).unwrap();
        let a = key.derive(Chain::External, 7).unwrap();
        let b = key.derive(Chain::External, 7).unwrap();
        assert_eq!(a, b);
        let ranged = key.derive_range(Chain::External, 5, 3).unwrap();
        assert_eq!(ranged[2], a);
    }

    #[test]
    fn hardened_segment_is_rejected() {
        let key = AccountKey::from_xpub(CoinType::Bitcoin, ZPUB, None, None).unwrap();
        let err = key.derive(Chain::External, hardened(1)).unwrap_err();
        assert_eq!(
            err,
            WalletError::Derivation(DerivationError::HardenedDerivationUnsupported {
                index: hardened(1)
            })
        );
        let path: DerivationPath = "m/0'/0".parse().unwrap();
        assert!(derive(key.xpub(), CoinType::Bitcoin, ScriptType::P2wpkh, &path).is_err());
    }

    #[test]
    fn account_path_from_type_and_coin() {
        let key = AccountKey::from_xpub(CoinType::Litecoin, MTUB, None, None).unwrap();
        assert_eq!(key.account(), 15);
        assert_eq!(key.account_path().to_string(), "m/49'/2'/15'");
        assert_eq!(script_type_for_path(&key.account_path()).unwrap(), ScriptType::P2shP2wpkh);
    }

    #[test]
    fn explicit_type_must_agree_with_segwit_magic() {
        assert!(AccountKey::from_xpub(CoinType::Bitcoin, ZPUB, None, Some(ScriptType::P2pkh)).is_err());
        assert!(AccountKey::from_xpub(CoinType::Bitcoin, ZPUB, None, Some(ScriptType::P2wpkh)).is_ok());
    }

    #[test]
    fn legacy_magic_accepts_override() {
        let xpub = "xpub6BiVtCpG9fQQdziwDT8EyYPLnuXs14FwNZqGHhMzPDMdLKc97agwFKMb3FfiweRsnqkeHYymF31RJc9EozZxHUSHzkjQ2H9SKGe7GmRDGPM";
        let key = AccountKey::from_xpub(CoinType::Bitcoin, xpub, Some(15), Some(ScriptType::P2wpkh)).unwrap();
        assert_eq!(key.account_path().to_string(), "m/84'/0'/15'");
    }

    #[test]
    fn dogecoin_rejects_segwit_accounts() {
        let err = AccountKey::from_xpub(CoinType::Dogecoin, DGUB, None, Some(ScriptType::P2wpkh)).unwrap_err();
        assert!(matches!(err, DerivationError::UnsupportedScriptType { .. }));
    }

    #[test]
    fn unsupported_purpose() {
        let path: DerivationPath = "m/86'/0'/0'".parse().unwrap();
        assert!(script_type_for_path(&path).is_err());
        assert!(script_type_for_path(&"0/1".parse().unwrap()).is_err());
    }

    #[test]
    fn account_must_match_the_key() {
        let err = AccountKey::from_xpub(CoinType::Bitcoin, ZPUB, Some(0), None).unwrap_err();
        assert_eq!(
            err,
            DerivationError::AccountMismatch {
                requested: 0,
                key: 15
            }
        );
        let (xpub, _) = ExtendedPublicKey::parse(DGUB, CoinType::Dogecoin).unwrap();
        assert!(AccountKey::new(CoinType::Dogecoin, ScriptType::P2pkh, 3, xpub).is_err());
        assert!(AccountKey::new(CoinType::Dogecoin, ScriptType::P2pkh, 15, xpub).is_ok());
    }

    #[test]
    fn account_defaults_to_the_key() {
        let key = AccountKey::from_xpub(CoinType::Bitcoin, ZPUB, None, None).unwrap();
        assert_eq!(key.account(), 15);
        assert_eq!(
            key.derive(Chain::External, 0).unwrap().path.to_string(),
            "m/84'/0'/15'/0/0"
        );
    }
}
