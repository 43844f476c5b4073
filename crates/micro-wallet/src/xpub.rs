//! SLIP-132 extended public keys.
//!
//! Coins and account types use different version magics for the same
//! 78-byte BIP-32 payload (`xpub`, `ypub`, `zpub`, `Ltub`, `dgub`, ...).
//! The key is decoded by swapping the magic for the standard `xpub` one,
//! and the original magic is kept so the key re-encodes unchanged.

use std::fmt;
use std::sync::LazyLock;

use bitcoin::base58;
use bitcoin::bip32::{ChainCode, ChildNumber, Fingerprint, Xpub};
use bitcoin::secp256k1::{Secp256k1, VerifyOnly};
use bitcoin::CompressedPublicKey;
use micro_core::coins::CoinType;
use micro_core::error::DerivationError;
use micro_core::types::ScriptType;

use crate::path::{is_hardened, DerivationPath};

/// Length of a serialized BIP-32 extended key.
const EXTENDED_KEY_LEN: usize = 78;

/// Version magic understood by [`Xpub::decode`].
const STANDARD_XPUB_MAGIC: [u8; 4] = [0x04, 0x88, 0xb2, 0x1e];

static SECP: LazyLock<Secp256k1<VerifyOnly>> = LazyLock::new(Secp256k1::verification_only);

/// A BIP-32 extended public key together with the magic it was encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtendedPublicKey {
    inner: Xpub,
    magic: u32,
}

impl ExtendedPublicKey {
    /// Decode a base58check extended public key with any version magic.
    pub fn decode(s: &str) -> Result<Self, DerivationError> {
        let data = base58::decode_check(s.trim())
            .map_err(|e| DerivationError::InvalidExtendedKey(e.to_string()))?;
        if data.len() != EXTENDED_KEY_LEN {
            return Err(DerivationError::InvalidExtendedKey(format!(
                "expected {EXTENDED_KEY_LEN} bytes, got {}",
                data.len()
            )));
        }
        let mut bytes = [0u8; EXTENDED_KEY_LEN];
        bytes.copy_from_slice(&data);
        let magic = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        bytes[..4].copy_from_slice(&STANDARD_XPUB_MAGIC);

        let inner = Xpub::decode(&bytes)
            .map_err(|e| DerivationError::InvalidExtendedKey(e.to_string()))?;
        Ok(Self { inner, magic })
    }

    /// Decode a key and check that its magic belongs to `coin`.
    ///
    /// Returns the key and the account type its magic selects.
    pub fn parse(s: &str, coin: CoinType) -> Result<(Self, ScriptType), DerivationError> {
        let key = Self::decode(s)?;
        let script_type = coin.params().script_type_for_magic(key.magic).ok_or_else(|| {
            DerivationError::UnknownKeyVersion {
                magic: key.magic,
                coin: coin.to_string(),
            }
        })?;
        Ok((key, script_type))
    }

    /// Wrap a decoded key with an explicit magic.
    pub fn from_xpub(inner: Xpub, magic: u32) -> Self {
        Self { inner, magic }
    }

    /// Base58check encoding with the original magic.
    pub fn encode(&self) -> String {
        let mut bytes = self.inner.encode();
        bytes[..4].copy_from_slice(&self.magic.to_be_bytes());
        base58::encode_check(&bytes)
    }

    pub fn magic(&self) -> u32 {
        self.magic
    }

    pub fn depth(&self) -> u8 {
        self.inner.depth
    }

    pub fn parent_fingerprint(&self) -> Fingerprint {
        self.inner.parent_fingerprint
    }

    pub fn child_number(&self) -> ChildNumber {
        self.inner.child_number
    }

    pub fn chain_code(&self) -> ChainCode {
        self.inner.chain_code
    }

    /// Fingerprint of this key (first four bytes of HASH160 of the public key).
    pub fn fingerprint(&self) -> Fingerprint {
        self.inner.fingerprint()
    }

    pub fn public_key(&self) -> CompressedPublicKey {
        self.inner.to_pub()
    }

    /// Normal child at `index`.
    pub fn child(&self, index: u32) -> Result<Self, DerivationError> {
        if is_hardened(index) {
            return Err(DerivationError::HardenedDerivationUnsupported { index });
        }
        let number = ChildNumber::from_normal_idx(index)
            .map_err(|e| DerivationError::Crypto(e.to_string()))?;
        let inner = self
            .inner
            .ckd_pub(&*SECP, number)
            .map_err(|e| DerivationError::Crypto(e.to_string()))?;
        Ok(Self {
            inner,
            magic: self.magic,
        })
    }

    /// Descendant at a relative path.
    ///
    /// Fails before any derivation if the path has a hardened segment.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, DerivationError> {
        if let Some(index) = path.first_hardened() {
            return Err(DerivationError::HardenedDerivationUnsupported { index });
        }
        path.segments()
            .iter()
            .try_fold(*self, |key, &index| key.child(index))
    }
}

impl fmt::Display for ExtendedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
