//! # micro-wallet: stateless xpub wallet core.
//!
//! Derives addresses from an account extended public key, discovers the
//! account's funds through an [`Indexer`](micro_core::traits::Indexer),
//! selects coins, and assembles unsigned transactions for a detached signer.
//! No state is kept between operations.
//!
//! # Modules
//!
//! - [`path`]: BIP-32 derivation paths
//! - [`xpub`]: SLIP-132 extended public keys, non-hardened CKD
//! - [`address`]: base58 and bech32 address codecs
//! - [`derivation`]: account keys and derived addresses
//! - [`retry`]: bounded retry with backoff for indexer calls
//! - [`account`]: gap-limit scan and balance aggregation
//! - [`fees`]: size and fee estimation
//! - [`coin_selection`]: deterministic accumulating selector
//! - [`builder`]: unsigned transaction builder
//! - [`portable`]: versioned JSON interchange form
//! - [`signer`]: signer trait and external command signer
//! - [`wallet`]: request-scoped session tying it together

pub mod account;
pub mod address;
pub mod builder;
pub mod coin_selection;
pub mod derivation;
pub mod fees;
pub mod path;
pub mod portable;
pub mod retry;
pub mod signer;
pub mod wallet;
pub mod xpub;

// Re-exports for convenient access
pub use account::{load_account, Account, ScanConfig, ScannedAddress};
pub use address::{Address, Payload};
pub use builder::{TransactionBuilder, UnsignedInput, UnsignedOutput, UnsignedTransaction};
pub use coin_selection::{
    CoinSelection, CoinSelector, InputOrdering, SelectionPolicy, SelectionTarget, WalletUtxo,
};
pub use derivation::{derive, AccountKey, DerivedAddress};
pub use path::DerivationPath;
pub use portable::{from_portable, to_portable};
pub use retry::RetryPolicy;
pub use signer::{CommandSigner, Signer};
pub use wallet::{FundedTransaction, SpendOptions, WalletSession};
pub use xpub::ExtendedPublicKey;
