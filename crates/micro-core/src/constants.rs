//! Wallet constants. All monetary values in the coin's smallest unit
//! (1 BTC = 10^8 satoshis).

/// Smallest units per whole coin for every supported coin.
pub const COIN: u64 = 100_000_000;

/// Number of decimal places in a whole-coin amount.
pub const COIN_DECIMALS: u32 = 8;

/// Bit that marks a hardened BIP-32 child index.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Default number of consecutive unused addresses that ends a chain scan.
pub const DEFAULT_GAP_LIMIT: u32 = 20;

/// Default number of indexer queries in flight during a chain scan.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 8;

/// Version of transactions assembled by the builder.
pub const TX_VERSION: i32 = 2;

/// Input sequence number: final lock time semantics, replaceable (BIP-125).
pub const RBF_SEQUENCE: u32 = 0xFFFF_FFFD;

/// Default upper bound on the number of inputs a selection may use.
pub const DEFAULT_MAX_INPUTS: usize = 500;

/// Default bound on fee recomputation rounds during coin selection.
pub const DEFAULT_MAX_SELECTION_ITERATIONS: usize = 1_000;

/// Confirmation target used when the fee rate is estimated by the indexer.
pub const DEFAULT_FEE_TARGET_BLOCKS: u32 = 6;

/// Default number of indexer attempts per call, including the first.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default backoff before the first indexer retry, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

/// Upper bound on a single backoff sleep, in milliseconds.
pub const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 4_000;

/// Default per-call indexer timeout, in seconds.
pub const DEFAULT_INDEXER_TIMEOUT_SECS: u64 = 15;

/// Format tag written into every portable unsigned transaction.
pub const PORTABLE_FORMAT: &str = "microwallet-unsigned-tx";

/// Current portable format version.
pub const PORTABLE_VERSION: u32 = 1;
