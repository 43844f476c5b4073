//! Shared test helpers for integration and property tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::Txid;
use micro_core::coins::CoinType;
use micro_core::error::IndexerError;
use micro_core::traits::Indexer;
use micro_core::types::{AddressInfo, Chain, UnspentOutput};
use micro_wallet::{AccountKey, WalletUtxo};

/// Published account vector: first six addresses of both chains.
pub struct AccountVector {
    pub coin: CoinType,
    pub xpub: &'static str,
    pub account: u32,
    pub account_path: &'static str,
    pub external: [&'static str; 6],
    pub internal: [&'static str; 6],
}

pub const LITECOIN_P2SH: AccountVector = AccountVector {
    coin: CoinType::Litecoin,
    xpub: "Mtub2syZtptY6mWDbfUYxStNwpWfnC1GCjgn94i7LACu9euPviukSSVptfWu8kC7LKjD2pEUAf4Tk78zEG3eNEeFp1vdCuEaWu4thgYCiTP5fiA",
    account: 15,
    account_path: "m/49'/2'/15'",
    external: [
        "MCbzx1zB9ArzrcW5ZRmynMXEjLaYrxp33h",
        "M9uuC491JF577P7A2BF7kRQSqC3kqKgP2y",
        "MMprCCHpMqS5nGUUQP5LqXp1CnkMG3taUD",
        "MAKwjwSPUsrjkWopYEQTCdu9HVkaGNV8Ja",
        "MBKL4t23XGNPw7Jyr8Ke9F9Ahg4qRFKENL",
        "MDh73owzDmsrH5ZY2KAHvGxThqcXxMBxCG",
    ],
    internal: [
        "MMq3nsjgxSmo567SY9onBE7mZZLzF7d7oa",
        "MAo8xpMwAkbnvY7dh6YNzonGtgfh9o1RrB",
        "MLj692LwqUEXpwwgMcTKtZ4rJiL3DzDRB5",
        "MX7gwUHoj4SwTrub33JGFzBZDpz1aXkEJF",
        "MMDPB89YZ6Tk98UTAayh2WuLqHjJBpZBc7",
        "MGpveTP4Qh4tV29sSFjjz6fj9MkVU2Wedn",
    ],
};

pub const DOGECOIN_LEGACY: AccountVector = AccountVector {
    coin: CoinType::Dogecoin,
    xpub: "dgub8sbe5Mi8LA4eBLHDvNhQWYu8awPXZThRPr4B4o3yzUYx4HswUunt8C5pTCQS45ZGcEaTbeJ1NuwyTfD8hERktZw3r3r3iypBnAAxhNxQLFM",
    account: 15,
    account_path: "m/44'/3'/15'",
    external: [
        "DBvD76yuDdqSRKXh65pyFbL3bJuqY2jnbX",
        "D7vFBCNtnsZXtK2TshbqUzgvHT7GXWo8Yq",
        "DRsuGwVTp9opR3qRqkPgyMQrQfAjwRpiX3",
        "DJdz3zbN6etDuuwRjBLCZpVtD7PvJLzEF6",
        "DJCZozyYBrhgyvzaueeMjCSmYswGZRZJMn",
        "DMjbi5E6GUtC8g4R4dURPhs27i9R6bQXjU",
    ],
    internal: [
        "DBnLen5bVcRDFAeYJ4ny4G1anM1L3zSJjN",
        "D5xbVbJQu927azLUvg7NvBYu97okexqtEw",
        "DEWMAwjRL49WaebYK1i6b6ApHjZEC82fpM",
        "D6pzpuU3ipBGPp7N8ATAnH3AX26jFpXGFz",
        "D6R2dNLJwPzurajb5F5HwVGbmyq8H22CQe",
        "DESENMRPbVNZTW1zcjz98c9xbYVJFDbxAj",
    ],
};

pub const BITCOIN_NATIVE: AccountVector = AccountVector {
    coin: CoinType::Bitcoin,
    xpub: "zpub6rszzdAK6RubKxxKxydVq6Bpjz1mt8BBitik5JMBy3QZeegBLHYp9Nw5UR6xa6PrMdn4hfF79rQcfri7pvqo5jJdrYj1WowiVDtGBjD9nbS",
    account: 15,
    account_path: "m/84'/0'/15'",
    external: [
        "bc1q9yjrygcxx93ur9jgmjle60l8kqwwcxllld3d7s",
        "bc1qdpupdw26jrhav4hflaljgvk8r7c0z284prlpwe",
        "bc1q2lx2fd2zw774cnmxk5mwe5r4c723wvdpxs3r25",
        "bc1qvp7jgc5uyn62w34fywe4v6kpp2wy4k9yyv9hgw",
        "bc1qdc5cdv3m9t9w9w9ee4qmaeaqztk7rja02tyrjy",
        "bc1q085kywupqv5uascm64cqjkaj9alw4866ux02cr",
    ],
    internal: [
        "bc1qa9rdzekzgzykr73aswftf0pxwng5xpryklyd9l",
        "bc1qut7auk2zsr790qhzf7y4wfq5sts5urvuzzmc88",
        "bc1qyzz8ukgm7fnu6gquzvc7t4ztzyukrgxll0r56t",
        "bc1qn9lxvsn5hjsay3qx8fwwvm3tkde8h8vwp6xm5y",
        "bc1q0hx5pxl07u540fy5758827garkll5cqwth4f4a",
        "bc1q7cxyt4ttvkl8n6mq6dzhckeg67y9hfc7yvlvd6",
    ],
};

pub const VECTORS: [&AccountVector; 3] = [&LITECOIN_P2SH, &DOGECOIN_LEGACY, &BITCOIN_NATIVE];

/// A P2WPKH address outside every test account.
pub const FOREIGN_BTC: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

impl AccountVector {
    pub fn key(&self) -> AccountKey {
        AccountKey::from_xpub(self.coin, self.xpub, Some(self.account), None).unwrap()
    }

    pub fn address(&self, chain: Chain, index: usize) -> &'static str {
        match chain {
            Chain::External => self.external[index],
            Chain::Internal => self.internal[index],
        }
    }
}

/// UTXO with a txid unique per `n`.
pub fn utxo(n: u8, amount: u64, confirmations: u32) -> UnspentOutput {
    UnspentOutput {
        txid: Txid::from_byte_array([n; 32]),
        vout: u32::from(n),
        amount,
        confirmations,
    }
}

/// UTXO owned by external address `index` of `key`.
pub fn wallet_utxo(key: &AccountKey, index: u32, amount: u64, confirmations: u32) -> WalletUtxo {
    WalletUtxo {
        utxo: utxo(index as u8, amount, confirmations),
        owner: key.derive(Chain::External, index).unwrap(),
    }
}

/// In-memory indexer.
#[derive(Default)]
pub struct MockIndexer {
    addresses: HashMap<String, AddressInfo>,
    fee_rate: Option<u64>,
    failure: Option<IndexerError>,
    calls: AtomicUsize,
}

impl MockIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fee_rate(mut self, rate: u64) -> Self {
        self.fee_rate = Some(rate);
        self
    }

    /// Every call fails with `error`.
    pub fn failing(mut self, error: IndexerError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn fund(&mut self, address: &str, utxo: UnspentOutput) {
        let info = self.addresses.entry(address.to_string()).or_default();
        info.used = true;
        info.utxos.push(utxo);
    }

    /// Used in the past, nothing left.
    pub fn mark_used(&mut self, address: &str) {
        self.addresses.entry(address.to_string()).or_default().used = true;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    async fn address_info(&self, address: &str) -> Result<AddressInfo, IndexerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        Ok(self.addresses.get(address).cloned().unwrap_or_default())
    }

    async fn estimate_fee_rate(&self, _target_blocks: u32) -> Result<Option<u64>, IndexerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        Ok(self.fee_rate)
    }
}
