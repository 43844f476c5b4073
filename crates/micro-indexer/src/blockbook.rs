//! Blockbook REST API v2 client.
//!
//! Endpoints used:
//! - `GET /api/v2/address/{address}?details=basic` for the usage flag
//! - `GET /api/v2/utxo/{address}` for unspent outputs
//! - `GET /api/v2/estimatefee/{blocks}` for fee estimates
//!
//! Blockbook reports output values as integer strings in smallest units and
//! fee rates as decimal strings in whole coins per kilobyte. Neither goes
//! through floating point.

use std::time::Duration;

use async_trait::async_trait;
use bitcoin::Txid;
use micro_core::amount::parse_amount;
use micro_core::error::IndexerError;
use micro_core::traits::Indexer;
use micro_core::types::{AddressInfo, UnspentOutput};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::trace;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressResponse {
    #[serde(default)]
    txs: u64,
    #[serde(default)]
    unconfirmed_txs: u64,
}

#[derive(Debug, Deserialize)]
struct UtxoResponse {
    txid: String,
    vout: u32,
    value: String,
    #[serde(default)]
    confirmations: u32,
}

#[derive(Debug, Deserialize)]
struct FeeResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Client for one Blockbook instance. Each instance serves a single coin.
#[derive(Debug, Clone)]
pub struct BlockbookClient {
    client: Client,
    base_url: String,
}

impl BlockbookClient {
    /// `timeout` bounds every request, connect included.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IndexerError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("microwallet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IndexerError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, IndexerError> {
        let url = format!("{}{}", self.base_url, path);
        trace!(%url, "Blockbook request");
        let resp = self.client.get(&url).send().await.map_err(transport_error)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        serde_json::from_slice(&body).map_err(|e| IndexerError::Decode(format!("{path}: {e}")))
    }
}

fn transport_error(e: reqwest::Error) -> IndexerError {
    if e.is_timeout() {
        IndexerError::Timeout
    } else {
        IndexerError::Transport(e.to_string())
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> IndexerError {
    let message = serde_json::from_slice::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).chars().take(200).collect());
    IndexerError::Status {
        status: status.as_u16(),
        message,
    }
}

fn parse_utxo(raw: UtxoResponse) -> Result<UnspentOutput, IndexerError> {
    let txid: Txid = raw
        .txid
        .parse()
        .map_err(|e| IndexerError::Decode(format!("txid {}: {e}", raw.txid)))?;
    let amount: u64 = raw
        .value
        .parse()
        .map_err(|e| IndexerError::Decode(format!("value {:?}: {e}", raw.value)))?;
    Ok(UnspentOutput {
        txid,
        vout: raw.vout,
        amount,
        confirmations: raw.confirmations,
    })
}

/// Whole coins per kB to smallest units per kB. Non-positive means no estimate.
fn parse_fee_rate(raw: &str) -> Result<Option<u64>, IndexerError> {
    let raw = raw.trim();
    if raw.starts_with('-') {
        return Ok(None);
    }
    let rate = parse_amount(raw).map_err(|e| IndexerError::Decode(format!("fee rate: {e}")))?;
    Ok((rate > 0).then_some(rate))
}

#[async_trait]
impl Indexer for BlockbookClient {
    async fn address_info(&self, address: &str) -> Result<AddressInfo, IndexerError> {
        let summary: AddressResponse = self
            .get(&format!("/api/v2/address/{address}?details=basic"))
            .await?;
        let used = summary.txs > 0 || summary.unconfirmed_txs > 0;
        if !used {
            return Ok(AddressInfo::unused());
        }
        let raw: Vec<UtxoResponse> = self.get(&format!("/api/v2/utxo/{address}")).await?;
        let utxos = raw.into_iter().map(parse_utxo).collect::<Result<Vec<_>, _>>()?;
        Ok(AddressInfo { used, utxos })
    }

    async fn estimate_fee_rate(&self, target_blocks: u32) -> Result<Option<u64>, IndexerError> {
        let resp: FeeResponse = self
            .get(&format!("/api/v2/estimatefee/{target_blocks}"))
            .await?;
        parse_fee_rate(&resp.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const TXID: &str = "c6cbb4b5b5e7b7e9ebce1d70c2e5e8ee3e7f4f7d4b3b1a1f0e9d8c7b6a5f4e3d";

    /// Serves canned responses, one connection each, keyed by request path.
    async fn serve(routes: Vec<(&'static str, u16, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf[read..]).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    read += n;
                }
                let request = String::from_utf8_lossy(&buf[..read]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("").to_string();
                let (status, body) = routes
                    .iter()
                    .find(|(p, _, _)| *p == path)
                    .map(|(_, s, b)| (*s, b.clone()))
                    .unwrap_or((404, r#"{"error":"not found"}"#.to_string()));
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        format!("http://{addr}/")
    }

    #[test]
    fn fee_rate_is_parsed_without_floats() {
        assert_eq!(parse_fee_rate("0.00012").unwrap(), Some(12_000));
        assert_eq!(parse_fee_rate("0.00001").unwrap(), Some(1_000));
        assert_eq!(parse_fee_rate("-1").unwrap(), None);
        assert_eq!(parse_fee_rate("0").unwrap(), None);
        assert!(matches!(parse_fee_rate("lots"), Err(IndexerError::Decode(_))));
    }

    #[test]
    fn utxo_values_are_smallest_units() {
        let raw: UtxoResponse = serde_json::from_str(&format!(
            r#"{{"txid":"{TXID}","vout":1,"value":"50000","height":800000,"confirmations":12}}"#
        ))
        .unwrap();
        let utxo = parse_utxo(raw).unwrap();
        assert_eq!(utxo.amount, 50_000);
        assert_eq!(utxo.vout, 1);
        assert_eq!(utxo.confirmations, 12);
        assert_eq!(utxo.txid.to_string(), TXID);
    }

    #[test]
    fn mempool_utxo_has_zero_confirmations() {
        let raw: UtxoResponse =
            serde_json::from_str(&format!(r#"{{"txid":"{TXID}","vout":0,"value":"1"}}"#)).unwrap();
        assert_eq!(parse_utxo(raw).unwrap().confirmations, 0);
    }

    #[test]
    fn bad_utxo_fields_are_decode_errors() {
        let raw = UtxoResponse {
            txid: "nothex".into(),
            vout: 0,
            value: "1".into(),
            confirmations: 0,
        };
        assert!(matches!(parse_utxo(raw), Err(IndexerError::Decode(_))));
        let raw = UtxoResponse {
            txid: TXID.into(),
            vout: 0,
            value: "0.5".into(),
            confirmations: 0,
        };
        assert!(matches!(parse_utxo(raw), Err(IndexerError::Decode(_))));
    }

    #[test]
    fn status_error_prefers_blockbook_message() {
        let e = status_error(StatusCode::BAD_REQUEST, br#"{"error":"Invalid address"}"#);
        assert_eq!(
            e,
            IndexerError::Status {
                status: 400,
                message: "Invalid address".into()
            }
        );
        assert!(!e.is_retryable());
        let e = status_error(StatusCode::BAD_GATEWAY, b"upstream down");
        assert!(e.is_retryable());
    }

    #[tokio::test]
    async fn used_address_fetches_utxos() {
        let utxos = format!(r#"[{{"txid":"{TXID}","vout":2,"value":"30000","confirmations":3}}]"#);
        let url = serve(vec![
            ("/api/v2/address/addr1?details=basic", 200, r#"{"address":"addr1","txs":2,"unconfirmedTxs":0}"#.into()),
            ("/api/v2/utxo/addr1", 200, utxos),
            ("/api/v2/address/addr2?details=basic", 200, r#"{"address":"addr2","txs":0,"unconfirmedTxs":0}"#.into()),
            ("/api/v2/estimatefee/6", 200, r#"{"result":"0.0002"}"#.into()),
        ])
        .await;
        let client = BlockbookClient::new(&url, Duration::from_secs(5)).unwrap();

        let info = client.address_info("addr1").await.unwrap();
        assert!(info.used);
        assert_eq!(info.utxos.len(), 1);
        assert_eq!(info.utxos[0].amount, 30_000);

        let info = client.address_info("addr2").await.unwrap();
        assert_eq!(info, AddressInfo::unused());

        assert_eq!(client.estimate_fee_rate(6).await.unwrap(), Some(20_000));
    }

    #[tokio::test]
    async fn http_errors_map_to_status() {
        let url = serve(vec![(
            "/api/v2/address/bad?details=basic",
            400,
            r#"{"error":"Invalid address, decoded address is of unknown format"}"#.into(),
        )])
        .await;
        let client = BlockbookClient::new(&url, Duration::from_secs(5)).unwrap();
        let err = client.address_info("bad").await.unwrap_err();
        assert!(matches!(err, IndexerError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = BlockbookClient::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
        let err = client.estimate_fee_rate(6).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
