//! Indexer (GraphQL) and JSON-RPC client with rate limiting, retries and a receipt cache.

use crate::chain::cache::{CacheError, ReceiptCache};
use crate::chain::normalize::{normalize_id, TimeWindow};
use crate::curation::{CurationRecord, ItemStub};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_INDEXER_URL: &str = "http://localhost:8000/subgraphs/name/curation-registry";
const DEFAULT_RPC_URL: &str = "http://localhost:8545";
const RATE_LIMIT_MS: u64 = 200;
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 500;

const CURATIONS_QUERY: &str = r#"query Curations(
  $fromTimestamp: BigInt!
  $toTimestamp: BigInt!
  $skip: Int!
  $first: Int!
) {
  curations(
    where: { timestamp_gte: $fromTimestamp, timestamp_lte: $toTimestamp }
    skip: $skip
    first: $first
    orderBy: timestamp
    orderDirection: asc
  ) {
    timestamp
    transactionHash
    curator { id }
    collection { id name createdAt items { name creationFee } }
  }
}"#;

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub indexer_url: String,
    pub rpc_url: String,
    /// Minimum spacing between indexer page requests. Receipts are paced by resolver batches.
    pub rate_limit_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            indexer_url: DEFAULT_INDEXER_URL.to_string(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            rate_limit_ms: RATE_LIMIT_MS,
            max_retries: MAX_RETRIES,
            retry_backoff_ms: RETRY_BACKOFF_MS,
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("cache: {0}")]
    Cache(#[from] CacheError),
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid endpoint url {0}: {1}")]
    InvalidUrl(String, url::ParseError),
    #[error("api error: status {0} body {1}")]
    Api(u16, String),
    #[error("graphql: {0}")]
    GraphQl(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("receipt not found: {0}")]
    ReceiptNotFound(String),
}

/// Subgraph `BigInt` values arrive as strings; some gateways send numbers.
fn de_bigint<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(i64),
        Str(String),
    }
    match Repr::deserialize(d)? {
        Repr::Num(n) => Ok(n),
        Repr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Clone, Deserialize)]
pub struct IndexerEntityRef {
    pub id: String,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerCollection {
    pub id: String,
    pub name: Option<String>,
    #[serde(deserialize_with = "de_bigint")]
    pub created_at: i64,
    pub items: Option<Vec<ItemStub>>,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerCuration {
    #[serde(deserialize_with = "de_bigint")]
    pub timestamp: i64,
    pub transaction_hash: String,
    pub curator: IndexerEntityRef,
    pub collection: Option<IndexerCollection>,
}

impl IndexerCuration {
    /// Lowercase identifiers. Returns None when the collection was not returned.
    pub fn into_record(self) -> Option<CurationRecord> {
        let collection = self.collection?;
        Some(CurationRecord {
            timestamp: self.timestamp,
            transaction_hash: normalize_id(&self.transaction_hash),
            curator_address: normalize_id(&self.curator.id),
            collection_id: normalize_id(&collection.id),
            collection_name: collection.name,
            collection_created_at: collection.created_at,
            items: collection.items.unwrap_or_default(),
        })
    }
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct CurationsData {
    curations: Vec<IndexerCuration>,
}

#[derive(Deserialize)]
struct CurationsResponse {
    data: Option<CurationsData>,
    errors: Option<Vec<GraphQlError>>,
}

/// Parse one GraphQL page body into normalized records.
pub fn parse_curations_response(body: &str) -> Result<Vec<CurationRecord>, FetchError> {
    let resp: CurationsResponse = serde_json::from_str(body)?;
    if let Some(errors) = resp.errors.filter(|e| !e.is_empty()) {
        let msg = errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(FetchError::GraphQl(msg));
    }
    let data = resp
        .data
        .ok_or_else(|| FetchError::GraphQl("response has no data".to_string()))?;
    let mut records = Vec::with_capacity(data.curations.len());
    for raw in data.curations {
        let tx = raw.transaction_hash.clone();
        match raw.into_record() {
            Some(r) => records.push(r),
            None => warn!(tx_hash = %tx, "curation without collection skipped"),
        }
    }
    Ok(records)
}

/// Emitted event as returned in a transaction receipt.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub log_index: Option<String>,
}

impl ReceiptLog {
    /// Hex quantity `logIndex` as an integer.
    pub fn log_index(&self) -> Option<u64> {
        let raw = self.log_index.as_deref()?;
        u64::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

/// Parse an `eth_getTransactionReceipt` response.
/// A null result means the node does not know the tx.
pub fn parse_receipt_response(tx_hash: &str, body: &str) -> Result<Receipt, FetchError> {
    let resp: RpcResponse<Receipt> = serde_json::from_str(body)?;
    if let Some(err) = resp.error {
        return Err(FetchError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    resp.result
        .ok_or_else(|| FetchError::ReceiptNotFound(tx_hash.to_string()))
}

/// HTTP fetcher for the curation indexer and the chain node.
pub struct Fetcher {
    config: FetchConfig,
    indexer_url: Url,
    rpc_url: Url,
    client: reqwest::Client,
    cache: Option<ReceiptCache>,
    last_request: std::sync::Mutex<Option<OffsetDateTime>>,
    request_count: AtomicU64,
    cache_hits: AtomicU64,
}

impl Fetcher {
    pub fn new(config: FetchConfig, cache: Option<ReceiptCache>) -> Result<Self, FetchError> {
        let indexer_url = Url::parse(&config.indexer_url)
            .map_err(|e| FetchError::InvalidUrl(config.indexer_url.clone(), e))?;
        let rpc_url = Url::parse(&config.rpc_url)
            .map_err(|e| FetchError::InvalidUrl(config.rpc_url.clone(), e))?;
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            config,
            indexer_url,
            rpc_url,
            client,
            cache,
            last_request: std::sync::Mutex::new(None),
            request_count: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        })
    }

    async fn rate_limit(&self) {
        let sleep_ms = {
            let prev = self.last_request.lock().map(|g| *g).unwrap_or(None);
            match prev {
                Some(prev) => {
                    let elapsed = (OffsetDateTime::now_utc() - prev).whole_milliseconds();
                    let need = i128::from(self.config.rate_limit_ms);
                    u64::try_from((need - elapsed).max(0)).unwrap_or(0)
                }
                None => 0,
            }
        };
        if sleep_ms > 0 {
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        }
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(OffsetDateTime::now_utc());
        }
    }

    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<String, FetchError> {
        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            match self.client.post(url.clone()).json(body).send().await {
                Ok(r) => {
                    let status = r.status();
                    let text = r.text().await?;
                    if status.is_success() {
                        self.request_count.fetch_add(1, Ordering::Relaxed);
                        return Ok(text);
                    }
                    last_err = Some(FetchError::Api(status.as_u16(), text));
                }
                Err(e) => last_err = Some(FetchError::Request(e)),
            }
            if attempt < self.config.max_retries {
                let ms = self.config.retry_backoff_ms * (1 << attempt);
                warn!(attempt, ms, %url, "retry after error");
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
        }
        Err(last_err.unwrap_or(FetchError::Api(0, "unknown".to_string())))
    }

    /// One page of curations with `timestamp` in `window`, ordered by timestamp.
    pub async fn curations_page(
        &self,
        window: TimeWindow,
        skip: usize,
        first: usize,
    ) -> Result<Vec<CurationRecord>, FetchError> {
        self.rate_limit().await;
        let body = serde_json::json!({
            "query": CURATIONS_QUERY,
            "variables": {
                "fromTimestamp": window.from.to_string(),
                "toTimestamp": window.to.to_string(),
                "skip": skip,
                "first": first,
            }
        });
        let text = self.post_json(&self.indexer_url, &body).await?;
        let records = parse_curations_response(&text)?;
        debug!(skip, count = records.len(), "curations page");
        Ok(records)
    }

    /// Receipt for `tx_hash`, served from the cache when present.
    pub async fn transaction_receipt(&self, tx_hash: &str) -> Result<Receipt, FetchError> {
        if let Some(cache) = &self.cache {
            match cache.get(tx_hash) {
                Ok(Some(json)) => match serde_json::from_str::<Receipt>(&json) {
                    Ok(receipt) => {
                        self.cache_hits.fetch_add(1, Ordering::Relaxed);
                        debug!(tx_hash = %tx_hash, "receipt cache hit");
                        return Ok(receipt);
                    }
                    Err(e) => warn!(tx_hash = %tx_hash, error = %e, "unreadable cached receipt"),
                },
                Ok(None) => {}
                Err(e) => warn!(error = %e, "receipt cache read failed"),
            }
        }

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getTransactionReceipt",
            "params": [tx_hash],
        });
        let text = self.post_json(&self.rpc_url, &body).await?;
        let receipt = parse_receipt_response(tx_hash, &text)?;

        if let Some(cache) = &self.cache {
            let stored = serde_json::to_string(&receipt)
                .map_err(FetchError::from)
                .and_then(|json| cache.put(tx_hash, &json).map_err(FetchError::from));
            if let Err(e) = stored {
                warn!(tx_hash = %tx_hash, error = %e, "receipt cache write failed");
            }
        }
        Ok(receipt)
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn log_totals(&self) {
        info!(
            requests = self.request_count(),
            cache_hits = self.cache_hits(),
            "fetcher totals"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_page_normalizes_and_skips_orphans() {
        let body = r#"{"data":{"curations":[
            {"timestamp":"100","transactionHash":"0xAA","curator":{"id":"0xU1"},
             "collection":{"id":"0xC0","name":"Col","createdAt":"2000000000",
                           "items":[{"name":"First","creationFee":"3000000000000000000"}]}},
            {"timestamp":101,"transactionHash":"0xbb","curator":{"id":"0xu2"},"collection":null}
        ]}}"#;
        let records = parse_curations_response(body).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.timestamp, 100);
        assert_eq!(r.transaction_hash, "0xaa");
        assert_eq!(r.curator_address, "0xu1");
        assert_eq!(r.collection_id, "0xc0");
        assert_eq!(r.collection_created_at, 2_000_000_000);
        assert_eq!(
            r.items[0].creation_fee.as_deref(),
            Some("3000000000000000000")
        );
    }

    #[test]
    fn parse_page_surfaces_graphql_errors() {
        let body = r#"{"errors":[{"message":"indexer lagging"}]}"#;
        match parse_curations_response(body) {
            Err(FetchError::GraphQl(msg)) => assert_eq!(msg, "indexer lagging"),
            other => panic!("unexpected: {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn parse_receipt_null_is_not_found() {
        let body = r#"{"jsonrpc":"2.0","id":1,"result":null}"#;
        assert!(matches!(
            parse_receipt_response("0xabc", body),
            Err(FetchError::ReceiptNotFound(h)) if h == "0xabc"
        ));
    }

    #[test]
    fn parse_receipt_rpc_error() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"limit exceeded"}}"#;
        assert!(matches!(
            parse_receipt_response("0xabc", body),
            Err(FetchError::Rpc { code: -32005, .. })
        ));
    }

    #[test]
    fn log_index_hex() {
        let log = ReceiptLog {
            log_index: Some("0x1a".into()),
            ..Default::default()
        };
        assert_eq!(log.log_index(), Some(26));
    }

    const RECEIPT_BODY: &str =
        r#"{"jsonrpc":"2.0","id":1,"result":{"transactionHash":"0xabc","logs":[]}}"#;
    const CLOSED_PORT: &str = "http://127.0.0.1:9";

    fn local_config(url: &str) -> FetchConfig {
        FetchConfig {
            indexer_url: url.to_string(),
            rpc_url: url.to_string(),
            max_retries: 0,
            retry_backoff_ms: 1,
            ..Default::default()
        }
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        use tokio::io::AsyncReadExt;
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serve one canned response per connection, in order; yields the raw requests.
    async fn serve(
        responses: Vec<(u16, &'static str)>,
    ) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        use tokio::io::AsyncWriteExt;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut stream).await);
                let reply = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
            requests
        });
        (url, handle)
    }

    #[tokio::test]
    async fn cached_receipt_skips_network() {
        let cache = ReceiptCache::open_in_memory().unwrap();
        cache
            .put("0xABC", r#"{"transactionHash":"0xabc","logs":[]}"#)
            .unwrap();
        let fetcher = Fetcher::new(local_config(CLOSED_PORT), Some(cache)).unwrap();
        let receipt = fetcher.transaction_receipt("0xabc").await.unwrap();
        assert_eq!(receipt.transaction_hash.as_deref(), Some("0xabc"));
        assert_eq!(fetcher.cache_hits(), 1);
        assert_eq!(fetcher.request_count(), 0);
    }

    #[tokio::test]
    async fn unreadable_cache_entry_falls_through_to_network() {
        let cache = ReceiptCache::open_in_memory().unwrap();
        cache.put("0xabc", "not json").unwrap();
        let fetcher = Fetcher::new(local_config(CLOSED_PORT), Some(cache)).unwrap();
        let res = fetcher.transaction_receipt("0xabc").await;
        assert!(matches!(res, Err(FetchError::Request(_))));
        assert_eq!(fetcher.cache_hits(), 0);
    }

    #[tokio::test]
    async fn fetched_receipt_is_written_back() {
        let (url, server) = serve(vec![(200, RECEIPT_BODY)]).await;
        let cache = ReceiptCache::open_in_memory().unwrap();
        let fetcher = Fetcher::new(local_config(&url), Some(cache)).unwrap();

        let first = fetcher.transaction_receipt("0xabc").await.unwrap();
        let second = fetcher.transaction_receipt("0xABC").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.request_count(), 1);
        assert_eq!(fetcher.cache_hits(), 1);

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains("eth_getTransactionReceipt"));
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let (url, server) = serve(vec![(500, "busy"), (200, RECEIPT_BODY)]).await;
        let config = FetchConfig {
            max_retries: 1,
            ..local_config(&url)
        };
        let fetcher = Fetcher::new(config, None).unwrap();
        let receipt = fetcher.transaction_receipt("0xabc").await.unwrap();
        assert_eq!(receipt.transaction_hash.as_deref(), Some("0xabc"));
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_report_last_status() {
        let (url, server) = serve(vec![(503, "down"), (503, "still down")]).await;
        let config = FetchConfig {
            max_retries: 1,
            ..local_config(&url)
        };
        let fetcher = Fetcher::new(config, None).unwrap();
        match fetcher.transaction_receipt("0xabc").await {
            Err(FetchError::Api(503, body)) => assert_eq!(body, "still down"),
            other => panic!("unexpected: {:?}", other.map(|r| r.logs.len())),
        }
        assert_eq!(fetcher.request_count(), 0);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn truncated_success_body_is_a_request_error() {
        use tokio::io::AsyncWriteExt;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            let reply = "HTTP/1.1 200 OK\r\ncontent-length: 500\r\n\r\n{\"jsonrpc\"";
            stream.write_all(reply.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        let fetcher = Fetcher::new(local_config(&url), None).unwrap();
        let res = fetcher.transaction_receipt("0xabc").await;
        assert!(matches!(res, Err(FetchError::Request(_))));
        assert_eq!(fetcher.request_count(), 0);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn receipts_are_not_held_by_indexer_spacing() {
        let (url, server) = serve(vec![
            (200, r#"{"data":{"curations":[]}}"#),
            (200, RECEIPT_BODY),
        ])
        .await;
        let config = FetchConfig {
            rate_limit_ms: 60_000,
            ..local_config(&url)
        };
        let fetcher = Fetcher::new(config, None).unwrap();
        let window = TimeWindow::new(0, 10).unwrap();
        let page = fetcher.curations_page(window, 0, 10).await.unwrap();
        assert!(page.is_empty());
        let receipt = tokio::time::timeout(
            Duration::from_secs(5),
            fetcher.transaction_receipt("0xabc"),
        )
        .await
        .expect("receipt request waited on the indexer rate limit");
        assert!(receipt.is_ok());
        server.await.unwrap();
    }

    #[test]
    fn invalid_endpoint_rejected() {
        let config = FetchConfig {
            rpc_url: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(
            Fetcher::new(config, None),
            Err(FetchError::InvalidUrl(..))
        ));
    }
}
