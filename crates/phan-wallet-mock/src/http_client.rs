//! JSON-RPC over HTTP against a cluster endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use phan_types::{
    Commitment, ConfirmationResult, ConfirmedTransaction, Hash, Lamports, Pubkey,
    RecentCheckpoint, Signature, TransactionMeta,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::connection::{NetworkClient, ResolvedConnectionConfig, RpcError};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    slot: u64,
    err: Option<Value>,
    confirmation_status: Option<Commitment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcConfirmedTransaction {
    slot: u64,
    block_time: Option<i64>,
    meta: Option<RpcTransactionMeta>,
    transaction: RpcTransaction,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransactionMeta {
    fee: Lamports,
    #[serde(default)]
    pre_balances: Vec<Lamports>,
    #[serde(default)]
    post_balances: Vec<Lamports>,
    err: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
    signatures: Vec<String>,
    message: RpcMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcMessage {
    account_keys: Vec<String>,
    recent_blockhash: String,
}

/// Network client speaking the cluster's JSON-RPC dialect.
pub struct HttpRpcClient {
    http: Client,
    url: String,
    config: ResolvedConnectionConfig,
    next_id: AtomicU64,
}

impl std::fmt::Debug for HttpRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRpcClient")
            .field("url", &self.url)
            .field("commitment", &self.config.commitment)
            .finish_non_exhaustive()
    }
}

impl HttpRpcClient {
    pub fn new(url: &str, config: ResolvedConnectionConfig) -> Result<Self, RpcError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.http_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| RpcError::Http(format!("invalid header name `{name}`: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| RpcError::Http(format!("invalid header value: {err}")))?;
            headers.insert(name, value);
        }
        let http = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| RpcError::Http(err.to_string()))?;
        Ok(Self {
            http,
            url: url.to_string(),
            config,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, id = request.id, url = %self.url, "rpc request");

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;
        if !response.status().is_success() {
            return Err(RpcError::Unavailable(format!(
                "{method} returned http status {}",
                response.status()
            )));
        }
        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|err| RpcError::Decode(err.to_string()))?;
        if let Some(error) = body.error {
            warn!(method, code = error.code, message = %error.message, "rpc error");
            return Err(RpcError::Rejected {
                code: error.code,
                message: error.message,
            });
        }
        serde_json::from_value(body.result).map_err(|err| RpcError::Decode(err.to_string()))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature.to_base58()], {"searchTransactionHistory": true}]),
            )
            .await?;
        Ok(statuses.value.into_iter().next().flatten())
    }

    /// `getTransaction` does not accept `processed`.
    fn finality(&self) -> Commitment {
        self.config.commitment.max(Commitment::Confirmed)
    }
}

#[async_trait]
impl NetworkClient for HttpRpcClient {
    async fn get_recent_checkpoint(&self) -> Result<RecentCheckpoint, RpcError> {
        let latest: WithContext<LatestBlockhash> = self
            .call(
                "getLatestBlockhash",
                json!([{"commitment": self.config.commitment}]),
            )
            .await?;
        Ok(RecentCheckpoint {
            checkpoint: decode_base58(&latest.value.blockhash)?,
            last_valid_block_height: latest.value.last_valid_block_height,
        })
    }

    async fn get_balance(&self, account: &Pubkey) -> Result<Lamports, RpcError> {
        let balance: WithContext<Lamports> = self
            .call(
                "getBalance",
                json!([account.to_base58(), {"commitment": self.config.commitment}]),
            )
            .await?;
        Ok(balance.value)
    }

    async fn request_airdrop(
        &self,
        to: &Pubkey,
        lamports: Lamports,
    ) -> Result<Signature, RpcError> {
        let signature: String = self
            .call(
                "requestAirdrop",
                json!([to.to_base58(), lamports, {"commitment": self.config.commitment}]),
            )
            .await?;
        decode_base58(&signature)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
    ) -> Result<ConfirmationResult, RpcError> {
        let deadline = Instant::now() + self.config.confirm_timeout;
        loop {
            if let Some(status) = self.signature_status(signature).await? {
                let reached = status
                    .confirmation_status
                    .unwrap_or(Commitment::Processed)
                    >= self.config.commitment;
                if reached || status.err.is_some() {
                    return Ok(ConfirmationResult {
                        slot: status.slot,
                        err: status.err.map(|err| err.to_string()),
                    });
                }
            }
            if Instant::now() + self.config.poll_interval > deadline {
                return Err(RpcError::ConfirmationTimeout {
                    signature: *signature,
                    timeout_ms: self.config.confirm_timeout.as_millis() as u64,
                });
            }
            sleep(self.config.poll_interval).await;
        }
    }

    async fn get_confirmed_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<ConfirmedTransaction>, RpcError> {
        let tx: Option<RpcConfirmedTransaction> = self
            .call(
                "getTransaction",
                json!([
                    signature.to_base58(),
                    {
                        "commitment": self.finality(),
                        "encoding": "json",
                        "maxSupportedTransactionVersion": 0
                    }
                ]),
            )
            .await?;
        tx.map(into_confirmed_transaction).transpose()
    }

    async fn send_raw_transaction(&self, bytes: &[u8]) -> Result<Signature, RpcError> {
        let signature: String = self
            .call(
                "sendTransaction",
                json!([
                    STANDARD.encode(bytes),
                    {"encoding": "base64", "preflightCommitment": self.config.commitment}
                ]),
            )
            .await?;
        decode_base58(&signature)
    }
}

fn classify_transport_error(err: reqwest::Error) -> RpcError {
    if err.is_timeout() {
        RpcError::Timeout
    } else if err.is_connect() {
        RpcError::Unavailable(err.to_string())
    } else {
        RpcError::Http(err.to_string())
    }
}

fn decode_base58<T>(encoded: &str) -> Result<T, RpcError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    encoded
        .parse()
        .map_err(|err: T::Err| RpcError::Decode(err.to_string()))
}

fn into_confirmed_transaction(
    tx: RpcConfirmedTransaction,
) -> Result<ConfirmedTransaction, RpcError> {
    let signatures = tx
        .transaction
        .signatures
        .iter()
        .map(|sig| decode_base58::<Signature>(sig))
        .collect::<Result<_, _>>()?;
    let account_keys = tx
        .transaction
        .message
        .account_keys
        .iter()
        .map(|key| decode_base58::<Pubkey>(key))
        .collect::<Result<_, _>>()?;
    Ok(ConfirmedTransaction {
        slot: tx.slot,
        block_time: tx.block_time,
        signatures,
        account_keys,
        recent_checkpoint: decode_base58::<Hash>(&tx.transaction.message.recent_blockhash)?,
        meta: tx.meta.map(|meta| TransactionMeta {
            fee: meta.fee,
            pre_balances: meta.pre_balances,
            post_balances: meta.post_balances,
            err: meta.err.map(|err| err.to_string()),
        }),
    })
}
