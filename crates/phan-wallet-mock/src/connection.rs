//! Network client boundary: the `NetworkClient` trait, connection config, and the
//! in-memory client backed by `MockLedger`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use phan_ledger_mock::{LedgerError, MockLedger};
use phan_types::{
    Commitment, ConfirmationResult, ConfirmedTransaction, Lamports, Pubkey, RecentCheckpoint,
    Signature,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::http_client::HttpRpcClient;

/// Error model for network client operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("request timed out")]
    Timeout,
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: code={code}, message={message}")]
    Rejected { code: i64, message: String },
    #[error("http transport error: {0}")]
    Http(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("transaction {signature} not confirmed within {timeout_ms} ms")]
    ConfirmationTimeout {
        signature: Signature,
        timeout_ms: u64,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Operations the wallet needs from a cluster endpoint.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn get_recent_checkpoint(&self) -> Result<RecentCheckpoint, RpcError>;

    async fn get_balance(&self, account: &Pubkey) -> Result<Lamports, RpcError>;

    async fn request_airdrop(&self, to: &Pubkey, lamports: Lamports)
        -> Result<Signature, RpcError>;

    /// Waits until `signature` reaches the configured commitment.
    async fn confirm_transaction(
        &self,
        signature: &Signature,
    ) -> Result<ConfirmationResult, RpcError>;

    async fn get_confirmed_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<ConfirmedTransaction>, RpcError>;

    async fn send_raw_transaction(&self, bytes: &[u8]) -> Result<Signature, RpcError>;
}

/// Structured connection options; unset fields fall back to the defaults of
/// [`ResolvedConnectionConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionOptions {
    pub commitment: Option<Commitment>,
    pub confirm_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub http_headers: BTreeMap<String, String>,
}

/// Commitment-or-config accepted at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfig {
    Simple(Commitment),
    Structured(ConnectionOptions),
}

impl From<Commitment> for ConnectionConfig {
    fn from(commitment: Commitment) -> Self {
        Self::Simple(commitment)
    }
}

impl From<ConnectionOptions> for ConnectionConfig {
    fn from(options: ConnectionOptions) -> Self {
        Self::Structured(options)
    }
}

impl ConnectionConfig {
    pub fn resolve(&self) -> ResolvedConnectionConfig {
        let defaults = ResolvedConnectionConfig::default();
        match self {
            Self::Simple(commitment) => ResolvedConnectionConfig {
                commitment: *commitment,
                ..defaults
            },
            Self::Structured(options) => ResolvedConnectionConfig {
                commitment: options.commitment.unwrap_or(defaults.commitment),
                confirm_timeout: options
                    .confirm_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.confirm_timeout),
                request_timeout: options
                    .request_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.request_timeout),
                http_headers: options.http_headers.clone(),
                ..defaults
            },
        }
    }
}

/// Normalized config handed to a [`ConnectionFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConnectionConfig {
    pub commitment: Commitment,
    pub confirm_timeout: Duration,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub http_headers: BTreeMap<String, String>,
}

impl Default for ResolvedConnectionConfig {
    fn default() -> Self {
        Self {
            commitment: Commitment::Finalized,
            confirm_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            http_headers: BTreeMap::new(),
        }
    }
}

/// Builds the network client a wallet holds while connected.
pub trait ConnectionFactory: Send + Sync {
    fn connect(
        &self,
        url: &str,
        config: &ResolvedConnectionConfig,
    ) -> Result<Arc<dyn NetworkClient>, RpcError>;
}

/// Connects over HTTP JSON-RPC.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnectionFactory;

impl ConnectionFactory for HttpConnectionFactory {
    fn connect(
        &self,
        url: &str,
        config: &ResolvedConnectionConfig,
    ) -> Result<Arc<dyn NetworkClient>, RpcError> {
        Ok(Arc::new(HttpRpcClient::new(url, config.clone())?))
    }
}

/// Hands out clients that share one in-memory ledger.
#[derive(Clone)]
pub struct InMemoryConnectionFactory {
    ledger: Arc<Mutex<MockLedger>>,
}

impl InMemoryConnectionFactory {
    pub fn new(ledger: Arc<Mutex<MockLedger>>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> Arc<Mutex<MockLedger>> {
        Arc::clone(&self.ledger)
    }
}

impl ConnectionFactory for InMemoryConnectionFactory {
    fn connect(
        &self,
        url: &str,
        _config: &ResolvedConnectionConfig,
    ) -> Result<Arc<dyn NetworkClient>, RpcError> {
        debug!(url, "connecting to in-memory ledger");
        Ok(Arc::new(InMemoryClient {
            ledger: Arc::clone(&self.ledger),
        }))
    }
}

/// In-memory client backed by `MockLedger`; every call completes immediately.
#[derive(Clone)]
pub struct InMemoryClient {
    ledger: Arc<Mutex<MockLedger>>,
}

impl InMemoryClient {
    pub fn new(ledger: MockLedger) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
        }
    }

    fn with_ledger<R>(
        &self,
        f: impl FnOnce(&mut MockLedger) -> Result<R, LedgerError>,
    ) -> Result<R, RpcError> {
        let mut lock = self
            .ledger
            .lock()
            .map_err(|_| RpcError::Unavailable("mutex poisoned".to_string()))?;
        Ok(f(&mut lock)?)
    }
}

#[async_trait]
impl NetworkClient for InMemoryClient {
    async fn get_recent_checkpoint(&self) -> Result<RecentCheckpoint, RpcError> {
        self.with_ledger(|ledger| ledger.latest_checkpoint())
    }

    async fn get_balance(&self, account: &Pubkey) -> Result<Lamports, RpcError> {
        self.with_ledger(|ledger| ledger.balance(account))
    }

    async fn request_airdrop(
        &self,
        to: &Pubkey,
        lamports: Lamports,
    ) -> Result<Signature, RpcError> {
        self.with_ledger(|ledger| ledger.request_airdrop(to, lamports))
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
    ) -> Result<ConfirmationResult, RpcError> {
        self.with_ledger(|ledger| ledger.confirm_transaction(signature))
    }

    async fn get_confirmed_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<ConfirmedTransaction>, RpcError> {
        self.with_ledger(|ledger| ledger.get_transaction(signature))
    }

    async fn send_raw_transaction(&self, bytes: &[u8]) -> Result<Signature, RpcError> {
        self.with_ledger(|ledger| ledger.process_transaction(bytes))
    }
}
