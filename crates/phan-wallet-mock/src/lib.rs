//! Programmable stand-in for a browser-injected signing wallet.
//!
//! This crate exposes:
//! - the network client boundary (`NetworkClient`) with HTTP JSON-RPC and in-memory clients,
//! - the wallet state machine (`WalletMock`): connect/disconnect, automatic signing, history,
//! - the `connect`/`disconnect` listener registry and the diagnostics observer hook.

pub mod cluster;
pub mod connection;
pub mod events;
pub mod http_client;
pub mod observer;
pub mod summary;
pub mod wallet;

pub use cluster::{Cluster, DEVNET, LOCALNET, MAINNET_BETA, TESTNET};
pub use connection::{
    ConnectionConfig, ConnectionFactory, ConnectionOptions, HttpConnectionFactory, InMemoryClient,
    InMemoryConnectionFactory, NetworkClient, ResolvedConnectionConfig, RpcError,
};
pub use events::{EventRegistry, Listener, ListenerId, WalletEvent};
pub use http_client::HttpRpcClient;
pub use observer::{Diagnostic, DiagnosticLevel, NoopObserver, TracingObserver, WalletObserver};
pub use summary::{BalanceChange, TransactionSummary};
pub use wallet::{SignedMessage, WalletError, WalletMock, WalletOptions, IN_MEMORY_URL};
