//! Diagnostics emitted by the wallet at lifecycle and signing points.

use std::fmt;

use phan_types::{Commitment, Pubkey, Signature};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Debug,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Initialized {
        url: String,
        public_key: Pubkey,
        commitment: Commitment,
    },
    Connected {
        url: String,
    },
    Disconnected,
    SigningTransaction {
        signer: Pubkey,
    },
    SignedTransaction {
        signature: Signature,
    },
    SigningFailed {
        reason: String,
    },
    SignedMessage {
        len: usize,
    },
    WalletChanged {
        previous: Pubkey,
        current: Pubkey,
    },
}

impl Diagnostic {
    pub const fn level(&self) -> DiagnosticLevel {
        match self {
            Self::Initialized { .. } | Self::WalletChanged { .. } => DiagnosticLevel::Info,
            Self::SigningFailed { .. } => DiagnosticLevel::Error,
            _ => DiagnosticLevel::Debug,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized {
                url,
                public_key,
                commitment,
            } => write!(
                f,
                "initializing wallet mock for {public_key} on {url} ({commitment})"
            ),
            Self::Connected { url } => write!(f, "wallet connected to {url}"),
            Self::Disconnected => f.write_str("wallet disconnected"),
            Self::SigningTransaction { signer } => {
                write!(f, "attempting to sign transaction as {signer}")
            }
            Self::SignedTransaction { signature } => write!(f, "signed transaction {signature}"),
            Self::SigningFailed { reason } => write!(f, "failed signing: {reason}"),
            Self::SignedMessage { len } => write!(f, "signed {len} byte message"),
            Self::WalletChanged { previous, current } => {
                write!(f, "wallet changed from {previous} to {current}")
            }
        }
    }
}

/// Receives wallet diagnostics. Implementations must not block.
pub trait WalletObserver: Send + Sync {
    fn observe(&self, diagnostic: &Diagnostic);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl WalletObserver for NoopObserver {
    fn observe(&self, _diagnostic: &Diagnostic) {}
}

/// Forwards diagnostics to `tracing` at their level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl WalletObserver for TracingObserver {
    fn observe(&self, diagnostic: &Diagnostic) {
        match diagnostic.level() {
            DiagnosticLevel::Debug => debug!(target: "phan", "{diagnostic}"),
            DiagnosticLevel::Info => info!(target: "phan", "{diagnostic}"),
            DiagnosticLevel::Error => error!(target: "phan", "{diagnostic}"),
        }
    }
}
