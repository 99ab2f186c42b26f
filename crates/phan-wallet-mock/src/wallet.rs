//! WalletMock: connection lifecycle, automatic transaction and message signing, and
//! signature history.

use std::sync::{Arc, Mutex};

use futures::future::join_all;
use phan_crypto::{Keypair, Signer, Transaction};
use phan_ledger_mock::MockLedger;
use phan_types::{
    Commitment, ConfirmedTransaction, CryptoError, Lamports, Pubkey, SignableTransaction,
    Signature, TransactionError, TxSigner,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    cluster::Cluster,
    connection::{
        ConnectionConfig, ConnectionFactory, HttpConnectionFactory, InMemoryConnectionFactory,
        NetworkClient, RpcError,
    },
    events::{EventRegistry, ListenerId, WalletEvent},
    observer::{Diagnostic, NoopObserver, WalletObserver},
};

/// Endpoint label used by [`WalletMock::in_memory`].
pub const IN_MEMORY_URL: &str = "memory://ledger";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Need to connect wallet first")]
    NotConnected,
    #[error(transparent)]
    Upstream(#[from] RpcError),
    #[error(transparent)]
    Signing(#[from] CryptoError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error("transaction {signature} failed: {reason}")]
    Failed { signature: Signature, reason: String },
}

/// Result of [`WalletMock::sign_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    pub signature: Signature,
    pub public_key: Pubkey,
}

/// Keypair plus its cached signer projection; replaced as a unit.
#[derive(Clone)]
struct Identity {
    keypair: Keypair,
    signer: Signer,
}

impl Identity {
    fn new(keypair: Keypair) -> Self {
        let signer = keypair.to_signer();
        Self { keypair, signer }
    }
}

/// Construction options beyond the endpoint.
#[derive(Clone)]
pub struct WalletOptions {
    /// Generated when absent.
    pub keypair: Option<Keypair>,
    pub config: Option<ConnectionConfig>,
    pub factory: Arc<dyn ConnectionFactory>,
    pub observer: Arc<dyn WalletObserver>,
}

impl Default for WalletOptions {
    fn default() -> Self {
        Self {
            keypair: None,
            config: None,
            factory: Arc::new(HttpConnectionFactory),
            observer: Arc::new(NoopObserver),
        }
    }
}

/// Stand-in for a browser-injected wallet that approves every request.
pub struct WalletMock {
    url: String,
    config: ConnectionConfig,
    identity: Identity,
    connection: Option<Arc<dyn NetworkClient>>,
    transaction_signatures: Vec<Signature>,
    events: EventRegistry,
    factory: Arc<dyn ConnectionFactory>,
    observer: Arc<dyn WalletObserver>,
}

impl std::fmt::Debug for WalletMock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletMock")
            .field("url", &self.url)
            .field("public_key", &self.public_key())
            .field("connected", &self.is_connected())
            .field("signatures", &self.transaction_signatures.len())
            .finish_non_exhaustive()
    }
}

impl WalletMock {
    pub fn create(
        url: impl Into<String>,
        keypair: Option<Keypair>,
        config: Option<ConnectionConfig>,
    ) -> Self {
        Self::with_options(
            url,
            WalletOptions {
                keypair,
                config,
                ..WalletOptions::default()
            },
        )
    }

    pub fn with_options(url: impl Into<String>, options: WalletOptions) -> Self {
        let url = url.into();
        let config = options
            .config
            .unwrap_or(ConnectionConfig::Simple(Commitment::default()));
        let identity = Identity::new(options.keypair.unwrap_or_else(Keypair::generate));
        options.observer.observe(&Diagnostic::Initialized {
            url: url.clone(),
            public_key: identity.keypair.public_key(),
            commitment: config.resolve().commitment,
        });
        Self {
            url,
            config,
            identity,
            connection: None,
            transaction_signatures: Vec::new(),
            events: EventRegistry::default(),
            factory: options.factory,
            observer: options.observer,
        }
    }

    pub fn for_cluster(
        cluster: Cluster,
        keypair: Option<Keypair>,
        config: Option<ConnectionConfig>,
    ) -> Self {
        Self::create(cluster.url(), keypair, config)
    }

    pub fn localnet(keypair: Option<Keypair>) -> Self {
        Self::for_cluster(Cluster::Localnet, keypair, None)
    }

    pub fn devnet(keypair: Option<Keypair>) -> Self {
        Self::for_cluster(Cluster::Devnet, keypair, None)
    }

    pub fn testnet(keypair: Option<Keypair>) -> Self {
        Self::for_cluster(Cluster::Testnet, keypair, None)
    }

    pub fn mainnet_beta(keypair: Option<Keypair>) -> Self {
        Self::for_cluster(Cluster::MainnetBeta, keypair, None)
    }

    /// Wallet whose connections all talk to `ledger`.
    pub fn in_memory(ledger: Arc<Mutex<MockLedger>>, keypair: Option<Keypair>) -> Self {
        Self::with_options(
            IN_MEMORY_URL,
            WalletOptions {
                keypair,
                factory: Arc::new(InMemoryConnectionFactory::new(ledger)),
                ..WalletOptions::default()
            },
        )
    }

    pub fn with_observer(mut self, observer: Arc<dyn WalletObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub const fn is_phantom(&self) -> bool {
        true
    }

    pub fn public_key(&self) -> Pubkey {
        self.identity.keypair.public_key()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.identity.keypair
    }

    pub fn signer(&self) -> &Signer {
        &self.identity.signer
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The live network client; the single guard every network-backed call goes through.
    pub fn connection(&self) -> Result<Arc<dyn NetworkClient>, WalletError> {
        self.connection.clone().ok_or(WalletError::NotConnected)
    }

    pub fn on(
        &mut self,
        event: WalletEvent,
        listener: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> ListenerId {
        self.events.on(event, listener)
    }

    pub fn off(&mut self, event: WalletEvent, id: ListenerId) -> bool {
        self.events.off(event, id)
    }

    pub fn remove_all_listeners(&mut self, event: WalletEvent) {
        self.events.remove_all(event);
    }

    pub fn listener_count(&self, event: WalletEvent) -> usize {
        self.events.listener_count(event)
    }

    /// Builds a fresh client, replacing any existing one, and emits `connect`.
    pub async fn connect(&mut self) -> Result<(), WalletError> {
        let client = self.factory.connect(&self.url, &self.config.resolve())?;
        self.connection = Some(client);
        self.observer.observe(&Diagnostic::Connected {
            url: self.url.clone(),
        });
        self.events.emit(WalletEvent::Connect, &[]);
        Ok(())
    }

    /// Drops the client and emits `disconnect` with `args`, even when already disconnected.
    pub async fn disconnect(&mut self, args: &[Value]) {
        self.connection = None;
        self.observer.observe(&Diagnostic::Disconnected);
        self.events.emit(WalletEvent::Disconnect, args);
    }

    /// Stamps a recent checkpoint onto `transaction` and fills this wallet's slot.
    pub async fn sign_transaction<T: SignableTransaction>(
        &mut self,
        transaction: &mut T,
    ) -> Result<Signature, WalletError> {
        self.observer.observe(&Diagnostic::SigningTransaction {
            signer: self.public_key(),
        });
        let result = self.try_sign_transaction(transaction).await;
        self.record(result)
    }

    /// Fetches all checkpoints concurrently, then signs and records in input order.
    /// Stops at the first failure; transactions signed before it stay signed.
    pub async fn sign_all_transactions<T: SignableTransaction>(
        &mut self,
        transactions: &mut [T],
    ) -> Result<Vec<Signature>, WalletError> {
        let client = self.connection().map_err(|err| self.failed(err))?;
        let checkpoints =
            join_all(transactions.iter().map(|_| client.get_recent_checkpoint())).await;

        let mut signatures = Vec::with_capacity(transactions.len());
        for (transaction, checkpoint) in transactions.iter_mut().zip(checkpoints) {
            self.observer.observe(&Diagnostic::SigningTransaction {
                signer: self.public_key(),
            });
            let result = checkpoint.map_err(WalletError::from).and_then(|recent| {
                transaction.set_recent_checkpoint(recent.checkpoint);
                Ok(transaction.apply_partial_signature(&self.identity.signer)?)
            });
            signatures.push(self.record(result)?);
        }
        Ok(signatures)
    }

    /// Detached signature over `message`; does not touch the history.
    pub fn sign_message(&self, message: &[u8]) -> Result<SignedMessage, WalletError> {
        self.connection()?;
        let signature = self.identity.signer.try_sign_message(message)?;
        self.observer.observe(&Diagnostic::SignedMessage {
            len: message.len(),
        });
        Ok(SignedMessage {
            signature,
            public_key: self.public_key(),
        })
    }

    /// Base58 signatures of every signed transaction, oldest first.
    pub fn transaction_signatures(&self) -> Vec<String> {
        self.transaction_signatures
            .iter()
            .map(Signature::to_base58)
            .collect()
    }

    pub fn last_transaction_signature(&self) -> Option<&Signature> {
        self.transaction_signatures.last()
    }

    /// Pops the newest signature and looks up its confirmed transaction.
    /// Returns `None` when nothing has been signed yet.
    pub async fn consume_last_transaction(
        &mut self,
    ) -> Result<Option<ConfirmedTransaction>, WalletError> {
        let client = self.connection()?;
        let Some(signature) = self.transaction_signatures.pop() else {
            return Ok(None);
        };
        Ok(client.get_confirmed_transaction(&signature).await?)
    }

    /// Swaps the signing identity. Connection and history are kept.
    pub fn change_wallet(&mut self, keypair: Keypair) {
        let previous = self.public_key();
        self.identity = Identity::new(keypair);
        self.observer.observe(&Diagnostic::WalletChanged {
            previous,
            current: self.public_key(),
        });
    }

    pub async fn get_balance(&self) -> Result<Lamports, WalletError> {
        let client = self.connection()?;
        Ok(client.get_balance(&self.public_key()).await?)
    }

    /// Requests funds for this wallet and waits for the airdrop to confirm.
    pub async fn request_airdrop(&self, lamports: Lamports) -> Result<Signature, WalletError> {
        let client = self.connection()?;
        let signature = client.request_airdrop(&self.public_key(), lamports).await?;
        confirm(client.as_ref(), signature).await
    }

    /// Submits a fully signed transaction and waits for confirmation.
    pub async fn send_and_confirm(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, WalletError> {
        let client = self.connection()?;
        let bytes = transaction.serialize()?;
        let signature = client.send_raw_transaction(&bytes).await?;
        confirm(client.as_ref(), signature).await
    }

    async fn try_sign_transaction<T: SignableTransaction>(
        &self,
        transaction: &mut T,
    ) -> Result<Signature, WalletError> {
        let client = self.connection()?;
        let recent = client.get_recent_checkpoint().await?;
        transaction.set_recent_checkpoint(recent.checkpoint);
        Ok(transaction.apply_partial_signature(&self.identity.signer)?)
    }

    fn record(
        &mut self,
        result: Result<Signature, WalletError>,
    ) -> Result<Signature, WalletError> {
        match result {
            Ok(signature) => {
                self.transaction_signatures.push(signature);
                self.observer.observe(&Diagnostic::SignedTransaction { signature });
                Ok(signature)
            }
            Err(err) => Err(self.failed(err)),
        }
    }

    fn failed(&self, err: WalletError) -> WalletError {
        self.observer.observe(&Diagnostic::SigningFailed {
            reason: err.to_string(),
        });
        err
    }
}

async fn confirm(
    client: &dyn NetworkClient,
    signature: Signature,
) -> Result<Signature, WalletError> {
    let confirmation = client.confirm_transaction(&signature).await?;
    match confirmation.err {
        Some(reason) => Err(WalletError::Failed { signature, reason }),
        None => Ok(signature),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use phan_crypto::{verify_detached, Keypair, Transaction};
    use phan_ledger_mock::{system, LedgerConfig, MockLedger};
    use phan_types::{
        ConfirmationResult, ConfirmedTransaction, Hash, Lamports, Pubkey, RecentCheckpoint,
        SignableTransaction, Signature, TransactionError, LAMPORTS_PER_SOL,
    };
    use serde_json::json;

    use super::{WalletError, WalletMock, WalletOptions};
    use crate::{
        connection::{ConnectionFactory, NetworkClient, ResolvedConnectionConfig, RpcError},
        events::WalletEvent,
        observer::{Diagnostic, WalletObserver},
    };

    const FIXTURE_SECRET: &str =
        "88ispq4nGXVUTuwm1ayCbXWTqhBXYLMZD4Jq1dWyptvj6W4RHCpn1VtrUAbhVEXzjMjjG1eJu9rzWA7MDMzXeBL";

    /// Hands out a distinct checkpoint per call; earlier calls resolve later.
    #[derive(Default)]
    struct StaggeredClient {
        calls: AtomicUsize,
        completed: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl NetworkClient for StaggeredClient {
        async fn get_recent_checkpoint(&self) -> Result<RecentCheckpoint, RpcError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = 40u64.saturating_sub(20 * call as u64);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.completed.lock().unwrap().push(call);
            Ok(RecentCheckpoint {
                checkpoint: Hash::new([call as u8 + 1; 32]),
                last_valid_block_height: 150,
            })
        }

        async fn get_balance(&self, _account: &Pubkey) -> Result<Lamports, RpcError> {
            Err(RpcError::Unavailable("staggered".to_string()))
        }

        async fn request_airdrop(
            &self,
            _to: &Pubkey,
            _lamports: Lamports,
        ) -> Result<Signature, RpcError> {
            Err(RpcError::Unavailable("staggered".to_string()))
        }

        async fn confirm_transaction(
            &self,
            _signature: &Signature,
        ) -> Result<ConfirmationResult, RpcError> {
            Err(RpcError::Unavailable("staggered".to_string()))
        }

        async fn get_confirmed_transaction(
            &self,
            _signature: &Signature,
        ) -> Result<Option<ConfirmedTransaction>, RpcError> {
            Err(RpcError::Unavailable("staggered".to_string()))
        }

        async fn send_raw_transaction(&self, _bytes: &[u8]) -> Result<Signature, RpcError> {
            Err(RpcError::Unavailable("staggered".to_string()))
        }
    }

    struct StaggeredFactory(Arc<StaggeredClient>);

    impl ConnectionFactory for StaggeredFactory {
        fn connect(
            &self,
            _url: &str,
            _config: &ResolvedConnectionConfig,
        ) -> Result<Arc<dyn NetworkClient>, RpcError> {
            Ok(Arc::clone(&self.0) as Arc<dyn NetworkClient>)
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<Diagnostic>>,
    }

    impl WalletObserver for RecordingObserver {
        fn observe(&self, diagnostic: &Diagnostic) {
            self.seen.lock().unwrap().push(diagnostic.clone());
        }
    }

    fn ledger_with(keypair: &Keypair) -> Arc<Mutex<MockLedger>> {
        Arc::new(Mutex::new(MockLedger::with_balances(
            LedgerConfig::default(),
            HashMap::from([(keypair.public_key(), 2 * LAMPORTS_PER_SOL)]),
        )))
    }

    fn fixture_wallet() -> WalletMock {
        let keypair = Keypair::from_base58_string(FIXTURE_SECRET).unwrap();
        WalletMock::in_memory(ledger_with(&keypair), Some(keypair))
    }

    #[tokio::test]
    async fn lifecycle_tracks_connection_and_emits_events() {
        let mut wallet = fixture_wallet();
        let connects = Arc::new(Mutex::new(0));
        let disconnects = Arc::new(Mutex::new(Vec::new()));
        {
            let connects = Arc::clone(&connects);
            wallet.on(WalletEvent::Connect, move |_| *connects.lock().unwrap() += 1);
            let disconnects = Arc::clone(&disconnects);
            wallet.on(WalletEvent::Disconnect, move |args| {
                disconnects.lock().unwrap().push(args.to_vec())
            });
        }

        assert!(!wallet.is_connected());
        wallet.connect().await.unwrap();
        assert!(wallet.is_connected());
        assert_eq!(*connects.lock().unwrap(), 1);
        assert!(disconnects.lock().unwrap().is_empty());

        wallet.disconnect(&[json!("user")]).await;
        assert!(!wallet.is_connected());
        assert_eq!(*disconnects.lock().unwrap(), vec![vec![json!("user")]]);

        wallet.disconnect(&[]).await;
        assert_eq!(disconnects.lock().unwrap().len(), 2);
        assert_eq!(wallet.connection().err(), Some(WalletError::NotConnected));

        wallet.remove_all_listeners(WalletEvent::Disconnect);
        assert_eq!(wallet.listener_count(WalletEvent::Disconnect), 0);
        assert_eq!(wallet.listener_count(WalletEvent::Connect), 1);
        wallet.disconnect(&[]).await;
        assert_eq!(disconnects.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn golden_message_signatures() {
        let mut wallet = fixture_wallet();
        wallet.connect().await.unwrap();
        let cases = [
            (
                "",
                "s5BP5cuM6a8FMfnvagAuNLnL6ZWAYfb1HRt3tFxUhSY8jaxZRB7ZR1McSdSxzkZ7rfpDiLWaNxwrz2Bmca1cE76",
            ),
            (
                "a",
                "3hx5JAgfJyv1W7mxrdAJ36Jm6TEXLeexknA7LxrKFk7khprve2ewvA412wUhTjMGJmwu4ZEGMCPPbNg5wm9MGHKX",
            ),
            (
                "You gotta be messaging me!",
                "5WCNZvDpSDHiqgXajXRNRksGLgW4zCNjqdhK1DCHXxntuDmnrguDDkdeaff82ZHjUMqTDMB5igUvADrfxUDdpQBn",
            ),
        ];
        for (message, expected) in cases {
            let signed = wallet.sign_message(message.as_bytes()).unwrap();
            assert_eq!(signed.signature.to_base58(), expected, "message {message:?}");
            assert_eq!(signed.public_key, wallet.public_key());
            verify_detached(&signed.public_key, message.as_bytes(), &signed.signature).unwrap();
        }
        assert!(wallet.transaction_signatures().is_empty());
    }

    #[tokio::test]
    async fn signing_requires_connection() {
        let mut wallet = fixture_wallet();
        let mut tx = Transaction::new();
        let err = wallet.sign_transaction(&mut tx).await.unwrap_err();
        assert_eq!(err.to_string(), "Need to connect wallet first");
        assert_eq!(tx, Transaction::new());
        assert!(wallet.transaction_signatures().is_empty());
        assert_eq!(
            wallet.sign_message(b"hi").unwrap_err(),
            WalletError::NotConnected
        );
        assert_eq!(
            wallet
                .sign_all_transactions(&mut [Transaction::new()])
                .await
                .unwrap_err(),
            WalletError::NotConnected
        );
    }

    #[tokio::test]
    async fn empty_transaction_gets_one_slot_for_wallet_key() {
        let mut wallet = fixture_wallet();
        wallet.connect().await.unwrap();
        let mut tx = Transaction::new();
        let signature = wallet.sign_transaction(&mut tx).await.unwrap();

        assert_eq!(tx.signatures.len(), 1);
        assert_eq!(tx.signatures[0].public_key, wallet.public_key());
        assert_eq!(tx.signatures[0].signature, Some(signature));
        assert!(tx.verify_signatures());
        assert_eq!(wallet.transaction_signatures(), vec![signature.to_base58()]);
    }

    #[tokio::test]
    async fn transfer_signs_without_setting_fee_payer() {
        let mut wallet = fixture_wallet();
        wallet.connect().await.unwrap();
        let mut tx = Transaction::new().add(system::transfer(
            &wallet.public_key(),
            &Pubkey::new([9; 32]),
            10,
        ));
        wallet.sign_transaction(&mut tx).await.unwrap();

        assert!(tx.fee_payer.is_none());
        assert!(tx.nonce_info.is_none());
        assert!(tx.recent_checkpoint().is_some());
        assert!(tx.verify_signatures());
    }

    #[tokio::test]
    async fn multi_signer_transaction_is_signed_partially() {
        let mut wallet = fixture_wallet();
        wallet.connect().await.unwrap();
        let other = Keypair::from_seed([0x33; 32]);
        let mut tx = Transaction::with_fee_payer(wallet.public_key())
            .add(system::transfer(&wallet.public_key(), &Pubkey::new([1; 32]), 1))
            .add(system::transfer(&other.public_key(), &Pubkey::new([2; 32]), 1));

        wallet.sign_transaction(&mut tx).await.unwrap();
        assert_eq!(tx.signatures.len(), 2);
        assert!(!tx.verify_signatures());
        assert_eq!(tx.missing_signers().unwrap(), vec![other.public_key()]);

        tx.apply_partial_signature(&other).unwrap();
        assert!(tx.verify_signatures());
    }

    #[tokio::test]
    async fn foreign_fee_payer_fails_without_recording() {
        let mut wallet = fixture_wallet();
        wallet.connect().await.unwrap();
        let stranger = Pubkey::new([0x44; 32]);
        let mut tx = Transaction::with_fee_payer(stranger)
            .add(system::transfer(&stranger, &Pubkey::new([1; 32]), 1));

        let err = wallet.sign_transaction(&mut tx).await.unwrap_err();
        assert_eq!(
            err,
            WalletError::Transaction(TransactionError::UnknownSigner(wallet.public_key()))
        );
        assert!(wallet.transaction_signatures().is_empty());
    }

    #[tokio::test]
    async fn sign_all_records_in_input_order() {
        let mut wallet = fixture_wallet();
        wallet.connect().await.unwrap();
        let payer = wallet.public_key();
        let mut txs = vec![
            Transaction::new().add(system::transfer(&payer, &Pubkey::new([1; 32]), 1)),
            Transaction::new().add(system::transfer(&payer, &Pubkey::new([2; 32]), 2)),
        ];
        let signatures = wallet.sign_all_transactions(&mut txs).await.unwrap();

        assert_eq!(signatures.len(), 2);
        assert_eq!(txs[0].signature(), Some(&signatures[0]));
        assert_eq!(txs[1].signature(), Some(&signatures[1]));
        assert_eq!(
            wallet.transaction_signatures(),
            signatures.iter().map(Signature::to_base58).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn sign_all_keeps_input_order_when_fetches_finish_out_of_order() {
        let client = Arc::new(StaggeredClient::default());
        let mut wallet = WalletMock::with_options(
            "memory://staggered",
            WalletOptions {
                factory: Arc::new(StaggeredFactory(Arc::clone(&client))),
                ..WalletOptions::default()
            },
        );
        wallet.connect().await.unwrap();
        let payer = wallet.public_key();
        let mut txs: Vec<Transaction> = (1..=3u8)
            .map(|n| {
                Transaction::new().add(system::transfer(&payer, &Pubkey::new([n; 32]), n.into()))
            })
            .collect();

        let signatures = wallet.sign_all_transactions(&mut txs).await.unwrap();

        assert_eq!(*client.completed.lock().unwrap(), vec![2, 1, 0]);
        for (index, tx) in txs.iter().enumerate() {
            assert_eq!(tx.recent_checkpoint(), Some(&Hash::new([index as u8 + 1; 32])));
            assert_eq!(tx.signature(), Some(&signatures[index]));
            assert!(tx.verify_signatures());
        }
        assert_eq!(
            wallet.transaction_signatures(),
            txs.iter()
                .map(|tx| tx.signature().unwrap().to_base58())
                .collect::<Vec<_>>()
        );
        assert_eq!(wallet.last_transaction_signature(), Some(&signatures[2]));
    }

    #[tokio::test]
    async fn sign_all_stops_at_first_failure_without_rollback() {
        let mut wallet = fixture_wallet();
        wallet.connect().await.unwrap();
        let stranger = Pubkey::new([0x55; 32]);
        let mut txs = vec![
            Transaction::new(),
            Transaction::with_fee_payer(stranger),
            Transaction::new(),
        ];
        let err = wallet.sign_all_transactions(&mut txs).await.unwrap_err();

        assert!(matches!(err, WalletError::Transaction(_)));
        assert!(txs[0].verify_signatures());
        assert!(txs[2].signatures.is_empty());
        assert_eq!(wallet.transaction_signatures().len(), 1);
    }

    #[tokio::test]
    async fn change_wallet_swaps_key_and_signer() {
        let mut wallet = fixture_wallet();
        wallet.connect().await.unwrap();
        let first = wallet.sign_message(b"x").unwrap();

        let next = Keypair::from_seed([0x66; 32]);
        wallet.change_wallet(next.clone());
        assert_eq!(wallet.public_key(), next.public_key());
        assert_eq!(wallet.signer().public_key(), next.public_key());
        assert!(wallet.is_connected());

        let second = wallet.sign_message(b"x").unwrap();
        assert_eq!(second.public_key, next.public_key());
        assert_ne!(first.signature, second.signature);
        verify_detached(&next.public_key(), b"x", &second.signature).unwrap();
    }

    #[tokio::test]
    async fn consume_last_transaction_pops_newest() {
        let mut wallet = fixture_wallet();
        wallet.connect().await.unwrap();
        assert_eq!(wallet.consume_last_transaction().await.unwrap(), None);

        let mut first = Transaction::new()
            .add(system::transfer(&wallet.public_key(), &Pubkey::new([1; 32]), 5));
        wallet.sign_transaction(&mut first).await.unwrap();
        let mut second = Transaction::new()
            .add(system::transfer(&wallet.public_key(), &Pubkey::new([2; 32]), 6));
        let sent = wallet.sign_transaction(&mut second).await.unwrap();
        wallet.send_and_confirm(&second).await.unwrap();

        let confirmed = wallet.consume_last_transaction().await.unwrap().unwrap();
        assert_eq!(confirmed.signatures, vec![sent]);
        assert_eq!(wallet.transaction_signatures().len(), 1);

        // `first` was never submitted.
        assert_eq!(wallet.consume_last_transaction().await.unwrap(), None);
        assert!(wallet.transaction_signatures().is_empty());
    }

    #[tokio::test]
    async fn consume_while_disconnected_keeps_history() {
        let mut wallet = fixture_wallet();
        wallet.connect().await.unwrap();
        wallet.sign_transaction(&mut Transaction::new()).await.unwrap();
        wallet.disconnect(&[]).await;

        assert_eq!(
            wallet.consume_last_transaction().await.unwrap_err(),
            WalletError::NotConnected
        );
        assert_eq!(wallet.transaction_signatures().len(), 1);
    }

    #[tokio::test]
    async fn airdrop_and_balance_go_through_connection() {
        let mut wallet = fixture_wallet();
        assert_eq!(wallet.get_balance().await.unwrap_err(), WalletError::NotConnected);
        wallet.connect().await.unwrap();

        let before = wallet.get_balance().await.unwrap();
        wallet.request_airdrop(LAMPORTS_PER_SOL).await.unwrap();
        assert_eq!(wallet.get_balance().await.unwrap(), before + LAMPORTS_PER_SOL);
    }

    #[tokio::test]
    async fn observer_sees_signing_outcomes() {
        let observer = Arc::new(RecordingObserver::default());
        let mut wallet = fixture_wallet().with_observer(observer.clone());
        wallet.sign_transaction(&mut Transaction::new()).await.unwrap_err();
        wallet.connect().await.unwrap();
        let signature = wallet.sign_transaction(&mut Transaction::new()).await.unwrap();

        let seen = observer.seen.lock().unwrap();
        assert!(matches!(seen[1], Diagnostic::SigningFailed { .. }));
        assert!(seen.contains(&Diagnostic::SignedTransaction { signature }));
    }

    #[test]
    fn generated_identity_and_phantom_flag() {
        let wallet = WalletMock::devnet(None);
        assert!(wallet.is_phantom());
        assert!(!wallet.is_connected());
        assert_eq!(wallet.url(), crate::cluster::DEVNET);
        assert_eq!(wallet.signer().public_key(), wallet.public_key());
    }
}
