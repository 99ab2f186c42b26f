//! Drives the wallet mock end to end against a cluster or the in-memory ledger.

use std::sync::{Arc, Mutex};

use clap::Parser;
use phan_crypto::{Keypair, Transaction};
use phan_ledger_mock::{system_transfer, DemoScenario};
use phan_types::{Commitment, Pubkey, LAMPORTS_PER_SOL};
use phan_wallet_mock::{
    Cluster, ConnectionConfig, ConnectionOptions, InMemoryConnectionFactory, TracingObserver,
    TransactionSummary, WalletEvent, WalletMock, WalletOptions, IN_MEMORY_URL,
};
use serde_json::json;
use tracing::info;

/// Wallet mock demo.
#[derive(Parser, Debug)]
#[command(name = "phan-demo", about = "Sign and submit transactions with the wallet mock")]
struct Cli {
    /// Named cluster to connect to.
    #[arg(long, default_value = "localnet")]
    cluster: Cluster,

    /// Explicit RPC endpoint; overrides --cluster.
    #[arg(long)]
    url: Option<String>,

    /// Base58-encoded 64-byte secret key. A fresh key is generated when omitted.
    #[arg(long)]
    keypair: Option<String>,

    #[arg(long, default_value = "confirmed")]
    commitment: Commitment,

    /// How long to wait for confirmations, in milliseconds.
    #[arg(long, default_value = "60000")]
    confirm_timeout_ms: u64,

    /// SOL to request before sending when the balance is lower.
    #[arg(long, default_value = "1")]
    airdrop_sol: u64,

    /// Transfer recipient; defaults to a fixed demo account.
    #[arg(long)]
    recipient: Option<Pubkey>,

    /// Run against the in-memory ledger instead of a cluster.
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let keypair = cli
        .keypair
        .as_deref()
        .map(Keypair::from_base58_string)
        .transpose()?;
    let config = ConnectionConfig::Structured(ConnectionOptions {
        commitment: Some(cli.commitment),
        confirm_timeout_ms: Some(cli.confirm_timeout_ms),
        ..ConnectionOptions::default()
    });

    let scenario = DemoScenario::default();
    let recipient = cli.recipient.unwrap_or(scenario.accounts.carol);
    let mut wallet = if cli.in_memory {
        let ledger = Arc::new(Mutex::new(scenario.ledger));
        WalletMock::with_options(
            IN_MEMORY_URL,
            WalletOptions {
                keypair: Some(keypair.unwrap_or(scenario.accounts.alice)),
                config: Some(config),
                factory: Arc::new(InMemoryConnectionFactory::new(ledger)),
                observer: Arc::new(TracingObserver),
            },
        )
    } else {
        let url = cli.url.unwrap_or_else(|| cli.cluster.url().to_string());
        WalletMock::with_options(
            url,
            WalletOptions {
                keypair,
                config: Some(config),
                observer: Arc::new(TracingObserver),
                ..WalletOptions::default()
            },
        )
    };

    wallet.on(WalletEvent::Connect, |_| info!("event: connect"));
    wallet.on(WalletEvent::Disconnect, |args| {
        info!(args = %json!(args), "event: disconnect")
    });

    wallet.connect().await?;
    let balance = wallet.get_balance().await?;
    info!(pubkey = %wallet.public_key(), balance, "wallet ready");
    let wanted = cli.airdrop_sol * LAMPORTS_PER_SOL;
    if balance < wanted {
        let signature = wallet.request_airdrop(wanted - balance).await?;
        info!(%signature, "airdrop confirmed");
    }

    let signed = wallet.sign_message(b"You gotta be messaging me!")?;
    info!(signature = %signed.signature, "signed message");

    let mut transfer = Transaction::new().add(system_transfer(
        &wallet.public_key(),
        &recipient,
        LAMPORTS_PER_SOL / 100,
    ));
    wallet.sign_transaction(&mut transfer).await?;
    wallet.send_and_confirm(&transfer).await?;
    if let Some(confirmed) = wallet.consume_last_transaction().await? {
        println!("{}", TransactionSummary::from(&confirmed));
    }

    let mut batch: Vec<Transaction> = (1..=2)
        .map(|i| {
            Transaction::new().add(system_transfer(&wallet.public_key(), &recipient, i * 1_000))
        })
        .collect();
    wallet.sign_all_transactions(&mut batch).await?;
    for tx in &batch {
        wallet.send_and_confirm(tx).await?;
    }
    info!(history = ?wallet.transaction_signatures(), "signed transactions");
    let balance = wallet.get_balance().await?;
    info!(balance, "final balance");

    wallet.disconnect(&[json!("demo finished")]).await;
    Ok(())
}
