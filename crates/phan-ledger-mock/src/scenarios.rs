use std::collections::HashMap;

use phan_crypto::Keypair;
use phan_types::{Pubkey, LAMPORTS_PER_SOL};

use crate::mock_ledger::{LedgerConfig, MockLedger};

/// Deterministic demo accounts: alice and bob are funded, carol starts empty.
#[derive(Debug, Clone)]
pub struct DemoAccounts {
    pub alice: Keypair,
    pub bob: Keypair,
    pub carol: Pubkey,
}

#[derive(Debug, Clone)]
pub struct DemoScenario {
    pub accounts: DemoAccounts,
    pub ledger: MockLedger,
}

impl DemoScenario {
    pub fn new(config: LedgerConfig) -> Self {
        let accounts = DemoAccounts {
            alice: Keypair::from_seed([0x41; 32]),
            bob: Keypair::from_seed([0x42; 32]),
            carol: Pubkey::new([0x03; 32]),
        };
        let ledger = MockLedger::with_balances(config, demo_balances(&accounts));
        Self { accounts, ledger }
    }
}

impl Default for DemoScenario {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

fn demo_balances(accounts: &DemoAccounts) -> HashMap<Pubkey, u64> {
    HashMap::from([
        (accounts.alice.public_key(), 10 * LAMPORTS_PER_SOL),
        (accounts.bob.public_key(), 2 * LAMPORTS_PER_SOL),
    ])
}
