//! In-memory ledger for exercising wallets without a running cluster.

pub mod mock_ledger;
pub mod scenarios;
pub mod system;

pub use mock_ledger::{LedgerConfig, LedgerError, MockLedger};
pub use scenarios::{DemoAccounts, DemoScenario};
pub use system::{transfer as system_transfer, SystemInstruction, SYSTEM_PROGRAM_ID};
