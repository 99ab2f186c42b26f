//! MockLedger: in-memory cluster with rotating checkpoints, balances, airdrops, and
//! signature-checked transaction processing.

use std::collections::{HashMap, VecDeque};

use phan_crypto::WireTransaction;
use phan_types::{
    ConfirmationResult, ConfirmedTransaction, Hash, Lamports, Pubkey, RecentCheckpoint, Signature,
    TransactionError, TransactionMeta,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::system::{SystemInstruction, SYSTEM_PROGRAM_ID};

const CHECKPOINT_TAG: &[u8] = b"phan.ledger.checkpoint.v1";
const AIRDROP_TAG: &[u8] = b"phan.ledger.airdrop.v1";
const GENESIS_UNIX_SECS: i64 = 1_700_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerConfig {
    pub lamports_per_signature: Lamports,
    /// Number of checkpoints a transaction may reference before it is rejected.
    pub max_recent_checkpoints: usize,
    pub max_airdrop: Lamports,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lamports_per_signature: 5_000,
            max_recent_checkpoints: 150,
            max_airdrop: 1_000 * phan_types::LAMPORTS_PER_SOL,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionError),
    #[error("checkpoint not found")]
    CheckpointNotFound,
    #[error("transaction {0} already processed")]
    AlreadyProcessed(Signature),
    #[error("insufficient funds for {account}: needed {needed}, available {available}")]
    InsufficientFunds {
        account: Pubkey,
        needed: Lamports,
        available: Lamports,
    },
    #[error("account {0} already in use")]
    AccountInUse(Pubkey),
    #[error("instruction {index} requires {account} to sign")]
    MissingRequiredSignature { index: usize, account: Pubkey },
    #[error("instruction {index} is malformed")]
    MalformedInstruction { index: usize },
    #[error("airdrop of {requested} exceeds limit {max}")]
    AirdropLimit { requested: Lamports, max: Lamports },
    #[error("unknown signature {0}")]
    UnknownSignature(Signature),
    #[error("fee for {signatures} signatures overflows")]
    FeeOverflow { signatures: usize },
}

#[derive(Debug, Clone)]
pub struct MockLedger {
    config: LedgerConfig,
    slot: u64,
    block_height: u64,
    recent_checkpoints: VecDeque<Hash>,
    pub balances: HashMap<Pubkey, Lamports>,
    pub transactions: HashMap<Signature, ConfirmedTransaction>,
    airdrop_count: u64,
    outage: Option<String>,
}

impl MockLedger {
    pub fn new(config: LedgerConfig) -> Self {
        let genesis = derive_checkpoint(&Hash::default(), 0);
        Self {
            config,
            slot: 0,
            block_height: 0,
            recent_checkpoints: VecDeque::from([genesis]),
            balances: HashMap::new(),
            transactions: HashMap::new(),
            airdrop_count: 0,
            outage: None,
        }
    }

    pub fn with_balances(config: LedgerConfig, balances: HashMap<Pubkey, Lamports>) -> Self {
        let mut ledger = Self::new(config);
        ledger.balances = balances;
        ledger
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Makes every subsequent call fail with [`LedgerError::Unavailable`] until
    /// [`MockLedger::restore`] is called.
    pub fn simulate_outage(&mut self, reason: impl Into<String>) {
        self.outage = Some(reason.into());
    }

    pub fn restore(&mut self) {
        self.outage = None;
    }

    /// Produces a fresh checkpoint; older ones stay valid until they leave the window.
    pub fn latest_checkpoint(&mut self) -> Result<RecentCheckpoint, LedgerError> {
        self.ensure_available()?;
        let checkpoint = self.advance_slot();
        Ok(RecentCheckpoint {
            checkpoint,
            last_valid_block_height: self.block_height + self.config.max_recent_checkpoints as u64,
        })
    }

    pub fn balance(&self, account: &Pubkey) -> Result<Lamports, LedgerError> {
        self.ensure_available()?;
        Ok(self.balances.get(account).copied().unwrap_or(0))
    }

    pub fn request_airdrop(
        &mut self,
        to: &Pubkey,
        lamports: Lamports,
    ) -> Result<Signature, LedgerError> {
        self.ensure_available()?;
        if lamports > self.config.max_airdrop {
            return Err(LedgerError::AirdropLimit {
                requested: lamports,
                max: self.config.max_airdrop,
            });
        }
        self.airdrop_count += 1;
        let signature = derive_airdrop_signature(to, lamports, self.airdrop_count);
        let checkpoint = self.advance_slot();

        let pre = self.balances.get(to).copied().unwrap_or(0);
        let post = pre.saturating_add(lamports);
        self.balances.insert(*to, post);
        self.transactions.insert(
            signature,
            ConfirmedTransaction {
                slot: self.slot,
                block_time: Some(self.block_time()),
                signatures: vec![signature],
                account_keys: vec![*to],
                recent_checkpoint: checkpoint,
                meta: Some(TransactionMeta {
                    fee: 0,
                    pre_balances: vec![pre],
                    post_balances: vec![post],
                    err: None,
                }),
            },
        );
        info!(to = %to, lamports, slot = self.slot, "airdrop credited");
        Ok(signature)
    }

    /// Decodes, verifies, and applies a wire-encoded transaction atomically.
    pub fn process_transaction(&mut self, bytes: &[u8]) -> Result<Signature, LedgerError> {
        self.ensure_available()?;
        let wire = WireTransaction::decode(bytes)?;
        wire.verify()?;
        let message = &wire.message;
        let signature = wire
            .signatures
            .first()
            .copied()
            .ok_or(TransactionError::MissingFeePayer)?;
        if self.transactions.contains_key(&signature) {
            return Err(LedgerError::AlreadyProcessed(signature));
        }
        if !self.recent_checkpoints.contains(&message.recent_checkpoint) {
            return Err(LedgerError::CheckpointNotFound);
        }

        let fee_payer = *message
            .fee_payer()
            .ok_or(TransactionError::MissingFeePayer)?;
        let fee = u64::try_from(wire.signatures.len())
            .ok()
            .and_then(|count| self.config.lamports_per_signature.checked_mul(count))
            .ok_or(LedgerError::FeeOverflow {
                signatures: wire.signatures.len(),
            })?;
        let mut scratch = self.balances.clone();
        debit(&mut scratch, &fee_payer, fee)?;

        for (index, ix) in message.instructions.iter().enumerate() {
            let program = message
                .account_keys
                .get(usize::from(ix.program_id_index))
                .ok_or(LedgerError::MalformedInstruction { index })?;
            if *program != SYSTEM_PROGRAM_ID {
                debug!(program = %program, index, "skipping instruction for unknown program");
                continue;
            }
            let account_at = |position: usize| -> Result<(usize, Pubkey), LedgerError> {
                let key_index = usize::from(
                    *ix.accounts
                        .get(position)
                        .ok_or(LedgerError::MalformedInstruction { index })?,
                );
                let key = message
                    .account_keys
                    .get(key_index)
                    .ok_or(LedgerError::MalformedInstruction { index })?;
                Ok((key_index, *key))
            };
            let require_signer = |(key_index, key): (usize, Pubkey)| {
                if message.is_signer(key_index) {
                    Ok(key)
                } else {
                    Err(LedgerError::MissingRequiredSignature {
                        index,
                        account: key,
                    })
                }
            };

            match SystemInstruction::decode(&ix.data) {
                Some(SystemInstruction::Transfer { lamports }) => {
                    let from = require_signer(account_at(0)?)?;
                    let (_, to) = account_at(1)?;
                    debit(&mut scratch, &from, lamports)?;
                    credit(&mut scratch, &to, lamports);
                }
                Some(SystemInstruction::CreateAccount { lamports, .. }) => {
                    let from = require_signer(account_at(0)?)?;
                    let new_account = require_signer(account_at(1)?)?;
                    if scratch.get(&new_account).copied().unwrap_or(0) > 0 {
                        return Err(LedgerError::AccountInUse(new_account));
                    }
                    debit(&mut scratch, &from, lamports)?;
                    credit(&mut scratch, &new_account, lamports);
                }
                None => return Err(LedgerError::MalformedInstruction { index }),
            }
        }

        let pre_balances = balances_of(&self.balances, &message.account_keys);
        let post_balances = balances_of(&scratch, &message.account_keys);
        self.balances = scratch;
        let recent_checkpoint = message.recent_checkpoint;
        let account_keys = message.account_keys.clone();
        self.advance_slot();
        self.transactions.insert(
            signature,
            ConfirmedTransaction {
                slot: self.slot,
                block_time: Some(self.block_time()),
                signatures: wire.signatures.clone(),
                account_keys,
                recent_checkpoint,
                meta: Some(TransactionMeta {
                    fee,
                    pre_balances,
                    post_balances,
                    err: None,
                }),
            },
        );
        info!(signature = %signature, slot = self.slot, fee, "transaction processed");
        Ok(signature)
    }

    pub fn confirm_transaction(
        &self,
        signature: &Signature,
    ) -> Result<ConfirmationResult, LedgerError> {
        self.ensure_available()?;
        let tx = self
            .transactions
            .get(signature)
            .ok_or(LedgerError::UnknownSignature(*signature))?;
        Ok(ConfirmationResult {
            slot: tx.slot,
            err: tx.meta.as_ref().and_then(|meta| meta.err.clone()),
        })
    }

    pub fn get_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<ConfirmedTransaction>, LedgerError> {
        self.ensure_available()?;
        Ok(self.transactions.get(signature).cloned())
    }

    fn ensure_available(&self) -> Result<(), LedgerError> {
        match &self.outage {
            Some(reason) => Err(LedgerError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn advance_slot(&mut self) -> Hash {
        self.slot += 1;
        self.block_height += 1;
        let previous = self.recent_checkpoints.back().copied().unwrap_or_default();
        let checkpoint = derive_checkpoint(&previous, self.slot);
        self.recent_checkpoints.push_back(checkpoint);
        while self.recent_checkpoints.len() > self.config.max_recent_checkpoints.max(1) {
            self.recent_checkpoints.pop_front();
        }
        checkpoint
    }

    fn block_time(&self) -> i64 {
        GENESIS_UNIX_SECS + (self.slot as i64 * 400) / 1_000
    }
}

fn debit(
    balances: &mut HashMap<Pubkey, Lamports>,
    account: &Pubkey,
    lamports: Lamports,
) -> Result<(), LedgerError> {
    let available = balances.get(account).copied().unwrap_or(0);
    if available < lamports {
        return Err(LedgerError::InsufficientFunds {
            account: *account,
            needed: lamports,
            available,
        });
    }
    balances.insert(*account, available - lamports);
    Ok(())
}

fn credit(balances: &mut HashMap<Pubkey, Lamports>, account: &Pubkey, lamports: Lamports) {
    let entry = balances.entry(*account).or_insert(0);
    *entry = entry.saturating_add(lamports);
}

fn balances_of(balances: &HashMap<Pubkey, Lamports>, keys: &[Pubkey]) -> Vec<Lamports> {
    keys.iter()
        .map(|key| balances.get(key).copied().unwrap_or(0))
        .collect()
}

fn derive_checkpoint(previous: &Hash, slot: u64) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(CHECKPOINT_TAG);
    hasher.update(previous.as_bytes());
    hasher.update(slot.to_be_bytes());
    Hash::new(hasher.finalize().into())
}

fn derive_airdrop_signature(to: &Pubkey, lamports: Lamports, count: u64) -> Signature {
    let mut hasher = Sha256::new();
    hasher.update(AIRDROP_TAG);
    hasher.update(to.as_bytes());
    hasher.update(lamports.to_be_bytes());
    hasher.update(count.to_be_bytes());
    let first: [u8; 32] = hasher.finalize().into();
    let second: [u8; 32] = Sha256::digest(first).into();
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(&first);
    out[32..].copy_from_slice(&second);
    Signature::new(out)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use phan_crypto::{Keypair, Transaction};
    use phan_types::{Pubkey, SignableTransaction, TransactionError, LAMPORTS_PER_SOL};

    use super::{LedgerConfig, LedgerError, MockLedger};
    use crate::system;

    fn funded_ledger(payer: &Keypair) -> MockLedger {
        MockLedger::with_balances(
            LedgerConfig::default(),
            HashMap::from([(payer.public_key(), 5 * LAMPORTS_PER_SOL)]),
        )
    }

    fn signed_transfer(
        ledger: &mut MockLedger,
        payer: &Keypair,
        to: &Pubkey,
        lamports: u64,
    ) -> Vec<u8> {
        let checkpoint = ledger.latest_checkpoint().unwrap().checkpoint;
        let mut tx = Transaction::new().add(system::transfer(&payer.public_key(), to, lamports));
        tx.set_recent_checkpoint(checkpoint);
        tx.apply_partial_signature(payer).unwrap();
        tx.serialize().unwrap()
    }

    #[test]
    fn checkpoints_rotate_and_expire() {
        let mut ledger = MockLedger::new(LedgerConfig {
            max_recent_checkpoints: 2,
            ..LedgerConfig::default()
        });
        let first = ledger.latest_checkpoint().unwrap();
        let second = ledger.latest_checkpoint().unwrap();
        assert_ne!(first.checkpoint, second.checkpoint);
        assert_eq!(ledger.slot(), 2);
        assert!(second.last_valid_block_height > first.last_valid_block_height);
    }

    #[test]
    fn fee_overflow_is_rejected_without_side_effects() {
        let payer = Keypair::from_seed([0x0a; 32]);
        let new_account = Keypair::from_seed([0x0b; 32]);
        let mut ledger = MockLedger::with_balances(
            LedgerConfig {
                lamports_per_signature: u64::MAX / 2 + 1,
                ..LedgerConfig::default()
            },
            HashMap::from([(payer.public_key(), u64::MAX)]),
        );
        let checkpoint = ledger.latest_checkpoint().unwrap().checkpoint;
        let mut tx = Transaction::new().add(system::create_account(
            &payer.public_key(),
            &new_account.public_key(),
            1,
            0,
            &system::SYSTEM_PROGRAM_ID,
        ));
        tx.set_recent_checkpoint(checkpoint);
        tx.apply_partial_signature(&payer).unwrap();
        tx.apply_partial_signature(&new_account).unwrap();

        let err = ledger
            .process_transaction(&tx.serialize().unwrap())
            .unwrap_err();
        assert_eq!(err, LedgerError::FeeOverflow { signatures: 2 });
        assert_eq!(ledger.balance(&payer.public_key()).unwrap(), u64::MAX);
        assert_eq!(ledger.balance(&new_account.public_key()).unwrap(), 0);
    }

    #[test]
    fn processes_transfer_and_charges_fee() {
        let payer = Keypair::from_seed([0x01; 32]);
        let receiver = Pubkey::new([0x02; 32]);
        let mut ledger = funded_ledger(&payer);

        let bytes = signed_transfer(&mut ledger, &payer, &receiver, 10);
        let signature = ledger.process_transaction(&bytes).unwrap();

        assert_eq!(ledger.balance(&receiver).unwrap(), 10);
        assert_eq!(
            ledger.balance(&payer.public_key()).unwrap(),
            5 * LAMPORTS_PER_SOL - 10 - 5_000
        );
        let confirmed = ledger.get_transaction(&signature).unwrap().unwrap();
        assert_eq!(confirmed.meta.unwrap().fee, 5_000);
        assert!(ledger.confirm_transaction(&signature).unwrap().slot > 0);
    }

    #[test]
    fn rejects_replay_and_stale_checkpoint() {
        let payer = Keypair::from_seed([0x03; 32]);
        let mut ledger = MockLedger::with_balances(
            LedgerConfig {
                max_recent_checkpoints: 2,
                ..LedgerConfig::default()
            },
            HashMap::from([(payer.public_key(), LAMPORTS_PER_SOL)]),
        );
        let bytes = signed_transfer(&mut ledger, &payer, &Pubkey::new([4; 32]), 1);
        let signature = ledger.process_transaction(&bytes).unwrap();
        assert_eq!(
            ledger.process_transaction(&bytes).unwrap_err(),
            LedgerError::AlreadyProcessed(signature)
        );

        let stale = signed_transfer(&mut ledger, &payer, &Pubkey::new([5; 32]), 2);
        for _ in 0..3 {
            ledger.latest_checkpoint().unwrap();
        }
        assert_eq!(
            ledger.process_transaction(&stale).unwrap_err(),
            LedgerError::CheckpointNotFound
        );
    }

    #[test]
    fn failed_transaction_leaves_balances_untouched() {
        let payer = Keypair::from_seed([0x05; 32]);
        let mut ledger = MockLedger::with_balances(
            LedgerConfig::default(),
            HashMap::from([(payer.public_key(), 6_000)]),
        );
        let bytes = signed_transfer(&mut ledger, &payer, &Pubkey::new([6; 32]), 5_000);
        let err = ledger.process_transaction(&bytes).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance(&payer.public_key()).unwrap(), 6_000);
    }

    #[test]
    fn rejects_tampered_signature() {
        let payer = Keypair::from_seed([0x07; 32]);
        let mut ledger = funded_ledger(&payer);
        let mut bytes = signed_transfer(&mut ledger, &payer, &Pubkey::new([8; 32]), 1);
        bytes[1] ^= 0x01;
        assert_eq!(
            ledger.process_transaction(&bytes).unwrap_err(),
            LedgerError::InvalidTransaction(TransactionError::InvalidSignature(payer.public_key()))
        );
    }

    #[test]
    fn create_account_requires_new_account_signature() {
        let payer = Keypair::from_seed([0x09; 32]);
        let new_account = Keypair::from_seed([0x0a; 32]);
        let mut ledger = funded_ledger(&payer);
        let checkpoint = ledger.latest_checkpoint().unwrap().checkpoint;
        let mut tx = Transaction::with_fee_payer(payer.public_key()).add(system::create_account(
            &payer.public_key(),
            &new_account.public_key(),
            1_000,
            1,
            &system::SYSTEM_PROGRAM_ID,
        ));
        tx.set_recent_checkpoint(checkpoint);
        tx.apply_partial_signature(&payer).unwrap();
        tx.apply_partial_signature(&new_account).unwrap();

        ledger.process_transaction(&tx.serialize().unwrap()).unwrap();
        assert_eq!(ledger.balance(&new_account.public_key()).unwrap(), 1_000);
    }

    #[test]
    fn airdrop_credits_and_is_confirmable() {
        let receiver = Pubkey::new([0x0b; 32]);
        let mut ledger = MockLedger::new(LedgerConfig::default());
        let sig = ledger.request_airdrop(&receiver, LAMPORTS_PER_SOL).unwrap();
        assert_eq!(ledger.balance(&receiver).unwrap(), LAMPORTS_PER_SOL);
        assert!(ledger.confirm_transaction(&sig).unwrap().err.is_none());

        let err = ledger
            .request_airdrop(&receiver, 10_000 * LAMPORTS_PER_SOL)
            .unwrap_err();
        assert!(matches!(err, LedgerError::AirdropLimit { .. }));
    }

    #[test]
    fn outage_fails_every_call_until_restored() {
        let mut ledger = MockLedger::new(LedgerConfig::default());
        ledger.simulate_outage("maintenance");
        assert_eq!(
            ledger.latest_checkpoint().unwrap_err(),
            LedgerError::Unavailable("maintenance".to_string())
        );
        assert!(ledger.balance(&Pubkey::default()).is_err());
        ledger.restore();
        assert!(ledger.latest_checkpoint().is_ok());
        assert!(ledger.get_transaction(&Default::default()).unwrap().is_none());
    }
}
