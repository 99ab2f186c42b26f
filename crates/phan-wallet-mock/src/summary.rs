//! Human-readable rendering of confirmed transactions.

use std::fmt;

use phan_types::{ConfirmedTransaction, Lamports, Pubkey, Signature, LAMPORTS_PER_SOL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    pub account: Pubkey,
    pub before: Lamports,
    pub after: Lamports,
}

impl BalanceChange {
    pub fn delta(&self) -> i128 {
        i128::from(self.after) - i128::from(self.before)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSummary {
    pub signature: Option<Signature>,
    pub slot: u64,
    pub fee: Lamports,
    pub err: Option<String>,
    /// Accounts whose balance moved, in account-key order.
    pub changes: Vec<BalanceChange>,
}

impl From<&ConfirmedTransaction> for TransactionSummary {
    fn from(tx: &ConfirmedTransaction) -> Self {
        let (fee, err, changes) = match &tx.meta {
            Some(meta) => {
                let changes = tx
                    .account_keys
                    .iter()
                    .zip(meta.pre_balances.iter().zip(&meta.post_balances))
                    .filter(|(_, (before, after))| before != after)
                    .map(|(account, (before, after))| BalanceChange {
                        account: *account,
                        before: *before,
                        after: *after,
                    })
                    .collect();
                (meta.fee, meta.err.clone(), changes)
            }
            None => (0, None, Vec::new()),
        };
        Self {
            signature: tx.signatures.first().copied(),
            slot: tx.slot,
            fee,
            err,
            changes,
        }
    }
}

impl fmt::Display for TransactionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.signature {
            Some(signature) => writeln!(f, "transaction {signature}")?,
            None => writeln!(f, "transaction <unsigned>")?,
        }
        writeln!(f, "  slot: {}", self.slot)?;
        writeln!(f, "  fee: {} lamports", self.fee)?;
        if let Some(err) = &self.err {
            writeln!(f, "  error: {err}")?;
        }
        for change in &self.changes {
            writeln!(
                f,
                "  {}: {:+} lamports ({} SOL)",
                change.account,
                change.delta(),
                change.after as f64 / LAMPORTS_PER_SOL as f64
            )?;
        }
        Ok(())
    }
}
