//! Trait definitions for signers and transactions that accept signatures.

use crate::{
    error::{CryptoError, TransactionError},
    ids::{Hash, Pubkey, Signature},
};

/// Produces detached signatures for a single public key.
pub trait TxSigner {
    fn pubkey(&self) -> Pubkey;

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, CryptoError>;
}

/// A transaction the wallet can stamp with a checkpoint and sign its own slot of.
pub trait SignableTransaction {
    fn set_recent_checkpoint(&mut self, checkpoint: Hash);

    fn recent_checkpoint(&self) -> Option<&Hash>;

    /// Fills only the slot that belongs to `signer`, leaving other slots as they are.
    fn apply_partial_signature(
        &mut self,
        signer: &dyn TxSigner,
    ) -> Result<Signature, TransactionError>;

    /// True when every required slot holds a signature that verifies.
    fn verify_signatures(&self) -> bool;
}
