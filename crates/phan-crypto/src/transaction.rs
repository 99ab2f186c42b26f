//! Transaction: instructions plus per-signer signature slots, signed in place.

use phan_types::{Hash, Pubkey, Signature, SignableTransaction, TransactionError, TxSigner};
use serde::{Deserialize, Serialize};

use crate::{
    ed25519::verify_detached,
    message::{put_compact_len, Instruction, Message, Reader},
};

/// One signature slot. `signature` stays `None` until the owning key signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    pub signature: Option<Signature>,
    pub public_key: Pubkey,
}

impl SignaturePair {
    pub fn unsigned(public_key: Pubkey) -> Self {
        Self {
            signature: None,
            public_key,
        }
    }
}

/// Durable nonce used in place of a recent checkpoint. The advance instruction is
/// always compiled first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceInfo {
    pub nonce: Hash,
    pub advance_instruction: Instruction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub instructions: Vec<Instruction>,
    pub signatures: Vec<SignaturePair>,
    pub recent_checkpoint: Option<Hash>,
    pub fee_payer: Option<Pubkey>,
    pub nonce_info: Option<NonceInfo>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fee_payer(fee_payer: Pubkey) -> Self {
        Self {
            fee_payer: Some(fee_payer),
            ..Self::default()
        }
    }

    pub fn add(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Declares `signers` as required signers with empty slots.
    pub fn require_signers(mut self, signers: &[Pubkey]) -> Self {
        for signer in signers {
            if !self.signatures.iter().any(|pair| pair.public_key == *signer) {
                self.signatures.push(SignaturePair::unsigned(*signer));
            }
        }
        self
    }

    /// Signature in the fee payer's slot, which identifies the transaction on chain.
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first().and_then(|pair| pair.signature.as_ref())
    }

    pub fn compile_message(&self) -> Result<Message, TransactionError> {
        self.compile_with_slots(&self.signatures)
    }

    pub fn serialize_message(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(self.compile_message()?.serialize())
    }

    /// Required signers whose slot is still empty.
    pub fn missing_signers(&self) -> Result<Vec<Pubkey>, TransactionError> {
        let message = self.compile_message()?;
        Ok(message
            .signer_keys()
            .iter()
            .filter(|key| self.slot_signature(key).is_none())
            .copied()
            .collect())
    }

    /// Checks every required slot, reporting the first signer that fails.
    pub fn check_signatures(&self) -> Result<(), TransactionError> {
        let message = self.compile_message()?;
        let bytes = message.serialize();
        for key in message.signer_keys() {
            let signature = self
                .slot_signature(key)
                .ok_or(TransactionError::MissingSignature(*key))?;
            verify_detached(key, &bytes, &signature)
                .map_err(|_| TransactionError::InvalidSignature(*key))?;
        }
        Ok(())
    }

    /// Wire encoding; every required signature must be present and valid.
    pub fn serialize(&self) -> Result<Vec<u8>, TransactionError> {
        self.check_signatures()?;
        self.serialize_partial()
    }

    /// Wire encoding with zeroed bytes for slots that are still unsigned.
    pub fn serialize_partial(&self) -> Result<Vec<u8>, TransactionError> {
        let message = self.compile_message()?;
        let signatures = message
            .signer_keys()
            .iter()
            .map(|key| self.slot_signature(key).unwrap_or_default())
            .collect();
        Ok(WireTransaction {
            signatures,
            message,
        }
        .encode())
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, TransactionError> {
        let wire = WireTransaction::decode(bytes)?;
        let instructions = wire.message.decompile()?;
        let signatures = wire
            .message
            .signer_keys()
            .iter()
            .zip(&wire.signatures)
            .map(|(key, signature)| SignaturePair {
                signature: (*signature != Signature::default()).then_some(*signature),
                public_key: *key,
            })
            .collect();
        Ok(Self {
            instructions,
            signatures,
            recent_checkpoint: Some(wire.message.recent_checkpoint),
            fee_payer: wire.message.fee_payer().copied(),
            nonce_info: None,
        })
    }

    fn slot_signature(&self, key: &Pubkey) -> Option<Signature> {
        self.signatures
            .iter()
            .find(|pair| pair.public_key == *key)
            .and_then(|pair| pair.signature)
    }

    fn compile_with_slots(&self, slots: &[SignaturePair]) -> Result<Message, TransactionError> {
        let (checkpoint, instructions) = match &self.nonce_info {
            Some(nonce_info) => {
                let mut instructions = Vec::with_capacity(self.instructions.len() + 1);
                instructions.push(nonce_info.advance_instruction.clone());
                instructions.extend(
                    self.instructions
                        .iter()
                        .filter(|ix| **ix != nonce_info.advance_instruction)
                        .cloned(),
                );
                (nonce_info.nonce, instructions)
            }
            None => (
                self.recent_checkpoint
                    .ok_or(TransactionError::MissingRecentCheckpoint)?,
                self.instructions.clone(),
            ),
        };
        let fee_payer = self
            .fee_payer
            .or_else(|| slots.first().map(|pair| pair.public_key))
            .ok_or(TransactionError::MissingFeePayer)?;
        let slot_keys: Vec<Pubkey> = slots.iter().map(|pair| pair.public_key).collect();
        Message::compile(fee_payer, &instructions, &slot_keys, checkpoint)
    }
}

/// Resets the slots when the compiled signer set no longer matches them; any
/// earlier signature was made over a different message.
fn aligned_slots(slots: &[SignaturePair], message: &Message) -> Vec<SignaturePair> {
    let signer_keys = message.signer_keys();
    let aligned = slots.len() == signer_keys.len()
        && slots
            .iter()
            .zip(signer_keys)
            .all(|(pair, key)| pair.public_key == *key);
    if aligned {
        return slots.to_vec();
    }
    signer_keys
        .iter()
        .map(|key| SignaturePair::unsigned(*key))
        .collect()
}

impl SignableTransaction for Transaction {
    fn set_recent_checkpoint(&mut self, checkpoint: Hash) {
        self.recent_checkpoint = Some(checkpoint);
    }

    fn recent_checkpoint(&self) -> Option<&Hash> {
        self.recent_checkpoint.as_ref()
    }

    fn apply_partial_signature(
        &mut self,
        signer: &dyn TxSigner,
    ) -> Result<Signature, TransactionError> {
        let pubkey = signer.pubkey();
        let mut slots = self.signatures.clone();
        if self.fee_payer.is_none() && slots.is_empty() {
            slots.push(SignaturePair::unsigned(pubkey));
        }

        let message = self.compile_with_slots(&slots)?;
        let mut slots = aligned_slots(&slots, &message);
        let slot = slots
            .iter_mut()
            .find(|pair| pair.public_key == pubkey)
            .ok_or(TransactionError::UnknownSigner(pubkey))?;
        let signature = signer.try_sign_message(&message.serialize())?;
        slot.signature = Some(signature);

        self.signatures = slots;
        Ok(signature)
    }

    fn verify_signatures(&self) -> bool {
        self.check_signatures().is_ok()
    }
}

/// Decoded wire form: signatures in signer order followed by the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireTransaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl WireTransaction {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_compact_len(&mut out, self.signatures.len());
        for signature in &self.signatures {
            out.extend_from_slice(signature.as_bytes());
        }
        out.extend_from_slice(&self.message.serialize());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = Reader::new(bytes);
        let count = reader.compact_len()?;
        let mut signatures = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            signatures.push(Signature::new(reader.array::<64>()?));
        }
        let message_bytes = reader.rest();
        let message = Message::deserialize(message_bytes)?;
        if signatures.len() != message.signer_keys().len() {
            return Err(TransactionError::Malformed(format!(
                "expected {} signatures, got {}",
                message.signer_keys().len(),
                signatures.len()
            )));
        }
        Ok(Self {
            signatures,
            message,
        })
    }

    /// Verifies each signature against its signer key over the message bytes.
    pub fn verify(&self) -> Result<(), TransactionError> {
        let bytes = self.message.serialize();
        for (key, signature) in self.message.signer_keys().iter().zip(&self.signatures) {
            verify_detached(key, &bytes, signature)
                .map_err(|_| TransactionError::InvalidSignature(*key))?;
        }
        Ok(())
    }
}
