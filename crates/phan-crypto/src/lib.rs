//! Ed25519 keys, legacy message compilation, and in-place transaction signing.

pub mod ed25519;
pub mod message;
pub mod transaction;

pub use ed25519::{sign_detached, verify_detached, Keypair, Signer, SECRET_KEY_LEN};
pub use message::{AccountMeta, CompiledInstruction, Instruction, Message, MessageHeader};
pub use transaction::{NonceInfo, SignaturePair, Transaction, WireTransaction};
