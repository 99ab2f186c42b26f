pub mod error;
pub mod ids;
pub mod rpc;
pub mod traits;

pub use error::{CryptoError, TransactionError, ValidationError};
pub use ids::{Hash, Lamports, Pubkey, Signature, LAMPORTS_PER_SOL};
pub use rpc::{
    Commitment, ConfirmationResult, ConfirmedTransaction, RecentCheckpoint, TransactionMeta,
};
pub use traits::{SignableTransaction, TxSigner};
