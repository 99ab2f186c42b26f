//! System program instructions understood by the in-memory ledger.
//!
//! Data layout is a little-endian u32 variant tag followed by little-endian fields.

use phan_crypto::{AccountMeta, Instruction};
use phan_types::{Lamports, Pubkey};

pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new([0u8; 32]);

const CREATE_ACCOUNT_TAG: u32 = 0;
const TRANSFER_TAG: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemInstruction {
    CreateAccount {
        lamports: Lamports,
        space: u64,
        owner: Pubkey,
    },
    Transfer {
        lamports: Lamports,
    },
}

impl SystemInstruction {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::CreateAccount {
                lamports,
                space,
                owner,
            } => {
                out.extend_from_slice(&CREATE_ACCOUNT_TAG.to_le_bytes());
                out.extend_from_slice(&lamports.to_le_bytes());
                out.extend_from_slice(&space.to_le_bytes());
                out.extend_from_slice(owner.as_bytes());
            }
            Self::Transfer { lamports } => {
                out.extend_from_slice(&TRANSFER_TAG.to_le_bytes());
                out.extend_from_slice(&lamports.to_le_bytes());
            }
        }
        out
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        let tag = u32::from_le_bytes(data.get(..4)?.try_into().ok()?);
        let body = &data[4..];
        match tag {
            CREATE_ACCOUNT_TAG if body.len() == 48 => Some(Self::CreateAccount {
                lamports: u64::from_le_bytes(body[..8].try_into().ok()?),
                space: u64::from_le_bytes(body[8..16].try_into().ok()?),
                owner: Pubkey::from_slice(&body[16..48]).ok()?,
            }),
            TRANSFER_TAG if body.len() == 8 => Some(Self::Transfer {
                lamports: u64::from_le_bytes(body.try_into().ok()?),
            }),
            _ => None,
        }
    }
}

pub fn transfer(from: &Pubkey, to: &Pubkey, lamports: Lamports) -> Instruction {
    Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        SystemInstruction::Transfer { lamports }.encode(),
    )
}

pub fn create_account(
    from: &Pubkey,
    new_account: &Pubkey,
    lamports: Lamports,
    space: u64,
    owner: &Pubkey,
) -> Instruction {
    Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![
            AccountMeta::new(*from, true),
            AccountMeta::new(*new_account, true),
        ],
        SystemInstruction::CreateAccount {
            lamports,
            space,
            owner: *owner,
        }
        .encode(),
    )
}

#[cfg(test)]
mod tests {
    use phan_types::Pubkey;

    use super::{transfer, SystemInstruction, SYSTEM_PROGRAM_ID};

    #[test]
    fn transfer_layout_matches_native_program() {
        let ix = transfer(&Pubkey::new([1; 32]), &Pubkey::new([2; 32]), 10);
        assert_eq!(ix.program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(ix.data, vec![2, 0, 0, 0, 10, 0, 0, 0, 0, 0, 0, 0]);
        assert!(ix.keys[0].is_signer && ix.keys[0].is_writable);
        assert!(!ix.keys[1].is_signer && ix.keys[1].is_writable);
        assert_eq!(
            SystemInstruction::decode(&ix.data),
            Some(SystemInstruction::Transfer { lamports: 10 })
        );
    }

    #[test]
    fn decode_rejects_unknown_or_short_data() {
        assert_eq!(SystemInstruction::decode(&[2, 0, 0]), None);
        assert_eq!(SystemInstruction::decode(&[2, 0, 0, 0, 1]), None);
        assert_eq!(SystemInstruction::decode(&[9, 0, 0, 0]), None);
    }
}
