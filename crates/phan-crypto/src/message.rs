//! Legacy message compilation and its canonical wire encoding.
//!
//! Encoding rules:
//! 1. Lengths are compact-u16: 7 bits per byte, high bit set on every byte but the last.
//! 2. Header is three bytes: required signatures, readonly signed, readonly unsigned.
//! 3. Account keys follow in order: writable signers (fee payer first), readonly signers,
//!    writable non-signers, readonly non-signers.
//! 4. Instructions reference accounts and their program by one-byte index.

use std::collections::HashMap;

use phan_types::{Hash, Pubkey, TransactionError};
use serde::{Deserialize, Serialize};

const MAX_ACCOUNT_KEYS: usize = u8::MAX as usize + 1;
const MAX_COMPACT_U16: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub keys: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn new(program_id: Pubkey, keys: Vec<AccountMeta>, data: Vec<u8>) -> Self {
        Self {
            program_id,
            keys,
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_checkpoint: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compiles instructions into a message. `signers` are keys that hold a signature
    /// slot on the transaction and must therefore sign even if no instruction asks.
    pub fn compile(
        fee_payer: Pubkey,
        instructions: &[Instruction],
        signers: &[Pubkey],
        recent_checkpoint: Hash,
    ) -> Result<Self, TransactionError> {
        let mut metas: Vec<AccountMeta> = Vec::new();
        let mut positions: HashMap<Pubkey, usize> = HashMap::new();
        let mut merge = |meta: AccountMeta| match positions.get(&meta.pubkey).copied() {
            Some(pos) => {
                let existing: &mut AccountMeta = &mut metas[pos];
                existing.is_signer |= meta.is_signer;
                existing.is_writable |= meta.is_writable;
            }
            None => {
                positions.insert(meta.pubkey, metas.len());
                metas.push(meta);
            }
        };

        for ix in instructions {
            for key in &ix.keys {
                merge(key.clone());
            }
            merge(AccountMeta::new_readonly(ix.program_id, false));
        }
        for signer in signers {
            merge(AccountMeta::new_readonly(*signer, true));
        }

        metas.retain(|meta| meta.pubkey != fee_payer);
        metas.sort_by(|a, b| {
            b.is_signer
                .cmp(&a.is_signer)
                .then(b.is_writable.cmp(&a.is_writable))
                .then_with(|| a.pubkey.to_base58().cmp(&b.pubkey.to_base58()))
        });
        metas.insert(0, AccountMeta::new(fee_payer, true));

        if metas.len() > MAX_ACCOUNT_KEYS {
            return Err(TransactionError::TooMany {
                kind: "account keys",
                count: metas.len(),
                max: MAX_ACCOUNT_KEYS,
            });
        }

        let count = |pred: fn(&AccountMeta) -> bool| metas.iter().filter(|meta| pred(meta)).count();
        let header = MessageHeader {
            num_required_signatures: to_u8("signers", count(|m| m.is_signer))?,
            num_readonly_signed_accounts: to_u8(
                "readonly signers",
                count(|m| m.is_signer && !m.is_writable),
            )?,
            num_readonly_unsigned_accounts: to_u8(
                "readonly accounts",
                count(|m| !m.is_signer && !m.is_writable),
            )?,
        };

        check_compact("instructions", instructions.len())?;
        for ix in instructions {
            check_compact("instruction accounts", ix.keys.len())?;
            check_compact("instruction data bytes", ix.data.len())?;
        }

        let account_keys: Vec<Pubkey> = metas.iter().map(|meta| meta.pubkey).collect();
        let index_of = |key: &Pubkey| -> u8 {
            // Every key was merged above and the total fits in a u8 index.
            account_keys.iter().position(|k| k == key).unwrap_or_default() as u8
        };
        let compiled = instructions
            .iter()
            .map(|ix| CompiledInstruction {
                program_id_index: index_of(&ix.program_id),
                accounts: ix.keys.iter().map(|meta| index_of(&meta.pubkey)).collect(),
                data: ix.data.clone(),
            })
            .collect();

        Ok(Self {
            header,
            account_keys,
            recent_checkpoint,
            instructions: compiled,
        })
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    pub fn signer_keys(&self) -> &[Pubkey] {
        let required = usize::from(self.header.num_required_signatures).min(self.account_keys.len());
        &self.account_keys[..required]
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let required = usize::from(self.header.num_required_signatures);
        if index < required {
            index < required.saturating_sub(usize::from(self.header.num_readonly_signed_accounts))
        } else {
            let unsigned = self.account_keys.len().saturating_sub(required);
            index - required
                < unsigned.saturating_sub(usize::from(self.header.num_readonly_unsigned_accounts))
        }
    }

    /// Rebuilds instruction records from the compiled form.
    pub fn decompile(&self) -> Result<Vec<Instruction>, TransactionError> {
        let key_at = |index: u8| -> Result<Pubkey, TransactionError> {
            self.account_keys
                .get(usize::from(index))
                .copied()
                .ok_or_else(|| {
                    TransactionError::Malformed(format!("account index {index} out of range"))
                })
        };
        self.instructions
            .iter()
            .map(|ix| {
                let keys = ix
                    .accounts
                    .iter()
                    .map(|&index| {
                        Ok(AccountMeta {
                            pubkey: key_at(index)?,
                            is_signer: self.is_signer(usize::from(index)),
                            is_writable: self.is_writable(usize::from(index)),
                        })
                    })
                    .collect::<Result<Vec<_>, TransactionError>>()?;
                Ok(Instruction {
                    program_id: key_at(ix.program_id_index)?,
                    keys,
                    data: ix.data.clone(),
                })
            })
            .collect()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut enc = Vec::new();
        put_u8(&mut enc, self.header.num_required_signatures);
        put_u8(&mut enc, self.header.num_readonly_signed_accounts);
        put_u8(&mut enc, self.header.num_readonly_unsigned_accounts);
        put_compact_len(&mut enc, self.account_keys.len());
        for key in &self.account_keys {
            enc.extend_from_slice(key.as_bytes());
        }
        enc.extend_from_slice(self.recent_checkpoint.as_bytes());
        put_compact_len(&mut enc, self.instructions.len());
        for ix in &self.instructions {
            put_u8(&mut enc, ix.program_id_index);
            put_bytes(&mut enc, &ix.accounts);
            put_bytes(&mut enc, &ix.data);
        }
        enc
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = Reader::new(bytes);
        let message = Self::read_from(&mut reader)?;
        reader.finish()?;
        Ok(message)
    }

    pub(crate) fn read_from(reader: &mut Reader<'_>) -> Result<Self, TransactionError> {
        let header = MessageHeader {
            num_required_signatures: reader.u8()?,
            num_readonly_signed_accounts: reader.u8()?,
            num_readonly_unsigned_accounts: reader.u8()?,
        };
        let key_count = reader.compact_len()?;
        let mut account_keys = Vec::with_capacity(key_count.min(MAX_ACCOUNT_KEYS));
        for _ in 0..key_count {
            account_keys.push(Pubkey::new(reader.array::<32>()?));
        }
        if usize::from(header.num_required_signatures) > account_keys.len() {
            return Err(TransactionError::Malformed(
                "more required signatures than account keys".to_string(),
            ));
        }
        if header.num_readonly_signed_accounts > header.num_required_signatures {
            return Err(TransactionError::Malformed(
                "more readonly signers than required signatures".to_string(),
            ));
        }
        let unsigned = account_keys.len() - usize::from(header.num_required_signatures);
        if usize::from(header.num_readonly_unsigned_accounts) > unsigned {
            return Err(TransactionError::Malformed(
                "more readonly accounts than unsigned keys".to_string(),
            ));
        }
        let recent_checkpoint = Hash::new(reader.array::<32>()?);
        let ix_count = reader.compact_len()?;
        let mut instructions = Vec::new();
        for _ in 0..ix_count {
            let program_id_index = reader.u8()?;
            let accounts = reader.bytes()?.to_vec();
            let data = reader.bytes()?.to_vec();
            instructions.push(CompiledInstruction {
                program_id_index,
                accounts,
                data,
            });
        }
        Ok(Self {
            header,
            account_keys,
            recent_checkpoint,
            instructions,
        })
    }
}

fn to_u8(kind: &'static str, count: usize) -> Result<u8, TransactionError> {
    u8::try_from(count).map_err(|_| TransactionError::TooMany {
        kind,
        count,
        max: u8::MAX as usize,
    })
}

fn check_compact(kind: &'static str, count: usize) -> Result<(), TransactionError> {
    if count > MAX_COMPACT_U16 {
        return Err(TransactionError::TooMany {
            kind,
            count,
            max: MAX_COMPACT_U16,
        });
    }
    Ok(())
}

pub(crate) fn put_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub(crate) fn put_compact_len(out: &mut Vec<u8>, len: usize) {
    debug_assert!(len <= MAX_COMPACT_U16, "compact-u16 length {len} out of range");
    let mut rem = len;
    loop {
        let mut elem = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(elem);
            break;
        }
        elem |= 0x80;
        out.push(elem);
    }
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_compact_len(out, bytes.len());
    out.extend_from_slice(bytes);
}

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn u8(&mut self) -> Result<u8, TransactionError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], TransactionError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn compact_len(&mut self) -> Result<usize, TransactionError> {
        let mut len = 0usize;
        for shift in [0u32, 7, 14] {
            let byte = self.u8()?;
            len |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                if len > MAX_COMPACT_U16 {
                    break;
                }
                return Ok(len);
            }
        }
        Err(TransactionError::Malformed("invalid compact-u16 length".to_string()))
    }

    fn bytes(&mut self) -> Result<&'a [u8], TransactionError> {
        let len = self.compact_len()?;
        self.take(len)
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        rest
    }

    pub(crate) fn finish(&self) -> Result<(), TransactionError> {
        if self.pos != self.bytes.len() {
            return Err(TransactionError::Malformed(format!(
                "{} trailing bytes",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], TransactionError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| TransactionError::Malformed("unexpected end of input".to_string()))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }
}
