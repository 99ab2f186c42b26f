use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Smallest unit of the native token.
pub type Lamports = u64;

pub const LAMPORTS_PER_SOL: Lamports = 1_000_000_000;

macro_rules! impl_base58_bytes_id {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
                if bytes.len() != Self::LEN {
                    return Err(ValidationError::InvalidLength {
                        kind: stringify!($name),
                        expected: Self::LEN,
                        actual: bytes.len(),
                    });
                }
                let mut out = [0u8; Self::LEN];
                out.copy_from_slice(bytes);
                Ok(Self(out))
            }

            pub fn from_base58(encoded: &str) -> Result<Self, ValidationError> {
                let bytes = bs58::decode(encoded)
                    .into_vec()
                    .map_err(|err| ValidationError::InvalidBase58(err.to_string()))?;
                Self::from_slice(&bytes)
            }

            pub fn to_base58(&self) -> String {
                bs58::encode(self.0).into_string()
            }

            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub const fn into_inner(self) -> [u8; $len] {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; Self::LEN])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_base58())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_base58(s)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(value: [u8; $len]) -> Self {
                Self::new(value)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = ValidationError;

            fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
                Self::from_slice(value)
            }
        }

        // Base58 strings on the wire, matching the JSON-RPC representation.
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_base58())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let encoded = String::deserialize(deserializer)?;
                Self::from_base58(&encoded).map_err(de::Error::custom)
            }
        }
    };
}

impl_base58_bytes_id!(Pubkey, 32);
impl_base58_bytes_id!(Hash, 32);
impl_base58_bytes_id!(Signature, 64);
