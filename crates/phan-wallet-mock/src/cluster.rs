//! Well-known cluster endpoints.

use std::{fmt, str::FromStr};

use phan_types::ValidationError;

pub const LOCALNET: &str = "http://127.0.0.1:8899";
pub const DEVNET: &str = "https://api.devnet.solana.com";
pub const TESTNET: &str = "https://api.testnet.solana.com";
pub const MAINNET_BETA: &str = "https://api.mainnet-beta.solana.com";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Cluster {
    #[default]
    Localnet,
    Devnet,
    Testnet,
    MainnetBeta,
}

impl Cluster {
    pub const fn url(&self) -> &'static str {
        match self {
            Self::Localnet => LOCALNET,
            Self::Devnet => DEVNET,
            Self::Testnet => TESTNET,
            Self::MainnetBeta => MAINNET_BETA,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Localnet => "localnet",
            Self::Devnet => "devnet",
            Self::Testnet => "testnet",
            Self::MainnetBeta => "mainnet-beta",
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Cluster {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "localnet" | "localhost" => Ok(Self::Localnet),
            "devnet" => Ok(Self::Devnet),
            "testnet" => Ok(Self::Testnet),
            "mainnet-beta" | "mainnet" => Ok(Self::MainnetBeta),
            other => Err(ValidationError::Message(format!("unknown cluster `{other}`"))),
        }
    }
}
