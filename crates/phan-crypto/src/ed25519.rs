use std::fmt;

use ed25519_dalek::{
    Signature as DalekSignature, Signer as DalekSigner, SigningKey, Verifier as DalekVerifier,
    VerifyingKey,
};
use phan_types::{CryptoError, Pubkey, Signature, TxSigner};
use rand::rngs::OsRng;

pub const SECRET_KEY_LEN: usize = 64;

/// Ed25519 key pair; the secret key is the 32-byte seed followed by the public key.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Parses 64 bytes of secret key material and checks the embedded public key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes = secret_key_array(bytes)?;
        let signing_key = SigningKey::from_keypair_bytes(&bytes)
            .map_err(|err| CryptoError::InvalidKeypair(err.to_string()))?;
        Ok(Self { signing_key })
    }

    pub fn from_base58_string(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|err| CryptoError::InvalidKeypair(format!("invalid base58: {err}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_base58_string(&self) -> String {
        bs58::encode(self.secret_key()).into_string()
    }

    pub fn public_key(&self) -> Pubkey {
        Pubkey::new(self.signing_key.verifying_key().to_bytes())
    }

    pub fn secret_key(&self) -> [u8; SECRET_KEY_LEN] {
        self.signing_key.to_keypair_bytes()
    }

    pub fn to_signer(&self) -> Signer {
        Signer {
            public_key: self.public_key(),
            secret_key: self.secret_key(),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key())
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        self.secret_key() == other.secret_key()
    }
}

impl Eq for Keypair {}

impl TxSigner for Keypair {
    fn pubkey(&self) -> Pubkey {
        self.public_key()
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        Ok(Signature::new(self.signing_key.sign(message).to_bytes()))
    }
}

/// Plain-bytes view of a [`Keypair`] handed to transactions at signing time.
#[derive(Clone, PartialEq, Eq)]
pub struct Signer {
    public_key: Pubkey,
    secret_key: [u8; SECRET_KEY_LEN],
}

impl Signer {
    pub fn public_key(&self) -> Pubkey {
        self.public_key
    }

    pub fn secret_key(&self) -> &[u8; SECRET_KEY_LEN] {
        &self.secret_key
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("public_key", &self.public_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

impl TxSigner for Signer {
    fn pubkey(&self) -> Pubkey {
        self.public_key
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        sign_detached(&self.secret_key, message)
    }
}

/// Detached signature over `message` using 64 bytes of secret key material.
pub fn sign_detached(secret_key: &[u8], message: &[u8]) -> Result<Signature, CryptoError> {
    let bytes = secret_key_array(secret_key)?;
    let signing_key = SigningKey::from_keypair_bytes(&bytes)
        .map_err(|err| CryptoError::InvalidKeypair(err.to_string()))?;
    Ok(Signature::new(signing_key.sign(message).to_bytes()))
}

pub fn verify_detached(
    public_key: &Pubkey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), CryptoError> {
    let verify_key =
        VerifyingKey::from_bytes(public_key.as_bytes()).map_err(|_| CryptoError::InvalidPublicKey)?;
    let signature = DalekSignature::from_bytes(signature.as_bytes());
    verify_key
        .verify(message, &signature)
        .map_err(|_| CryptoError::InvalidSignature)
}

fn secret_key_array(bytes: &[u8]) -> Result<[u8; SECRET_KEY_LEN], CryptoError> {
    bytes.try_into().map_err(|_| CryptoError::InvalidLength {
        kind: "secret key",
        expected: SECRET_KEY_LEN,
        actual: bytes.len(),
    })
}
