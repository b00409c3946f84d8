// Message types - accounts, amounts and signed messages
//
// A SignedMessage has two derived keys used by the pool:
// - content key: SHA-256 over the canonical bytes of the whole signed message
// - sender key: the `from` address of the unsigned message

use crate::message::signer::{Keypair, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const ADDRESS_PREFIX: &str = "f1";
const ADDRESS_LENGTH: usize = 20;
const SIGNING_DOMAIN: &[u8] = b"chainrelay-message-v1:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid content key: {0}")]
    InvalidContentKey(String),

    #[error("Signer does not own sender address {0}")]
    SenderMismatch(Address),

    #[error("Signature verification failed")]
    BadSignature,
}

// ============================================================================
// ADDRESS
// ============================================================================

/// Account address: first 20 bytes of SHA-256 over the account's public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let digest = Sha256::digest(public_key.as_bytes());
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Parse the `f1<base58>` text form
    pub fn parse(s: &str) -> Result<Self, MessageError> {
        let body = s.strip_prefix(ADDRESS_PREFIX).ok_or_else(|| {
            MessageError::InvalidAddress(format!("missing '{}' prefix", ADDRESS_PREFIX))
        })?;
        let decoded = bs58::decode(body)
            .into_vec()
            .map_err(|e| MessageError::InvalidAddress(e.to_string()))?;
        let bytes: [u8; ADDRESS_LENGTH] = decoded.as_slice().try_into().map_err(|_| {
            MessageError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_LENGTH,
                decoded.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ADDRESS_PREFIX, bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// TOKEN AMOUNT
// ============================================================================

/// Non-negative token amount in the smallest unit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(0);

    pub fn from_atto(atto: u128) -> Self {
        Self(atto)
    }

    pub fn atto(&self) -> u128 {
        self.0
    }

    pub fn saturating_add(self, other: TokenAmount) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CONTENT KEY
// ============================================================================

/// Content-derived identifier of a signed message
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey({})", hex::encode(&self.0[..8]))
    }
}

impl FromStr for ContentKey {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = hex::decode(s).map_err(|e| MessageError::InvalidContentKey(e.to_string()))?;
        let bytes: [u8; 32] = decoded.as_slice().try_into().map_err(|_| {
            MessageError::InvalidContentKey(format!("expected 32 bytes, got {}", decoded.len()))
        })?;
        Ok(Self(bytes))
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

/// Unsigned chain message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
    pub value: TokenAmount,
    pub gas_limit: u64,
    pub gas_fee_cap: TokenAmount,
    pub gas_premium: TokenAmount,
    pub method: u64,
    pub params: Vec<u8>,
}

impl Message {
    /// Plain value transfer with zeroed gas fields
    pub fn new(from: Address, to: Address, nonce: u64) -> Self {
        Self {
            from,
            to,
            nonce,
            value: TokenAmount::ZERO,
            gas_limit: 0,
            gas_fee_cap: TokenAmount::ZERO,
            gas_premium: TokenAmount::ZERO,
            method: 0,
            params: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: TokenAmount) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas(mut self, limit: u64, fee_cap: TokenAmount, premium: TokenAmount) -> Self {
        self.gas_limit = limit;
        self.gas_fee_cap = fee_cap;
        self.gas_premium = premium;
        self
    }

    pub fn with_method(mut self, method: u64, params: Vec<u8>) -> Self {
        self.method = method;
        self.params = params;
        self
    }

    /// Canonical bytes covered by the signature
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SIGNING_DOMAIN.len() + 128 + self.params.len());
        out.extend_from_slice(SIGNING_DOMAIN);
        out.extend_from_slice(self.from.as_bytes());
        out.extend_from_slice(self.to.as_bytes());
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(&self.value.atto().to_be_bytes());
        out.extend_from_slice(&self.gas_limit.to_be_bytes());
        out.extend_from_slice(&self.gas_fee_cap.atto().to_be_bytes());
        out.extend_from_slice(&self.gas_premium.atto().to_be_bytes());
        out.extend_from_slice(&self.method.to_be_bytes());
        out.extend_from_slice(&(self.params.len() as u64).to_be_bytes());
        out.extend_from_slice(&self.params);
        out
    }
}

// ============================================================================
// SIGNED MESSAGE
// ============================================================================

/// A message together with its signer's key and signature
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    message: Message,
    signer: PublicKey,
    signature: Signature,
}

impl SignedMessage {
    /// Sign `message` with the key owning `message.from`
    pub fn sign(message: Message, keypair: &Keypair) -> Result<Self, MessageError> {
        let signer = keypair.public_key();
        if Address::from_public_key(&signer) != message.from {
            return Err(MessageError::SenderMismatch(message.from));
        }
        let signature = keypair.sign(&message.signing_bytes());
        Ok(Self {
            message,
            signer,
            signature,
        })
    }

    /// Assemble from parts without checking the signature
    pub fn from_parts(message: Message, signer: PublicKey, signature: Signature) -> Self {
        Self {
            message,
            signer,
            signature,
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn signer(&self) -> &PublicKey {
        &self.signer
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Sender key used by the pool's sender index
    pub fn sender(&self) -> Address {
        self.message.from
    }

    /// Content key used by the pool's content index
    pub fn content_key(&self) -> ContentKey {
        let mut hasher = Sha256::new();
        hasher.update(self.message.signing_bytes());
        hasher.update(self.signer.as_bytes());
        hasher.update(self.signature.to_bytes());
        ContentKey(hasher.finalize().into())
    }

    /// Check that the signer owns `from` and signed these exact bytes
    pub fn verify(&self) -> Result<(), MessageError> {
        if Address::from_public_key(&self.signer) != self.message.from {
            return Err(MessageError::SenderMismatch(self.message.from));
        }
        if !self.signer.verify(&self.message.signing_bytes(), &self.signature) {
            return Err(MessageError::BadSignature);
        }
        Ok(())
    }
}
