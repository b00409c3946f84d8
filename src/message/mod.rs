// Message module - WHAT GETS RELAYED
// Signed chain messages, their derived keys and their gossip encoding

mod codec;
mod signer;
mod types;

pub use codec::{CodecError, MessageCodec};
pub use signer::{Keypair, PublicKey, Signature, SignatureError};
pub use types::{Address, ContentKey, Message, MessageError, SignedMessage, TokenAmount};
