// Message Tests
// Signing, verification, addresses and content keys

use chainrelay::message::{
    Address, ContentKey, Keypair, Message, MessageError, SignedMessage, TokenAmount,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn address_of(kp: &Keypair) -> Address {
    Address::from_public_key(&kp.public_key())
}

fn transfer(kp: &Keypair, nonce: u64, value: u128) -> SignedMessage {
    let to = address_of(&Keypair::generate());
    let message = Message::new(address_of(kp), to, nonce).with_value(TokenAmount::from_atto(value));
    SignedMessage::sign(message, kp).unwrap()
}

// ============================================================================
// ADDRESSES
// ============================================================================

#[test]
fn test_address_is_stable_for_key() {
    let kp = Keypair::generate();
    assert_eq!(address_of(&kp), address_of(&kp));
    assert_ne!(address_of(&kp), address_of(&Keypair::generate()));
}

#[test]
fn test_address_parse_roundtrip() {
    let addr = address_of(&Keypair::generate());
    let parsed: Address = addr.to_string().parse().unwrap();
    assert_eq!(parsed, addr);
}

#[test]
fn test_address_parse_rejects_garbage() {
    assert!(Address::parse("").is_err());
    assert!(Address::parse("f1").is_err());
    assert!(Address::parse("x1abc").is_err());
    assert!(Address::parse("f10OIl").is_err());
}

// ============================================================================
// SIGNING
// ============================================================================

#[test]
fn test_signed_message_verifies() {
    let kp = Keypair::generate();
    let signed = transfer(&kp, 0, 10);

    assert!(signed.verify().is_ok());
    assert_eq!(signed.sender(), address_of(&kp));
}

#[test]
fn test_sign_with_foreign_key_rejected() {
    let owner = Keypair::generate();
    let other = Keypair::generate();
    let message = Message::new(address_of(&owner), address_of(&other), 1);

    let result = SignedMessage::sign(message, &other);
    assert_eq!(result, Err(MessageError::SenderMismatch(address_of(&owner))));
}

#[test]
fn test_tampered_message_fails_verification() {
    let kp = Keypair::generate();
    let signed = transfer(&kp, 3, 100);

    let mut altered = signed.message().clone();
    altered.value = TokenAmount::from_atto(1_000_000);
    let tampered =
        SignedMessage::from_parts(altered, signed.signer().clone(), signed.signature().clone());

    assert_eq!(tampered.verify(), Err(MessageError::BadSignature));
}

#[test]
fn test_swapped_signer_fails_verification() {
    let kp = Keypair::generate();
    let signed = transfer(&kp, 0, 1);
    let impostor = Keypair::generate().public_key();

    let forged =
        SignedMessage::from_parts(signed.message().clone(), impostor, signed.signature().clone());
    assert!(matches!(forged.verify(), Err(MessageError::SenderMismatch(_))));
}

// ============================================================================
// CONTENT KEYS
// ============================================================================

#[test]
fn test_content_key_deterministic() {
    let kp = Keypair::generate();
    let signed = transfer(&kp, 5, 7);
    assert_eq!(signed.content_key(), signed.clone().content_key());
}

#[test]
fn test_content_key_differs_by_nonce() {
    let kp = Keypair::generate();
    assert_ne!(transfer(&kp, 1, 7).content_key(), transfer(&kp, 2, 7).content_key());
}

#[test]
fn test_content_key_hex_roundtrip() {
    let key = transfer(&Keypair::generate(), 0, 0).content_key();
    let text = key.to_string();

    assert_eq!(text.len(), 64);
    assert_eq!(text.parse::<ContentKey>().unwrap(), key);
    assert!("zz".parse::<ContentKey>().is_err());
}
