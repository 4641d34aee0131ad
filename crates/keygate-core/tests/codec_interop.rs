#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Interop tests for the AES-GCM layout: payloads assembled from a back-end
//! that reports ciphertext and tag separately must open with the software
//! codec, and the other way round.

use keygate_core::gcm::{check_open_input, join_tag, open, seal, split_tag, IV_LEN, TAG_LEN};
use keygate_core::CryptoError;
use ring::aead;

const KEY: [u8; 32] = [0xDD; 32];

/// Encrypt the way a back-end with a detached-tag API does.
fn detached_encrypt(plaintext: &[u8], iv: [u8; IV_LEN]) -> (Vec<u8>, Vec<u8>) {
    let key = aead::LessSafeKey::new(aead::UnboundKey::new(&aead::AES_256_GCM, &KEY).unwrap());
    let mut ciphertext = plaintext.to_vec();
    let tag = key
        .seal_in_place_separate_tag(
            aead::Nonce::assume_unique_for_key(iv),
            aead::Aad::empty(),
            &mut ciphertext,
        )
        .unwrap();
    (ciphertext, tag.as_ref().to_vec())
}

#[test]
fn detached_tag_backend_output_opens_with_codec() {
    let iv = [9u8; IV_LEN];
    let (ciphertext, tag) = detached_encrypt(b"cross back-end payload", iv);
    let payload = join_tag(&ciphertext, &tag).unwrap();
    let opened = open(&KEY, Some(&iv), &payload).unwrap();
    assert_eq!(opened.expose(), b"cross back-end payload");
}

#[test]
fn codec_output_splits_for_detached_tag_backend() {
    let sealed = seal(&KEY, b"the other direction").unwrap();
    let (ciphertext, tag) = split_tag(&sealed.payload).unwrap();
    assert_eq!(ciphertext.len(), b"the other direction".len());
    assert_eq!(tag.len(), TAG_LEN);

    let (expected_ct, expected_tag) = detached_encrypt(b"the other direction", sealed.iv);
    assert_eq!(ciphertext, expected_ct.as_slice());
    assert_eq!(tag, expected_tag.as_slice());
}

#[test]
fn roundtrip_64kb_payload() {
    let plaintext = vec![0x55u8; 65_536];
    let sealed = seal(&KEY, &plaintext).unwrap();
    let json = serde_json::to_string(&sealed).unwrap();
    let restored: keygate_core::Sealed = serde_json::from_str(&json).unwrap();
    let opened = open(&KEY, Some(&restored.iv), &restored.payload).unwrap();
    assert_eq!(opened.expose(), plaintext.as_slice());
}

#[test]
fn framing_errors_name_the_problem() {
    match check_open_input(None, 64) {
        Err(CryptoError::Framing(message)) => {
            assert_eq!(message, "IV is required for AES-GCM decryption.");
        }
        other => panic!("unexpected {other:?}"),
    }
    match check_open_input(Some(&[1u8; IV_LEN]), TAG_LEN - 1) {
        Err(CryptoError::Framing(message)) => {
            assert_eq!(message, "Input data is too short for AES-GCM decryption.");
        }
        other => panic!("unexpected {other:?}"),
    }
}
