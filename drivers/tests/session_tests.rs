// Licensed under the Apache-2.0 license

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use num_bigint::BigUint;
use se_drivers::{
    AesKey, Direction, EngineId, Endian, ErrorKind, GcmTag, RsaExponent, RsaKey, RsaKeyLoad,
    SeError, SecurityEngine, Session, SessionKey, SessionKind, ShaAlg,
};
use se_hw_model::ModelHal;
use sha2::{Digest, Sha384};

const MODULUS: &str = concat!(
    "e417dc402766423743b7ec0b8409203abb2b8f9dd3213d8e3792d33f51b5cb5c",
    "6567114906aea203235afa4b9added1cb3070c8bbe29133a96a3494a9b1504ff",
);
const PRIVATE_EXPONENT: &str = concat!(
    "839c3ceb0b90d68e3ad5ca2e8ede1129b24c1d4f2cbed65cd436350c2922a396",
    "b2cad18e176ebbfdafe331117c0f9c3db5141f4ab70a2185fa90d8f369680e59",
);
const PUBLIC_EXPONENT: [u8; 4] = [0x00, 0x01, 0x00, 0x01];

fn hex64(s: &str) -> Vec<u8> {
    let bytes = BigUint::parse_bytes(s.as_bytes(), 16).unwrap().to_bytes_be();
    let mut out = vec![0u8; 64 - bytes.len()];
    out.extend_from_slice(&bytes);
    out
}

#[test]
fn test_digest_session() {
    let mut se = SecurityEngine::new(ModelHal::default());
    let mut session = Session::default();
    assert_eq!(session.kind(), SessionKind::Empty);

    session.init_digest(&mut se, ShaAlg::Sha384);
    assert_eq!(session.kind(), SessionKind::Digest);
    let message = [0x6Bu8; 300];
    let mut output = [0u8; 64];
    assert_eq!(session.update(&mut se, &message[..200], &mut output), Ok(0));
    assert_eq!(
        session.finalize(&mut se, &message[200..], &mut output, None),
        Ok(48)
    );
    assert_eq!(output[..48], Sha384::digest(message)[..]);
    assert_eq!(session.kind(), SessionKind::Empty);

    session.init_digest(&mut se, ShaAlg::Sha256);
    assert_eq!(
        session.set_key(SessionKey::Aes(AesKey::from(&[0u8; 16]))),
        Err(SeError::DRIVER_SESSION_OPERATION_NOT_SUPPORTED)
    );
    assert_eq!(
        session.update_aad(&mut se, b"aad"),
        Err(SeError::DRIVER_SESSION_OPERATION_NOT_SUPPORTED)
    );
    let mut tag = [0u8; 16];
    assert_eq!(
        session.finalize(&mut se, &[], &mut output, Some(GcmTag::Export(&mut tag))),
        Err(SeError::DRIVER_SESSION_TAG_NOT_APPLICABLE)
    );
    // A rejected finalize leaves the session in place
    assert_eq!(session.kind(), SessionKind::Digest);
}

#[test]
fn test_empty_session() {
    let mut se = SecurityEngine::new(ModelHal::default());
    let mut session = Session::<ModelHal>::default();
    let mut output = [0u8; 16];
    assert_eq!(
        session.set_key(SessionKey::Aes(AesKey::from(&[0u8; 16]))),
        Err(SeError::DRIVER_SESSION_EMPTY)
    );
    assert_eq!(
        session.update_aad(&mut se, b"aad"),
        Err(SeError::DRIVER_SESSION_EMPTY)
    );
    assert_eq!(
        session.update(&mut se, b"data", &mut output),
        Err(SeError::DRIVER_SESSION_EMPTY)
    );
    let err = session
        .finalize(&mut se, &[], &mut output, None)
        .unwrap_err();
    assert_eq!(err, SeError::DRIVER_SESSION_EMPTY);
    assert!(err.is(ErrorKind::BadState));
}

#[test]
fn test_gcm_session() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let key = [0x0Fu8; 32];
    let nonce = [0x3Cu8; 12];
    let plaintext = [0x81u8; 45];
    let mut expected = plaintext.to_vec();
    let expected_tag = Aes256Gcm::new_from_slice(&key)
        .unwrap()
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"session", &mut expected)
        .unwrap();

    let mut session = Session::default();
    session.init_gcm(&mut se, Direction::Encrypt, &nonce, 16).unwrap();
    assert_eq!(session.kind(), SessionKind::Gcm);
    session.set_key(SessionKey::Aes(AesKey::from(&key))).unwrap();
    session.update_aad(&mut se, b"session").unwrap();
    let mut ciphertext = [0u8; 45];
    let written = session
        .update(&mut se, &plaintext[..40], &mut ciphertext)
        .unwrap();
    assert_eq!(written, 32);

    let mut output = [0u8; 45];
    assert_eq!(
        session.finalize(&mut se, &plaintext[40..], &mut output, None),
        Err(SeError::DRIVER_SESSION_TAG_REQUIRED)
    );
    let mut tag = [0u8; 16];
    assert_eq!(
        session.finalize(
            &mut se,
            &plaintext[40..],
            &mut ciphertext[written..],
            Some(GcmTag::Export(&mut tag))
        ),
        Ok(13)
    );
    assert_eq!(ciphertext.to_vec(), expected);
    assert_eq!(tag[..], expected_tag[..]);
    assert_eq!(session.kind(), SessionKind::Empty);

    // Decrypt, with the tag verified
    session.init_gcm(&mut se, Direction::Decrypt, &nonce, 16).unwrap();
    session.set_key(SessionKey::Aes(AesKey::from(&key))).unwrap();
    session.update_aad(&mut se, b"session").unwrap();
    assert_eq!(
        session.finalize(&mut se, &ciphertext, &mut output, Some(GcmTag::Verify(&tag))),
        Ok(45)
    );
    assert_eq!(output, plaintext);
    assert!(hal.aes_key_regs_clear());
}

#[test]
fn test_failed_finalize_empties_session() {
    let mut se = SecurityEngine::new(ModelHal::default());
    let key = [0x0Fu8; 16];
    let mut session = Session::default();
    session.init_gcm(&mut se, Direction::Decrypt, &[], 16).unwrap();
    session.set_key(SessionKey::Aes(AesKey::from(&key))).unwrap();
    let mut output = [0u8; 16];
    assert_eq!(
        session.finalize(&mut se, &[0u8; 16], &mut output, Some(GcmTag::Verify(&[0u8; 16]))),
        Err(SeError::DRIVER_GCM_TAG_MISMATCH)
    );
    assert_eq!(session.kind(), SessionKind::Empty);
}

#[test]
fn test_ccm_session() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let key = [0x40u8; 16];
    let nonce = [0x10u8; 12];
    let plaintext = [0x22u8; 30];

    let mut session = Session::default();
    session
        .init_ccm(&mut se, Direction::Encrypt, &nonce, 10, 5, plaintext.len())
        .unwrap();
    assert_eq!(session.kind(), SessionKind::Ccm);
    session.set_key(SessionKey::Aes(AesKey::from(&key))).unwrap();
    session.update_aad(&mut se, b"hello").unwrap();
    let mut ciphertext = [0u8; 40];
    assert_eq!(
        session.update(&mut se, &plaintext, &mut ciphertext),
        Err(SeError::DRIVER_CCM_UPDATE_NOT_ALLOWED)
    );
    let mut tag = [0u8; 16];
    assert_eq!(
        session.finalize(&mut se, &plaintext, &mut ciphertext, Some(GcmTag::Export(&mut tag))),
        Err(SeError::DRIVER_SESSION_TAG_NOT_APPLICABLE)
    );
    assert_eq!(
        session.finalize(&mut se, &plaintext, &mut ciphertext, None),
        Ok(40)
    );
    assert_eq!(hal.scratch_in_use(), 0);

    session
        .init_ccm(&mut se, Direction::Decrypt, &nonce, 10, 5, plaintext.len())
        .unwrap();
    session.set_key(SessionKey::Aes(AesKey::from(&key))).unwrap();
    session.update_aad(&mut se, b"hello").unwrap();
    let mut output = [0u8; 30];
    assert_eq!(
        session.finalize(&mut se, &ciphertext, &mut output, None),
        Ok(30)
    );
    assert_eq!(output, plaintext);
    assert_eq!(hal.scratch_in_use(), 0);
}

#[test]
fn test_ccm_session_released() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let nonce = [0x10u8; 12];
    let mut session = Session::default();

    // Reset
    session
        .init_ccm(&mut se, Direction::Encrypt, &nonce, 8, 0, 64)
        .unwrap();
    assert!(hal.scratch_in_use() > 0);
    session.reset(&mut se);
    assert_eq!(session.kind(), SessionKind::Empty);
    assert_eq!(hal.scratch_in_use(), 0);

    // Re-initialization
    session
        .init_ccm(&mut se, Direction::Encrypt, &nonce, 8, 0, 64)
        .unwrap();
    let in_use = hal.scratch_in_use();
    session
        .init_ccm(&mut se, Direction::Encrypt, &nonce, 8, 0, 64)
        .unwrap();
    assert_eq!(hal.scratch_in_use(), in_use);

    // Finalize rejected by the session
    let mut output = [0u8; 72];
    assert_eq!(
        session.finalize(&mut se, &[0u8; 64], &mut output, None),
        Err(SeError::DRIVER_CCM_KEY_NOT_SET)
    );
    assert_eq!(session.kind(), SessionKind::Empty);
    assert_eq!(hal.scratch_in_use(), 0);
}

#[test]
fn test_rsa_session() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let modulus = hex64(MODULUS);
    let private_exponent = hex64(PRIVATE_EXPONENT);
    let key = RsaKey {
        modulus: &modulus,
        public_exponent: &PUBLIC_EXPONENT,
        private_exponent: Some(&private_exponent),
        endian: Endian::Big,
    };
    let message = [0x05u8; 64];

    let mut session = Session::default();
    session.init_rsa(&mut se, 512, RsaKeyLoad::Direct).unwrap();
    assert_eq!(session.kind(), SessionKind::Rsa);
    assert_eq!(
        session.set_key(SessionKey::Aes(AesKey::from(&[0u8; 16]))),
        Err(SeError::DRIVER_SESSION_ALGORITHM_MISMATCH)
    );
    session
        .set_key(SessionKey::Rsa(&key, RsaExponent::Public))
        .unwrap();
    let mut output = [0u8; 64];
    assert_eq!(
        session.update(&mut se, &message, &mut output),
        Err(SeError::DRIVER_SESSION_OPERATION_NOT_SUPPORTED)
    );
    assert_eq!(
        session.update_aad(&mut se, b"aad"),
        Err(SeError::DRIVER_SESSION_OPERATION_NOT_SUPPORTED)
    );
    assert_eq!(session.finalize(&mut se, &message, &mut output, None), Ok(64));
    let expected = BigUint::from_bytes_be(&message).modpow(
        &BigUint::from(65537u32),
        &BigUint::from_bytes_be(&modulus),
    );
    assert_eq!(BigUint::from_bytes_be(&output), expected);
    assert_eq!(session.kind(), SessionKind::Empty);

    // Back to the message with the private exponent
    session.init_rsa(&mut se, 512, RsaKeyLoad::Direct).unwrap();
    session
        .set_key(SessionKey::Rsa(&key, RsaExponent::Private))
        .unwrap();
    let signature = output;
    assert_eq!(session.finalize(&mut se, &signature, &mut output, None), Ok(64));
    assert_eq!(output, message);
    assert!(!hal.mutex_held(EngineId::Pka));
}

#[test]
fn test_session_algorithm_mismatch() {
    let mut se = SecurityEngine::new(ModelHal::default());
    let modulus = hex64(MODULUS);
    let key = RsaKey {
        modulus: &modulus,
        public_exponent: &PUBLIC_EXPONENT,
        private_exponent: None,
        endian: Endian::Big,
    };
    let mut session = Session::default();
    session.init_gcm(&mut se, Direction::Encrypt, &[], 16).unwrap();
    let err = session
        .set_key(SessionKey::Rsa(&key, RsaExponent::Public))
        .unwrap_err();
    assert_eq!(err, SeError::DRIVER_SESSION_ALGORITHM_MISMATCH);
    assert!(err.is(ErrorKind::BadState));

    session
        .init_ccm(&mut se, Direction::Encrypt, &[0u8; 12], 8, 0, 16)
        .unwrap();
    assert_eq!(
        session.set_key(SessionKey::Rsa(&key, RsaExponent::Public)),
        Err(SeError::DRIVER_SESSION_ALGORITHM_MISMATCH)
    );
    session.reset(&mut se);
}

#[test]
fn test_init_releases_ccm_work_buffer() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let nonce = [0x10u8; 12];
    let mut session = Session::default();

    session
        .init_ccm(&mut se, Direction::Encrypt, &nonce, 8, 0, 64)
        .unwrap();
    assert!(hal.scratch_in_use() > 0);
    session.init_digest(&mut se, ShaAlg::Sha256);
    assert_eq!(session.kind(), SessionKind::Digest);
    assert_eq!(hal.scratch_in_use(), 0);
    assert_eq!(hal.scratch_returns(), 1);

    session
        .init_ccm(&mut se, Direction::Encrypt, &nonce, 8, 0, 64)
        .unwrap();
    session.init_gcm(&mut se, Direction::Encrypt, &[], 16).unwrap();
    assert_eq!(hal.scratch_in_use(), 0);
    assert_eq!(hal.scratch_returns(), 2);

    session
        .init_ccm(&mut se, Direction::Encrypt, &nonce, 8, 0, 64)
        .unwrap();
    session.init_rsa(&mut se, 512, RsaKeyLoad::Direct).unwrap();
    assert_eq!(session.kind(), SessionKind::Rsa);
    assert_eq!(hal.scratch_in_use(), 0);
    assert_eq!(hal.scratch_returns(), 3);

    // A rejected init still leaves the session empty and released
    session
        .init_ccm(&mut se, Direction::Encrypt, &nonce, 8, 0, 64)
        .unwrap();
    assert_eq!(
        session.init_rsa(&mut se, 1000, RsaKeyLoad::Direct),
        Err(SeError::DRIVER_RSA_INVALID_KEY_SIZE)
    );
    assert_eq!(session.kind(), SessionKind::Empty);
    assert_eq!(hal.scratch_in_use(), 0);
    assert_eq!(hal.scratch_returns(), 4);
}
