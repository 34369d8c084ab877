// Licensed under the Apache-2.0 license

use aes_gcm::aead::{generic_array::GenericArray, AeadInPlace, KeyInit};
use aes_gcm::aes::cipher::BlockEncrypt;
use aes_gcm::aes::{Aes128, Aes256};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use se_drivers::{
    ctr, ctr_start, AesKey, CcmSession, Direction, EngineId, ErrorKind, GcmSession, GcmTag,
    SeError, SecurityEngine, AES_BLOCK_SIZE, GCM_DEFAULT_NONCE,
};
use se_hw_model::{ModelConfig, ModelHal};

const CCM_KEY: [u8; 16] = [
    0xc0, 0xc1, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xcb, 0xcc, 0xcd, 0xce, 0xcf,
];
const CCM_NONCE: [u8; 13] = [
    0x00, 0x00, 0x00, 0x03, 0x02, 0x01, 0x00, 0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5,
];
const CCM_AAD: [u8; 8] = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
const CCM_PT: [u8; 23] = [
    0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17,
    0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e,
];
// RFC 3610 packet vector #1
const CCM_CT: [u8; 31] = [
    0x58, 0x8c, 0x97, 0x9a, 0x61, 0xc6, 0x63, 0xd2, 0xf0, 0x66, 0xd0, 0xc2, 0xc0, 0xf9, 0x89, 0x80,
    0x6d, 0x5f, 0x6b, 0x61, 0xda, 0xc3, 0x84, 0x17, 0xe8, 0xd1, 0x2c, 0xfd, 0xf9, 0x26, 0xe0,
];

type Block = [u8; AES_BLOCK_SIZE];

fn random_bytes(rng: &mut StdRng, len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Split `data` at random points.
fn chunks<'a>(rng: &mut StdRng, data: &'a [u8]) -> Vec<&'a [u8]> {
    let mut result = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        let take = rng.gen_range(0..=rest.len().min(40));
        let (chunk, tail) = rest.split_at(take);
        result.push(chunk);
        rest = tail;
    }
    result
}

fn block_cipher(key: &[u8]) -> Box<dyn Fn(&Block) -> Block> {
    fn wrap<C: BlockEncrypt + 'static>(cipher: C) -> Box<dyn Fn(&Block) -> Block> {
        Box::new(move |block| {
            let mut block = GenericArray::clone_from_slice(block);
            cipher.encrypt_block(&mut block);
            let mut out = [0u8; AES_BLOCK_SIZE];
            out.copy_from_slice(&block);
            out
        })
    }
    match key.len() {
        16 => wrap(Aes128::new_from_slice(key).unwrap()),
        32 => wrap(Aes256::new_from_slice(key).unwrap()),
        len => panic!("unexpected key length {len}"),
    }
}

fn reference_gcm(key: &[u8], nonce: &[u8; 12], aad: &[u8], plaintext: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut buffer = plaintext.to_vec();
    let nonce = Nonce::from_slice(nonce);
    let tag = match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .unwrap()
            .encrypt_in_place_detached(nonce, aad, &mut buffer),
        32 => Aes256Gcm::new_from_slice(key)
            .unwrap()
            .encrypt_in_place_detached(nonce, aad, &mut buffer),
        len => panic!("unexpected key length {len}"),
    }
    .unwrap();
    (buffer, tag.to_vec())
}

/// AES-CCM as laid out in RFC 3610, returning `ciphertext || tag`.
fn reference_ccm(key: &[u8], nonce: &[u8], aad: &[u8], plaintext: &[u8], tag_len: usize) -> Vec<u8> {
    let encrypt = block_cipher(key);
    let q = AES_BLOCK_SIZE - 1 - nonce.len();

    let mut mac_input = vec![0u8; AES_BLOCK_SIZE];
    mac_input[0] = (u8::from(!aad.is_empty()) << 6) | (((tag_len - 2) / 2) << 3) as u8 | (q - 1) as u8;
    mac_input[1..1 + nonce.len()].copy_from_slice(nonce);
    let len = (plaintext.len() as u64).to_be_bytes();
    mac_input[1 + nonce.len()..].copy_from_slice(&len[8 - q..]);
    if !aad.is_empty() {
        if aad.len() < 0xFF00 {
            mac_input.extend_from_slice(&(aad.len() as u16).to_be_bytes());
        } else {
            mac_input.extend_from_slice(&[0xFF, 0xFE]);
            mac_input.extend_from_slice(&(aad.len() as u32).to_be_bytes());
        }
        mac_input.extend_from_slice(aad);
        mac_input.resize(mac_input.len().next_multiple_of(AES_BLOCK_SIZE), 0);
    }
    mac_input.extend_from_slice(plaintext);
    mac_input.resize(mac_input.len().next_multiple_of(AES_BLOCK_SIZE), 0);

    let mut mac = [0u8; AES_BLOCK_SIZE];
    for block in mac_input.chunks_exact(AES_BLOCK_SIZE) {
        for (m, b) in mac.iter_mut().zip(block) {
            *m ^= b;
        }
        mac = encrypt(&mac);
    }

    let counter = |i: usize| {
        let mut block = [0u8; AES_BLOCK_SIZE];
        block[0] = (q - 1) as u8;
        block[1..1 + nonce.len()].copy_from_slice(nonce);
        let i = (i as u64).to_be_bytes();
        block[1 + nonce.len()..].copy_from_slice(&i[8 - q..]);
        block
    };
    let mut output: Vec<u8> = plaintext
        .chunks(AES_BLOCK_SIZE)
        .enumerate()
        .flat_map(|(i, chunk)| {
            let keystream = encrypt(&counter(i + 1));
            chunk
                .iter()
                .zip(keystream)
                .map(|(p, k)| p ^ k)
                .collect::<Vec<u8>>()
        })
        .collect();
    let s0 = encrypt(&counter(0));
    output.extend(mac.iter().zip(s0).take(tag_len).map(|(m, s)| m ^ s));
    output
}

fn reference_ctr(key: &[u8], counter: &Block, input: &[u8]) -> Vec<u8> {
    let encrypt = block_cipher(key);
    let mut counter = *counter;
    let mut output = Vec::new();
    for chunk in input.chunks(AES_BLOCK_SIZE) {
        output.extend(chunk.iter().zip(encrypt(&counter)).map(|(d, k)| d ^ k));
        se_drivers::inc32(&mut counter);
    }
    output
}

/// Run a whole GCM operation through the session, feeding additional data
/// and text in random pieces.
#[allow(clippy::too_many_arguments)]
fn run_gcm(
    se: &mut SecurityEngine<ModelHal>,
    rng: &mut StdRng,
    direction: Direction,
    key: AesKey,
    nonce: &[u8],
    aad: &[u8],
    input: &[u8],
    tag: GcmTag,
) -> Result<Vec<u8>, SeError> {
    let mut gcm = GcmSession::new(direction, nonce, 16)?;
    gcm.set_key(key)?;
    for chunk in chunks(rng, aad) {
        gcm.update_aad(se, chunk)?;
    }
    let mut output = vec![0u8; input.len()];
    let mut written = 0;
    let pieces = chunks(rng, input);
    let (last, body) = match pieces.split_last() {
        Some((last, body)) => (*last, body),
        None => (&input[..0], &[][..]),
    };
    for chunk in body {
        written += gcm.update(se, chunk, &mut output[written..])?;
    }
    written += gcm.finalize(se, last, &mut output[written..], tag)?;
    assert_eq!(written, input.len());
    Ok(output)
}

#[test]
fn test_gcm_matches_reference() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let mut rng = StdRng::seed_from_u64(0x6C6D);
    for key_len in [16, 32] {
        for aad_len in [0, 1, 15, 16, 17, 45] {
            for text_len in [0, 1, 16, 31, 64, 100] {
                let key = random_bytes(&mut rng, key_len);
                let nonce: [u8; 12] = rng.gen();
                let aad = random_bytes(&mut rng, aad_len);
                let plaintext = random_bytes(&mut rng, text_len);
                let (expected_ct, expected_tag) = reference_gcm(&key, &nonce, &aad, &plaintext);

                let mut tag = [0u8; 16];
                let ciphertext = run_gcm(
                    &mut se,
                    &mut rng,
                    Direction::Encrypt,
                    AesKey::Array(&key),
                    &nonce,
                    &aad,
                    &plaintext,
                    GcmTag::Export(&mut tag),
                )
                .unwrap();
                assert_eq!(ciphertext, expected_ct, "aad {aad_len} text {text_len}");
                assert_eq!(tag.to_vec(), expected_tag, "aad {aad_len} text {text_len}");

                let decrypted = run_gcm(
                    &mut se,
                    &mut rng,
                    Direction::Decrypt,
                    AesKey::Array(&key),
                    &nonce,
                    &aad,
                    &ciphertext,
                    GcmTag::Verify(&tag),
                )
                .unwrap();
                assert_eq!(decrypted, plaintext);
            }
        }
    }
    assert!(hal.aes_key_regs_clear());
    assert!(!hal.mutex_held(EngineId::Aes));
}

#[test]
fn test_gcm_default_nonce() {
    let mut se = SecurityEngine::new(ModelHal::default());
    let key = [0x42u8; 32];
    let plaintext = [0x17u8; 40];
    let (expected_ct, expected_tag) =
        reference_gcm(&key, &GCM_DEFAULT_NONCE, b"header", &plaintext);

    let mut gcm = GcmSession::new(Direction::Encrypt, &[], 0).unwrap();
    assert_eq!(gcm.tag_len(), 16);
    gcm.set_key(AesKey::from(&key)).unwrap();
    gcm.update_aad(&mut se, b"header").unwrap();
    let mut ciphertext = [0u8; 40];
    let mut tag = [0u8; 16];
    gcm.finalize(&mut se, &plaintext, &mut ciphertext, GcmTag::Export(&mut tag))
        .unwrap();
    assert_eq!(ciphertext.to_vec(), expected_ct);
    assert_eq!(tag.to_vec(), expected_tag);
}

#[test]
fn test_gcm_nonce_lengths() {
    for len in [1, 8, 16, 60] {
        let nonce = vec![0u8; len];
        let err = GcmSession::new(Direction::Encrypt, &nonce, 16).err().unwrap();
        assert_eq!(err, SeError::DRIVER_GCM_UNSUPPORTED_NONCE_LENGTH);
        assert!(err.is(ErrorKind::NotSupported));
    }
}

#[test]
fn test_gcm_truncated_tag() {
    let mut se = SecurityEngine::new(ModelHal::default());
    for len in [1, 4, 8, 11, 17] {
        assert_eq!(
            GcmSession::new(Direction::Encrypt, &[], len).err(),
            Some(SeError::DRIVER_GCM_INVALID_TAG_LENGTH)
        );
    }
    let key = [0x24u8; 16];
    let nonce = [0x11u8; 12];
    let plaintext = [0x99u8; 20];
    let (_, expected_tag) = reference_gcm(&key, &nonce, &[], &plaintext);

    let mut gcm = GcmSession::new(Direction::Encrypt, &nonce, 12).unwrap();
    gcm.set_key(AesKey::from(&key)).unwrap();
    let mut ciphertext = [0u8; 20];
    let mut tag = [0u8; 12];
    gcm.finalize(&mut se, &plaintext, &mut ciphertext, GcmTag::Export(&mut tag))
        .unwrap();
    assert_eq!(tag[..], expected_tag[..12]);

    let mut gcm = GcmSession::new(Direction::Decrypt, &nonce, 12).unwrap();
    gcm.set_key(AesKey::from(&key)).unwrap();
    let mut output = [0u8; 20];
    assert_eq!(
        gcm.finalize(&mut se, &ciphertext, &mut output, GcmTag::Verify(&expected_tag)),
        Err(SeError::DRIVER_GCM_INVALID_TAG_LENGTH)
    );
    gcm.finalize(&mut se, &ciphertext, &mut output, GcmTag::Verify(&tag))
        .unwrap();
    assert_eq!(output, plaintext);
}

#[test]
fn test_gcm_tag_mismatch() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let key = [0x5Au8; 32];
    let nonce = [0x01u8; 12];
    let (ciphertext, mut tag) = reference_gcm(&key, &nonce, b"aad", &[0x33u8; 48]);
    tag[15] ^= 0x80;

    let mut gcm = GcmSession::new(Direction::Decrypt, &nonce, 16).unwrap();
    gcm.set_key(AesKey::from(&key)).unwrap();
    gcm.update_aad(&mut se, b"aad").unwrap();
    let mut output = [0xAAu8; 48];
    let err = gcm
        .finalize(&mut se, &ciphertext, &mut output, GcmTag::Verify(&tag))
        .unwrap_err();
    assert_eq!(err, SeError::DRIVER_GCM_TAG_MISMATCH);
    assert!(err.is(ErrorKind::NotValid));
    assert!(output.iter().all(|b| *b == 0));

    // The session is closed after the failure
    assert_eq!(
        gcm.update(&mut se, &ciphertext, &mut output),
        Err(SeError::DRIVER_GCM_INVALID_STATE)
    );
    assert!(hal.aes_key_regs_clear());
    assert!(!hal.mutex_held(EngineId::Aes));
}

#[test]
fn test_gcm_aad_after_data() {
    let mut se = SecurityEngine::new(ModelHal::default());
    let key = [0x01u8; 16];
    let mut gcm = GcmSession::new(Direction::Encrypt, &[], 16).unwrap();
    gcm.set_key(AesKey::from(&key)).unwrap();
    gcm.update_aad(&mut se, b"first").unwrap();
    let mut output = [0u8; 32];
    assert_eq!(gcm.update(&mut se, &[0u8; 5], &mut output), Ok(0));
    let err = gcm.update_aad(&mut se, b"late").unwrap_err();
    assert_eq!(err, SeError::DRIVER_GCM_AAD_AFTER_DATA);
    assert!(err.is(ErrorKind::InvalidArgs));
}

#[test]
fn test_gcm_session_errors() {
    let mut se = SecurityEngine::new(ModelHal::default());
    let key = [0x01u8; 16];
    let mut output = [0u8; 32];

    let mut gcm = GcmSession::new(Direction::Encrypt, &[], 16).unwrap();
    assert_eq!(
        gcm.update_aad(&mut se, b"aad"),
        Err(SeError::DRIVER_GCM_KEY_NOT_SET)
    );
    assert_eq!(
        gcm.set_key(AesKey::Array(&[0u8; 20])),
        Err(SeError::DRIVER_AES_INVALID_KEY_SIZE)
    );
    gcm.set_key(AesKey::from(&key)).unwrap();
    assert_eq!(
        gcm.finalize(&mut se, &[0u8; 16], &mut output, GcmTag::Verify(&[0u8; 16])),
        Err(SeError::DRIVER_GCM_TAG_DIRECTION_MISMATCH)
    );
    let mut tag = [0u8; 8];
    assert_eq!(
        gcm.finalize(&mut se, &[0u8; 16], &mut output, GcmTag::Export(&mut tag)),
        Err(SeError::DRIVER_GCM_OUTPUT_TOO_SMALL)
    );
    let mut tag = [0u8; 16];
    assert_eq!(
        gcm.update(&mut se, &[0u8; 48], &mut output),
        Err(SeError::DRIVER_GCM_OUTPUT_TOO_SMALL)
    );

    let mut se_slots = SecurityEngine::new(ModelHal::default());
    let slot = se_slots.alloc_aes_keyslot().unwrap();
    assert_eq!(
        gcm.set_key(AesKey::from(&slot)),
        Err(SeError::DRIVER_GCM_KEY_KIND_CHANGED)
    );
    gcm.update_aad(&mut se, b"aad").unwrap();
    assert_eq!(
        gcm.set_key(AesKey::from(&key)),
        Err(SeError::DRIVER_GCM_INVALID_STATE)
    );

    gcm.finalize(&mut se, &[0u8; 16], &mut output, GcmTag::Export(&mut tag))
        .unwrap();
    assert_eq!(
        gcm.finalize(&mut se, &[], &mut output, GcmTag::Export(&mut tag)),
        Err(SeError::DRIVER_GCM_INVALID_STATE)
    );
    se_slots.free_aes_keyslot(slot).unwrap();
}

#[test]
fn test_gcm_keyslot_key() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let mut rng = StdRng::seed_from_u64(7);
    let key = random_bytes(&mut rng, 32);
    let nonce: [u8; 12] = rng.gen();
    let plaintext = random_bytes(&mut rng, 77);
    let (expected_ct, expected_tag) = reference_gcm(&key, &nonce, b"slot", &plaintext);

    let slot = se.alloc_aes_keyslot().unwrap();
    se.load_aes_keyslot(&slot, &key).unwrap();
    assert!(hal.aes_keyslot_loaded(slot.index().into()));
    assert!(hal.aes_key_regs_clear());

    let mut tag = [0u8; 16];
    let ciphertext = run_gcm(
        &mut se,
        &mut rng,
        Direction::Encrypt,
        AesKey::from(&slot),
        &nonce,
        b"slot",
        &plaintext,
        GcmTag::Export(&mut tag),
    )
    .unwrap();
    assert_eq!(ciphertext, expected_ct);
    assert_eq!(tag.to_vec(), expected_tag);

    let index = usize::from(slot.index());
    se.free_aes_keyslot(slot).unwrap();
    assert!(!hal.aes_keyslot_loaded(index));
}

#[test]
fn test_gcm_keyslot_must_be_checked_out() {
    let mut se = SecurityEngine::new(ModelHal::default());
    let slot = se.alloc_aes_keyslot().unwrap();
    let mut gcm = GcmSession::new(Direction::Encrypt, &[], 16).unwrap();
    gcm.set_key(AesKey::from(&slot)).unwrap();
    se.free_aes_keyslot(slot).unwrap();
    assert_eq!(
        gcm.update_aad(&mut se, &[0u8; 16]),
        Err(SeError::DRIVER_KEYSLOT_NOT_CHECKED_OUT)
    );
}

#[test]
fn test_gcm_discontiguous_buffers() {
    let mut se = SecurityEngine::new(ModelHal::new(ModelConfig {
        page_size: Some(16),
        ..Default::default()
    }));
    let mut rng = StdRng::seed_from_u64(16);
    let key = random_bytes(&mut rng, 16);
    let nonce: [u8; 12] = rng.gen();
    let aad = random_bytes(&mut rng, 50);
    let plaintext = random_bytes(&mut rng, 200);
    let (expected_ct, expected_tag) = reference_gcm(&key, &nonce, &aad, &plaintext);

    let mut tag = [0u8; 16];
    let ciphertext = run_gcm(
        &mut se,
        &mut rng,
        Direction::Encrypt,
        AesKey::Array(&key),
        &nonce,
        &aad,
        &plaintext,
        GcmTag::Export(&mut tag),
    )
    .unwrap();
    assert_eq!(ciphertext, expected_ct);
    assert_eq!(tag.to_vec(), expected_tag);
}

#[test]
fn test_gcm_engine_failure() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let key = [0x77u8; 32];
    let mut gcm = GcmSession::new(Direction::Encrypt, &[], 16).unwrap();
    gcm.set_key(AesKey::from(&key)).unwrap();
    hal.fail_next_operation(EngineId::Aes);
    let err = gcm.update_aad(&mut se, &[0u8; 32]).unwrap_err();
    assert_eq!(err, SeError::DRIVER_AES_ENGINE_FAILURE);
    assert!(err.is(ErrorKind::EngineFailure));
    assert!(hal.aes_key_regs_clear());
    assert!(!hal.mutex_held(EngineId::Aes));
    assert_eq!(
        gcm.update_aad(&mut se, &[0u8; 32]),
        Err(SeError::DRIVER_GCM_INVALID_STATE)
    );
}

#[test]
fn test_gcm_contended_engine() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let key = [0x77u8; 16];
    let mut gcm = GcmSession::new(Direction::Encrypt, &[], 16).unwrap();
    gcm.set_key(AesKey::from(&key)).unwrap();
    hal.set_contended(EngineId::Aes, true);
    assert_eq!(
        gcm.update_aad(&mut se, &[0u8; 16]),
        Err(SeError::ENGINE_BUSY)
    );
    assert_eq!(hal.reg_writes(EngineId::Aes), 0);
}

#[test]
fn test_ctr_continues_counter() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let mut rng = StdRng::seed_from_u64(99);
    let key = random_bytes(&mut rng, 32);
    let initial: Block = rng.gen();
    let input = random_bytes(&mut rng, 64);

    let mut counter = initial;
    let mut output = vec![0u8; 64];
    ctr(&mut se, AesKey::Array(&key), &mut counter, &input[..32], &mut output[..32]).unwrap();
    ctr(&mut se, AesKey::Array(&key), &mut counter, &input[32..], &mut output[32..]).unwrap();
    assert_eq!(output, reference_ctr(&key, &initial, &input));

    let mut expected_counter = initial;
    for _ in 0..4 {
        se_drivers::inc32(&mut expected_counter);
    }
    assert_eq!(counter, expected_counter);
    assert!(hal.aes_key_regs_clear());
}

#[test]
fn test_ctr_partial_block() {
    let mut se = SecurityEngine::new(ModelHal::new(ModelConfig {
        page_size: Some(16),
        ..Default::default()
    }));
    let key = [0x10u8; 16];
    let initial = [0xF0u8; 16];
    let input = [0x3Cu8; 21];
    let mut counter = initial;
    let mut output = [0u8; 21];
    ctr(&mut se, AesKey::from(&key), &mut counter, &input, &mut output).unwrap();
    assert_eq!(output.to_vec(), reference_ctr(&key, &initial, &input));
    assert_eq!(
        ctr(&mut se, AesKey::from(&key), &mut counter, &input, &mut output[..20]),
        Err(SeError::DRIVER_AES_OUTPUT_TOO_SMALL)
    );
}

#[test]
fn test_ctr_start_async() {
    let hal = ModelHal::new(ModelConfig {
        busy_latency: 2,
        ..Default::default()
    });
    let mut se = SecurityEngine::new(hal.clone());
    let key = [0x2Bu8; 32];
    let counter = [0x01u8; 16];
    let input = vec![0x5Du8; 48];
    let mut output = vec![0u8; 48];

    let mut pending = ctr_start(&mut se, AesKey::from(&key), &counter, &input, &mut output).unwrap();
    let mut polls = 1;
    while !pending.poll() {
        polls += 1;
    }
    assert_eq!(polls, 3);
    let next = pending.finish().unwrap();

    assert_eq!(output, reference_ctr(&key, &counter, &input));
    let mut expected = counter;
    for _ in 0..3 {
        se_drivers::inc32(&mut expected);
    }
    assert_eq!(next, expected);
    assert!(hal.aes_key_regs_clear());
    assert!(!hal.mutex_held(EngineId::Aes));
}

#[test]
fn test_ctr_start_finish_without_poll() {
    let hal = ModelHal::new(ModelConfig {
        busy_latency: 5,
        ..Default::default()
    });
    let mut se = SecurityEngine::new(hal.clone());
    let key = [0x2Bu8; 16];
    let counter = [0u8; 16];
    let input = vec![0xA5u8; 32];
    let mut output = vec![0u8; 32];
    ctr_start(&mut se, AesKey::from(&key), &counter, &input, &mut output)
        .unwrap()
        .finish()
        .unwrap();
    assert_eq!(output, reference_ctr(&key, &counter, &input));
    assert!(!hal.mutex_held(EngineId::Aes));
}

#[test]
fn test_ctr_start_rejects_discontiguous() {
    let hal = ModelHal::new(ModelConfig {
        page_size: Some(16),
        ..Default::default()
    });
    let mut se = SecurityEngine::new(hal.clone());
    let key = [0x2Bu8; 16];
    let input = vec![0u8; 64];
    let mut output = vec![0u8; 64];
    assert_eq!(
        ctr_start(&mut se, AesKey::from(&key), &[0u8; 16], &input, &mut output).err(),
        Some(SeError::DRIVER_AES_NOT_CONTIGUOUS)
    );
    assert_eq!(
        ctr_start(&mut se, AesKey::from(&key), &[0u8; 16], &[], &mut output).err(),
        Some(SeError::DRIVER_AES_INVALID_LENGTH)
    );
    assert_eq!(hal.acquisitions(EngineId::Aes), 0);
}

#[test]
fn test_ctr_start_failure_releases_engine() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let key = [0x2Bu8; 16];
    let input = vec![0u8; 16];
    let mut output = vec![0u8; 16];
    hal.fail_next_operation(EngineId::Aes);
    let pending = ctr_start(&mut se, AesKey::from(&key), &[0u8; 16], &input, &mut output).unwrap();
    assert_eq!(pending.finish(), Err(SeError::DRIVER_AES_ENGINE_FAILURE));
    assert!(hal.aes_key_regs_clear());
    assert!(!hal.mutex_held(EngineId::Aes));
}

fn ccm_encrypt(
    se: &mut SecurityEngine<ModelHal>,
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
    tag_len: usize,
) -> Result<Vec<u8>, SeError> {
    let mut ccm = CcmSession::new(
        se,
        Direction::Encrypt,
        nonce,
        tag_len,
        aad.len(),
        plaintext.len(),
    )?;
    ccm.set_key(AesKey::Array(key))?;
    let (head, tail) = aad.split_at(aad.len() / 3);
    ccm.update_aad(head)?;
    ccm.update_aad(tail)?;
    let mut output = vec![0u8; plaintext.len() + tag_len];
    let written = ccm.finalize(se, plaintext, &mut output)?;
    assert_eq!(written, output.len());
    Ok(output)
}

fn ccm_decrypt(
    se: &mut SecurityEngine<ModelHal>,
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    input: &[u8],
    tag_len: usize,
    output: &mut [u8],
) -> Result<usize, SeError> {
    let mut ccm = CcmSession::new(
        se,
        Direction::Decrypt,
        nonce,
        tag_len,
        aad.len(),
        input.len() - tag_len,
    )?;
    ccm.set_key(AesKey::Array(key))?;
    ccm.update_aad(aad)?;
    ccm.finalize(se, input, output)
}

#[test]
fn test_ccm_known_vector() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let ciphertext = ccm_encrypt(&mut se, &CCM_KEY, &CCM_NONCE, &CCM_AAD, &CCM_PT, 8).unwrap();
    assert_eq!(ciphertext, CCM_CT);

    let mut plaintext = [0u8; 23];
    assert_eq!(
        ccm_decrypt(&mut se, &CCM_KEY, &CCM_NONCE, &CCM_AAD, &CCM_CT, 8, &mut plaintext),
        Ok(23)
    );
    assert_eq!(plaintext, CCM_PT);
    assert_eq!(hal.scratch_in_use(), 0);
    assert!(hal.aes_key_regs_clear());
}

#[test]
fn test_ccm_matches_reference() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let mut rng = StdRng::seed_from_u64(3610);
    for nonce_len in 7..=13 {
        for tag_len in (4..=16).step_by(2) {
            let key = random_bytes(&mut rng, if tag_len % 4 == 0 { 32 } else { 16 });
            let nonce = random_bytes(&mut rng, nonce_len);
            let (aad_len, text_len) = (rng.gen_range(0..40), rng.gen_range(0..70));
            let aad = random_bytes(&mut rng, aad_len);
            let plaintext = random_bytes(&mut rng, text_len);
            let expected = reference_ccm(&key, &nonce, &aad, &plaintext, tag_len);

            let ciphertext = ccm_encrypt(&mut se, &key, &nonce, &aad, &plaintext, tag_len).unwrap();
            assert_eq!(ciphertext, expected, "nonce {nonce_len} tag {tag_len}");

            let mut output = vec![0u8; plaintext.len()];
            ccm_decrypt(&mut se, &key, &nonce, &aad, &ciphertext, tag_len, &mut output).unwrap();
            assert_eq!(output, plaintext);
        }
    }
    assert_eq!(hal.scratch_in_use(), 0);
}

#[test]
fn test_ccm_long_aad() {
    let mut se = SecurityEngine::new(ModelHal::default());
    let mut rng = StdRng::seed_from_u64(0xFF00);
    let key = random_bytes(&mut rng, 16);
    let nonce = random_bytes(&mut rng, 12);
    // Long enough for the six byte length encoding
    let aad = random_bytes(&mut rng, 0xFF00);
    let plaintext = random_bytes(&mut rng, 33);
    let ciphertext = ccm_encrypt(&mut se, &key, &nonce, &aad, &plaintext, 16).unwrap();
    assert_eq!(ciphertext, reference_ccm(&key, &nonce, &aad, &plaintext, 16));
}

#[test]
fn test_ccm_tag_mismatch() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let mut corrupted = CCM_CT;
    corrupted[30] ^= 0x01;
    let mut output = [0xAAu8; 23];
    let err = ccm_decrypt(&mut se, &CCM_KEY, &CCM_NONCE, &CCM_AAD, &corrupted, 8, &mut output)
        .unwrap_err();
    assert_eq!(err, SeError::DRIVER_CCM_TAG_MISMATCH);
    assert!(err.is(ErrorKind::NotValid));

    // No unauthenticated plaintext is released
    assert!(output.iter().all(|b| *b == 0xAA));
    assert_eq!(hal.scratch_in_use(), 0);
    assert!(!hal.mutex_held(EngineId::Aes));
}

#[test]
fn test_ccm_session_errors() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    for nonce_len in [0, 6, 14] {
        assert_eq!(
            CcmSession::new(&mut se, Direction::Encrypt, &vec![0u8; nonce_len], 8, 0, 16).err(),
            Some(SeError::DRIVER_CCM_INVALID_NONCE_LENGTH)
        );
    }
    for tag_len in [0, 2, 5, 18] {
        assert_eq!(
            CcmSession::new(&mut se, Direction::Encrypt, &CCM_NONCE, tag_len, 0, 16).err(),
            Some(SeError::DRIVER_CCM_INVALID_TAG_LENGTH)
        );
    }
    // A 13 byte nonce leaves two bytes for the payload length
    assert_eq!(
        CcmSession::new(&mut se, Direction::Encrypt, &CCM_NONCE, 8, 0, 0x1_0000).err(),
        Some(SeError::DRIVER_CCM_PAYLOAD_TOO_LONG)
    );
    assert_eq!(hal.scratch_in_use(), 0);

    let mut ccm = CcmSession::new(&mut se, Direction::Encrypt, &CCM_NONCE, 8, 8, 23).unwrap();
    assert_eq!(ccm.update(), Err(SeError::DRIVER_CCM_UPDATE_NOT_ALLOWED));
    let mut output = [0u8; 31];
    assert_eq!(
        ccm.finalize(&mut se, &CCM_PT, &mut output),
        Err(SeError::DRIVER_CCM_KEY_NOT_SET)
    );
    ccm.set_key(AesKey::from(&CCM_KEY)).unwrap();
    assert_eq!(
        ccm.update_aad(&[0u8; 9]),
        Err(SeError::DRIVER_CCM_LENGTH_MISMATCH)
    );
    ccm.update_aad(&CCM_AAD[..4]).unwrap();
    assert_eq!(
        ccm.finalize(&mut se, &CCM_PT, &mut output),
        Err(SeError::DRIVER_CCM_LENGTH_MISMATCH)
    );
    ccm.update_aad(&CCM_AAD[4..]).unwrap();
    assert_eq!(
        ccm.finalize(&mut se, &CCM_PT[..22], &mut output),
        Err(SeError::DRIVER_CCM_LENGTH_MISMATCH)
    );
    assert_eq!(
        ccm.finalize(&mut se, &CCM_PT, &mut output[..30]),
        Err(SeError::DRIVER_CCM_OUTPUT_TOO_SMALL)
    );
    assert_eq!(ccm.finalize(&mut se, &CCM_PT, &mut output), Ok(31));
    assert_eq!(output, CCM_CT);
    assert_eq!(
        ccm.finalize(&mut se, &CCM_PT, &mut output),
        Err(SeError::DRIVER_CCM_INVALID_STATE)
    );
    assert_eq!(hal.scratch_in_use(), 0);
}

#[test]
fn test_ccm_scratch_exhausted() {
    let hal = ModelHal::new(ModelConfig {
        scratch_capacity: 64,
        ..Default::default()
    });
    let mut se = SecurityEngine::new(hal.clone());
    let err = CcmSession::new(&mut se, Direction::Encrypt, &CCM_NONCE, 8, 8, 100)
        .err()
        .unwrap();
    assert_eq!(err, SeError::ENGINE_SCRATCH_EXHAUSTED);
    assert!(err.is(ErrorKind::NoMemory));
    assert_eq!(hal.scratch_in_use(), 0);

    // Small enough to fit
    let ccm = CcmSession::new(&mut se, Direction::Encrypt, &CCM_NONCE, 8, 8, 16).unwrap();
    assert!(hal.scratch_in_use() > 0);
    drop(ccm);
}

#[test]
fn test_ccm_length_limits() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());

    // A 7 byte nonce leaves an 8 byte length field, so only the buffer
    // layout bounds the payload
    for payload_len in [usize::MAX, usize::MAX - 15] {
        let err = CcmSession::new(&mut se, Direction::Encrypt, &[0; 7], 16, 0, payload_len)
            .err()
            .unwrap();
        assert_eq!(err, SeError::DRIVER_CCM_PAYLOAD_TOO_LONG);
        assert!(err.is(ErrorKind::InvalidArgs));
    }
    let err = CcmSession::new(&mut se, Direction::Encrypt, &[0; 7], 16, usize::MAX, 16)
        .err()
        .unwrap();
    assert_eq!(err, SeError::DRIVER_CCM_AAD_TOO_LONG);
    assert!(err.is(ErrorKind::InvalidArgs));
    let err = CcmSession::new(&mut se, Direction::Decrypt, &[0; 13], 16, usize::MAX - 5, 0)
        .err()
        .unwrap();
    assert_eq!(err, SeError::DRIVER_CCM_AAD_TOO_LONG);

    // A 13 byte nonce leaves a 2 byte length field
    assert_eq!(
        CcmSession::new(&mut se, Direction::Encrypt, &[0; 13], 16, 0, 0x1_0000).err(),
        Some(SeError::DRIVER_CCM_PAYLOAD_TOO_LONG)
    );
    assert_eq!(hal.scratch_in_use(), 0);
    assert_eq!(hal.reg_writes(EngineId::Aes), 0);
}

#[test]
fn test_ccm_reset_releases_buffer() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let mut ccm = CcmSession::new(&mut se, Direction::Decrypt, &CCM_NONCE, 8, 8, 23).unwrap();
    ccm.set_key(AesKey::from(&CCM_KEY)).unwrap();
    ccm.update_aad(&CCM_AAD).unwrap();
    assert!(hal.scratch_in_use() > 0);
    ccm.reset(&mut se);
    assert_eq!(hal.scratch_in_use(), 0);
    assert_eq!(hal.scratch_returns(), 1);
    let mut output = [0u8; 23];
    assert_eq!(
        ccm.finalize(&mut se, &CCM_CT, &mut output),
        Err(SeError::DRIVER_CCM_INVALID_STATE)
    );
}

#[test]
fn test_ccm_engine_failure() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let mut ccm = CcmSession::new(&mut se, Direction::Encrypt, &CCM_NONCE, 8, 8, 23).unwrap();
    ccm.set_key(AesKey::from(&CCM_KEY)).unwrap();
    ccm.update_aad(&CCM_AAD).unwrap();
    hal.fail_next_operation(EngineId::Aes);
    let mut output = [0xAAu8; 31];
    assert_eq!(
        ccm.finalize(&mut se, &CCM_PT, &mut output),
        Err(SeError::DRIVER_AES_ENGINE_FAILURE)
    );
    assert!(output.iter().all(|b| *b == 0));
    assert_eq!(hal.scratch_in_use(), 0);
    assert!(hal.aes_key_regs_clear());
    assert!(!hal.mutex_held(EngineId::Aes));
}
