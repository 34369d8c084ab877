// Licensed under the Apache-2.0 license

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use se_drivers::reg::aes::{self as aes_reg, AesConfig};
use se_drivers::reg::sha::{self as sha_reg, ShaConfig};
use se_drivers::{EngineId, ScratchAlloc, ScratchTag, SeError, SeMemory, SeMutex, SeRegs};
use se_hw_model::{ModelConfig, ModelHal, ShaCall};
use sha2::{Digest, Sha256};

fn program_sha256(hal: &mut ModelHal, data: &[u8]) {
    let addr = hal.phys_addr(data.as_ptr());
    hal.write_reg(EngineId::Sha, sha_reg::IN_ADDR_LO, addr as u32);
    hal.write_reg(EngineId::Sha, sha_reg::IN_ADDR_HI, (addr >> 32) as u32);
    hal.write_reg(EngineId::Sha, sha_reg::IN_LEN, data.len() as u32);
    hal.write_reg(EngineId::Sha, sha_reg::MSG_LEN_LO, data.len() as u32);
    hal.write_reg(EngineId::Sha, sha_reg::MSG_LEN_HI, 0);
    let mut config = ShaConfig(0);
    config.set_alg(sha_reg::ALG_SHA256);
    config.set_init_hash(true);
    config.set_last(true);
    hal.write_reg(EngineId::Sha, sha_reg::CONFIG, config.0);
}

fn read_digest(hal: &mut ModelHal) -> Vec<u8> {
    (0..8)
        .flat_map(|i| {
            hal.read_reg(EngineId::Sha, sha_reg::HASH_RESULT + i * 4)
                .to_be_bytes()
        })
        .collect()
}

#[test]
fn test_sha256_single_call() {
    let mut hal = ModelHal::default();
    let data = b"abc".to_vec();
    hal.acquire(EngineId::Sha).unwrap();
    program_sha256(&mut hal, &data);
    hal.start_operation(EngineId::Sha, sha_reg::PRESET_START)
        .unwrap();
    hal.wait_until_idle(EngineId::Sha).unwrap();
    assert_eq!(read_digest(&mut hal), Sha256::digest(&data).to_vec());
    assert_eq!(hal.sha_calls(), vec![ShaCall { len: 3, last: true }]);
    hal.release(EngineId::Sha);
}

#[test]
fn test_start_requires_mutex() {
    let mut hal = ModelHal::default();
    assert_eq!(
        hal.start_operation(EngineId::Sha, sha_reg::PRESET_START),
        Err(SeError::ENGINE_MUTEX_NOT_HELD)
    );
}

#[test]
fn test_contended_mutex() {
    let mut hal = ModelHal::default();
    hal.set_contended(EngineId::Pka, true);
    assert_eq!(hal.acquire(EngineId::Pka), Err(SeError::ENGINE_BUSY));
    hal.set_contended(EngineId::Pka, false);
    hal.acquire(EngineId::Pka).unwrap();
    assert_eq!(hal.acquire(EngineId::Pka), Err(SeError::ENGINE_BUSY));
    hal.release(EngineId::Pka);
    assert!(!hal.mutex_held(EngineId::Pka));
}

#[test]
fn test_busy_latency() {
    let mut hal = ModelHal::new(ModelConfig {
        busy_latency: 2,
        ..Default::default()
    });
    let data = vec![0x61u8; 10];
    hal.acquire(EngineId::Sha).unwrap();
    program_sha256(&mut hal, &data);
    hal.start_operation(EngineId::Sha, sha_reg::PRESET_START)
        .unwrap();
    assert!(!hal.is_idle(EngineId::Sha));
    assert_eq!(
        hal.start_operation(EngineId::Sha, sha_reg::PRESET_START),
        Err(SeError::ENGINE_BUSY)
    );
    assert!(!hal.is_idle(EngineId::Sha));
    assert!(hal.is_idle(EngineId::Sha));
    hal.wait_until_idle(EngineId::Sha).unwrap();
    assert_eq!(read_digest(&mut hal), Sha256::digest(&data).to_vec());
}

#[test]
fn test_injected_failure() {
    let mut hal = ModelHal::default();
    let data = vec![0u8; 64];
    hal.acquire(EngineId::Sha).unwrap();
    hal.fail_next_operation(EngineId::Sha);
    program_sha256(&mut hal, &data);
    hal.start_operation(EngineId::Sha, sha_reg::PRESET_START)
        .unwrap();
    assert_eq!(
        hal.wait_until_idle(EngineId::Sha),
        Err(SeError::ENGINE_OPERATION_FAILED)
    );
    // Only the next operation fails
    hal.start_operation(EngineId::Sha, sha_reg::PRESET_START)
        .unwrap();
    hal.wait_until_idle(EngineId::Sha).unwrap();
}

#[test]
fn test_dma_across_page_faults() {
    let mut hal = ModelHal::new(ModelConfig {
        page_size: Some(64),
        ..Default::default()
    });
    let data = vec![0u8; 256];
    assert!(hal.contiguous_len(data.as_ptr(), data.len()) <= 64);
    hal.acquire(EngineId::Sha).unwrap();
    program_sha256(&mut hal, &data);
    hal.start_operation(EngineId::Sha, sha_reg::PRESET_START)
        .unwrap();
    assert_eq!(
        hal.wait_until_idle(EngineId::Sha),
        Err(SeError::ENGINE_OPERATION_FAILED)
    );
}

#[test]
fn test_scratch_release() {
    let mut hal = ModelHal::new(ModelConfig {
        scratch_capacity: 128,
        ..Default::default()
    });
    let buffer = hal.get_buffer(ScratchTag::CcmWork, 16, 96).unwrap();
    assert_eq!(hal.scratch_in_use(), 96);
    assert_eq!(
        hal.get_buffer(ScratchTag::CcmWork, 16, 64).err(),
        Some(SeError::ENGINE_SCRATCH_EXHAUSTED)
    );
    hal.put_buffer(buffer);
    assert_eq!(hal.scratch_in_use(), 0);
    assert_eq!(hal.scratch_returns(), 1);
}

fn write_be(hal: &mut ModelHal, offset: u32, bytes: &[u8]) {
    for (i, chunk) in bytes.chunks(4).enumerate() {
        let mut word = [0u8; 4];
        word.copy_from_slice(chunk);
        hal.write_reg(EngineId::Aes, offset + (i * 4) as u32, u32::from_be_bytes(word));
    }
}

fn run_aes(hal: &mut ModelHal, mode: u32, src: &[u8], dst: Option<&mut [u8]>) {
    let mut config = AesConfig(0);
    config.set_mode(mode);
    config.set_key_size(aes_reg::KEY_SIZE_128);
    hal.write_reg(EngineId::Aes, aes_reg::CONFIG, config.0);
    let src_addr = hal.phys_addr(src.as_ptr());
    hal.write_reg(EngineId::Aes, aes_reg::SRC_ADDR_LO, src_addr as u32);
    hal.write_reg(EngineId::Aes, aes_reg::SRC_ADDR_HI, (src_addr >> 32) as u32);
    if let Some(dst) = dst {
        let dst_addr = hal.phys_addr(dst.as_ptr());
        hal.write_reg(EngineId::Aes, aes_reg::DST_ADDR_LO, dst_addr as u32);
        hal.write_reg(EngineId::Aes, aes_reg::DST_ADDR_HI, (dst_addr >> 32) as u32);
    }
    hal.write_reg(EngineId::Aes, aes_reg::DATA_LEN, src.len() as u32);
    hal.start_operation(EngineId::Aes, aes_reg::PRESET_START)
        .unwrap();
    hal.wait_until_idle(EngineId::Aes).unwrap();
}

#[test]
fn test_gcm_register_flow() {
    let key = [0x4Bu8; 16];
    let nonce = [0x12u8; 12];
    let aad = [0xA0u8; 20];
    let plaintext = [0x3Fu8; 40];
    let mut expected = plaintext.to_vec();
    let expected_tag = Aes128Gcm::new_from_slice(&key)
        .unwrap()
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), &aad, &mut expected)
        .unwrap();

    let mut hal = ModelHal::default();
    hal.acquire(EngineId::Aes).unwrap();
    write_be(&mut hal, aes_reg::KEY, &key);
    let mut j0 = [0u8; 16];
    j0[..12].copy_from_slice(&nonce);
    j0[15] = 1;
    let mut counter = j0;
    counter[15] = 2;
    write_be(&mut hal, aes_reg::IV, &counter);

    run_aes(&mut hal, aes_reg::MODE_GCM_AAD, &aad, None);
    let mut ciphertext = vec![0u8; plaintext.len()];
    run_aes(&mut hal, aes_reg::MODE_GCM_TEXT, &plaintext, Some(&mut ciphertext[..]));
    assert_eq!(ciphertext, expected);

    write_be(&mut hal, aes_reg::IV, &j0);
    hal.write_reg(EngineId::Aes, aes_reg::AAD_LEN_LO, aad.len() as u32);
    hal.write_reg(EngineId::Aes, aes_reg::TEXT_LEN_LO, plaintext.len() as u32);
    run_aes(&mut hal, aes_reg::MODE_GCM_TAG, &[], None);
    let tag: Vec<u8> = (0..4)
        .flat_map(|i| {
            hal.read_reg(EngineId::Aes, aes_reg::TAG + i * 4)
                .to_be_bytes()
        })
        .collect();
    assert_eq!(tag, expected_tag.to_vec());
    hal.release(EngineId::Aes);
}
