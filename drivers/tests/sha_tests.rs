// Licensed under the Apache-2.0 license

use rand::{rngs::StdRng, Rng, SeedableRng};
use se_drivers::{
    EngineId, ErrorKind, SeError, SecurityEngine, ShaAlg, ShaDigestOp, SHA_MAX_DIGEST_SIZE,
};
use se_hw_model::{ModelConfig, ModelHal, ShaCall};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

const ALGS: [ShaAlg; 4] = [ShaAlg::Sha224, ShaAlg::Sha256, ShaAlg::Sha384, ShaAlg::Sha512];

fn reference(alg: ShaAlg, data: &[u8]) -> Vec<u8> {
    match alg {
        ShaAlg::Sha224 => Sha224::digest(data).to_vec(),
        ShaAlg::Sha256 => Sha256::digest(data).to_vec(),
        ShaAlg::Sha384 => Sha384::digest(data).to_vec(),
        ShaAlg::Sha512 => Sha512::digest(data).to_vec(),
    }
}

fn one_shot(se: &mut SecurityEngine<ModelHal>, alg: ShaAlg, data: &[u8]) -> Vec<u8> {
    let mut digest = [0u8; SHA_MAX_DIGEST_SIZE];
    let len = se_drivers::digest(se, alg, data, &mut digest).unwrap();
    digest[..len].to_vec()
}

fn chunked(
    se: &mut SecurityEngine<ModelHal>,
    alg: ShaAlg,
    data: &[u8],
    rng: &mut StdRng,
) -> Vec<u8> {
    let mut op = ShaDigestOp::new(alg);
    let mut rest = data;
    while !rest.is_empty() && rng.gen_bool(0.8) {
        let n = rng.gen_range(0..=rest.len().min(3 * alg.block_size()));
        let (chunk, tail) = rest.split_at(n);
        op.update(se, chunk).unwrap();
        rest = tail;
    }
    let mut digest = [0u8; SHA_MAX_DIGEST_SIZE];
    let len = op.finalize(se, rest, &mut digest).unwrap();
    digest[..len].to_vec()
}

#[test]
fn test_one_shot_matches_reference() {
    let mut se = SecurityEngine::new(ModelHal::default());
    for alg in ALGS {
        for len in [0, 1, 55, 56, 63, 64, 65, 111, 112, 127, 128, 129, 1000] {
            let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
            assert_eq!(one_shot(&mut se, alg, &data), reference(alg, &data), "{alg:?} {len}");
        }
    }
}

#[test]
fn test_chunking_invariance() {
    let mut rng = StdRng::seed_from_u64(0x5a5a);
    let mut se = SecurityEngine::new(ModelHal::default());
    for alg in ALGS {
        for _ in 0..40 {
            let len = rng.gen_range(0..700);
            let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            let expected = one_shot(&mut se, alg, &data);
            assert_eq!(chunked(&mut se, alg, &data, &mut rng), expected);
        }
    }
}

#[test]
fn test_small_updates_stay_in_software() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let mut op = ShaDigestOp::new(ShaAlg::Sha256);
    for _ in 0..8 {
        op.update(&mut se, &[0x61; 8]).unwrap();
    }
    assert!(hal.sha_calls().is_empty());
    assert_eq!(hal.acquisitions(EngineId::Sha), 0);

    let mut digest = [0u8; 32];
    op.finalize(&mut se, &[], &mut digest).unwrap();
    assert_eq!(digest.to_vec(), Sha256::digest([0x61; 64]).to_vec());
}

#[test]
fn test_gather_flush_then_final_call() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let data: Vec<u8> = (0..64u8).collect();

    let mut op = ShaDigestOp::new(ShaAlg::Sha256);
    op.update(&mut se, &[]).unwrap();
    op.update(&mut se, &data[..55]).unwrap();
    assert!(hal.sha_calls().is_empty());
    let mut digest = [0u8; 32];
    op.finalize(&mut se, &data[55..], &mut digest).unwrap();
    assert_eq!(
        hal.sha_calls(),
        vec![
            ShaCall { len: 64, last: false },
            ShaCall { len: 0, last: true },
        ]
    );

    hal.clear_sha_calls();
    assert_eq!(one_shot(&mut se, ShaAlg::Sha256, &data), digest.to_vec());
    assert_eq!(hal.sha_calls(), vec![ShaCall { len: 64, last: true }]);
}

#[test]
fn test_whole_blocks_read_in_place() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let data = vec![0x3cu8; 64 * 5 + 10];

    let mut op = ShaDigestOp::new(ShaAlg::Sha256);
    op.update(&mut se, &data[..10]).unwrap();
    op.update(&mut se, &data[10..]).unwrap();
    let mut digest = [0u8; 32];
    op.finalize(&mut se, &[], &mut digest).unwrap();

    // One gather flush, the remaining whole blocks in one call, then the
    // buffered tail.
    assert_eq!(
        hal.sha_calls(),
        vec![
            ShaCall { len: 64, last: false },
            ShaCall { len: 256, last: false },
            ShaCall { len: 10, last: true },
        ]
    );
    assert_eq!(digest.to_vec(), Sha256::digest(&data).to_vec());
}

#[test]
fn test_never_hashes_empty_non_final() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let mut rng = StdRng::seed_from_u64(7);
    for alg in ALGS {
        let data: Vec<u8> = (0..900).map(|_| rng.gen()).collect();
        chunked(&mut se, alg, &data, &mut rng);
    }
    let calls = hal.sha_calls();
    assert!(calls.iter().all(|call| call.last || call.len > 0));
    assert!(calls
        .iter()
        .filter(|call| !call.last)
        .all(|call| call.len % 64 == 0));
}

#[test]
fn test_discontiguous_input() {
    let hal = ModelHal::new(ModelConfig {
        page_size: Some(256),
        ..Default::default()
    });
    let mut se = SecurityEngine::new(hal.clone());
    let mut rng = StdRng::seed_from_u64(0xd15c);
    for alg in ALGS {
        for offset in [0, 1, 17, 100] {
            let backing: Vec<u8> = (0..2048 + offset).map(|_| rng.gen()).collect();
            let data = &backing[offset..];
            assert_eq!(one_shot(&mut se, alg, data), reference(alg, data));
            assert_eq!(chunked(&mut se, alg, data, &mut rng), reference(alg, data));
        }
    }
    assert!(hal.sha_calls().iter().all(|call| call.len <= 256));
}

#[test]
fn test_interleaved_sessions() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let a = vec![0x11u8; 300];
    let b = vec![0x22u8; 500];

    let mut op_a = ShaDigestOp::new(ShaAlg::Sha256);
    let mut op_b = ShaDigestOp::new(ShaAlg::Sha512);
    for (chunk_a, chunk_b) in a.chunks(70).zip(b.chunks(130)) {
        op_a.update(&mut se, chunk_a).unwrap();
        op_b.update(&mut se, chunk_b).unwrap();
    }
    let mut digest_a = [0u8; 32];
    let mut digest_b = [0u8; 64];
    op_a.finalize(&mut se, &a[a.len().min(70 * 4)..], &mut digest_a)
        .unwrap();
    op_b.finalize(&mut se, &b[b.len().min(130 * 4)..], &mut digest_b)
        .unwrap();

    assert_eq!(digest_a.to_vec(), Sha256::digest(&a).to_vec());
    assert_eq!(digest_b.to_vec(), Sha512::digest(&b).to_vec());
    assert!(!hal.mutex_held(EngineId::Sha));
    assert_eq!(hal.acquisitions(EngineId::Sha), hal.releases(EngineId::Sha));
}

#[test]
fn test_finalize_twice() {
    let mut se = SecurityEngine::new(ModelHal::default());
    let mut op = ShaDigestOp::new(ShaAlg::Sha384);
    let mut digest = [0u8; 48];
    op.finalize(&mut se, b"abc", &mut digest).unwrap();

    let err = op.finalize(&mut se, b"abc", &mut digest).unwrap_err();
    assert_eq!(err, SeError::DRIVER_SHA_INVALID_STATE);
    assert!(err.is(ErrorKind::BadState));
    assert_eq!(
        op.update(&mut se, b"abc"),
        Err(SeError::DRIVER_SHA_INVALID_STATE)
    );

    op.reset();
    op.finalize(&mut se, b"abc", &mut digest).unwrap();
    assert_eq!(digest.to_vec(), Sha384::digest(b"abc").to_vec());
}

#[test]
fn test_output_too_small() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let mut digest = [0u8; 31];
    let err = se_drivers::digest(&mut se, ShaAlg::Sha256, b"abc", &mut digest).unwrap_err();
    assert!(err.is(ErrorKind::InvalidArgs));
    assert_eq!(hal.reg_writes(EngineId::Sha), 0);
}

#[test]
fn test_engine_failure_closes_op() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let mut op = ShaDigestOp::new(ShaAlg::Sha256);
    hal.fail_next_operation(EngineId::Sha);

    let err = op.update(&mut se, &[0u8; 200]).unwrap_err();
    assert_eq!(err, SeError::DRIVER_SHA_ENGINE_FAILURE);
    assert!(err.is(ErrorKind::EngineFailure));
    assert!(!hal.mutex_held(EngineId::Sha));

    let mut digest = [0u8; 32];
    assert_eq!(
        op.finalize(&mut se, &[], &mut digest),
        Err(SeError::DRIVER_SHA_INVALID_STATE)
    );
}

#[test]
fn test_contended_engine() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    hal.set_contended(EngineId::Sha, true);
    let mut digest = [0u8; 32];
    assert_eq!(
        se_drivers::digest(&mut se, ShaAlg::Sha256, b"abc", &mut digest),
        Err(SeError::ENGINE_BUSY)
    );
    hal.set_contended(EngineId::Sha, false);
    se_drivers::digest(&mut se, ShaAlg::Sha256, b"abc", &mut digest).unwrap();
}

#[test]
fn test_async_finalize() {
    let hal = ModelHal::new(ModelConfig {
        busy_latency: 3,
        ..Default::default()
    });
    let mut se = SecurityEngine::new(hal.clone());
    let data = vec![0xa5u8; 150];

    let mut op = ShaDigestOp::new(ShaAlg::Sha256);
    op.update(&mut se, &data[..40]).unwrap();
    let mut pending = op.finalize_start(&mut se, &data[40..]).unwrap();
    let mut polls = 0;
    while !pending.poll() {
        polls += 1;
    }
    assert_eq!(polls, 3);
    assert!(hal.mutex_held(EngineId::Sha));
    let digest = pending.finish().unwrap();

    assert_eq!(digest.as_bytes(), Sha256::digest(&data).as_slice());
    assert!(!hal.mutex_held(EngineId::Sha));
    assert!(hal.watchdog_kicks(EngineId::Sha) >= 4);
}

#[test]
fn test_async_finish_without_poll() {
    let hal = ModelHal::new(ModelConfig {
        busy_latency: 10,
        ..Default::default()
    });
    let mut se = SecurityEngine::new(hal.clone());
    let mut op = ShaDigestOp::new(ShaAlg::Sha512);
    let digest = op.finalize_start(&mut se, b"abc").unwrap().finish().unwrap();
    assert_eq!(digest.as_bytes(), Sha512::digest(b"abc").as_slice());
    assert!(!hal.mutex_held(EngineId::Sha));
}

#[test]
fn test_async_failure_releases_engine() {
    let hal = ModelHal::default();
    let mut se = SecurityEngine::new(hal.clone());
    let mut op = ShaDigestOp::new(ShaAlg::Sha256);
    hal.fail_next_operation(EngineId::Sha);
    let pending = op.finalize_start(&mut se, b"abc").unwrap();
    assert_eq!(pending.finish(), Err(SeError::DRIVER_SHA_ENGINE_FAILURE));
    assert!(!hal.mutex_held(EngineId::Sha));
}

#[test]
#[should_panic(expected = "dropped without finish")]
fn test_async_drop_without_finish() {
    let mut se = SecurityEngine::new(ModelHal::default());
    let mut op = ShaDigestOp::new(ShaAlg::Sha256);
    let pending = op.finalize_start(&mut se, b"abc").unwrap();
    drop(pending);
}

#[test]
fn test_async_drop_releases_mutex() {
    let hal = ModelHal::default();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut se = SecurityEngine::new(hal.clone());
        let mut op = ShaDigestOp::new(ShaAlg::Sha256);
        let _pending = op.finalize_start(&mut se, b"abc").unwrap();
    }));
    assert!(result.is_err());
    assert!(!hal.mutex_held(EngineId::Sha));
}
