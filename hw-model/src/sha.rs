/*++

Licensed under the Apache-2.0 license.

File Name:

    sha.rs

Abstract:

    File contains the model of the SHA-2 engine.

--*/

use crate::memory::Dma;
use crate::regs::RegFile;
use se_drivers::reg::sha::{self as sha_reg, ShaConfig};
use se_drivers::{SeError, SeResult};
use sha2::digest::generic_array::GenericArray;

const SHA224_IV: [u32; 8] = [
    0xc1059ed8, 0x367cd507, 0x3070dd17, 0xf70e5939, 0xffc00b31, 0x68581511, 0x64f98fa7, 0xbefa4fa4,
];

const SHA256_IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

const SHA384_IV: [u64; 8] = [
    0xcbbb9d5dc1059ed8,
    0x629a292a367cd507,
    0x9159015a3070dd17,
    0x152fecd8f70e5939,
    0x67332667ffc00b31,
    0x8eb44a8768581511,
    0xdb0c2e0d64f98fa7,
    0x47b5481dbefa4fa4,
];

const SHA512_IV: [u64; 8] = [
    0x6a09e667f3bcc908,
    0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b,
    0xa54ff53a5f1d36f1,
    0x510e527fade682d1,
    0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b,
    0x5be0cd19137e2179,
];

/// One hardware call as seen by the engine
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ShaCall {
    pub len: usize,
    pub last: bool,
}

#[derive(Copy, Clone)]
enum State {
    Sha256([u32; 8]),
    Sha512([u64; 8]),
}

impl State {
    fn init(alg: u32) -> SeResult<Self> {
        match alg {
            sha_reg::ALG_SHA224 => Ok(State::Sha256(SHA224_IV)),
            sha_reg::ALG_SHA256 => Ok(State::Sha256(SHA256_IV)),
            sha_reg::ALG_SHA384 => Ok(State::Sha512(SHA384_IV)),
            sha_reg::ALG_SHA512 => Ok(State::Sha512(SHA512_IV)),
            _ => Err(SeError::ENGINE_OPERATION_FAILED),
        }
    }

    fn load(alg: u32, regs: &RegFile) -> SeResult<Self> {
        let mut words = [0u32; sha_reg::HASH_RESULT_WORDS];
        regs.read_words(sha_reg::HASH_RESULT, &mut words);
        match Self::init(alg)? {
            State::Sha256(_) => {
                let mut state = [0u32; 8];
                state.copy_from_slice(&words[..8]);
                Ok(State::Sha256(state))
            }
            State::Sha512(_) => {
                let mut state = [0u64; 8];
                for (i, word) in state.iter_mut().enumerate() {
                    *word = (u64::from(words[2 * i]) << 32) | u64::from(words[2 * i + 1]);
                }
                Ok(State::Sha512(state))
            }
        }
    }

    fn store(&self, regs: &mut RegFile) {
        let mut words = [0u32; sha_reg::HASH_RESULT_WORDS];
        match self {
            State::Sha256(state) => words[..8].copy_from_slice(state),
            State::Sha512(state) => {
                for (i, word) in state.iter().enumerate() {
                    words[2 * i] = (word >> 32) as u32;
                    words[2 * i + 1] = *word as u32;
                }
            }
        }
        regs.write_words(sha_reg::HASH_RESULT, &words);
    }

    fn block_size(&self) -> usize {
        match self {
            State::Sha256(_) => 64,
            State::Sha512(_) => 128,
        }
    }

    fn compress(&mut self, data: &[u8]) {
        match self {
            State::Sha256(state) => {
                for block in data.chunks_exact(64) {
                    sha2::compress256(state, &[GenericArray::clone_from_slice(block)]);
                }
            }
            State::Sha512(state) => {
                for block in data.chunks_exact(128) {
                    sha2::compress512(state, &[GenericArray::clone_from_slice(block)]);
                }
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct ShaUnit {
    pub calls: Vec<ShaCall>,
}

impl ShaUnit {
    pub fn execute(&mut self, regs: &mut RegFile, dma: &Dma, preset: u32) -> SeResult<()> {
        if preset != sha_reg::PRESET_START {
            return Err(SeError::ENGINE_OPERATION_FAILED);
        }
        let config = ShaConfig(regs.read(sha_reg::CONFIG));
        let len = regs.read(sha_reg::IN_LEN) as usize;
        let addr = regs.read_u64(sha_reg::IN_ADDR_LO, sha_reg::IN_ADDR_HI);
        let data = dma.read(addr, len)?;
        self.calls.push(ShaCall {
            len,
            last: config.last(),
        });

        let mut state = if config.init_hash() {
            State::init(config.alg())?
        } else {
            State::load(config.alg(), regs)?
        };
        let block_size = state.block_size();

        if !config.last() {
            if len == 0 || len % block_size != 0 {
                return Err(SeError::ENGINE_OPERATION_FAILED);
            }
            state.compress(&data);
        } else {
            let msg_len = regs.read_u64(sha_reg::MSG_LEN_LO, sha_reg::MSG_LEN_HI);
            let mut padded = data;
            padded.push(0x80);
            // 8 byte length field for SHA-224/256, 16 byte for SHA-384/512
            let len_size = block_size / 8;
            while padded.len() % block_size != block_size - len_size {
                padded.push(0);
            }
            padded.extend_from_slice(&vec![0u8; len_size - 8]);
            padded.extend_from_slice(&(msg_len * 8).to_be_bytes());
            state.compress(&padded);
        }
        state.store(regs);
        Ok(())
    }
}
