/*++

Licensed under the Apache-2.0 license.

File Name:

    sha.rs

Abstract:

    File contains API for streaming SHA-2 digest operations on the
    security engine.

--*/

use crate::array::Array4x16;
use crate::engine::{EngineGuard, PendingOp, SecurityEngine};
use crate::hal::{EngineId, SeHal};
use crate::reg::sha::{self as sha_reg, ShaConfig};
use crate::{SeError, SeResult};
use zeroize::Zeroize;

/// Largest block size of the supported algorithms
pub const SHA_MAX_BLOCK_SIZE: usize = 128;

/// Largest digest size of the supported algorithms
pub const SHA_MAX_DIGEST_SIZE: usize = 64;

/// SHA-2 algorithm
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaAlg {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl ShaAlg {
    pub const fn block_size(self) -> usize {
        match self {
            ShaAlg::Sha224 | ShaAlg::Sha256 => 64,
            ShaAlg::Sha384 | ShaAlg::Sha512 => 128,
        }
    }

    pub const fn digest_size(self) -> usize {
        match self {
            ShaAlg::Sha224 => 28,
            ShaAlg::Sha256 => 32,
            ShaAlg::Sha384 => 48,
            ShaAlg::Sha512 => 64,
        }
    }

    const fn hw_alg(self) -> u32 {
        match self {
            ShaAlg::Sha224 => sha_reg::ALG_SHA224,
            ShaAlg::Sha256 => sha_reg::ALG_SHA256,
            ShaAlg::Sha384 => sha_reg::ALG_SHA384,
            ShaAlg::Sha512 => sha_reg::ALG_SHA512,
        }
    }
}

/// Digest state
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ShaDigestState {
    /// Initial state
    Init,

    /// Pending state
    Pending,

    /// Final state
    Final,
}

/// Gather buffer. The alignment keeps it inside one physical page.
#[repr(C, align(128))]
struct GatherBuffer([u8; SHA_MAX_BLOCK_SIZE]);

/// Source of the last hardware call of a digest
enum LastChunk<'d> {
    /// The first `used` bytes of the gather buffer
    Gather,

    /// The rest of the caller's input, read by the engine in place
    Direct(&'d [u8]),
}

/// Digest produced by an asynchronous finalization
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ShaDigest {
    bytes: [u8; SHA_MAX_DIGEST_SIZE],
    len: usize,
}

impl ShaDigest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Multi step digest operation.
///
/// Input is gathered into block-sized chunks. Whole blocks of caller
/// input are read by the engine in place; only sub-block remainders and
/// blocks straddling a physical discontinuity are copied. The
/// intermediate hash is saved after every hardware call and restored
/// before the next, so the engine is only held for the duration of one
/// `update` or `finalize`.
pub struct ShaDigestOp {
    /// Algorithm
    alg: ShaAlg,

    /// State
    state: ShaDigestState,

    /// Staging buffer
    buf: GatherBuffer,

    /// Bytes held in the staging buffer
    used: usize,

    /// Bytes already hashed by the engine
    processed: u64,

    /// Intermediate hash
    hash: Array4x16,
}

impl ShaDigestOp {
    pub fn new(alg: ShaAlg) -> Self {
        Self {
            alg,
            state: ShaDigestState::Init,
            buf: GatherBuffer([0; SHA_MAX_BLOCK_SIZE]),
            used: 0,
            processed: 0,
            hash: Array4x16::default(),
        }
    }

    pub fn alg(&self) -> ShaAlg {
        self.alg
    }

    /// Update the digest with data
    ///
    /// # Arguments
    ///
    /// * `se` - Security engine
    /// * `data` - Data to used to update the digest
    pub fn update<H: SeHal>(&mut self, se: &mut SecurityEngine<H>, data: &[u8]) -> SeResult<()> {
        if self.state == ShaDigestState::Final {
            return Err(SeError::DRIVER_SHA_INVALID_STATE);
        }

        // Small updates only fill the staging buffer
        if self.used + data.len() <= self.alg.block_size() {
            self.buf.0[self.used..][..data.len()].copy_from_slice(data);
            self.used += data.len();
            return Ok(());
        }

        let mut guard = se.lock(EngineId::Sha)?;
        match self.absorb(&mut guard, data, false) {
            Ok(_) => Ok(()),
            Err(err) => {
                self.close();
                Err(err)
            }
        }
    }

    /// Finalize the digest operation
    ///
    /// # Arguments
    ///
    /// * `se` - Security engine
    /// * `tail` - Last data of the message, may be empty
    /// * `digest` - Receives the digest
    ///
    /// # Returns
    ///
    /// Digest size in bytes
    pub fn finalize<H: SeHal>(
        &mut self,
        se: &mut SecurityEngine<H>,
        tail: &[u8],
        digest: &mut [u8],
    ) -> SeResult<usize> {
        if self.state == ShaDigestState::Final {
            return Err(SeError::DRIVER_SHA_INVALID_STATE);
        }
        let size = self.alg.digest_size();
        if digest.len() < size {
            return Err(SeError::DRIVER_SHA_OUTPUT_TOO_SMALL);
        }

        let result = se.lock(EngineId::Sha).and_then(|mut guard| {
            let last = self.absorb(&mut guard, tail, true)?;
            self.program_last(&mut guard, &last)?;
            guard.run(sha_reg::PRESET_START, SeError::DRIVER_SHA_ENGINE_FAILURE)?;
            self.read_digest(&mut guard, &mut digest[..size]);
            Ok(size)
        });
        self.close();
        result
    }

    /// Start the final hardware call and return without waiting for it.
    ///
    /// The engine stays locked until [`ShaPending::finish`]. Input
    /// preceding the final block is hashed synchronously.
    pub fn finalize_start<'a, H: SeHal>(
        &'a mut self,
        se: &'a mut SecurityEngine<H>,
        tail: &'a [u8],
    ) -> SeResult<ShaPending<'a, H>> {
        if self.state == ShaDigestState::Final {
            return Err(SeError::DRIVER_SHA_INVALID_STATE);
        }
        let mut guard = se.lock(EngineId::Sha)?;
        let started = self
            .absorb(&mut guard, tail, true)
            .and_then(|last| self.program_last(&mut guard, &last))
            .and_then(|_| {
                guard.start(sha_reg::PRESET_START, SeError::DRIVER_SHA_ENGINE_FAILURE)
            })
            .map(|_| PendingOp::new(guard, SeError::DRIVER_SHA_ENGINE_FAILURE));
        match started {
            Ok(op) => {
                self.state = ShaDigestState::Final;
                Ok(ShaPending { op, digest_op: self })
            }
            Err(err) => {
                self.close();
                Err(err)
            }
        }
    }

    /// Discard all buffered input and intermediate state. The operation
    /// starts over as a new digest.
    pub fn reset(&mut self) {
        self.zeroize_state();
        self.state = ShaDigestState::Init;
    }

    /// Hash everything except the final hardware call. On return the
    /// staging buffer holds fewer than a block, or the final call reads
    /// the remaining caller input in place.
    fn absorb<'d, H: SeHal>(
        &mut self,
        guard: &mut EngineGuard<'_, H>,
        mut data: &'d [u8],
        is_last: bool,
    ) -> SeResult<LastChunk<'d>> {
        let block_size = self.alg.block_size();
        if self.used > block_size {
            return Err(SeError::DRIVER_SHA_BUFFER_OVERFLOW);
        }

        if self.used > 0 {
            let take = (block_size - self.used).min(data.len());
            self.buf.0[self.used..][..take].copy_from_slice(&data[..take]);
            self.used += take;
            data = &data[take..];
            if self.used < block_size {
                return Ok(LastChunk::Gather);
            }
            self.flush_gather(guard)?;
        }

        while data.len() >= block_size {
            let run = guard.hal().contiguous_len(data.as_ptr(), data.len());
            let chunk = run - run % block_size;
            if chunk == 0 {
                // Block straddles a discontinuity
                self.buf.0[..block_size].copy_from_slice(&data[..block_size]);
                self.used = block_size;
                self.flush_gather(guard)?;
                data = &data[block_size..];
                continue;
            }
            if is_last && chunk == data.len() {
                return Ok(LastChunk::Direct(data));
            }
            self.hash_chunk(guard, &data[..chunk])?;
            data = &data[chunk..];
        }

        self.buf.0[..data.len()].copy_from_slice(data);
        self.used = data.len();
        Ok(LastChunk::Gather)
    }

    /// Hash a full staging buffer. Never the final call.
    fn flush_gather<H: SeHal>(&mut self, guard: &mut EngineGuard<'_, H>) -> SeResult<()> {
        let block_size = self.alg.block_size();
        if self.used != block_size {
            return Err(SeError::DRIVER_SHA_BUFFER_OVERFLOW);
        }
        let ptr = self.buf.0.as_ptr();
        self.program(guard, ptr, block_size, false)?;
        guard.run(sha_reg::PRESET_START, SeError::DRIVER_SHA_ENGINE_FAILURE)?;
        self.save_hash(guard, block_size);
        self.buf.0.fill(0);
        self.used = 0;
        Ok(())
    }

    /// Hash whole blocks of caller input in place. Never the final call.
    fn hash_chunk<H: SeHal>(&mut self, guard: &mut EngineGuard<'_, H>, chunk: &[u8]) -> SeResult<()> {
        self.program(guard, chunk.as_ptr(), chunk.len(), false)?;
        guard.run(sha_reg::PRESET_START, SeError::DRIVER_SHA_ENGINE_FAILURE)?;
        self.save_hash(guard, chunk.len());
        Ok(())
    }

    fn program_last<H: SeHal>(
        &mut self,
        guard: &mut EngineGuard<'_, H>,
        last: &LastChunk,
    ) -> SeResult<()> {
        match last {
            LastChunk::Gather => {
                let ptr = self.buf.0.as_ptr();
                self.program(guard, ptr, self.used, true)
            }
            LastChunk::Direct(data) => self.program(guard, data.as_ptr(), data.len(), true),
        }
    }

    /// Program one hardware call over `len` bytes at `ptr`.
    fn program<H: SeHal>(
        &mut self,
        guard: &mut EngineGuard<'_, H>,
        ptr: *const u8,
        len: usize,
        last: bool,
    ) -> SeResult<()> {
        if len == 0 && !last {
            return Err(SeError::DRIVER_SHA_INVALID_STATE);
        }
        let in_len = u32::try_from(len).map_err(|_| SeError::DRIVER_SHA_BUFFER_OVERFLOW)?;

        let mut config = ShaConfig(0);
        config.set_alg(self.alg.hw_alg());
        config.set_init_hash(self.state == ShaDigestState::Init);
        config.set_last(last);
        if self.state != ShaDigestState::Init {
            self.hash.write_regs(guard, sha_reg::HASH_RESULT);
        }

        guard.hal().flush_cache(ptr, len);
        let addr = guard.hal().phys_addr(ptr);
        guard.write(sha_reg::IN_ADDR_LO, addr as u32);
        guard.write(sha_reg::IN_ADDR_HI, (addr >> 32) as u32);
        guard.write(sha_reg::IN_LEN, in_len);
        if last {
            let total = self.processed + len as u64;
            guard.write(sha_reg::MSG_LEN_LO, total as u32);
            guard.write(sha_reg::MSG_LEN_HI, (total >> 32) as u32);
        }
        guard.write(sha_reg::CONFIG, config.0);
        Ok(())
    }

    fn save_hash<H: SeHal>(&mut self, guard: &mut EngineGuard<'_, H>, len: usize) {
        self.hash = Array4x16::read_regs(guard, sha_reg::HASH_RESULT);
        self.processed += len as u64;
        self.state = ShaDigestState::Pending;
    }

    fn read_digest<H: SeHal>(&self, guard: &mut EngineGuard<'_, H>, digest: &mut [u8]) {
        let mut hash = Array4x16::read_regs(guard, sha_reg::HASH_RESULT);
        let mut bytes: [u8; SHA_MAX_DIGEST_SIZE] = hash.into();
        digest.copy_from_slice(&bytes[..digest.len()]);
        bytes.zeroize();
        hash.zeroize();
    }

    fn close(&mut self) {
        self.zeroize_state();
        self.state = ShaDigestState::Final;
    }

    fn zeroize_state(&mut self) {
        self.buf.0.zeroize();
        self.hash.zeroize();
        self.used = 0;
        self.processed = 0;
    }
}

impl Drop for ShaDigestOp {
    fn drop(&mut self) {
        self.zeroize_state();
    }
}

/// Final digest call in flight
pub struct ShaPending<'a, H: SeHal> {
    op: PendingOp<'a, H>,
    digest_op: &'a mut ShaDigestOp,
}

impl<'a, H: SeHal> ShaPending<'a, H> {
    /// Non-blocking completion check
    pub fn poll(&mut self) -> bool {
        self.op.poll()
    }

    /// Wait for completion, read the digest and release the engine.
    pub fn finish(self) -> SeResult<ShaDigest> {
        let digest_op = self.digest_op;
        let mut digest = ShaDigest {
            bytes: [0; SHA_MAX_DIGEST_SIZE],
            len: digest_op.alg.digest_size(),
        };
        let result = self.op.finish().map(|mut guard| {
            digest_op.read_digest(&mut guard, &mut digest.bytes[..digest.len]);
        });
        digest_op.zeroize_state();
        result.map(|_| digest)
    }
}

/// Calculate the digest of `data` in one call.
///
/// # Returns
///
/// Digest size in bytes
pub fn digest<H: SeHal>(
    se: &mut SecurityEngine<H>,
    alg: ShaAlg,
    data: &[u8],
    out: &mut [u8],
) -> SeResult<usize> {
    ShaDigestOp::new(alg).finalize(se, data, out)
}
