/*++

Licensed under the Apache-2.0 license.

File Name:

    hal.rs

Abstract:

    File contains the interfaces the drivers consume from the platform:
    engine registers, the engine mutex and its watchdog, memory
    translation and cache maintenance, and scratch memory allocation.

--*/

use crate::SeResult;

/// Hardware units sharing the security engine.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EngineId {
    /// SHA-2 hash engine
    Sha = 0,

    /// AES block cipher engine
    Aes = 1,

    /// Public key accelerator (big number modular arithmetic)
    Pka = 2,
}

impl EngineId {
    pub const ALL: [EngineId; 3] = [EngineId::Sha, EngineId::Aes, EngineId::Pka];

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl ufmt::uDisplay for EngineId {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        match self {
            EngineId::Sha => f.write_str("SHA"),
            EngineId::Aes => f.write_str("AES"),
            EngineId::Pka => f.write_str("PKA"),
        }
    }
}

/// Register access to the engine.
pub trait SeRegs {
    /// Write a 32-bit register at `offset` from the engine's register base.
    fn write_reg(&mut self, engine: EngineId, offset: u32, value: u32);

    /// Read a 32-bit register at `offset` from the engine's register base.
    fn read_reg(&mut self, engine: EngineId, offset: u32) -> u32;

    /// Kick off the operation described by `preset`. Fails if the engine
    /// is still running a previous operation.
    fn start_operation(&mut self, engine: EngineId, preset: u32) -> SeResult<()>;

    /// Non-blocking completion check.
    fn is_idle(&mut self, engine: EngineId) -> bool;

    /// Block until the engine is idle. Reports the outcome of the last
    /// started operation.
    fn wait_until_idle(&mut self, engine: EngineId) -> SeResult<()>;
}

/// System-wide engine mutex with watchdog.
///
/// Acquiring the mutex starts the watchdog. The holder must either kick
/// the watchdog (poll) or release the mutex before the window expires.
pub trait SeMutex {
    fn acquire(&mut self, engine: EngineId) -> SeResult<()>;

    fn release(&mut self, engine: EngineId);

    fn kick_watchdog(&mut self, engine: EngineId);
}

/// Memory translation and cache maintenance for engine DMA.
pub trait SeMemory {
    /// Physical (bus) address of `ptr`.
    fn phys_addr(&self, ptr: *const u8) -> u64;

    /// Number of bytes starting at `ptr`, at most `len`, that are
    /// physically contiguous.
    fn contiguous_len(&self, ptr: *const u8, len: usize) -> usize;

    /// Write back CPU caches before the engine reads `len` bytes at `ptr`.
    fn flush_cache(&mut self, ptr: *const u8, len: usize);

    /// Discard CPU caches after the engine wrote `len` bytes at `ptr`.
    fn invalidate_cache(&mut self, ptr: *const u8, len: usize);
}

/// Owner tag for scratch allocations.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ScratchTag {
    CcmWork,
}

/// Scratch ("context") memory allocator.
pub trait ScratchAlloc {
    type Buffer: AsRef<[u8]> + AsMut<[u8]>;

    /// Allocate `size` bytes aligned to `alignment`. Fails with a
    /// [`crate::ErrorKind::NoMemory`] class error when exhausted.
    fn get_buffer(&mut self, tag: ScratchTag, alignment: usize, size: usize)
        -> SeResult<Self::Buffer>;

    fn put_buffer(&mut self, buffer: Self::Buffer);
}

/// Everything a [`crate::SecurityEngine`] needs from the platform.
pub trait SeHal: SeRegs + SeMutex + SeMemory + ScratchAlloc {}

impl<T: SeRegs + SeMutex + SeMemory + ScratchAlloc> SeHal for T {}
