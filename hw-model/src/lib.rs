/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains a software model of the security engine implementing
    the platform interfaces consumed by the drivers. Used by tests and
    known answer test runs on the host.

--*/

mod aes;
mod memory;
mod pka;
mod regs;
mod sha;

use std::cell::RefCell;
use std::rc::Rc;

use memory::{Dma, ScratchPool};
use regs::RegFile;
use se_drivers::reg::{aes as aes_reg, pka as pka_reg};
use se_drivers::{
    EngineId, ScratchAlloc, ScratchTag, SeError, SeMemory, SeMutex, SeRegs, SeResult,
};

pub use memory::ScratchBuffer;
pub use sha::ShaCall;

/// Model parameters
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Completion checks an operation stays busy for after being started
    pub busy_latency: u32,

    /// Every multiple of this size is a physical discontinuity
    pub page_size: Option<usize>,

    /// Scratch memory available to [`ScratchAlloc`]
    pub scratch_capacity: usize,

    /// Print every register access
    pub trace: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            busy_latency: 0,
            page_size: None,
            scratch_capacity: 64 * 1024,
            trace: false,
        }
    }
}

#[derive(Default)]
struct EngineState {
    regs: RegFile,
    mutex_held: bool,
    contended: bool,
    pending: Option<u32>,
    busy_polls: u32,
    outcome: Option<SeError>,
    fail_next: bool,
    acquisitions: usize,
    releases: usize,
    watchdog_kicks: usize,
    operations: usize,
    reg_writes: usize,
}

struct ModelState {
    config: ModelConfig,
    engines: [EngineState; 3],
    sha: sha::ShaUnit,
    aes: aes::AesUnit,
    pka: pka::PkaUnit,
    scratch: ScratchPool,
    scratch_returns: usize,
}

impl ModelState {
    fn dma(&self) -> Dma {
        Dma {
            page_size: self.config.page_size,
        }
    }

    /// Run the operation pending on `engine` and latch its outcome.
    fn complete(&mut self, engine: EngineId) {
        let dma = self.dma();
        let state = &mut self.engines[engine.index()];
        let Some(preset) = state.pending.take() else {
            return;
        };
        state.busy_polls = 0;
        let result = if state.fail_next {
            state.fail_next = false;
            if engine == EngineId::Pka {
                state
                    .regs
                    .write(pka_reg::FLAGS, pka_reg::PkaFlags::ERROR.bits());
            }
            Err(SeError::ENGINE_OPERATION_FAILED)
        } else {
            match engine {
                EngineId::Sha => self.sha.execute(&mut state.regs, &dma, preset),
                EngineId::Aes => self.aes.execute(&mut state.regs, &dma, preset),
                EngineId::Pka => self.pka.execute(&mut state.regs, preset),
            }
        };
        if self.config.trace {
            println!("[model] {engine:?} preset {preset:#x} -> {result:?}");
        }
        state.outcome = result.err();
    }
}

/// Security engine model.
///
/// Clones share the same engine, so a test can keep a handle for
/// inspection after handing one to a [`se_drivers::SecurityEngine`].
/// Operations execute when they complete: on the completion check that
/// exhausts the configured latency, or on a blocking wait.
#[derive(Clone)]
pub struct ModelHal {
    state: Rc<RefCell<ModelState>>,
}

impl Default for ModelHal {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl ModelHal {
    pub fn new(config: ModelConfig) -> Self {
        let scratch = ScratchPool::new(config.scratch_capacity);
        Self {
            state: Rc::new(RefCell::new(ModelState {
                config,
                engines: Default::default(),
                sha: Default::default(),
                aes: Default::default(),
                pka: Default::default(),
                scratch,
                scratch_returns: 0,
            })),
        }
    }

    /// Make the next operation started on `engine` fail.
    pub fn fail_next_operation(&self, engine: EngineId) {
        self.state.borrow_mut().engines[engine.index()].fail_next = true;
    }

    /// Simulate another agent holding the mutex of `engine`.
    pub fn set_contended(&self, engine: EngineId, contended: bool) {
        self.state.borrow_mut().engines[engine.index()].contended = contended;
    }

    pub fn mutex_held(&self, engine: EngineId) -> bool {
        self.state.borrow().engines[engine.index()].mutex_held
    }

    pub fn acquisitions(&self, engine: EngineId) -> usize {
        self.state.borrow().engines[engine.index()].acquisitions
    }

    pub fn releases(&self, engine: EngineId) -> usize {
        self.state.borrow().engines[engine.index()].releases
    }

    pub fn watchdog_kicks(&self, engine: EngineId) -> usize {
        self.state.borrow().engines[engine.index()].watchdog_kicks
    }

    /// Operations started on `engine`, including keyslot presets.
    pub fn operations(&self, engine: EngineId) -> usize {
        self.state.borrow().engines[engine.index()].operations
    }

    /// Register writes issued to `engine`.
    pub fn reg_writes(&self, engine: EngineId) -> usize {
        self.state.borrow().engines[engine.index()].reg_writes
    }

    /// Current value of a register, without side effects.
    pub fn reg(&self, engine: EngineId, offset: u32) -> u32 {
        self.state.borrow().engines[engine.index()].regs.read(offset)
    }

    /// SHA engine calls since the last [`Self::clear_sha_calls`].
    pub fn sha_calls(&self) -> Vec<ShaCall> {
        self.state.borrow().sha.calls.clone()
    }

    pub fn clear_sha_calls(&self) {
        self.state.borrow_mut().sha.calls.clear();
    }

    /// True if no key material is left in the AES key, counter and GHASH
    /// registers.
    pub fn aes_key_regs_clear(&self) -> bool {
        let state = self.state.borrow();
        let regs = &state.engines[EngineId::Aes.index()].regs;
        regs.is_zero(aes_reg::KEY, aes_reg::KEY_WORDS)
            && regs.is_zero(aes_reg::IV, 4)
            && regs.is_zero(aes_reg::GHASH, 4)
    }

    pub fn aes_keyslot_loaded(&self, slot: usize) -> bool {
        self.state.borrow().aes.keyslots[slot].is_some()
    }

    pub fn pka_keyslot_is_clear(&self, slot: usize) -> bool {
        self.state.borrow().pka.keyslot_is_clear(slot)
    }

    /// True if the PKA exponent register holds no data.
    pub fn pka_exponent_clear(&self) -> bool {
        let state = self.state.borrow();
        let regs = &state.engines[EngineId::Pka.index()].regs;
        regs.is_zero(
            pka_reg::operand_reg(pka_reg::Bank::D, 2),
            pka_reg::REG_WORDS,
        )
    }

    pub fn pka_keyslot_commits(&self) -> usize {
        self.state.borrow().pka.commits
    }

    /// Scratch bytes currently allocated.
    pub fn scratch_in_use(&self) -> usize {
        self.state.borrow().scratch.in_use()
    }

    /// Buffers handed back through [`ScratchAlloc::put_buffer`]. Buffers
    /// that are merely dropped free their memory but are not counted.
    pub fn scratch_returns(&self) -> usize {
        self.state.borrow().scratch_returns
    }
}

impl SeRegs for ModelHal {
    fn write_reg(&mut self, engine: EngineId, offset: u32, value: u32) {
        let mut state = self.state.borrow_mut();
        if state.config.trace {
            println!("[model] {engine:?} write {offset:#06x} = {value:#010x}");
        }
        let state = &mut *state;
        state.engines[engine.index()].reg_writes += 1;
        let regs = &mut state.engines[engine.index()].regs;
        if engine == EngineId::Pka && offset == pka_reg::KEYSLOT_DATA {
            state.pka.write_keyslot_data(regs, value);
        } else {
            regs.write(offset, value);
        }
    }

    fn read_reg(&mut self, engine: EngineId, offset: u32) -> u32 {
        let state = self.state.borrow();
        let value = state.engines[engine.index()].regs.read(offset);
        if state.config.trace {
            println!("[model] {engine:?} read {offset:#06x} = {value:#010x}");
        }
        value
    }

    fn start_operation(&mut self, engine: EngineId, preset: u32) -> SeResult<()> {
        let mut state = self.state.borrow_mut();
        let latency = state.config.busy_latency;
        let engine_state = &mut state.engines[engine.index()];
        if !engine_state.mutex_held {
            return Err(SeError::ENGINE_MUTEX_NOT_HELD);
        }
        if engine_state.pending.is_some() {
            return Err(SeError::ENGINE_BUSY);
        }
        engine_state.operations += 1;
        engine_state.outcome = None;
        engine_state.pending = Some(preset);
        engine_state.busy_polls = latency;
        if latency == 0 {
            state.complete(engine);
        }
        Ok(())
    }

    fn is_idle(&mut self, engine: EngineId) -> bool {
        let mut state = self.state.borrow_mut();
        let engine_state = &mut state.engines[engine.index()];
        if engine_state.pending.is_none() {
            return true;
        }
        if engine_state.busy_polls > 0 {
            engine_state.busy_polls -= 1;
            return false;
        }
        state.complete(engine);
        true
    }

    fn wait_until_idle(&mut self, engine: EngineId) -> SeResult<()> {
        let mut state = self.state.borrow_mut();
        state.complete(engine);
        match state.engines[engine.index()].outcome.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl SeMutex for ModelHal {
    fn acquire(&mut self, engine: EngineId) -> SeResult<()> {
        let mut state = self.state.borrow_mut();
        let engine_state = &mut state.engines[engine.index()];
        if engine_state.contended || engine_state.mutex_held {
            return Err(SeError::ENGINE_BUSY);
        }
        engine_state.mutex_held = true;
        engine_state.acquisitions += 1;
        Ok(())
    }

    fn release(&mut self, engine: EngineId) {
        let mut state = self.state.borrow_mut();
        let engine_state = &mut state.engines[engine.index()];
        if !engine_state.mutex_held {
            println!("[model] {engine:?} mutex released without being held");
        }
        engine_state.mutex_held = false;
        engine_state.releases += 1;
    }

    fn kick_watchdog(&mut self, engine: EngineId) {
        self.state.borrow_mut().engines[engine.index()].watchdog_kicks += 1;
    }
}

impl SeMemory for ModelHal {
    fn phys_addr(&self, ptr: *const u8) -> u64 {
        ptr as u64
    }

    fn contiguous_len(&self, ptr: *const u8, len: usize) -> usize {
        self.state.borrow().dma().contiguous_len(ptr as u64, len)
    }

    fn flush_cache(&mut self, _ptr: *const u8, _len: usize) {}

    fn invalidate_cache(&mut self, _ptr: *const u8, _len: usize) {}
}

impl ScratchAlloc for ModelHal {
    type Buffer = ScratchBuffer;

    fn get_buffer(
        &mut self,
        tag: ScratchTag,
        alignment: usize,
        size: usize,
    ) -> SeResult<ScratchBuffer> {
        self.state.borrow().scratch.alloc(tag, alignment, size)
    }

    fn put_buffer(&mut self, buffer: ScratchBuffer) {
        self.state.borrow_mut().scratch_returns += 1;
        drop(buffer);
    }
}
