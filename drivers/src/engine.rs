/*++

Licensed under the Apache-2.0 license.

File Name:

    engine.rs

Abstract:

    File contains the security engine context, the engine mutex guard and
    the pending asynchronous operation token.

--*/

use crate::hal::{EngineId, SeHal};
use crate::key_slot::{KeySlot, KeySlotArena, KeySlotId, SlotKind};
use crate::reg::aes as aes_reg;
use crate::{cprintln, SeError, SeResult};

/// Number of AES keyslots
pub const AES_KEYSLOT_COUNT: usize = 16;

/// Number of PKA keyslots
pub const PKA_KEYSLOT_COUNT: usize = 4;

/// Security engine context.
///
/// Owns the platform interface and tracks which keyslots are checked out.
pub struct SecurityEngine<H: SeHal> {
    hal: H,
    aes_slots: KeySlotArena<AES_KEYSLOT_COUNT>,
    pka_slots: KeySlotArena<PKA_KEYSLOT_COUNT>,
}

impl<H: SeHal> SecurityEngine<H> {
    pub fn new(hal: H) -> Self {
        Self {
            hal,
            aes_slots: KeySlotArena::new(SlotKind::Aes),
            pka_slots: KeySlotArena::new(SlotKind::Pka),
        }
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    pub fn into_hal(self) -> H {
        self.hal
    }

    /// Acquire the mutex of `engine`. The mutex is released when the
    /// returned guard is dropped.
    pub(crate) fn lock(&mut self, engine: EngineId) -> SeResult<EngineGuard<'_, H>> {
        EngineGuard::acquire(&mut self.hal, engine)
    }

    /// Check out a free AES keyslot.
    pub fn alloc_aes_keyslot(&mut self) -> SeResult<KeySlot> {
        self.aes_slots.checkout()
    }

    /// Check out a free PKA keyslot.
    pub fn alloc_pka_keyslot(&mut self) -> SeResult<KeySlot> {
        self.pka_slots.checkout()
    }

    /// Load `key` (16, 24 or 32 bytes) into an AES keyslot.
    pub fn load_aes_keyslot(&mut self, slot: &KeySlot, key: &[u8]) -> SeResult<()> {
        self.aes_slots.check(slot)?;
        let key_size = crate::aes::key_size_field(key.len())?;
        let mut words = [0u32; aes_reg::KEY_WORDS];
        crate::aes::pack_key(key, &mut words);

        let mut guard = self.lock(EngineId::Aes)?;
        let mut ctrl = aes_reg::KeySlotCtrl(0);
        ctrl.set_slot(slot.index() as u32);
        ctrl.set_key_size(key_size);
        guard.write(aes_reg::KEYSLOT_CTRL, ctrl.0);
        crate::array::Array4x8::from(words).write_regs(&mut guard, aes_reg::KEYSLOT_KEY);
        let result = guard.run(
            aes_reg::PRESET_KEYSLOT_WRITE,
            SeError::DRIVER_KEYSLOT_WRITE_FAILURE,
        );
        crate::array::Array4x8::default().write_regs(&mut guard, aes_reg::KEYSLOT_KEY);
        result
    }

    /// Clear an AES keyslot and return it to the free pool. The slot is
    /// returned to the pool even if the hardware clear fails.
    pub fn free_aes_keyslot(&mut self, slot: KeySlot) -> SeResult<()> {
        self.aes_slots.check(&slot)?;
        let result = self.lock(EngineId::Aes).and_then(|mut guard| {
            let mut ctrl = aes_reg::KeySlotCtrl(0);
            ctrl.set_slot(slot.index() as u32);
            guard.write(aes_reg::KEYSLOT_CTRL, ctrl.0);
            guard.run(
                aes_reg::PRESET_KEYSLOT_CLEAR,
                SeError::DRIVER_KEYSLOT_CLEAR_FAILURE,
            )
        });
        self.aes_slots.checkin(slot)?;
        result
    }

    /// Clear all four fields of a PKA keyslot and return it to the free
    /// pool.
    pub fn free_pka_keyslot(&mut self, slot: KeySlot) -> SeResult<()> {
        self.pka_slots.check(&slot)?;
        let result = self.lock(EngineId::Pka).and_then(|mut guard| {
            crate::rsa::clear_pka_keyslot(&mut guard, slot.index())
        });
        self.pka_slots.checkin(slot)?;
        result
    }

    pub(crate) fn check_pka_keyslot_id(&self, id: KeySlotId) -> SeResult<()> {
        self.pka_slots.check_id(id)
    }

    pub(crate) fn check_aes_keyslot_id(&self, id: KeySlotId) -> SeResult<()> {
        self.aes_slots.check_id(id)
    }
}

/// Holds the mutex of one engine for its lifetime.
pub struct EngineGuard<'a, H: SeHal> {
    hal: &'a mut H,
    engine: EngineId,
}

impl<'a, H: SeHal> EngineGuard<'a, H> {
    fn acquire(hal: &'a mut H, engine: EngineId) -> SeResult<Self> {
        hal.acquire(engine)?;
        Ok(Self { hal, engine })
    }

    pub fn engine(&self) -> EngineId {
        self.engine
    }

    pub(crate) fn hal(&mut self) -> &mut H {
        self.hal
    }

    pub(crate) fn write(&mut self, offset: u32, value: u32) {
        self.hal.write_reg(self.engine, offset, value);
    }

    pub(crate) fn read(&mut self, offset: u32) -> u32 {
        self.hal.read_reg(self.engine, offset)
    }

    /// Start `preset`. An engine that is still busy means an earlier
    /// asynchronous operation was never finished.
    pub(crate) fn start(&mut self, preset: u32, failure: SeError) -> SeResult<()> {
        if !self.hal.is_idle(self.engine) {
            return Err(SeError::ENGINE_BUSY);
        }
        self.hal
            .start_operation(self.engine, preset)
            .map_err(|_| failure)
    }

    pub(crate) fn wait(&mut self, failure: SeError) -> SeResult<()> {
        self.hal.wait_until_idle(self.engine).map_err(|_| failure)
    }

    /// Start `preset` and block until it completes.
    pub(crate) fn run(&mut self, preset: u32, failure: SeError) -> SeResult<()> {
        self.start(preset, failure)?;
        self.wait(failure)
    }

    /// Zero `words` registers starting at `offset`.
    pub(crate) fn clear_regs(&mut self, offset: u32, words: usize) {
        for i in 0..words as u32 {
            self.write(offset + i * 4, 0);
        }
    }
}

impl<H: SeHal> Drop for EngineGuard<'_, H> {
    fn drop(&mut self) {
        self.hal.release(self.engine);
    }
}

/// Hardware operation started in asynchronous mode.
///
/// The engine mutex stays held until [`PendingOp::finish`]. Dropping an
/// unfinished operation is a caller bug: the drop waits for the
/// hardware, runs the cleanup hook, releases the mutex and panics.
pub struct PendingOp<'a, H: SeHal> {
    guard: Option<EngineGuard<'a, H>>,
    failure: SeError,
    cleanup: Option<fn(&mut EngineGuard<'_, H>)>,
}

impl<'a, H: SeHal> PendingOp<'a, H> {
    /// Take over `guard` after its engine was started.
    pub(crate) fn new(guard: EngineGuard<'a, H>, failure: SeError) -> Self {
        Self {
            guard: Some(guard),
            failure,
            cleanup: None,
        }
    }

    /// Run `cleanup` before the mutex is released on a failed or
    /// abandoned operation.
    pub(crate) fn with_cleanup(mut self, cleanup: fn(&mut EngineGuard<'_, H>)) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Non-blocking completion check. Kicks the watchdog.
    pub fn poll(&mut self) -> bool {
        match self.guard.as_mut() {
            Some(guard) => {
                let engine = guard.engine;
                guard.hal.kick_watchdog(engine);
                guard.hal.is_idle(engine)
            }
            None => true,
        }
    }

    /// Block until the hardware completes. Returns the guard so the caller
    /// can read results before the mutex is released.
    pub(crate) fn finish(mut self) -> SeResult<EngineGuard<'a, H>> {
        let failure = self.failure;
        let mut guard = self.guard.take().ok_or(SeError::ENGINE_MUTEX_NOT_HELD)?;
        if let Err(err) = guard.wait(failure) {
            if let Some(cleanup) = self.cleanup {
                cleanup(&mut guard);
            }
            return Err(err);
        }
        Ok(guard)
    }
}

impl<H: SeHal> Drop for PendingOp<'_, H> {
    fn drop(&mut self) {
        if let Some(mut guard) = self.guard.take() {
            let engine = guard.engine;
            let _ = guard.hal.wait_until_idle(engine);
            if let Some(cleanup) = self.cleanup {
                cleanup(&mut guard);
            }
            drop(guard);
            cprintln!("[se] {} operation dropped without finish", engine);

            #[cfg(any(feature = "std", test))]
            if std::thread::panicking() {
                return;
            }
            panic!("asynchronous engine operation dropped without finish");
        }
    }
}
