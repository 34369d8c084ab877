/*++

Licensed under the Apache-2.0 license.

File Name:

    rsa.rs

Abstract:

    File contains API for RSA modular exponentiation on the public key
    accelerator, including Montgomery constant handling and keyslot or
    register key loading.

--*/

use crate::engine::{EngineGuard, SecurityEngine};
use crate::hal::SeHal;
use crate::key_slot::{KeySlot, KeySlotId, SlotKind};
use crate::operand::{self, Endian, Operand, OperandMut, WORD_SIZE};
use crate::pka::{
    PkaContext, PkaMode, PkaPrimitive, REG_A0, REG_EXPONENT, REG_MODULUS, REG_M_PRIME,
    REG_R_SQUARED,
};
use crate::printer::HexU32;
use crate::reg::pka::{self as pka_reg, KeySlotAddr};
use crate::{cprintln, SeError, SeResult};
use zeroize::Zeroize;

/// Largest RSA operand in bytes
pub const RSA_MAX_BYTES: usize = 512;

/// Supported RSA key sizes
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RsaKeySize {
    Rsa512,
    Rsa768,
    Rsa1024,
    Rsa1536,
    Rsa2048,
    Rsa3072,
    Rsa4096,
}

impl RsaKeySize {
    pub const ALL: [RsaKeySize; 7] = [
        RsaKeySize::Rsa512,
        RsaKeySize::Rsa768,
        RsaKeySize::Rsa1024,
        RsaKeySize::Rsa1536,
        RsaKeySize::Rsa2048,
        RsaKeySize::Rsa3072,
        RsaKeySize::Rsa4096,
    ];

    /// # Errors
    ///
    /// `DRIVER_RSA_INVALID_KEY_SIZE` for anything other than 512, 768,
    /// 1024, 1536, 2048, 3072 or 4096 bits.
    pub fn from_bits(bits: u32) -> SeResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|size| size.bits() == bits)
            .ok_or(SeError::DRIVER_RSA_INVALID_KEY_SIZE)
    }

    pub const fn bits(self) -> u32 {
        self.mode().bits()
    }

    pub const fn bytes(self) -> usize {
        self.mode().bytes()
    }

    pub(crate) const fn mode(self) -> PkaMode {
        match self {
            RsaKeySize::Rsa512 => PkaMode::Bits512,
            RsaKeySize::Rsa768 => PkaMode::Bits768,
            RsaKeySize::Rsa1024 => PkaMode::Bits1024,
            RsaKeySize::Rsa1536 => PkaMode::Bits1536,
            RsaKeySize::Rsa2048 => PkaMode::Bits2048,
            RsaKeySize::Rsa3072 => PkaMode::Bits3072,
            RsaKeySize::Rsa4096 => PkaMode::Bits4096,
        }
    }
}

/// RSA key material as supplied by the caller
#[derive(Debug, Copy, Clone)]
pub struct RsaKey<'a> {
    /// Modulus, exactly the key size
    pub modulus: &'a [u8],

    /// Public exponent; may be shorter than the modulus
    pub public_exponent: &'a [u8],

    /// Private exponent, when the caller holds the private key
    pub private_exponent: Option<&'a [u8]>,

    /// Byte order of all three fields
    pub endian: Endian,
}

/// Exponent selection
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RsaExponent {
    Public,
    Private,
}

/// How the key reaches the engine
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RsaKeyLoad {
    /// Exponent, modulus and Montgomery constants written to the operand
    /// registers for one operation
    Direct,

    /// Key material written to a keyslot before the operation. The slot
    /// is cleared afterwards unless `retain` is set.
    KeySlot { slot: KeySlotId, retain: bool },

    /// Keyslot already holding the key from an earlier retained
    /// operation. No key material is supplied.
    ResidentKeySlot { slot: KeySlotId, retain: bool },
}

impl RsaKeyLoad {
    pub fn keyslot(slot: &KeySlot, retain: bool) -> Self {
        RsaKeyLoad::KeySlot {
            slot: slot.id(),
            retain,
        }
    }

    pub fn resident_keyslot(slot: &KeySlot, retain: bool) -> Self {
        RsaKeyLoad::ResidentKeySlot {
            slot: slot.id(),
            retain,
        }
    }
}

/// Montgomery constants of one modulus.
#[derive(Clone, Zeroize)]
pub struct MontgomeryConstants {
    m_prime: [u8; RSA_MAX_BYTES],
    r_squared: [u8; RSA_MAX_BYTES],
    len: usize,
    #[zeroize(skip)]
    endian: Endian,
    validated: bool,
}

impl MontgomeryConstants {
    /// Wrap constants supplied out of band. With `validated` set, sessions
    /// use them without recomputation.
    pub fn new(m_prime: &[u8], r_squared: &[u8], endian: Endian, validated: bool) -> SeResult<Self> {
        if m_prime.len() != r_squared.len()
            || m_prime.len() > RSA_MAX_BYTES
            || m_prime.len() % WORD_SIZE != 0
        {
            return Err(SeError::DRIVER_RSA_INVALID_MONTGOMERY);
        }
        let mut result = Self {
            m_prime: [0; RSA_MAX_BYTES],
            r_squared: [0; RSA_MAX_BYTES],
            len: m_prime.len(),
            endian,
            validated,
        };
        result.m_prime[..m_prime.len()].copy_from_slice(m_prime);
        result.r_squared[..r_squared.len()].copy_from_slice(r_squared);
        Ok(result)
    }

    /// M' = -m^-1 mod R
    pub fn m_prime(&self) -> &[u8] {
        &self.m_prime[..self.len]
    }

    /// R^2 mod m
    pub fn r_squared(&self) -> &[u8] {
        &self.r_squared[..self.len]
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    fn read_from_engine<H: SeHal>(ctx: &mut PkaContext<'_, H>, mode: PkaMode) -> SeResult<Self> {
        let mut result = Self {
            m_prime: [0; RSA_MAX_BYTES],
            r_squared: [0; RSA_MAX_BYTES],
            len: mode.bytes(),
            endian: Endian::Big,
            validated: true,
        };
        let mut words = [0u32; pka_reg::REG_WORDS];
        ctx.read_words(REG_M_PRIME, &mut words[..mode.words()]);
        operand::decode(
            &words[..mode.words()],
            &mut OperandMut::be(&mut result.m_prime[..mode.bytes()]),
        )?;
        ctx.read_words(REG_R_SQUARED, &mut words[..mode.words()]);
        operand::decode(
            &words[..mode.words()],
            &mut OperandMut::be(&mut result.r_squared[..mode.bytes()]),
        )?;
        words.zeroize();
        Ok(result)
    }
}

/// RSA session: key size, key material and loading strategy.
pub struct RsaSession {
    size: RsaKeySize,
    load: RsaKeyLoad,
    endian: Endian,
    modulus: [u8; RSA_MAX_BYTES],
    exponent: [u8; RSA_MAX_BYTES],
    exponent_len: usize,
    montgomery: Option<MontgomeryConstants>,
}

impl RsaSession {
    /// # Arguments
    ///
    /// * `bits` - Key size in bits
    /// * `load` - Key loading strategy
    pub fn new(bits: u32, load: RsaKeyLoad) -> SeResult<Self> {
        let size = RsaKeySize::from_bits(bits)?;
        match load {
            RsaKeyLoad::Direct => {}
            RsaKeyLoad::KeySlot { slot, .. } | RsaKeyLoad::ResidentKeySlot { slot, .. } => {
                if !cfg!(feature = "pka-keyslot") {
                    return Err(SeError::DRIVER_RSA_KEYSLOT_DISABLED);
                }
                if slot.kind() != SlotKind::Pka {
                    return Err(SeError::DRIVER_KEYSLOT_INVALID_INDEX);
                }
            }
        }
        Ok(Self {
            size,
            load,
            endian: Endian::Big,
            modulus: [0; RSA_MAX_BYTES],
            exponent: [0; RSA_MAX_BYTES],
            exponent_len: 0,
            montgomery: None,
        })
    }

    pub fn size(&self) -> RsaKeySize {
        self.size
    }

    /// Set the key material.
    ///
    /// The private exponent is used only when the key carries one and
    /// `exponent` asks for it; otherwise the public exponent is used.
    /// The session keeps a copy of the material; the caller may redact
    /// its own buffers afterwards.
    pub fn set_key(&mut self, key: &RsaKey, exponent: RsaExponent) -> SeResult<()> {
        if matches!(self.load, RsaKeyLoad::ResidentKeySlot { .. }) {
            return Err(SeError::DRIVER_RSA_KEY_KIND_CHANGED);
        }
        let size = self.size.bytes();
        let modulus = Operand::new(key.modulus, key.endian);
        if modulus.len() != size {
            return Err(SeError::DRIVER_RSA_INVALID_KEY_SIZE);
        }
        if modulus.is_zero() {
            return Err(SeError::DRIVER_PKA_ZERO_MODULUS);
        }

        let exp = match (exponent, key.private_exponent) {
            (RsaExponent::Private, Some(d)) => d,
            _ => key.public_exponent,
        };
        let exp = Operand::new(exp, key.endian);
        exp.word_len()?;
        if exp.is_empty() || exp.len() > size || exp.is_zero() {
            return Err(SeError::DRIVER_RSA_INVALID_EXPONENT);
        }

        // Montgomery constants belong to the modulus they were computed for
        let current = &self.modulus[..size];
        let modulus_changed = !operand::is_zero(current)
            && (self.endian != key.endian || current != key.modulus);
        if modulus_changed {
            if let Some(constants) = self.montgomery.as_mut() {
                constants.zeroize();
            }
            self.montgomery = None;
        }

        self.zeroize_key();
        self.endian = key.endian;
        self.modulus[..size].copy_from_slice(key.modulus);
        self.exponent[..exp.len()].copy_from_slice(exp.bytes());
        self.exponent_len = exp.len();
        Ok(())
    }

    /// Supply Montgomery constants out of band. Constants that are not
    /// marked validated are recomputed by the engine.
    pub fn set_montgomery(&mut self, constants: MontgomeryConstants) -> SeResult<()> {
        if constants.len != self.size.bytes() {
            return Err(SeError::DRIVER_RSA_INVALID_MONTGOMERY);
        }
        self.montgomery = Some(constants);
        Ok(())
    }

    /// Montgomery constants used by the last operation, for reuse by
    /// later sessions with the same modulus.
    pub fn montgomery(&self) -> Option<&MontgomeryConstants> {
        self.montgomery.as_ref()
    }

    /// Compute `input^exponent mod modulus`.
    ///
    /// # Arguments
    ///
    /// * `se` - Security engine
    /// * `input` - Exactly the key size, in the key's byte order
    /// * `output` - At least the key size; receives the result in the key's
    ///   byte order
    ///
    /// # Returns
    ///
    /// Number of bytes written to `output`.
    pub fn exponentiate<H: SeHal>(
        &mut self,
        se: &mut SecurityEngine<H>,
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<usize> {
        let size = self.size.bytes();
        if input.len() != size {
            return Err(SeError::DRIVER_RSA_INVALID_INPUT_SIZE);
        }
        if output.len() < size {
            return Err(SeError::DRIVER_RSA_OUTPUT_TOO_SMALL);
        }
        match self.load {
            RsaKeyLoad::Direct | RsaKeyLoad::KeySlot { .. } if self.exponent_len == 0 => {
                return Err(SeError::DRIVER_RSA_KEY_NOT_SET);
            }
            RsaKeyLoad::KeySlot { slot, .. } | RsaKeyLoad::ResidentKeySlot { slot, .. } => {
                se.check_pka_keyslot_id(slot)?;
            }
            RsaKeyLoad::Direct => {}
        }

        let mode = self.size.mode();
        let mut result = [0u32; pka_reg::REG_WORDS];

        // Init
        let mut ctx = se.pka()?;
        let status = match self.load {
            RsaKeyLoad::Direct => self.run_direct(&mut ctx, input, &mut result),
            RsaKeyLoad::KeySlot { slot, retain } => {
                let mut lease = PkaKeySlotLease::new(&mut ctx, slot.index(), retain);
                let primary = self.run_keyslot(lease.ctx(), slot.index(), true, input, &mut result);
                merge_cleanup(primary, lease.release())
            }
            RsaKeyLoad::ResidentKeySlot { slot, retain } => {
                let mut lease = PkaKeySlotLease::new(&mut ctx, slot.index(), retain);
                let primary = self.run_keyslot(lease.ctx(), slot.index(), false, input, &mut result);
                merge_cleanup(primary, lease.release())
            }
        };
        // Release
        drop(ctx);

        let status = status.and_then(|_| {
            operand::decode(
                &result[..mode.words()],
                &mut OperandMut::new(&mut output[..size], self.endian),
            )
        });
        result.zeroize();
        status.map(|_| size)
    }

    /// Clear key material and cached constants.
    pub fn reset(&mut self) {
        self.zeroize_key();
        if let Some(constants) = self.montgomery.as_mut() {
            constants.zeroize();
        }
        self.montgomery = None;
    }

    fn run_direct<H: SeHal>(
        &mut self,
        ctx: &mut PkaContext<'_, H>,
        input: &[u8],
        result: &mut [u32],
    ) -> SeResult<()> {
        let mode = self.size.mode();
        self.setup_montgomery(ctx)?;
        ctx.write_operand(REG_EXPONENT, &self.exponent_operand(), mode)?;
        let status = ctx
            .write_operand(REG_A0, &Operand::new(input, self.endian), mode)
            .and_then(|_| ctx.execute(PkaPrimitive::ModExp, mode, None))
            .map(|_| ctx.read_words(REG_A0, &mut result[..mode.words()]));
        ctx.guard()
            .clear_regs(crate::pka::reg_offset(REG_EXPONENT), mode.words());
        status
    }

    fn run_keyslot<H: SeHal>(
        &mut self,
        ctx: &mut PkaContext<'_, H>,
        slot: u8,
        load_material: bool,
        input: &[u8],
        result: &mut [u32],
    ) -> SeResult<()> {
        let mode = self.size.mode();
        if load_material {
            self.setup_montgomery(ctx)?;
            let mut words = [0u32; pka_reg::REG_WORDS];
            let status = self.write_keyslot_material(ctx, slot, &mut words);
            words.zeroize();
            ctx.guard()
                .clear_regs(crate::pka::reg_offset(REG_MODULUS), mode.words());
            status?;
        }
        ctx.write_operand(REG_A0, &Operand::new(input, self.endian), mode)?;
        ctx.execute(PkaPrimitive::ModExp, mode, Some(slot))?;
        ctx.read_words(REG_A0, &mut result[..mode.words()]);
        Ok(())
    }

    /// Load the modulus and make M' and R^2 available in the engine,
    /// computing them unless validated constants were supplied.
    fn setup_montgomery<H: SeHal>(&mut self, ctx: &mut PkaContext<'_, H>) -> SeResult<()> {
        let mode = self.size.mode();
        let modulus = Operand::new(&self.modulus[..self.size.bytes()], self.endian);
        ctx.load_modulus(&modulus, mode)?;
        match self.montgomery.as_ref().filter(|c| c.validated) {
            Some(constants) => {
                ctx.write_operand(
                    REG_M_PRIME,
                    &Operand::new(constants.m_prime(), constants.endian),
                    mode,
                )?;
                ctx.write_operand(
                    REG_R_SQUARED,
                    &Operand::new(constants.r_squared(), constants.endian),
                    mode,
                )?;
            }
            None => {
                ctx.compute_montgomery(mode)?;
                self.montgomery = Some(MontgomeryConstants::read_from_engine(ctx, mode)?);
            }
        }
        Ok(())
    }

    /// Write exponent, modulus, M' and R^2 into the four keyslot fields.
    /// M' and R^2 are taken from the engine registers.
    fn write_keyslot_material<H: SeHal>(
        &self,
        ctx: &mut PkaContext<'_, H>,
        slot: u8,
        words: &mut [u32; pka_reg::REG_WORDS],
    ) -> SeResult<()> {
        let mode = self.size.mode();
        operand::encode(&self.exponent_operand(), pka_reg::REG_WORDS, words)?;
        write_keyslot_field(ctx.guard(), slot, KeySlotField::Exponent, &words[..])?;

        let modulus = Operand::new(&self.modulus[..self.size.bytes()], self.endian);
        operand::encode(&modulus, pka_reg::REG_WORDS, words)?;
        write_keyslot_field(ctx.guard(), slot, KeySlotField::Modulus, &words[..])?;

        words.fill(0);
        ctx.read_words(REG_M_PRIME, &mut words[..mode.words()]);
        write_keyslot_field(ctx.guard(), slot, KeySlotField::MPrime, &words[..])?;

        words.fill(0);
        ctx.read_words(REG_R_SQUARED, &mut words[..mode.words()]);
        write_keyslot_field(ctx.guard(), slot, KeySlotField::RSquared, &words[..])
    }

    fn exponent_operand(&self) -> Operand<'_> {
        Operand::new(&self.exponent[..self.exponent_len], self.endian)
    }

    fn zeroize_key(&mut self) {
        self.modulus.zeroize();
        self.exponent.zeroize();
        self.exponent_len = 0;
    }
}

impl Drop for RsaSession {
    fn drop(&mut self) {
        self.reset();
    }
}

/// PKA keyslot fields
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeySlotField {
    Exponent = 0,
    Modulus = 1,
    MPrime = 2,
    RSquared = 3,
}

impl KeySlotField {
    pub const ALL: [KeySlotField; pka_reg::KEYSLOT_FIELDS] = [
        KeySlotField::Exponent,
        KeySlotField::Modulus,
        KeySlotField::MPrime,
        KeySlotField::RSquared,
    ];
}

fn write_keyslot_field<H: SeHal>(
    guard: &mut EngineGuard<'_, H>,
    slot: u8,
    field: KeySlotField,
    words: &[u32],
) -> SeResult<()> {
    program_keyslot_field(guard, slot, field, words.iter().copied())?;
    guard.run(
        pka_reg::PRESET_KEYSLOT_COMMIT,
        SeError::DRIVER_KEYSLOT_WRITE_FAILURE,
    )
}

fn program_keyslot_field<H: SeHal>(
    guard: &mut EngineGuard<'_, H>,
    slot: u8,
    field: KeySlotField,
    words: impl Iterator<Item = u32>,
) -> SeResult<()> {
    let mut addr = KeySlotAddr(0);
    addr.set_slot(operand::field(u32::from(slot), 2)?);
    addr.set_field(field as u32);
    addr.set_auto_increment(true);
    guard.write(pka_reg::KEYSLOT_ADDR, addr.0);
    for word in words.take(pka_reg::KEYSLOT_FIELD_WORDS) {
        guard.write(pka_reg::KEYSLOT_DATA, word);
    }
    Ok(())
}

/// Overwrite all four fields of a PKA keyslot with zeros. Every field is
/// attempted; the first failure is returned.
pub(crate) fn clear_pka_keyslot<H: SeHal>(guard: &mut EngineGuard<'_, H>, slot: u8) -> SeResult<()> {
    let mut first_err = None;
    for field in KeySlotField::ALL {
        let status = program_keyslot_field(
            guard,
            slot,
            field,
            core::iter::repeat(0).take(pka_reg::KEYSLOT_FIELD_WORDS),
        )
        .and_then(|_| {
            guard.run(
                pka_reg::PRESET_KEYSLOT_COMMIT,
                SeError::DRIVER_KEYSLOT_CLEAR_FAILURE,
            )
        });
        if let Err(err) = status {
            first_err.get_or_insert(err);
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Use of a PKA keyslot for the duration of one operation.
///
/// Unless retained, the keyslot is cleared when the lease is released;
/// dropping an unreleased lease clears it too and logs any failure.
struct PkaKeySlotLease<'c, 'a, H: SeHal> {
    ctx: &'c mut PkaContext<'a, H>,
    slot: u8,
    retain: bool,
    armed: bool,
}

impl<'c, 'a, H: SeHal> PkaKeySlotLease<'c, 'a, H> {
    fn new(ctx: &'c mut PkaContext<'a, H>, slot: u8, retain: bool) -> Self {
        Self {
            ctx,
            slot,
            retain,
            armed: true,
        }
    }

    fn ctx(&mut self) -> &mut PkaContext<'a, H> {
        self.ctx
    }

    fn release(mut self) -> SeResult<()> {
        self.armed = false;
        if self.retain {
            return Ok(());
        }
        clear_pka_keyslot(self.ctx.guard(), self.slot)
    }
}

impl<H: SeHal> Drop for PkaKeySlotLease<'_, '_, H> {
    fn drop(&mut self) {
        if self.armed && !self.retain {
            if let Err(err) = clear_pka_keyslot(self.ctx.guard(), self.slot) {
                cprintln!("[rsa] keyslot clear failed {}", HexU32(err.into()));
            }
        }
    }
}

/// Combine the outcome of an operation with the outcome of its cleanup.
/// A cleanup failure is reported only when the operation itself succeeded.
fn merge_cleanup(primary: SeResult<()>, cleanup: SeResult<()>) -> SeResult<()> {
    match (primary, cleanup) {
        (Err(err), Err(cleanup_err)) => {
            cprintln!(
                "[rsa] keyslot clear failed {} after {}",
                HexU32(cleanup_err.into()),
                HexU32(err.into())
            );
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
        (Ok(()), cleanup) => cleanup,
    }
}
