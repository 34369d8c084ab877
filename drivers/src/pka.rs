/*++

Licensed under the Apache-2.0 license.

File Name:

    pka.rs

Abstract:

    File contains API for the public key accelerator: modular
    multiplication, addition, subtraction, inversion, division,
    exponentiation, single and double precision reduction, squaring and
    plain (double width) multiplication.

--*/

use crate::engine::{EngineGuard, SecurityEngine};
use crate::hal::{EngineId, SeHal};
use crate::operand::{self, Operand, OperandMut, WORD_SIZE};
use crate::reg::pka::{self as pka_reg, Bank, PkaCtrl, PkaFlags};
use crate::{SeError, SeResult};

/// Widest operand the engine accepts, in bits
pub const PKA_MAX_BITS: u32 = 4096;

/// Widest double-width product the engine can move back into an input
/// register for reduction, in bits
pub const PKA_MAX_REDUCE_BITS: u32 = 4096;

/// Largest product of `generic_multiply`, in words
const PRODUCT_MAX_WORDS: usize = 2 * pka_reg::REG_WORDS;

/// Operand width the engine is configured for
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum PkaMode {
    Bits256 = 0,
    Bits384 = 1,
    Bits512 = 2,
    Bits768 = 3,
    Bits1024 = 4,
    Bits1536 = 5,
    Bits2048 = 6,
    Bits3072 = 7,
    Bits4096 = 8,
}

impl PkaMode {
    pub const ALL: [PkaMode; 9] = [
        PkaMode::Bits256,
        PkaMode::Bits384,
        PkaMode::Bits512,
        PkaMode::Bits768,
        PkaMode::Bits1024,
        PkaMode::Bits1536,
        PkaMode::Bits2048,
        PkaMode::Bits3072,
        PkaMode::Bits4096,
    ];

    pub const fn bits(self) -> u32 {
        match self {
            PkaMode::Bits256 => 256,
            PkaMode::Bits384 => 384,
            PkaMode::Bits512 => 512,
            PkaMode::Bits768 => 768,
            PkaMode::Bits1024 => 1024,
            PkaMode::Bits1536 => 1536,
            PkaMode::Bits2048 => 2048,
            PkaMode::Bits3072 => 3072,
            PkaMode::Bits4096 => 4096,
        }
    }

    pub const fn words(self) -> usize {
        self.bits() as usize / 32
    }

    pub const fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    /// Smallest mode holding `words` words.
    pub fn for_words(words: usize) -> SeResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.words() >= words)
            .ok_or(SeError::DRIVER_PKA_UNSUPPORTED_WIDTH)
    }

    /// Mode used to reduce a double precision operand of this class.
    ///
    /// The mapping is a fixed table. Only the width of the mapped mode
    /// matters to the reduction primitive, so the mapped operand class is
    /// not otherwise meaningful.
    pub fn double_precision(self) -> SeResult<Self> {
        match self {
            PkaMode::Bits256 => Ok(PkaMode::Bits512),
            PkaMode::Bits384 => Ok(PkaMode::Bits768),
            PkaMode::Bits512 => Ok(PkaMode::Bits1024),
            PkaMode::Bits768 => Ok(PkaMode::Bits1536),
            PkaMode::Bits1024 => Ok(PkaMode::Bits2048),
            PkaMode::Bits1536 => Ok(PkaMode::Bits3072),
            PkaMode::Bits2048 => Ok(PkaMode::Bits4096),
            PkaMode::Bits3072 | PkaMode::Bits4096 => {
                Err(SeError::DRIVER_PKA_DOUBLE_PRECISION_UNSUPPORTED)
            }
        }
    }

    pub(crate) fn from_field(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

/// Engine primitive codes
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
pub enum PkaPrimitive {
    /// A0 = A0 * B0 mod D0
    ModMul = 0x01,
    /// A0 = A0 + B0 mod D0
    ModAdd = 0x02,
    /// A0 = A0 - B0 mod D0
    ModSub = 0x03,
    /// B0 = A0^-1 mod D0
    ModInv = 0x04,
    /// C0 = A0 * B0^-1 mod D0
    ModDiv = 0x05,
    /// A0 = A0^D2 mod D0 using M' in D1 and R^2 in D3
    ModExp = 0x06,
    /// B0 = A0 mod D0
    Reduce = 0x07,
    /// C0||C1 = A0 * B0
    Mul = 0x08,
    /// D1 = -D0^-1 mod R
    CalcMp = 0x09,
    /// D3 = R^2 mod D0
    CalcR2 = 0x0A,
    /// A0 = C0||C1
    MoveProduct = 0x0B,
}

impl PkaPrimitive {
    pub fn from_u32(value: u32) -> Option<Self> {
        [
            Self::ModMul,
            Self::ModAdd,
            Self::ModSub,
            Self::ModInv,
            Self::ModDiv,
            Self::ModExp,
            Self::Reduce,
            Self::Mul,
            Self::CalcMp,
            Self::CalcR2,
            Self::MoveProduct,
        ]
        .into_iter()
        .find(|p| *p as u32 == value)
    }
}

/// Register holding an operand or result
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct PkaReg(pub Bank, pub u8);

pub(crate) const REG_A0: PkaReg = PkaReg(Bank::A, 0);
pub(crate) const REG_B0: PkaReg = PkaReg(Bank::B, 0);
pub(crate) const REG_C0: PkaReg = PkaReg(Bank::C, 0);
pub(crate) const REG_MODULUS: PkaReg = PkaReg(Bank::D, 0);
pub(crate) const REG_M_PRIME: PkaReg = PkaReg(Bank::D, 1);
pub(crate) const REG_EXPONENT: PkaReg = PkaReg(Bank::D, 2);
pub(crate) const REG_R_SQUARED: PkaReg = PkaReg(Bank::D, 3);

/// Modulus currently resident in the engine
#[derive(Debug, Copy, Clone)]
struct LoadedModulus {
    /// Width the modulus register is zero padded to
    mode: PkaMode,
    /// Smallest mode holding the modulus itself
    class: PkaMode,
    bytes: usize,
}

impl<H: SeHal> SecurityEngine<H> {
    /// Acquire the PKA for a sequence of operations. The engine stays
    /// locked, and a loaded modulus stays resident, until the context is
    /// dropped.
    pub fn pka(&mut self) -> SeResult<PkaContext<'_, H>> {
        Ok(PkaContext {
            guard: self.lock(EngineId::Pka)?,
            modulus: None,
            product: None,
        })
    }
}

/// Locked PKA
pub struct PkaContext<'a, H: SeHal> {
    guard: EngineGuard<'a, H>,
    modulus: Option<LoadedModulus>,
    product: Option<PkaMode>,
}

impl<'a, H: SeHal> PkaContext<'a, H> {
    /// Modular multiplication `x * y mod m`.
    ///
    /// # Arguments
    ///
    /// * `x` - Multiplicand
    /// * `y` - Multiplier
    /// * `m` - Modulus, or `None` to reuse the loaded modulus
    /// * `out` - Result, at least as long as the modulus
    pub fn multiply(
        &mut self,
        x: Operand,
        y: Operand,
        m: Option<Operand>,
        out: OperandMut,
    ) -> SeResult<()> {
        self.binary(PkaPrimitive::ModMul, x, y, m, out)
    }

    /// Modular addition `x + y mod m`.
    pub fn add(
        &mut self,
        x: Operand,
        y: Operand,
        m: Option<Operand>,
        out: OperandMut,
    ) -> SeResult<()> {
        self.binary(PkaPrimitive::ModAdd, x, y, m, out)
    }

    /// Modular subtraction `x - y mod m`.
    pub fn subtract(
        &mut self,
        x: Operand,
        y: Operand,
        m: Option<Operand>,
        out: OperandMut,
    ) -> SeResult<()> {
        self.binary(PkaPrimitive::ModSub, x, y, m, out)
    }

    /// Modular division `x * y^-1 mod m`.
    #[cfg(feature = "pka-divide")]
    pub fn divide(
        &mut self,
        x: Operand,
        y: Operand,
        m: Option<Operand>,
        out: OperandMut,
    ) -> SeResult<()> {
        self.binary(PkaPrimitive::ModDiv, x, y, m, out)
    }

    /// Modular squaring `x * x mod m`. Uses the multiplication primitive
    /// with `x` in both input registers.
    pub fn square(&mut self, x: Operand, m: Option<Operand>, out: OperandMut) -> SeResult<()> {
        self.binary(PkaPrimitive::ModMul, x, x, m, out)
    }

    /// Modular inversion `x^-1 mod m`.
    pub fn invert(&mut self, x: Operand, m: Option<Operand>, out: OperandMut) -> SeResult<()> {
        let mut out = out;
        let mode = self.validate(&[x], m.as_ref(), &out)?;
        self.prepare_modulus(m.as_ref(), mode)?;
        self.write_operand(REG_A0, &x, mode)?;
        self.execute(PkaPrimitive::ModInv, mode, None)?;
        self.read_result(REG_B0, mode.words(), &mut out)
    }

    /// Reduction `x mod m` where `x` is no wider than the operation
    /// width.
    pub fn reduce(&mut self, x: Operand, m: Option<Operand>, out: OperandMut) -> SeResult<()> {
        let mut out = out;
        let mode = self.validate(&[x], m.as_ref(), &out)?;
        self.prepare_modulus(m.as_ref(), mode)?;
        self.write_operand(REG_A0, &x, mode)?;
        self.execute(PkaPrimitive::Reduce, mode, None)?;
        self.read_result(REG_B0, mode.words(), &mut out)
    }

    /// Reduction `x mod m` where `x` is up to twice the width of `m`.
    ///
    /// The operation runs in the double precision mode of the modulus
    /// class, and the modulus is zero padded to that doubled width.
    pub fn reduce_double_precision(
        &mut self,
        x: Operand,
        m: Option<Operand>,
        out: OperandMut,
    ) -> SeResult<()> {
        let mut out = out;
        let mode = self.validate(&[], m.as_ref(), &out)?;
        let dmode = mode.double_precision()?;
        check_fits(&x, dmode)?;
        self.prepare_modulus(m.as_ref(), dmode)?;
        self.write_operand(REG_A0, &x, dmode)?;
        self.execute(PkaPrimitive::Reduce, dmode, None)?;
        self.read_result(REG_B0, dmode.words(), &mut out)
    }

    /// Modular exponentiation `base^exponent mod m`. The Montgomery
    /// constants are computed by the engine.
    pub fn exponentiate(
        &mut self,
        base: Operand,
        exponent: Operand,
        m: Option<Operand>,
        out: OperandMut,
    ) -> SeResult<()> {
        let mut out = out;
        let mode = self.validate(&[base, exponent], m.as_ref(), &out)?;
        self.prepare_modulus(m.as_ref(), mode)?;
        self.compute_montgomery(mode)?;
        self.write_operand(REG_EXPONENT, &exponent, mode)?;
        self.write_operand(REG_A0, &base, mode)?;
        let result = self
            .execute(PkaPrimitive::ModExp, mode, None)
            .and_then(|_| self.read_result(REG_A0, mode.words(), &mut out));
        self.guard
            .clear_regs(reg_offset(REG_EXPONENT), mode.words());
        result
    }

    /// Plain multiplication `x * y`, producing a double width result.
    pub fn generic_multiply(&mut self, x: Operand, y: Operand, out: OperandMut) -> SeResult<()> {
        let mut out = out;
        if out.is_empty() {
            return Err(SeError::DRIVER_PKA_MISSING_RESULT);
        }
        out.word_len()?;
        let mode = self.validate_product(x, y)?;
        if out.len() < x.len() + y.len() {
            return Err(SeError::DRIVER_PKA_RESULT_TOO_SMALL);
        }
        self.multiply_to_product(&x, &y, mode)?;
        self.read_result(REG_C0, 2 * mode.words(), &mut out)
    }

    /// Plain multiplication followed by double precision reduction,
    /// `x * y mod m`, keeping the product inside the engine.
    pub fn generic_multiply_then_reduce(
        &mut self,
        x: Operand,
        y: Operand,
        m: Option<Operand>,
        out: OperandMut,
    ) -> SeResult<()> {
        let mut out = out;
        let mmode = self.validate(&[], m.as_ref(), &out)?;
        let pmode = self.validate_product(x, y)?;
        let mode = mmode.max(pmode);
        if 2 * mode.bits() > PKA_MAX_REDUCE_BITS {
            return Err(SeError::DRIVER_PKA_MOVE_TOO_WIDE);
        }
        mode.double_precision()?;

        self.multiply_to_product(&x, &y, mode)?;
        let dmode = self.move_double_to_reduce_input()?;
        self.prepare_modulus(m.as_ref(), dmode)?;
        self.execute(PkaPrimitive::Reduce, dmode, None)?;
        self.read_result(REG_B0, dmode.words(), &mut out)
    }

    /// Move the double width product left in C0||C1 by a plain
    /// multiplication into A0, ready for a double precision reduction.
    /// Returns the mode the reduction must run in.
    pub fn move_double_to_reduce_input(&mut self) -> SeResult<PkaMode> {
        let mode = self.product.ok_or(SeError::DRIVER_PKA_NO_DOUBLE_RESULT)?;
        if 2 * mode.bits() > PKA_MAX_REDUCE_BITS {
            return Err(SeError::DRIVER_PKA_MOVE_TOO_WIDE);
        }
        let dmode = mode.double_precision()?;
        self.execute(PkaPrimitive::MoveProduct, mode, None)?;
        self.product = None;
        Ok(dmode)
    }

    fn binary(
        &mut self,
        primitive: PkaPrimitive,
        x: Operand,
        y: Operand,
        m: Option<Operand>,
        out: OperandMut,
    ) -> SeResult<()> {
        let mut out = out;
        let mode = self.validate(&[x, y], m.as_ref(), &out)?;
        self.prepare_modulus(m.as_ref(), mode)?;
        self.write_operand(REG_A0, &x, mode)?;
        self.write_operand(REG_B0, &y, mode)?;
        self.execute(primitive, mode, None)?;
        let dest = match primitive {
            PkaPrimitive::ModDiv => REG_C0,
            _ => REG_A0,
        };
        self.read_result(dest, mode.words(), &mut out)
    }

    fn multiply_to_product(&mut self, x: &Operand, y: &Operand, mode: PkaMode) -> SeResult<()> {
        self.write_operand(REG_A0, x, mode)?;
        self.write_operand(REG_B0, y, mode)?;
        self.product = None;
        self.execute(PkaPrimitive::Mul, mode, None)?;
        self.product = Some(mode);
        Ok(())
    }

    /// Validate operands, modulus and result of a modular operation and
    /// select its mode. Never touches the engine.
    fn validate(
        &self,
        operands: &[Operand],
        m: Option<&Operand>,
        out: &OperandMut,
    ) -> SeResult<PkaMode> {
        if out.is_empty() {
            return Err(SeError::DRIVER_PKA_MISSING_RESULT);
        }
        out.word_len()?;
        for operand in operands {
            if operand.is_empty() {
                return Err(SeError::DRIVER_PKA_INVALID_OPERAND_LENGTH);
            }
            operand.word_len()?;
        }

        let (modulus_words, modulus_bytes) = match m {
            Some(m) => {
                let words = m.word_len()?;
                if m.is_zero() {
                    return Err(SeError::DRIVER_PKA_ZERO_MODULUS);
                }
                (words, m.len())
            }
            None => {
                let loaded = self.modulus.ok_or(SeError::DRIVER_PKA_MISSING_MODULUS)?;
                (loaded.class.words(), loaded.bytes)
            }
        };
        let words = operands
            .iter()
            .map(operand::significant_words)
            .try_fold(modulus_words, |acc, w| w.map(|w| acc.max(w)))?;
        let mode = PkaMode::for_words(words)?;

        if out.len() < modulus_bytes {
            return Err(SeError::DRIVER_PKA_RESULT_TOO_SMALL);
        }
        Ok(mode)
    }

    fn validate_product(&self, x: Operand, y: Operand) -> SeResult<PkaMode> {
        if x.is_empty() || y.is_empty() {
            return Err(SeError::DRIVER_PKA_INVALID_OPERAND_LENGTH);
        }
        let words = operand::significant_words(&x)?.max(operand::significant_words(&y)?);
        PkaMode::for_words(words.max(1))
    }

    /// Write the modulus, if supplied, zero padded to `mode`. A resident
    /// modulus padded to a narrower mode is padded further.
    fn prepare_modulus(&mut self, m: Option<&Operand>, mode: PkaMode) -> SeResult<()> {
        match m {
            Some(m) => {
                self.write_operand(REG_MODULUS, m, mode)?;
                self.modulus = Some(LoadedModulus {
                    mode,
                    class: PkaMode::for_words(m.word_len()?)?,
                    bytes: m.len(),
                });
            }
            None => {
                let loaded = self.modulus.ok_or(SeError::DRIVER_PKA_MISSING_MODULUS)?;
                if loaded.mode < mode {
                    let start = reg_offset(REG_MODULUS) + (loaded.mode.words() * WORD_SIZE) as u32;
                    self.guard
                        .clear_regs(start, mode.words() - loaded.mode.words());
                    self.modulus = Some(LoadedModulus { mode, ..loaded });
                }
            }
        }
        Ok(())
    }

    /// Compute M' and R^2 for the loaded modulus into D1 and D3.
    pub(crate) fn compute_montgomery(&mut self, mode: PkaMode) -> SeResult<()> {
        self.execute(PkaPrimitive::CalcMp, mode, None)?;
        self.execute(PkaPrimitive::CalcR2, mode, None)
    }

    pub(crate) fn load_modulus(&mut self, m: &Operand, mode: PkaMode) -> SeResult<()> {
        if m.is_zero() {
            return Err(SeError::DRIVER_PKA_ZERO_MODULUS);
        }
        self.prepare_modulus(Some(m), mode)
    }

    /// Encode `value` into register `reg`, zero extended to `mode`.
    pub(crate) fn write_operand(&mut self, reg: PkaReg, value: &Operand, mode: PkaMode) -> SeResult<()> {
        let mut words = [0u32; pka_reg::REG_WORDS];
        operand::encode(value, mode.words(), &mut words)?;
        self.write_words(reg, &words[..mode.words()]);
        Ok(())
    }

    pub(crate) fn write_words(&mut self, reg: PkaReg, words: &[u32]) {
        let base = reg_offset(reg);
        for (i, word) in words.iter().enumerate() {
            self.guard.write(base + (i * WORD_SIZE) as u32, *word);
        }
    }

    pub(crate) fn read_words(&mut self, reg: PkaReg, words: &mut [u32]) {
        let base = reg_offset(reg);
        for (i, word) in words.iter_mut().enumerate() {
            *word = self.guard.read(base + (i * WORD_SIZE) as u32);
        }
    }

    /// Read `words` words from `reg` and decode them into `out`. Nothing is
    /// written to `out` unless the whole result fits.
    fn read_result(&mut self, reg: PkaReg, words: usize, out: &mut OperandMut) -> SeResult<()> {
        let mut result = [0u32; PRODUCT_MAX_WORDS];
        let result = result
            .get_mut(..words)
            .ok_or(SeError::DRIVER_PKA_UNSUPPORTED_WIDTH)?;
        self.read_words(reg, result);
        operand::decode(result, out)
    }

    /// Program and run `primitive`. Any engine failure is reported as
    /// `DRIVER_PKA_ENGINE_FAILURE`.
    pub(crate) fn execute(
        &mut self,
        primitive: PkaPrimitive,
        mode: PkaMode,
        keyslot: Option<u8>,
    ) -> SeResult<()> {
        let mut ctrl = PkaCtrl(0);
        ctrl.set_primitive(primitive as u32);
        ctrl.set_mode(mode as u32);
        if let Some(slot) = keyslot {
            ctrl.set_use_keyslot(true);
            ctrl.set_keyslot(operand::field(u32::from(slot), 2)?);
        }
        self.guard.write(pka_reg::CTRL, ctrl.0);
        self.guard
            .run(pka_reg::PRESET_START, SeError::DRIVER_PKA_ENGINE_FAILURE)?;

        let flags = PkaFlags::from_bits_truncate(self.guard.read(pka_reg::FLAGS));
        if flags.intersects(PkaFlags::ERROR | PkaFlags::NOT_INVERTIBLE | PkaFlags::BAD_MONTGOMERY) {
            return Err(SeError::DRIVER_PKA_ENGINE_FAILURE);
        }
        Ok(())
    }

    pub(crate) fn guard(&mut self) -> &mut EngineGuard<'a, H> {
        &mut self.guard
    }

}

/// Offset of the first word of `reg`.
pub(crate) const fn reg_offset(reg: PkaReg) -> u32 {
    pka_reg::operand_reg(reg.0, reg.1)
}

fn check_fits(value: &Operand, mode: PkaMode) -> SeResult<()> {
    if operand::significant_words(value)? > mode.words() {
        return Err(SeError::DRIVER_PKA_WIDTH_MISMATCH);
    }
    Ok(())
}
