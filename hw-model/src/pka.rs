/*++

Licensed under the Apache-2.0 license.

File Name:

    pka.rs

Abstract:

    File contains the model of the public key accelerator and its
    keyslots.

--*/

use crate::regs::RegFile;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use se_drivers::reg::pka::{self as pka_reg, Bank, KeySlotAddr, PkaCtrl, PkaFlags};
use se_drivers::{PkaMode, PkaPrimitive, SeError, SeResult, PKA_KEYSLOT_COUNT};

type Field = [u32; pka_reg::KEYSLOT_FIELD_WORDS];

const EXPONENT: usize = 0;
const MODULUS: usize = 1;
const M_PRIME: usize = 2;
const R_SQUARED: usize = 3;

pub(crate) struct PkaUnit {
    /// Committed keyslot contents
    pub keyslots: Box<[[Field; pka_reg::KEYSLOT_FIELDS]; PKA_KEYSLOT_COUNT]>,

    /// Words written through the data window, not yet committed
    staging: Box<[[Field; pka_reg::KEYSLOT_FIELDS]; PKA_KEYSLOT_COUNT]>,

    pub commits: usize,
}

impl Default for PkaUnit {
    fn default() -> Self {
        Self {
            keyslots: Box::new([[[0; pka_reg::KEYSLOT_FIELD_WORDS]; pka_reg::KEYSLOT_FIELDS];
                PKA_KEYSLOT_COUNT]),
            staging: Box::new([[[0; pka_reg::KEYSLOT_FIELD_WORDS]; pka_reg::KEYSLOT_FIELDS];
                PKA_KEYSLOT_COUNT]),
            commits: 0,
        }
    }
}

fn read_reg(regs: &RegFile, bank: Bank, index: u8, words: usize) -> BigUint {
    let mut digits = vec![0u32; words];
    regs.read_words(pka_reg::operand_reg(bank, index), &mut digits);
    BigUint::from_slice(&digits)
}

fn write_reg(regs: &mut RegFile, bank: Bank, index: u8, words: usize, value: &BigUint) {
    let mut digits = value.to_u32_digits();
    digits.resize(words, 0);
    regs.write_words(pka_reg::operand_reg(bank, index), &digits[..words]);
}

fn field_value(field: &Field, words: usize) -> BigUint {
    BigUint::from_slice(&field[..words])
}

/// M' = -m^-1 mod 2^(32 * words), for odd `m`
pub(crate) fn m_prime(m: &BigUint, words: usize) -> Option<BigUint> {
    let r = BigUint::one() << (32 * words);
    let inv = m.modinv(&r)?;
    Some((&r - inv) % &r)
}

/// R^2 mod m with R = 2^(32 * words)
pub(crate) fn r_squared(m: &BigUint, words: usize) -> BigUint {
    (BigUint::one() << (64 * words)) % m
}

impl PkaUnit {
    /// Write through the keyslot data window.
    pub fn write_keyslot_data(&mut self, regs: &mut RegFile, value: u32) {
        let mut addr = KeySlotAddr(regs.read(pka_reg::KEYSLOT_ADDR));
        let word = addr.word() as usize % pka_reg::KEYSLOT_FIELD_WORDS;
        self.staging[addr.slot() as usize][addr.field() as usize][word] = value;
        if addr.auto_increment() {
            addr.set_word(((word + 1) % pka_reg::KEYSLOT_FIELD_WORDS) as u32);
            regs.write(pka_reg::KEYSLOT_ADDR, addr.0);
        }
    }

    pub fn keyslot_is_clear(&self, slot: usize) -> bool {
        self.keyslots[slot]
            .iter()
            .all(|field| field.iter().all(|w| *w == 0))
    }

    pub fn execute(&mut self, regs: &mut RegFile, preset: u32) -> SeResult<()> {
        match preset {
            pka_reg::PRESET_KEYSLOT_COMMIT => {
                let addr = KeySlotAddr(regs.read(pka_reg::KEYSLOT_ADDR));
                let (slot, field) = (addr.slot() as usize, addr.field() as usize);
                self.keyslots[slot][field] = self.staging[slot][field];
                self.staging[slot][field] = [0; pka_reg::KEYSLOT_FIELD_WORDS];
                self.commits += 1;
                Ok(())
            }
            pka_reg::PRESET_START => {
                let flags = self.start(regs);
                regs.write(pka_reg::FLAGS, flags.bits());
                if flags.is_empty() {
                    Ok(())
                } else {
                    Err(SeError::ENGINE_OPERATION_FAILED)
                }
            }
            _ => Err(SeError::ENGINE_OPERATION_FAILED),
        }
    }

    fn start(&self, regs: &mut RegFile) -> PkaFlags {
        let ctrl = PkaCtrl(regs.read(pka_reg::CTRL));
        let (Some(primitive), Some(mode)) = (
            PkaPrimitive::from_u32(ctrl.primitive()),
            PkaMode::ALL.get(ctrl.mode() as usize).copied(),
        ) else {
            return PkaFlags::ERROR;
        };
        let n = mode.words();
        let a = || read_reg(regs, Bank::A, 0, n);
        let b = || read_reg(regs, Bank::B, 0, n);
        let m = read_reg(regs, Bank::D, 0, n);

        let needs_modulus = !matches!(primitive, PkaPrimitive::Mul | PkaPrimitive::MoveProduct);
        let uses_keyslot = primitive == PkaPrimitive::ModExp && ctrl.use_keyslot();
        if needs_modulus && !uses_keyslot && m.is_zero() {
            return PkaFlags::ERROR;
        }

        let (bank, index, words, value) = match primitive {
            PkaPrimitive::ModMul => (Bank::A, 0, n, (a() * b()) % &m),
            PkaPrimitive::ModAdd => (Bank::A, 0, n, (a() + b()) % &m),
            PkaPrimitive::ModSub => (Bank::A, 0, n, (a() % &m + &m - b() % &m) % &m),
            PkaPrimitive::ModInv => match (a() % &m).modinv(&m) {
                Some(inv) => (Bank::B, 0, n, inv),
                None => return PkaFlags::NOT_INVERTIBLE,
            },
            PkaPrimitive::ModDiv => match (b() % &m).modinv(&m) {
                Some(inv) => (Bank::C, 0, n, (a() * inv) % &m),
                None => return PkaFlags::NOT_INVERTIBLE,
            },
            PkaPrimitive::Reduce => (Bank::B, 0, n, a() % &m),
            PkaPrimitive::Mul => (Bank::C, 0, 2 * n, a() * b()),
            PkaPrimitive::MoveProduct => {
                (Bank::A, 0, 2 * n, read_reg(regs, Bank::C, 0, 2 * n))
            }
            PkaPrimitive::CalcMp => match m_prime(&m, n) {
                Some(mp) => (Bank::D, 1, n, mp),
                None => return PkaFlags::ERROR,
            },
            PkaPrimitive::CalcR2 => (Bank::D, 3, n, r_squared(&m, n)),
            PkaPrimitive::ModExp => {
                let (e, m, mp, r2) = if uses_keyslot {
                    let Some(slot) = self.keyslots.get(ctrl.keyslot() as usize) else {
                        return PkaFlags::ERROR;
                    };
                    (
                        field_value(&slot[EXPONENT], n),
                        field_value(&slot[MODULUS], n),
                        field_value(&slot[M_PRIME], n),
                        field_value(&slot[R_SQUARED], n),
                    )
                } else {
                    (
                        read_reg(regs, Bank::D, 2, n),
                        m,
                        read_reg(regs, Bank::D, 1, n),
                        read_reg(regs, Bank::D, 3, n),
                    )
                };
                if m.is_zero() {
                    return PkaFlags::ERROR;
                }
                if m_prime(&m, n).as_ref() != Some(&mp) || r_squared(&m, n) != r2 {
                    return PkaFlags::BAD_MONTGOMERY;
                }
                (Bank::A, 0, n, a().modpow(&e, &m))
            }
        };
        write_reg(regs, bank, index, words, &value);
        PkaFlags::empty()
    }
}
