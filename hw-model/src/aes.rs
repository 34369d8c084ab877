/*++

Licensed under the Apache-2.0 license.

File Name:

    aes.rs

Abstract:

    File contains the model of the AES engine: CTR, CBC-MAC and the three
    GCM steps, plus the AES keyslots.

--*/

use crate::memory::Dma;
use crate::regs::RegFile;
use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use se_drivers::reg::aes::{self as aes_reg, AesConfig, KeySlotCtrl};
use se_drivers::{inc32, SeError, SeResult, AES_BLOCK_SIZE, AES_KEYSLOT_COUNT};

type Block = [u8; AES_BLOCK_SIZE];

enum Cipher {
    Aes128(aes::Aes128),
    Aes192(aes::Aes192),
    Aes256(aes::Aes256),
}

impl Cipher {
    fn new(key: &[u8]) -> SeResult<Self> {
        match key.len() {
            16 => Ok(Cipher::Aes128(aes::Aes128::new(GenericArray::from_slice(key)))),
            24 => Ok(Cipher::Aes192(aes::Aes192::new(GenericArray::from_slice(key)))),
            32 => Ok(Cipher::Aes256(aes::Aes256::new(GenericArray::from_slice(key)))),
            _ => Err(SeError::ENGINE_OPERATION_FAILED),
        }
    }

    fn encrypt(&self, block: &Block) -> Block {
        let mut block = GenericArray::clone_from_slice(block);
        match self {
            Cipher::Aes128(c) => c.encrypt_block(&mut block),
            Cipher::Aes192(c) => c.encrypt_block(&mut block),
            Cipher::Aes256(c) => c.encrypt_block(&mut block),
        }
        let mut out = [0u8; AES_BLOCK_SIZE];
        out.copy_from_slice(&block);
        out
    }
}

fn key_len(key_size: u32) -> SeResult<usize> {
    match key_size {
        aes_reg::KEY_SIZE_128 => Ok(16),
        aes_reg::KEY_SIZE_192 => Ok(24),
        aes_reg::KEY_SIZE_256 => Ok(32),
        _ => Err(SeError::ENGINE_OPERATION_FAILED),
    }
}

/// Multiplication in GF(2^128) with the GCM bit order.
pub(crate) fn gf128_mul(x: u128, y: u128) -> u128 {
    const R: u128 = 0xE1 << 120;
    let mut z = 0u128;
    let mut v = y;
    for i in 0..128 {
        if (x >> (127 - i)) & 1 == 1 {
            z ^= v;
        }
        v = if v & 1 == 1 { (v >> 1) ^ R } else { v >> 1 };
    }
    z
}

/// Absorb `data`, zero padded to whole blocks, into `y`.
pub(crate) fn ghash(h: u128, mut y: u128, data: &[u8]) -> u128 {
    for chunk in data.chunks(AES_BLOCK_SIZE) {
        let mut block = [0u8; AES_BLOCK_SIZE];
        block[..chunk.len()].copy_from_slice(chunk);
        y = gf128_mul(y ^ u128::from_be_bytes(block), h);
    }
    y
}

#[derive(Default)]
pub(crate) struct AesUnit {
    pub keyslots: [Option<Vec<u8>>; AES_KEYSLOT_COUNT],
}

impl AesUnit {
    pub fn execute(&mut self, regs: &mut RegFile, dma: &Dma, preset: u32) -> SeResult<()> {
        match preset {
            aes_reg::PRESET_START => self.start(regs, dma),
            aes_reg::PRESET_KEYSLOT_WRITE => {
                let ctrl = KeySlotCtrl(regs.read(aes_reg::KEYSLOT_CTRL));
                let len = key_len(ctrl.key_size())?;
                let key = regs.read_be_bytes::<32>(aes_reg::KEYSLOT_KEY);
                let slot = self.slot_mut(ctrl.slot())?;
                *slot = Some(key[..len].to_vec());
                Ok(())
            }
            aes_reg::PRESET_KEYSLOT_CLEAR => {
                let ctrl = KeySlotCtrl(regs.read(aes_reg::KEYSLOT_CTRL));
                if let Some(key) = self.slot_mut(ctrl.slot())?.as_mut() {
                    key.fill(0);
                }
                *self.slot_mut(ctrl.slot())? = None;
                Ok(())
            }
            _ => Err(SeError::ENGINE_OPERATION_FAILED),
        }
    }

    fn slot_mut(&mut self, slot: u32) -> SeResult<&mut Option<Vec<u8>>> {
        self.keyslots
            .get_mut(slot as usize)
            .ok_or(SeError::ENGINE_OPERATION_FAILED)
    }

    fn cipher(&self, regs: &RegFile, config: AesConfig) -> SeResult<Cipher> {
        if config.use_keyslot() {
            let key = self
                .keyslots
                .get(config.keyslot() as usize)
                .and_then(|key| key.as_ref())
                .ok_or(SeError::ENGINE_OPERATION_FAILED)?;
            Cipher::new(key)
        } else {
            let key = regs.read_be_bytes::<32>(aes_reg::KEY);
            Cipher::new(&key[..key_len(config.key_size())?])
        }
    }

    fn start(&mut self, regs: &mut RegFile, dma: &Dma) -> SeResult<()> {
        let config = AesConfig(regs.read(aes_reg::CONFIG));
        let cipher = self.cipher(regs, config)?;
        let mut iv: Block = regs.read_be_bytes::<16>(aes_reg::IV);
        let h = u128::from_be_bytes(cipher.encrypt(&[0; AES_BLOCK_SIZE]));
        let y = u128::from_be_bytes(regs.read_be_bytes::<16>(aes_reg::GHASH));

        if config.mode() == aes_reg::MODE_GCM_TAG {
            let aad_bits = regs.read_u64(aes_reg::AAD_LEN_LO, aes_reg::AAD_LEN_HI) * 8;
            let text_bits = regs.read_u64(aes_reg::TEXT_LEN_LO, aes_reg::TEXT_LEN_HI) * 8;
            let mut len_block = [0u8; AES_BLOCK_SIZE];
            len_block[..8].copy_from_slice(&aad_bits.to_be_bytes());
            len_block[8..].copy_from_slice(&text_bits.to_be_bytes());
            let s = ghash(h, y, &len_block);
            let tag = u128::from_be_bytes(cipher.encrypt(&iv)) ^ s;
            regs.write_be_bytes(aes_reg::TAG, &tag.to_be_bytes());
            return Ok(());
        }

        let len = regs.read(aes_reg::DATA_LEN) as usize;
        let src = regs.read_u64(aes_reg::SRC_ADDR_LO, aes_reg::SRC_ADDR_HI);
        let dst = regs.read_u64(aes_reg::DST_ADDR_LO, aes_reg::DST_ADDR_HI);
        let input = dma.read(src, len)?;

        match config.mode() {
            aes_reg::MODE_CTR => {
                let output = ctr(&cipher, &mut iv, &input);
                dma.write(dst, &output)?;
            }
            aes_reg::MODE_CBC_MAC => {
                if len % AES_BLOCK_SIZE != 0 {
                    return Err(SeError::ENGINE_OPERATION_FAILED);
                }
                for block in input.chunks_exact(AES_BLOCK_SIZE) {
                    for (v, b) in iv.iter_mut().zip(block) {
                        *v ^= b;
                    }
                    iv = cipher.encrypt(&iv);
                }
            }
            aes_reg::MODE_GCM_AAD => {
                let y = ghash(h, y, &input);
                regs.write_be_bytes(aes_reg::GHASH, &y.to_be_bytes());
            }
            aes_reg::MODE_GCM_TEXT => {
                let output = ctr(&cipher, &mut iv, &input);
                let ciphertext = if config.decrypt() { &input } else { &output };
                let y = ghash(h, y, ciphertext);
                regs.write_be_bytes(aes_reg::GHASH, &y.to_be_bytes());
                dma.write(dst, &output)?;
            }
            _ => return Err(SeError::ENGINE_OPERATION_FAILED),
        }
        regs.write_be_bytes(aes_reg::IV, &iv);
        Ok(())
    }
}

/// Counter mode from `counter`; leaves the next counter block behind. A
/// partial final block consumes a whole counter value.
fn ctr(cipher: &Cipher, counter: &mut Block, input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    for chunk in input.chunks(AES_BLOCK_SIZE) {
        let keystream = cipher.encrypt(counter);
        output.extend(chunk.iter().zip(keystream).map(|(d, k)| d ^ k));
        inc32(counter);
    }
    output
}
