/*++

Licensed under the Apache-2.0 license.

File Name:

    memory.rs

Abstract:

    File contains the modelled DMA path and scratch memory pool.

    Physical addresses are host addresses. With a page size configured,
    every page boundary is treated as a physical discontinuity, and a
    DMA transfer crossing one faults.

--*/

use se_drivers::{ScratchTag, SeError, SeResult};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Copy, Clone)]
pub(crate) struct Dma {
    pub page_size: Option<usize>,
}

impl Dma {
    /// Bytes from `addr`, at most `len`, before the next discontinuity.
    pub fn contiguous_len(&self, addr: u64, len: usize) -> usize {
        match self.page_size {
            Some(page) => len.min(page - (addr as usize % page)),
            None => len,
        }
    }

    fn check(&self, addr: u64, len: usize) -> SeResult<()> {
        if len > 0 && (addr == 0 || self.contiguous_len(addr, len) != len) {
            return Err(SeError::ENGINE_OPERATION_FAILED);
        }
        Ok(())
    }

    pub fn read(&self, addr: u64, len: usize) -> SeResult<Vec<u8>> {
        self.check(addr, len)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        // SAFETY: the driver programs the address of a live buffer of at
        // least `len` bytes and keeps it borrowed until the operation
        // completes.
        let src = unsafe { std::slice::from_raw_parts(addr as *const u8, len) };
        Ok(src.to_vec())
    }

    pub fn write(&self, addr: u64, data: &[u8]) -> SeResult<()> {
        self.check(addr, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        // SAFETY: as for `read`; the destination is exclusively borrowed by
        // the driver for the duration of the operation.
        let dst = unsafe { std::slice::from_raw_parts_mut(addr as *mut u8, data.len()) };
        dst.copy_from_slice(data);
        Ok(())
    }
}

/// Scratch pool shared by all buffers handed out by one model.
#[derive(Clone)]
pub(crate) struct ScratchPool {
    capacity: usize,
    in_use: Rc<Cell<usize>>,
}

impl ScratchPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            in_use: Rc::new(Cell::new(0)),
        }
    }

    pub fn in_use(&self) -> usize {
        self.in_use.get()
    }

    pub fn alloc(&self, tag: ScratchTag, alignment: usize, size: usize) -> SeResult<ScratchBuffer> {
        if !alignment.is_power_of_two() {
            return Err(SeError::ENGINE_INVALID_ALIGNMENT);
        }
        if self.in_use.get() + size > self.capacity {
            return Err(SeError::ENGINE_SCRATCH_EXHAUSTED);
        }
        let storage = vec![0u8; size + alignment];
        let offset = storage.as_ptr().align_offset(alignment);
        self.in_use.set(self.in_use.get() + size);
        Ok(ScratchBuffer {
            storage,
            offset,
            size,
            tag,
            in_use: self.in_use.clone(),
        })
    }
}

/// Scratch allocation. Returned to the pool when released or dropped.
pub struct ScratchBuffer {
    storage: Vec<u8>,
    offset: usize,
    size: usize,
    tag: ScratchTag,
    in_use: Rc<Cell<usize>>,
}

impl ScratchBuffer {
    pub fn tag(&self) -> ScratchTag {
        self.tag
    }
}

impl AsRef<[u8]> for ScratchBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.storage[self.offset..self.offset + self.size]
    }
}

impl AsMut<[u8]> for ScratchBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.offset..self.offset + self.size]
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        self.in_use.set(self.in_use.get() - self.size);
    }
}
