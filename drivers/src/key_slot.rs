/*++

Licensed under the Apache-2.0 license.

File Name:

    key_slot.rs

Abstract:

    File contains the keyslot arena. Hardware keyslots are handed out as
    ownership tokens so that a slot has exactly one owner at a time.

--*/

use crate::{SeError, SeResult};

/// Keyslot bank
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SlotKind {
    Aes,
    Pka,
}

/// Index of a keyslot, used by sessions to refer to a slot owned
/// elsewhere.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct KeySlotId {
    kind: SlotKind,
    index: u8,
}

impl KeySlotId {
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    pub fn index(&self) -> u8 {
        self.index
    }
}

/// Ownership token for a checked-out keyslot.
///
/// Tokens are neither `Copy` nor `Clone`; a slot goes back to the arena
/// only through `SecurityEngine::free_aes_keyslot` or
/// `SecurityEngine::free_pka_keyslot`, which clear it first.
#[derive(Debug, Eq, PartialEq)]
pub struct KeySlot {
    id: KeySlotId,
}

impl KeySlot {
    pub fn id(&self) -> KeySlotId {
        self.id
    }

    pub fn index(&self) -> u8 {
        self.id.index
    }

    pub fn kind(&self) -> SlotKind {
        self.id.kind
    }
}

/// Fixed set of `N` keyslots tracked with a bitmask.
#[derive(Debug)]
pub(crate) struct KeySlotArena<const N: usize> {
    kind: SlotKind,
    used: u32,
}

impl<const N: usize> KeySlotArena<N> {
    pub(crate) const fn new(kind: SlotKind) -> Self {
        assert!(N <= 32);
        Self { kind, used: 0 }
    }

    /// Check out the lowest free slot.
    pub(crate) fn checkout(&mut self) -> SeResult<KeySlot> {
        let index = (0..N)
            .find(|i| self.used & (1 << i) == 0)
            .ok_or(SeError::DRIVER_KEYSLOT_IN_USE)?;
        self.used |= 1 << index;
        Ok(KeySlot {
            id: KeySlotId {
                kind: self.kind,
                index: index as u8,
            },
        })
    }

    /// Verify `slot` belongs to this arena and is checked out.
    pub(crate) fn check(&self, slot: &KeySlot) -> SeResult<()> {
        self.check_id(slot.id)
    }

    pub(crate) fn check_id(&self, id: KeySlotId) -> SeResult<()> {
        if id.kind != self.kind || usize::from(id.index) >= N {
            return Err(SeError::DRIVER_KEYSLOT_INVALID_INDEX);
        }
        if self.used & (1 << id.index) == 0 {
            return Err(SeError::DRIVER_KEYSLOT_NOT_CHECKED_OUT);
        }
        Ok(())
    }

    pub(crate) fn checkin(&mut self, slot: KeySlot) -> SeResult<()> {
        self.check(&slot)?;
        self.used &= !(1 << slot.id.index);
        Ok(())
    }

    #[cfg(test)]
    fn in_use(&self) -> u32 {
        self.used.count_ones()
    }
}
