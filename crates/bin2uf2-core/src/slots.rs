use thiserror::Error;

use crate::{Bin2Uf2Error, uf2::UF2_PAYLOAD_SIZE};

/// A region of flash reserved for one firmware image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlotDescriptor {
    pub index: u8,
    pub base_address: u32,
    pub capacity_bytes: u32,
}

impl SlotDescriptor {
    pub const fn new(index: u8, base_address: u32, capacity_bytes: u32) -> Self {
        Self {
            index,
            base_address,
            capacity_bytes,
        }
    }

    /// One past the last byte of the slot.
    pub const fn end_address(&self) -> u64 {
        self.base_address as u64 + self.capacity_bytes as u64
    }

    pub fn contains(&self, address: u32) -> bool {
        address >= self.base_address && (address as u64) < self.end_address()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SlotTableError {
    #[error("slot {0} has no capacity")]
    EmptySlot(u8),
    #[error("slot {0} is not aligned to the 256 byte block payload")]
    Unaligned(u8),
    #[error("slot {0} extends past the 32-bit address space")]
    Wraps(u8),
    #[error("slot {0} overlaps slot {1}")]
    Overlap(u8, u8),
    #[error("slot at position {position} has index {index}")]
    IndexMismatch { position: usize, index: u8 },
}

/// Maps slot indices to flash regions. Slot `n` lives at position `n`.
#[derive(Copy, Clone, Debug)]
pub struct SlotTable {
    slots: &'static [SlotDescriptor],
}

impl SlotTable {
    pub const fn new(slots: &'static [SlotDescriptor]) -> Self {
        Self { slots }
    }

    pub fn resolve(&self, slot: u8) -> Result<SlotDescriptor, Bin2Uf2Error> {
        self.slots
            .get(slot as usize)
            .copied()
            .ok_or(Bin2Uf2Error::InvalidSlot {
                slot,
                available: self.slots.len(),
            })
    }

    /// Finds the slot a flash address falls into.
    pub fn slot_for_address(&self, address: u32) -> Option<SlotDescriptor> {
        self.slots.iter().copied().find(|s| s.contains(address))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotDescriptor> {
        self.slots.iter()
    }

    pub fn validate(&self) -> Result<(), SlotTableError> {
        for (position, slot) in self.slots.iter().enumerate() {
            if slot.index as usize != position {
                return Err(SlotTableError::IndexMismatch {
                    position,
                    index: slot.index,
                });
            }
            if slot.capacity_bytes == 0 {
                return Err(SlotTableError::EmptySlot(slot.index));
            }
            if slot.base_address as usize % UF2_PAYLOAD_SIZE != 0
                || slot.capacity_bytes as usize % UF2_PAYLOAD_SIZE != 0
            {
                return Err(SlotTableError::Unaligned(slot.index));
            }
            if slot.end_address() > u32::MAX as u64 + 1 {
                return Err(SlotTableError::Wraps(slot.index));
            }
        }

        for (i, a) in self.slots.iter().enumerate() {
            for b in &self.slots[i + 1..] {
                if (a.base_address as u64) < b.end_address()
                    && (b.base_address as u64) < a.end_address()
                {
                    return Err(SlotTableError::Overlap(a.index, b.index));
                }
            }
        }

        Ok(())
    }
}
