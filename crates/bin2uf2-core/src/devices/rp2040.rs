use crate::{
    Family,
    devices::DeviceInfo,
    slots::{SlotDescriptor, SlotTable},
};

#[derive(Debug, Default, Clone, Copy)]
pub struct Rp2040;

pub const RP2040: Rp2040 = Rp2040;

impl DeviceInfo for Rp2040 {
    fn family_id(&self) -> u32 {
        Family::RP2040 as u32
    }

    fn slot_table(&self) -> SlotTable {
        SlotTable::new(RP2040_SLOTS)
    }

    fn device_name(&self) -> &'static str {
        "rp2040"
    }
}

pub const FLASH_START_RP2040: u32 = 0x10000000;
pub const SLOT_SIZE_RP2040: u32 = 0x00010000;

pub const RP2040_SLOTS: &[SlotDescriptor] = &[
    SlotDescriptor::new(0, FLASH_START_RP2040, SLOT_SIZE_RP2040),
    SlotDescriptor::new(1, FLASH_START_RP2040 + SLOT_SIZE_RP2040, SLOT_SIZE_RP2040),
    SlotDescriptor::new(2, FLASH_START_RP2040 + 2 * SLOT_SIZE_RP2040, SLOT_SIZE_RP2040),
    SlotDescriptor::new(3, FLASH_START_RP2040 + 3 * SLOT_SIZE_RP2040, SLOT_SIZE_RP2040),
];
