use static_assertions::const_assert;

use crate::{
    Family,
    devices::DeviceInfo,
    slots::{SlotDescriptor, SlotTable},
    uf2::UF2_PAYLOAD_SIZE,
};

/// An FPGA board whose RP2040 companion stores bitstreams in flash and loads
/// the selected one at boot.
#[derive(Debug, Default, Clone, Copy)]
pub struct FpgaBitstream;

pub const FPGA_BITSTREAM: FpgaBitstream = FpgaBitstream;

impl DeviceInfo for FpgaBitstream {
    fn family_id(&self) -> u32 {
        Family::FPGA_BITSTREAM as u32
    }

    fn slot_table(&self) -> SlotTable {
        SlotTable::new(BITSTREAM_SLOTS)
    }

    fn device_name(&self) -> &'static str {
        "fpga-bitstream"
    }
}

// Offsets into flash as seen by the bootloader, the first 544 KiB hold the
// loader itself.
pub const BITSTREAM_STORAGE_START: u32 = 544 * 1024;
pub const BITSTREAM_SLOT_SIZE: u32 = 512 * 1024;

const_assert!(BITSTREAM_STORAGE_START as usize % UF2_PAYLOAD_SIZE == 0);

pub const BITSTREAM_SLOTS: &[SlotDescriptor] = &[
    SlotDescriptor::new(0, BITSTREAM_STORAGE_START, BITSTREAM_SLOT_SIZE),
    SlotDescriptor::new(
        1,
        BITSTREAM_STORAGE_START + BITSTREAM_SLOT_SIZE,
        BITSTREAM_SLOT_SIZE,
    ),
    SlotDescriptor::new(
        2,
        BITSTREAM_STORAGE_START + 2 * BITSTREAM_SLOT_SIZE,
        BITSTREAM_SLOT_SIZE,
    ),
    SlotDescriptor::new(
        3,
        BITSTREAM_STORAGE_START + 3 * BITSTREAM_SLOT_SIZE,
        BITSTREAM_SLOT_SIZE,
    ),
];
