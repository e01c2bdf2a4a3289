//! Converts raw firmware images into UF2 files aimed at a flash slot.
//!
//! The image gets a metadata trailer (name, clock frequency and a CRC-32)
//! appended before it is chunked into UF2 blocks addressed from the base of
//! the selected slot. The device's bootloader reads the trailer back to pick
//! and configure the image.

use std::io::Write;

use log::*;
use thiserror::Error;
use zerocopy::IntoBytes;

use crate::{
    devices::{DeviceInfo, RP2040},
    trailer::{MetadataTrailer, NameEncodingError, TRAILER_SIZE},
    uf2::{UF2_BLOCK_SIZE, Uf2Block, encode_blocks},
};

pub mod decode;
pub mod devices;
pub mod frequency;
pub mod slots;
pub mod trailer;
pub mod uf2;

// See https://github.com/microsoft/uf2/blob/master/utils/uf2families.json for list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
#[allow(non_camel_case_types)]
pub enum Family {
    /// Raspberry Pi RP2040
    RP2040 = 0xe48bff56,

    /// Bitstream storage of an RP2040 driven FPGA board
    FPGA_BITSTREAM = 0xefab1e55,
}

impl Default for Family {
    fn default() -> Self {
        Self::RP2040
    }
}

#[derive(Error, Debug)]
pub enum Bin2Uf2Error {
    #[error("Slot {slot} is not configured, the device has {available} slots")]
    InvalidSlot { slot: u8, available: usize },
    #[error(
        "Image needs {required} bytes including the metadata trailer, but slot {slot} only holds {capacity}"
    )]
    SlotOverflow {
        slot: u8,
        required: u64,
        capacity: u32,
    },
    #[error("Name can't be stored in the metadata trailer: {0}")]
    NameEncoding(#[from] NameEncodingError),
    #[error("The {field} value {value} does not fit in 32 bits")]
    ValueOutOfRange { field: &'static str, value: u64 },
    #[error("{blocks} blocks starting at {start:#010x} exceed the {capacity} byte region")]
    PayloadTooLarge {
        blocks: usize,
        start: u32,
        capacity: u32,
    },
    #[error("Failed to write to output")]
    FailedToWrite(std::io::Error),
}

/// Everything needed to convert one image.
#[derive(Debug, Clone, Copy)]
pub struct ConversionRequest<'a> {
    pub binary: &'a [u8],
    pub slot: u8,
    pub name: &'a str,
    pub autoclock_hz: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutput {
    /// The UF2 file, blocks in block number order
    pub data: Vec<u8>,
    /// Base address of the slot the image was placed in
    pub start_offset: u32,
    pub slot: u8,
}

impl ConversionOutput {
    pub fn block_count(&self) -> usize {
        self.data.len() / UF2_BLOCK_SIZE
    }
}

/// Builds the UF2 blocks for `request` without serializing them.
pub fn build_blocks(
    request: &ConversionRequest<'_>,
    device: &dyn DeviceInfo,
) -> Result<Vec<Uf2Block>, Bin2Uf2Error> {
    let slot = device.slot_table().resolve(request.slot)?;

    let required = request.binary.len() as u64 + TRAILER_SIZE as u64;
    if required > slot.capacity_bytes as u64 {
        return Err(Bin2Uf2Error::SlotOverflow {
            slot: request.slot,
            required,
            capacity: slot.capacity_bytes,
        });
    }

    let trailer = MetadataTrailer::build(
        request.binary,
        request.name,
        request.autoclock_hz.into(),
    )?;

    debug!(
        "Slot {} at {:#010x}, {} byte image, trailer checksum {:#010x}",
        slot.index,
        slot.base_address,
        request.binary.len(),
        trailer.checksum
    );

    let mut payload = Vec::with_capacity(required as usize);
    payload.extend_from_slice(request.binary);
    payload.extend_from_slice(&trailer.to_bytes());

    encode_blocks(&payload, &slot, device.family_id())
}

/// Converts a raw image into a UF2 file targeting one of `device`'s slots.
pub fn convert(
    request: &ConversionRequest<'_>,
    device: &dyn DeviceInfo,
) -> Result<ConversionOutput, Bin2Uf2Error> {
    let slot = device.slot_table().resolve(request.slot)?;
    let blocks = build_blocks(request, device)?;

    let mut data = Vec::with_capacity(blocks.len() * UF2_BLOCK_SIZE);
    write_output(&blocks, &mut data)?;

    Ok(ConversionOutput {
        data,
        start_offset: slot.base_address,
        slot: request.slot,
    })
}

/// Converts `bin` for the default device (RP2040).
pub fn convert_bin_to_uf2(
    bin: &[u8],
    slot: u8,
    name: &str,
    autoclock_hz: u32,
) -> Result<ConversionOutput, Bin2Uf2Error> {
    let request = ConversionRequest {
        binary: bin,
        slot,
        name,
        autoclock_hz,
    };

    convert(&request, &RP2040)
}

pub fn write_output(blocks: &[Uf2Block], mut output: impl Write) -> Result<(), Bin2Uf2Error> {
    for block in blocks {
        debug!(
            "Block {} / {} {:#010x}",
            block.block_no.get(),
            block.num_blocks.get(),
            block.target_addr.get()
        );

        output
            .write_all(block.as_bytes())
            .map_err(Bin2Uf2Error::FailedToWrite)?;
    }

    output.flush().map_err(Bin2Uf2Error::FailedToWrite)
}
