use assert_into::AssertInto;
use static_assertions::const_assert;
use std::mem;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, byteorder::little_endian::U32,
};

use crate::{Bin2Uf2Error, slots::SlotDescriptor};

pub const UF2_MAGIC_START0: u32 = 0x0A324655;
pub const UF2_MAGIC_START1: u32 = 0x9E5D5157;
pub const UF2_MAGIC_END: u32 = 0x0AB16F30;

pub const UF2_FLAG_NOT_MAIN_FLASH: u32 = 0x00000001;
pub const UF2_FLAG_FILE_CONTAINER: u32 = 0x00001000;
pub const UF2_FLAG_FAMILY_ID_PRESENT: u32 = 0x00002000;

pub const UF2_BLOCK_SIZE: usize = 512;
pub const UF2_DATA_SIZE: usize = 476;

/// Every block carries exactly this many payload bytes; the tail of the last
/// chunk is zero filled.
pub const UF2_PAYLOAD_SIZE: usize = 256;

pub type Uf2BlockData = [u8; UF2_DATA_SIZE];

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
pub struct Uf2Block {
    // 32 byte header
    pub magic_start0: U32,
    pub magic_start1: U32,
    pub flags: U32,
    pub target_addr: U32,
    pub payload_size: U32,
    pub block_no: U32,
    pub num_blocks: U32,
    pub file_size: U32, // or familyID
    pub data: Uf2BlockData,
    pub magic_end: U32,
}

const_assert!(mem::size_of::<Uf2Block>() == UF2_BLOCK_SIZE);
const_assert!(UF2_PAYLOAD_SIZE <= UF2_DATA_SIZE);

impl Uf2Block {
    /// A block for a stream of `num_blocks` blocks targeting `family_id`.
    ///
    /// Target address, block number and data still need to be filled in.
    pub fn prototype(num_blocks: u32, family_id: u32) -> Self {
        Self {
            magic_start0: U32::new(UF2_MAGIC_START0),
            magic_start1: U32::new(UF2_MAGIC_START1),
            flags: U32::new(UF2_FLAG_FAMILY_ID_PRESENT),
            target_addr: U32::new(0),
            payload_size: U32::new(UF2_PAYLOAD_SIZE as u32),
            block_no: U32::new(0),
            num_blocks: U32::new(num_blocks),
            file_size: U32::new(family_id),
            data: [0; UF2_DATA_SIZE],
            magic_end: U32::new(UF2_MAGIC_END),
        }
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic_start0.get() == UF2_MAGIC_START0
            && self.magic_start1.get() == UF2_MAGIC_START1
            && self.magic_end.get() == UF2_MAGIC_END
    }

    pub fn family_id(&self) -> Option<u32> {
        if self.flags.get() & UF2_FLAG_FAMILY_ID_PRESENT != 0 {
            Some(self.file_size.get())
        } else {
            None
        }
    }

    /// The payload bytes this block carries.
    pub fn payload(&self) -> &[u8] {
        let len = (self.payload_size.get() as usize).min(UF2_DATA_SIZE);
        &self.data[..len]
    }
}

/// Number of blocks needed for `len` payload bytes.
pub fn blocks_for_len(len: usize) -> usize {
    len.div_ceil(UF2_PAYLOAD_SIZE)
}

/// Chunks `payload` into UF2 blocks addressed from the start of `region`.
pub fn encode_blocks(
    payload: &[u8],
    region: &SlotDescriptor,
    family_id: u32,
) -> Result<Vec<Uf2Block>, Bin2Uf2Error> {
    let num_blocks = blocks_for_len(payload.len());
    let span = num_blocks as u64 * UF2_PAYLOAD_SIZE as u64;

    let too_large = Bin2Uf2Error::PayloadTooLarge {
        blocks: num_blocks,
        start: region.base_address,
        capacity: region.capacity_bytes,
    };

    if span > region.capacity_bytes as u64 {
        return Err(too_large);
    }
    if region.base_address as u64 + span > u32::MAX as u64 + 1 {
        return Err(too_large);
    }
    let Ok(num_blocks_u32) = u32::try_from(num_blocks) else {
        return Err(too_large);
    };

    let mut block = Uf2Block::prototype(num_blocks_u32, family_id);

    let blocks = payload
        .chunks(UF2_PAYLOAD_SIZE)
        .enumerate()
        .map(|(block_no, chunk)| {
            let block_no: u32 = block_no.assert_into();

            // Cannot overflow, the span check above bounds the last address
            block.target_addr = U32::new(region.base_address + block_no * UF2_PAYLOAD_SIZE as u32);
            block.block_no = U32::new(block_no);

            block.data.iter_mut().for_each(|v| *v = 0);
            block.data[..chunk.len()].copy_from_slice(chunk);

            block
        })
        .collect();

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGION: SlotDescriptor = SlotDescriptor {
        index: 0,
        base_address: 0x1000_0000,
        capacity_bytes: 0x1000,
    };

    #[test]
    fn header_layout_is_bit_exact() {
        let mut block = Uf2Block::prototype(3, 0xe48bff56);
        block.target_addr = U32::new(0x1000_0100);
        block.block_no = U32::new(1);
        block.data[0] = 0xAA;

        let bytes = block.as_bytes();
        assert_eq!(bytes.len(), 512);
        assert_eq!(&bytes[0..4], &0x0A324655u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &0x9E5D5157u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &0x00002000u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &0x1000_0100u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &256u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &1u32.to_le_bytes());
        assert_eq!(&bytes[24..28], &3u32.to_le_bytes());
        assert_eq!(&bytes[28..32], &0xe48bff56u32.to_le_bytes());
        assert_eq!(bytes[32], 0xAA);
        assert_eq!(&bytes[508..512], &0x0AB16F30u32.to_le_bytes());
    }

    #[test]
    fn last_chunk_is_zero_filled() {
        let payload = vec![0xFFu8; 300];
        let blocks = encode_blocks(&payload, &REGION, 1).unwrap();

        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.payload_size.get() == 256));
        assert_eq!(&blocks[1].data[..44], &[0xFF; 44][..]);
        assert!(blocks[1].data[44..].iter().all(|&b| b == 0));
        // Bytes past the 256 byte payload stay zero in every block
        assert!(blocks[0].data[256..].iter().all(|&b| b == 0));
    }

    #[test]
    fn addresses_and_numbers_increase_without_gaps() {
        let payload = vec![1u8; 256 * 5];
        let blocks = encode_blocks(&payload, &REGION, 7).unwrap();

        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.block_no.get(), i as u32);
            assert_eq!(block.num_blocks.get(), 5);
            assert_eq!(block.target_addr.get(), 0x1000_0000 + i as u32 * 256);
            assert_eq!(block.family_id(), Some(7));
            assert!(block.has_valid_magic());
        }
    }

    #[test]
    fn payload_filling_region_exactly_is_accepted() {
        let payload = vec![0u8; 0x1000];
        assert_eq!(encode_blocks(&payload, &REGION, 0).unwrap().len(), 16);
    }

    #[test]
    fn payload_past_region_is_rejected() {
        let payload = vec![0u8; 0x1001];
        assert!(matches!(
            encode_blocks(&payload, &REGION, 0),
            Err(Bin2Uf2Error::PayloadTooLarge { blocks: 17, .. })
        ));
    }

    #[test]
    fn region_at_top_of_address_space() {
        let top = SlotDescriptor {
            index: 0,
            base_address: 0xFFFF_FF00,
            capacity_bytes: 0x100,
        };
        let blocks = encode_blocks(&[1, 2, 3], &top, 0).unwrap();
        assert_eq!(blocks[0].target_addr.get(), 0xFFFF_FF00);

        let wrapping = SlotDescriptor {
            capacity_bytes: 0x200,
            ..top
        };
        assert!(matches!(
            encode_blocks(&[0; 257], &wrapping, 0),
            Err(Bin2Uf2Error::PayloadTooLarge { .. })
        ));
    }
}
