//! Reads a UF2 stream back into the flat payload it was built from.

use thiserror::Error;
use zerocopy::FromBytes;

use crate::{
    trailer::{MetadataTrailer, TRAILER_SIZE},
    uf2::{
        UF2_BLOCK_SIZE, UF2_DATA_SIZE, UF2_FLAG_FILE_CONTAINER, UF2_FLAG_NOT_MAIN_FLASH,
        UF2_PAYLOAD_SIZE, Uf2Block,
    },
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Uf2DecodeError {
    #[error("The input is empty")]
    Empty,
    #[error("Input size ({0} bytes) isn't a multiple of 512, not a UF2 file?")]
    NotBlockAligned(usize),
    #[error("Block {block} has bad magic")]
    BadMagic { block: usize },
    #[error("Block {block} has unsupported flags {flags:#010x}")]
    UnsupportedFlags { block: usize, flags: u32 },
    #[error("Block {block} does not include a family ID")]
    MissingFamilyId { block: usize },
    #[error("Block {block} claims impossible payload size {size}")]
    InvalidPayloadSize { block: usize, size: u32 },
    #[error("Expected block number {expected}, found {found}")]
    OutOfOrder { expected: u32, found: u32 },
    #[error("Block {block} declares {found} blocks, the first block declared {expected}")]
    InconsistentBlockCount {
        block: usize,
        expected: u32,
        found: u32,
    },
    #[error("Stream declares {declared} blocks but contains {actual}")]
    BlockCountMismatch { declared: u32, actual: usize },
    #[error("Block {block} targets family {found:#010x}, expected {expected:#010x}")]
    FamilyMismatch {
        block: usize,
        expected: u32,
        found: u32,
    },
    #[error("Block {block} targets {found:#010x}, expected contiguous address {expected:#010x}")]
    NonContiguous {
        block: usize,
        expected: u64,
        found: u32,
    },
    #[error("No metadata trailer with a matching checksum was found")]
    TrailerNotFound,
}

/// A contiguous image recovered from a UF2 stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub family_id: u32,
    pub start_address: u32,
    pub block_count: u32,
    pub payload: Vec<u8>,
}

/// Decodes a single-family, contiguously addressed UF2 stream.
pub fn decode_blocks(bytes: &[u8]) -> Result<DecodedImage, Uf2DecodeError> {
    if bytes.is_empty() {
        return Err(Uf2DecodeError::Empty);
    }
    if bytes.len() % UF2_BLOCK_SIZE != 0 {
        return Err(Uf2DecodeError::NotBlockAligned(bytes.len()));
    }

    let mut image: Option<DecodedImage> = None;
    let mut next_address = 0u64;

    for (i, raw) in bytes.chunks_exact(UF2_BLOCK_SIZE).enumerate() {
        let block = Uf2Block::ref_from_bytes(raw).map_err(|_| Uf2DecodeError::BadMagic { block: i })?;

        if !block.has_valid_magic() {
            return Err(Uf2DecodeError::BadMagic { block: i });
        }

        let flags = block.flags.get();
        if flags & (UF2_FLAG_NOT_MAIN_FLASH | UF2_FLAG_FILE_CONTAINER) != 0 {
            return Err(Uf2DecodeError::UnsupportedFlags { block: i, flags });
        }

        let family_id = block
            .family_id()
            .ok_or(Uf2DecodeError::MissingFamilyId { block: i })?;

        let size = block.payload_size.get();
        if size == 0 || size as usize > UF2_DATA_SIZE {
            return Err(Uf2DecodeError::InvalidPayloadSize { block: i, size });
        }

        let expected_no = i as u32;
        if block.block_no.get() != expected_no {
            return Err(Uf2DecodeError::OutOfOrder {
                expected: expected_no,
                found: block.block_no.get(),
            });
        }

        let image = image.get_or_insert_with(|| {
            next_address = block.target_addr.get() as u64;
            DecodedImage {
                family_id,
                start_address: block.target_addr.get(),
                block_count: block.num_blocks.get(),
                payload: Vec::with_capacity(bytes.len() / UF2_BLOCK_SIZE * UF2_PAYLOAD_SIZE),
            }
        });

        if block.num_blocks.get() != image.block_count {
            return Err(Uf2DecodeError::InconsistentBlockCount {
                block: i,
                expected: image.block_count,
                found: block.num_blocks.get(),
            });
        }
        if family_id != image.family_id {
            return Err(Uf2DecodeError::FamilyMismatch {
                block: i,
                expected: image.family_id,
                found: family_id,
            });
        }
        if block.target_addr.get() as u64 != next_address {
            return Err(Uf2DecodeError::NonContiguous {
                block: i,
                expected: next_address,
                found: block.target_addr.get(),
            });
        }

        next_address += size as u64;
        image.payload.extend_from_slice(block.payload());
    }

    let image = image.ok_or(Uf2DecodeError::Empty)?;
    let actual = bytes.len() / UF2_BLOCK_SIZE;
    if image.block_count as usize != actual {
        return Err(Uf2DecodeError::BlockCountMismatch {
            declared: image.block_count,
            actual,
        });
    }

    Ok(image)
}

/// Finds the metadata trailer at the end of a decoded payload.
///
/// The image length is not recorded anywhere, so every end position inside
/// the trailing zero fill is tried, last first, and the first trailer whose
/// checksum matches the bytes before it wins. Returns the image length and
/// the trailer.
pub fn locate_trailer(payload: &[u8]) -> Result<(usize, MetadataTrailer), Uf2DecodeError> {
    if payload.len() < TRAILER_SIZE {
        return Err(Uf2DecodeError::TrailerNotFound);
    }

    let lowest_end = payload
        .len()
        .saturating_sub(UF2_PAYLOAD_SIZE - 1)
        .max(TRAILER_SIZE);

    for end in (lowest_end..=payload.len()).rev() {
        if payload[end..].iter().any(|&b| b != 0) {
            break;
        }

        let image_len = end - TRAILER_SIZE;
        let mut raw = [0; TRAILER_SIZE];
        raw.copy_from_slice(&payload[image_len..end]);

        let trailer = MetadataTrailer::from_bytes(&raw);
        if trailer.verify(&payload[..image_len]) {
            return Ok((image_len, trailer));
        }
    }

    Err(Uf2DecodeError::TrailerNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{slots::SlotDescriptor, uf2::encode_blocks};
    use zerocopy::{IntoBytes, byteorder::little_endian::U32};

    const REGION: SlotDescriptor = SlotDescriptor::new(0, 0x2000_0000, 0x4000);

    fn encode(payload: &[u8]) -> Vec<u8> {
        encode_blocks(payload, &REGION, 0xabcd)
            .unwrap()
            .iter()
            .flat_map(|b| b.as_bytes().to_vec())
            .collect()
    }

    fn patch_block(stream: &mut [u8], block: usize, patch: impl FnOnce(&mut Uf2Block)) {
        let raw = &mut stream[block * UF2_BLOCK_SIZE..(block + 1) * UF2_BLOCK_SIZE];
        patch(Uf2Block::mut_from_bytes(raw).unwrap());
    }

    #[test]
    fn decodes_encoded_stream() {
        let payload: Vec<u8> = (0..600u32).map(|i| i as u8).collect();
        let image = decode_blocks(&encode(&payload)).unwrap();

        assert_eq!(image.family_id, 0xabcd);
        assert_eq!(image.start_address, 0x2000_0000);
        assert_eq!(image.block_count, 3);
        assert_eq!(image.payload.len(), 768);
        assert_eq!(&image.payload[..600], &payload[..]);
        assert!(image.payload[600..].iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_bad_framing() {
        assert_eq!(decode_blocks(&[]), Err(Uf2DecodeError::Empty));
        assert_eq!(
            decode_blocks(&[0; 100]),
            Err(Uf2DecodeError::NotBlockAligned(100))
        );
        assert_eq!(
            decode_blocks(&[0; 512]),
            Err(Uf2DecodeError::BadMagic { block: 0 })
        );
    }

    #[test]
    fn rejects_reordered_blocks() {
        let mut stream = encode(&[1; 512]);
        let (first, second) = stream.split_at_mut(UF2_BLOCK_SIZE);
        first.swap_with_slice(second);

        assert_eq!(
            decode_blocks(&stream),
            Err(Uf2DecodeError::OutOfOrder {
                expected: 0,
                found: 1
            })
        );
    }

    #[test]
    fn rejects_inconsistent_headers() {
        let mut stream = encode(&[1; 768]);
        patch_block(&mut stream, 2, |b| b.num_blocks = U32::new(4));
        assert_eq!(
            decode_blocks(&stream),
            Err(Uf2DecodeError::InconsistentBlockCount {
                block: 2,
                expected: 3,
                found: 4
            })
        );

        let mut stream = encode(&[1; 768]);
        patch_block(&mut stream, 1, |b| b.file_size = U32::new(0x1234));
        assert_eq!(
            decode_blocks(&stream),
            Err(Uf2DecodeError::FamilyMismatch {
                block: 1,
                expected: 0xabcd,
                found: 0x1234
            })
        );

        let mut stream = encode(&[1; 768]);
        patch_block(&mut stream, 1, |b| b.target_addr = U32::new(0x2000_0200));
        assert_eq!(
            decode_blocks(&stream),
            Err(Uf2DecodeError::NonContiguous {
                block: 1,
                expected: 0x2000_0100,
                found: 0x2000_0200
            })
        );

        let mut stream = encode(&[1; 256]);
        patch_block(&mut stream, 0, |b| b.flags = U32::new(0));
        assert_eq!(
            decode_blocks(&stream),
            Err(Uf2DecodeError::MissingFamilyId { block: 0 })
        );

        let mut stream = encode(&[1; 256]);
        patch_block(&mut stream, 0, |b| b.payload_size = U32::new(477));
        assert_eq!(
            decode_blocks(&stream),
            Err(Uf2DecodeError::InvalidPayloadSize {
                block: 0,
                size: 477
            })
        );
    }

    #[test]
    fn rejects_truncated_stream() {
        let stream = encode(&[1; 768]);
        assert_eq!(
            decode_blocks(&stream[..2 * UF2_BLOCK_SIZE]),
            Err(Uf2DecodeError::BlockCountMismatch {
                declared: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn locates_trailer_after_zero_image() {
        let image = vec![0u8; 300];
        let trailer = MetadataTrailer::build(&image, "fw-a", 133_000_000).unwrap();

        let mut payload = image.clone();
        payload.extend_from_slice(&trailer.to_bytes());
        payload.resize(512, 0);

        assert_eq!(locate_trailer(&payload), Ok((300, trailer)));
    }

    #[test]
    fn missing_trailer_is_reported() {
        assert_eq!(
            locate_trailer(&[0x55; 256]),
            Err(Uf2DecodeError::TrailerNotFound)
        );
        assert_eq!(
            locate_trailer(&[0; 10]),
            Err(Uf2DecodeError::TrailerNotFound)
        );
    }
}
