//! Metadata appended after the firmware image.
//!
//! The bootloader reads the trailer to name the slot and configure the clock
//! before jumping into the image. Layout, little-endian:
//!
//! | Offset | Size | Field        |
//! |--------|------|--------------|
//! | 0      | 32   | name, UTF-8, zero padded |
//! | 32     | 4    | autoclock in Hz |
//! | 36     | 4    | CRC-32 over `image || name || autoclock` |

use crc32fast::Hasher;
use log::warn;
use static_assertions::const_assert_eq;
use std::mem;
use thiserror::Error;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, byteorder::little_endian::U32,
    transmute,
};

use crate::Bin2Uf2Error;

pub const NAME_FIELD_LEN: usize = 32;
pub const TRAILER_SIZE: usize = mem::size_of::<TrailerBytes>();

#[repr(C)]
#[derive(Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
struct TrailerBytes {
    name: [u8; NAME_FIELD_LEN],
    autoclock_hz: U32,
    checksum: U32,
}

const_assert_eq!(TRAILER_SIZE, 40);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NameEncodingError {
    #[error("name contains a NUL byte")]
    ContainsNul,
    #[error("truncating the name to {0} bytes would split a multi-byte character")]
    SplitCharacter(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetadataTrailer {
    pub name_field: [u8; NAME_FIELD_LEN],
    pub autoclock_hz: u32,
    pub checksum: u32,
}

impl MetadataTrailer {
    /// Builds the trailer for `image`, checksumming the image along with the
    /// encoded name and clock.
    pub fn build(image: &[u8], name: &str, autoclock_hz: u64) -> Result<Self, Bin2Uf2Error> {
        let name_field = encode_name(name)?;
        let autoclock_hz =
            u32::try_from(autoclock_hz).map_err(|_| Bin2Uf2Error::ValueOutOfRange {
                field: "autoclock",
                value: autoclock_hz,
            })?;

        let mut trailer = Self {
            name_field,
            autoclock_hz,
            checksum: 0,
        };
        trailer.checksum = trailer.compute_checksum(image);

        Ok(trailer)
    }

    fn compute_checksum(&self, image: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(image);
        hasher.update(&self.name_field);
        hasher.update(&self.autoclock_hz.to_le_bytes());
        hasher.finalize()
    }

    /// True if the stored checksum matches `image`.
    pub fn verify(&self, image: &[u8]) -> bool {
        self.compute_checksum(image) == self.checksum
    }

    /// The name with its zero padding removed.
    pub fn name(&self) -> &str {
        let len = self
            .name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_FIELD_LEN);

        // A trailer read off a device may hold anything
        match std::str::from_utf8(&self.name_field[..len]) {
            Ok(name) => name,
            Err(err) => std::str::from_utf8(&self.name_field[..err.valid_up_to()]).unwrap_or(""),
        }
    }

    pub fn to_bytes(&self) -> [u8; TRAILER_SIZE] {
        let raw = TrailerBytes {
            name: self.name_field,
            autoclock_hz: U32::new(self.autoclock_hz),
            checksum: U32::new(self.checksum),
        };

        transmute!(raw)
    }

    pub fn from_bytes(bytes: &[u8; TRAILER_SIZE]) -> Self {
        let raw: TrailerBytes = transmute!(*bytes);

        Self {
            name_field: raw.name,
            autoclock_hz: raw.autoclock_hz.get(),
            checksum: raw.checksum.get(),
        }
    }
}

/// Names longer than the field are cut at the field width, but only on a
/// character boundary; anything else is rejected.
fn encode_name(name: &str) -> Result<[u8; NAME_FIELD_LEN], NameEncodingError> {
    if name.contains('\0') {
        return Err(NameEncodingError::ContainsNul);
    }

    let name = if name.len() > NAME_FIELD_LEN {
        if !name.is_char_boundary(NAME_FIELD_LEN) {
            return Err(NameEncodingError::SplitCharacter(NAME_FIELD_LEN));
        }
        let truncated = &name[..NAME_FIELD_LEN];
        warn!(
            "Name \"{}\" is longer than {} bytes, truncated to \"{}\"",
            name, NAME_FIELD_LEN, truncated
        );
        truncated
    } else {
        name
    };

    let mut field = [0; NAME_FIELD_LEN];
    field[..name.len()].copy_from_slice(name.as_bytes());
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let trailer = MetadataTrailer::build(&[1, 2, 3], "fw-a", 133_000_000).unwrap();
        let bytes = trailer.to_bytes();

        assert_eq!(&bytes[..4], b"fw-a");
        assert!(bytes[4..32].iter().all(|&b| b == 0));
        assert_eq!(&bytes[32..36], &133_000_000u32.to_le_bytes());
        assert_eq!(&bytes[36..40], &trailer.checksum.to_le_bytes());
    }

    #[test]
    fn checksum_covers_image_name_and_clock() {
        let image = b"firmware image";
        let trailer = MetadataTrailer::build(image, "blinky", 48_000_000).unwrap();

        let mut covered = image.to_vec();
        covered.extend_from_slice(&trailer.to_bytes()[..36]);
        assert_eq!(trailer.checksum, crc32fast::hash(&covered));

        assert!(trailer.verify(image));
        assert!(!trailer.verify(b"firmware imagf"));
    }

    #[test]
    fn checksum_is_standard_crc32() {
        let trailer = MetadataTrailer::build(b"", "", 0).unwrap();
        assert_eq!(trailer.checksum, crc32fast::hash(&[0; 36]));
        assert_eq!(crc32fast::hash(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn build_is_deterministic() {
        let a = MetadataTrailer::build(b"abc", "name", 12).unwrap();
        let b = MetadataTrailer::build(b"abc", "name", 12).unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn full_width_name_has_no_terminator() {
        let name = "0123456789abcdef0123456789abcdef";
        let trailer = MetadataTrailer::build(b"", name, 0).unwrap();
        assert_eq!(&trailer.name_field, name.as_bytes());
        assert_eq!(trailer.name(), name);
    }

    #[test]
    fn long_ascii_name_is_truncated() {
        let name = "a-very-long-firmware-name-that-keeps-going";
        let trailer = MetadataTrailer::build(b"", name, 0).unwrap();
        assert_eq!(trailer.name(), &name[..NAME_FIELD_LEN]);
    }

    #[test]
    fn truncation_inside_multibyte_character_is_rejected() {
        // 31 ASCII bytes followed by a two byte character straddling the limit
        let name = format!("{}é", "x".repeat(31));
        assert!(matches!(
            MetadataTrailer::build(b"", &name, 0),
            Err(Bin2Uf2Error::NameEncoding(NameEncodingError::SplitCharacter(32)))
        ));
    }

    #[test]
    fn truncation_on_character_boundary_is_accepted() {
        let name = format!("{}ééé", "x".repeat(30));
        let trailer = MetadataTrailer::build(b"", &name, 0).unwrap();
        assert_eq!(trailer.name(), format!("{}é", "x".repeat(30)));
    }

    #[test]
    fn nul_in_name_is_rejected() {
        assert!(matches!(
            MetadataTrailer::build(b"", "fw\0a", 0),
            Err(Bin2Uf2Error::NameEncoding(NameEncodingError::ContainsNul))
        ));
    }

    #[test]
    fn clock_must_fit_in_32_bits() {
        assert!(MetadataTrailer::build(b"", "", u32::MAX as u64).is_ok());
        assert!(matches!(
            MetadataTrailer::build(b"", "", u32::MAX as u64 + 1),
            Err(Bin2Uf2Error::ValueOutOfRange {
                field: "autoclock",
                value: 0x1_0000_0000
            })
        ));
    }

    #[test]
    fn from_bytes_reverses_to_bytes() {
        let trailer = MetadataTrailer::build(b"\x01\x02", "slot", 25_000_000).unwrap();
        assert_eq!(MetadataTrailer::from_bytes(&trailer.to_bytes()), trailer);
    }
}
