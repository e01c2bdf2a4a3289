use std::{fs, path::Path};

use bin2uf2_core::{
    decode::{decode_blocks, locate_trailer},
    devices::DeviceIter,
};
use log::{info, warn};

pub fn info<P: AsRef<Path>>(input_path: &P) -> Result<(), Box<dyn std::error::Error>> {
    let input_path = input_path.as_ref();
    let bytes = fs::read(input_path)?;

    let image = decode_blocks(&bytes)?;

    info!("File:          {}", input_path.display());
    info!("Blocks:        {}", image.block_count);

    match DeviceIter::find_by_family(image.family_id) {
        Some(device) => {
            info!(
                "Family:        {:#010x} ({})",
                image.family_id,
                device.device_name()
            );
            match device.slot_table().slot_for_address(image.start_address) {
                Some(slot) if slot.base_address == image.start_address => {
                    info!("Start address: {:#010x} (slot {})", image.start_address, slot.index)
                }
                Some(slot) => warn!(
                    "Start address {:#010x} is inside slot {} but not at its base {:#010x}",
                    image.start_address, slot.index, slot.base_address
                ),
                None => warn!(
                    "Start address {:#010x} is outside every slot of {}",
                    image.start_address,
                    device.device_name()
                ),
            }
        }
        None => {
            info!("Family:        {:#010x} (unknown)", image.family_id);
            info!("Start address: {:#010x}", image.start_address);
        }
    }

    let (image_len, trailer) = locate_trailer(&image.payload)?;

    info!("Image size:    {} bytes", image_len);
    info!("Name:          {}", trailer.name());
    info!("Autoclock:     {} Hz", trailer.autoclock_hz);
    info!("Checksum:      {:#010x} (ok)", trailer.checksum);

    Ok(())
}
