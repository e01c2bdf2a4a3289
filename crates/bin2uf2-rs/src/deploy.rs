use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

use log::info;
use sysinfo::Disks;

use crate::{ImageArgs, convert::write_image};

pub fn deploy<P: AsRef<Path>>(
    input_path: &P,
    image: &ImageArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let disks = Disks::new_with_refreshed_list();

    let mut uf2_drive = None;
    for disk in &disks {
        let mount = disk.mount_point();

        if mount.join("INFO_UF2.TXT").is_file() {
            info!("Found uf2 disk {}", &mount.to_string_lossy());
            uf2_drive = Some(mount.to_owned());
            break;
        }
    }

    let output_path = match uf2_drive {
        Some(drive) => drive.join("out.uf2"),
        None => return Err("Unable to find a mounted UF2 bootloader drive".into()),
    };

    let output = BufWriter::new(File::create(&output_path)?);

    info!("Transfering image to slot {}", image.slot);

    if let Err(err) = write_image(input_path.as_ref(), image, output) {
        fs::remove_file(output_path)?;
        return Err(err);
    }

    Ok(())
}
