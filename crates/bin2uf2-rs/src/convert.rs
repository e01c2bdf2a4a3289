use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use bin2uf2_core::{
    ConversionRequest, build_blocks,
    devices::{DeviceIter, DeviceInfo},
    write_output,
};
use log::{LevelFilter, info};

use crate::{ImageArgs, reporter::ProgressBarReporter};

pub fn convert<P1: AsRef<Path>, P2: AsRef<Path>>(
    input_path: &P1,
    output_path: &P2,
    image: &ImageArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_path = output_path.as_ref().with_extension("uf2");

    let output = BufWriter::new(File::create(&output_path)?);

    info!("Writing {}", output_path.display());

    if let Err(err) = write_image(input_path.as_ref(), image, output) {
        fs::remove_file(output_path)?;
        return Err(err);
    }

    Ok(())
}

/// Converts the image at `input_path` and streams the blocks to `output`.
pub fn write_image(
    input_path: &Path,
    image: &ImageArgs,
    output: impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let device = find_device(&image.device)?;
    let binary = fs::read(input_path)?;

    let name = match &image.name {
        Some(name) => name.clone(),
        None => input_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    info!(
        "Using UF2 Family {:#010x}, slot {}, name \"{}\", autoclock {} Hz",
        device.family_id(),
        image.slot,
        name,
        image.autoclock
    );

    let request = ConversionRequest {
        binary: &binary,
        slot: image.slot,
        name: &name,
        autoclock_hz: image.autoclock,
    };
    let blocks = build_blocks(&request, device.as_ref())?;

    if log::max_level() >= LevelFilter::Info {
        let mut reporter = ProgressBarReporter::new(blocks.len(), output);
        let result = write_output(&blocks, &mut reporter);
        reporter.finish();
        println!();
        result?;
    } else {
        write_output(&blocks, output)?;
    }

    Ok(())
}

fn find_device(name: &str) -> Result<Box<dyn DeviceInfo>, Box<dyn std::error::Error>> {
    DeviceIter::find_by_name(name).ok_or_else(|| format!("Unknown device '{}'", name).into())
}
