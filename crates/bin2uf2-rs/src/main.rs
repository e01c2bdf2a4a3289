use bin2uf2_core::{devices::DeviceIter, frequency::parse_frequency};
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::*;

use std::{io::Write, path::PathBuf};

use crate::{convert::convert, deploy::deploy, info::info};

mod convert;
mod deploy;
mod info;
mod reporter;

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a raw image to a UF2 file on disk
    #[command(arg_required_else_help = true)]
    Convert {
        /// Input image
        input: PathBuf,

        /// Output UF2 file
        output: PathBuf,

        #[command(flatten)]
        image: ImageArgs,
    },
    /// Write a raw image directly to a connected bootloader drive
    #[command(arg_required_else_help = true)]
    Deploy {
        /// Input image
        input: PathBuf,

        #[command(flatten)]
        image: ImageArgs,
    },
    /// Decode a UF2 file and check its metadata trailer
    #[command(arg_required_else_help = true)]
    Info {
        /// UF2 file to inspect
        input: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ImageArgs {
    /// Target device (rp2040, fpga-bitstream)
    #[clap(short, long, value_parser = device_parser)]
    pub device: String,

    /// Flash slot to place the image in
    #[clap(short, long)]
    pub slot: u8,

    /// Name stored in the metadata trailer, defaults to the input file name
    #[clap(short, long)]
    pub name: Option<String>,

    /// Clock the bootloader configures before starting the image, e.g. 48MHz
    #[clap(short, long, value_parser = parse_frequency, default_value = "0")]
    pub autoclock: u32,
}

fn device_parser(s: &str) -> Result<String, String> {
    if let Some(device) = DeviceIter::find_by_name(s) {
        Ok(device.device_name().to_string())
    } else {
        let known: Vec<_> = DeviceIter::new().map(|d| d.device_name()).collect();
        Err(format!(
            "Unknown device '{}', expected one of: {}",
            s,
            known.join(", ")
        ))
    }
}

#[derive(Parser, Debug, Default)]
#[clap(version, about, long_about = None, author = "Jonathan Nilsson")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Set the logging verbosity
    #[clap(short, long, value_enum, global = true, default_value_t = LogLevel::Info)]
    verbose: LogLevel,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default())
        .filter_level(cli.verbose.into())
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            let level = record.level();
            if level == Level::Info {
                writeln!(buf, "{}", record.args())
            } else {
                writeln!(buf, "{}: {}", record.level(), record.args())
            }
        })
        .init();

    let command = match cli.command {
        Some(command) => command,
        None => return Ok(()),
    };

    match command {
        Command::Convert {
            input,
            output,
            image,
        } => convert(&input, &output, &image),
        Command::Deploy { input, image } => deploy(&input, &image),
        Command::Info { input } => info(&input),
    }
}
