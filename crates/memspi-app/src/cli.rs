//! CLI argument parsing

use clap::{Parser, Subcommand};
use memspi_decode::{AddressingMode, ElementKind};
use std::path::PathBuf;

fn parse_kind(s: &str) -> Result<ElementKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "header" => Ok(ElementKind::Header),
        "instruction" | "cmd" => Ok(ElementKind::Instruction),
        "address" => Ok(ElementKind::Address),
        "data" => Ok(ElementKind::Data),
        _ => Err(format!("unknown element kind '{s}' (expected header, instruction, address or data)")),
    }
}

#[derive(Parser)]
#[command(name = "memspi")]
#[command(author, version, about = "Serial SRAM SPI command decoder", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file (JSON). Defaults to <config dir>/memspi/settings.json
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output options shared by decode and listen
#[derive(clap::Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Addressing mode selected on the device (sequential, byte, page)
    #[arg(long)]
    pub mode: Option<AddressingMode>,

    /// Prefix each line with the element start time
    #[arg(long)]
    pub timestamps: bool,

    /// Element kinds to hide (comma-separated)
    #[arg(long, value_delimiter = ',', value_parser = parse_kind)]
    pub hide: Vec<ElementKind>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode a capture file (.json, or the line-based text format)
    Decode {
        /// Capture file
        capture: PathBuf,

        /// Print decoded elements as a JSON array
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Decode events streamed live from a sniffer on a serial port
    Listen {
        /// Serial port name
        port: String,

        /// Baud rate
        #[arg(short, long, default_value_t = 115_200)]
        baud: u32,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List available serial ports
    Ports,
}
