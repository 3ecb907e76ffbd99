//! memspi - decode serial SRAM SPI command captures
//!
//! Reads SPI transfer events either from a capture file or live from a
//! sniffer on a serial port, and prints the decoded header, instruction,
//! address and data/mode elements of each session.

mod cli;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, OutputArgs};
use memspi_core::annotate::render_line;
use memspi_core::{capture, AnnotationLog, Annotator, SnifferConfig, SnifferEvent, SnifferService};
use memspi_decode::{DecodedElement, DecoderConfig};
use settings::Settings;
use std::io::Write;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // -v/-vv pick the level; RUST_LOG still overrides per module
    env_logger::Builder::new()
        .filter_level(verbosity_level(cli.verbose))
        .parse_default_env()
        .init();

    let settings = settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Decode { capture, json, output } => run_decode(&capture, json, &output, &settings),
        Commands::Listen { port, baud, output } => run_listen(port, baud, &output, &settings),
        Commands::Ports => {
            run_ports();
            Ok(())
        }
    }
}

fn verbosity_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn decoder_config(output: &OutputArgs, settings: &Settings) -> DecoderConfig {
    DecoderConfig {
        addressing_mode: output.mode.unwrap_or(settings.addressing_mode),
    }
}

fn run_decode(path: &Path, json: bool, output: &OutputArgs, settings: &Settings) -> Result<()> {
    let events = capture::load(path).with_context(|| format!("failed to load capture {}", path.display()))?;

    let config = decoder_config(output, settings);
    log::debug!("addressing mode: {}", config.addressing_mode);
    let mut annotator = Annotator::new(config);
    let annotations = annotator.annotate_all(&events);

    let stats = annotator.stats();
    log::info!(
        "{} events, {} sessions ({} complete, {} truncated)",
        events.len(),
        stats.sessions,
        stats.completed,
        stats.truncated
    );

    if json {
        let elements: Vec<DecodedElement> = annotations
            .iter()
            .filter(|a| !output.hide.contains(&a.element.kind()))
            .map(|a| a.element)
            .collect();
        println!("{}", serde_json::to_string_pretty(&elements)?);
        return Ok(());
    }

    if annotations.len() > settings.max_entries {
        log::warn!(
            "{} elements decoded, showing the last {}",
            annotations.len(),
            settings.max_entries
        );
    }

    let mut log_store = AnnotationLog::new(settings.max_entries);
    for kind in &output.hide {
        log_store.set_visible(*kind, false);
    }
    for annotation in annotations {
        log_store.push(annotation);
    }
    print!("{}", log_store.to_text(output.timestamps || settings.show_timestamp));
    Ok(())
}

fn run_listen(port: String, baud: u32, output: &OutputArgs, settings: &Settings) -> Result<()> {
    let config = SnifferConfig {
        port_name: port,
        baud_rate: baud,
        decoder: decoder_config(output, settings),
    };
    let show_timestamp = output.timestamps || settings.show_timestamp;
    let service = SnifferService::open(config);
    log::debug!("opening {} at {} baud", service.config().port_name, service.config().baud_rate);

    let mut stdout = std::io::stdout().lock();
    let mut closing = false;
    while let Ok(event) = service.events().recv() {
        match event {
            SnifferEvent::Opened(name) => log::info!("listening on {name}"),
            SnifferEvent::Annotation(annotation) => {
                if closing || output.hide.contains(&annotation.element.kind()) {
                    continue;
                }
                // Output closed (e.g. piped into `head`): stop the worker and drain
                if writeln!(stdout, "{}", render_line(&annotation, show_timestamp)).is_err() {
                    closing = true;
                    service.close();
                }
            }
            SnifferEvent::Reset => log::info!("decoder reset"),
            SnifferEvent::Error(e) => log::error!("{e}"),
            SnifferEvent::Closed => break,
        }
    }
    Ok(())
}

fn run_ports() {
    let ports = SnifferService::list_ports();
    if ports.is_empty() {
        println!("No serial ports found");
        return;
    }
    for p in ports {
        match (p.vid, p.pid) {
            (Some(vid), Some(pid)) => println!(
                "{} ({:04X}:{:04X}) {}",
                p.port_name,
                vid,
                pid,
                p.product.as_deref().unwrap_or("")
            ),
            _ => println!("{} [{}]", p.port_name, p.port_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memspi_decode::AddressingMode;

    #[test]
    fn test_verbosity_level() {
        assert_eq!(verbosity_level(0), log::LevelFilter::Info);
        assert_eq!(verbosity_level(1), log::LevelFilter::Debug);
        assert_eq!(verbosity_level(2), log::LevelFilter::Trace);
        assert_eq!(verbosity_level(9), log::LevelFilter::Trace);
    }

    #[test]
    fn test_logger_honours_verbosity() {
        let logger = env_logger::Builder::new().filter_level(verbosity_level(1)).build();
        let debug = log::Metadata::builder().level(log::Level::Debug).target("memspi_decode::decoder").build();
        let trace = log::Metadata::builder().level(log::Level::Trace).target("memspi_decode::decoder").build();
        assert!(log::Log::enabled(&logger, &debug));
        assert!(!log::Log::enabled(&logger, &trace));
    }

    #[test]
    fn test_cli_mode_overrides_settings() {
        let settings = Settings { addressing_mode: AddressingMode::Page, ..Settings::default() };

        let output = OutputArgs { mode: Some(AddressingMode::Byte), ..OutputArgs::default() };
        assert_eq!(decoder_config(&output, &settings).addressing_mode, AddressingMode::Byte);

        let output = OutputArgs::default();
        assert_eq!(decoder_config(&output, &settings).addressing_mode, AddressingMode::Page);
    }
}
