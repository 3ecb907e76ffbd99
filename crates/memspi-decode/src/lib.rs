//! Decoder for the serial SRAM/EEPROM SPI command set.
//!
//! Feed [`TransferEvent`]s in capture order into a [`ProtocolDecoder`] and
//! collect the [`DecodedElement`]s it returns.

pub mod config;
pub mod decoder;
pub mod instruction;
pub mod spi;

pub use config::{AddressingMode, DecoderConfig};
pub use decoder::{DataValue, DecodedElement, DecoderStats, ElementKind, ElementPayload, ProtocolDecoder};
pub use instruction::{assemble_address, Instruction, Mode};
pub use spi::{TransferEvent, TransferKind};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start_s: f64,
    pub end_s: f64,
}

impl TimeSpan {
    pub fn new(start_s: f64, end_s: f64) -> Self {
        Self { start_s, end_s }
    }

    /// Span from the start of `first` to the end of `last`.
    pub fn merge(first: TimeSpan, last: TimeSpan) -> Self {
        Self { start_s: first.start_s, end_s: last.end_s }
    }
}
