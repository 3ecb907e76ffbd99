//! Streaming decoder for serial SRAM command sessions.
//!
//! A session is laid out as:
//!
//! ```text
//! | lead-in | opcode | addr 0 | addr 1 | addr 2 | data / mode | ...ignored |
//! ```
//!
//! Each byte advances the decoder by exactly one phase. Chip select
//! assertion always restarts at the idle phase, and a session that ends
//! before its data byte is dropped without producing further elements.

use crate::instruction::{address_byte0, address_byte1, address_byte2, Instruction, Mode};
use crate::spi::{TransferEvent, TransferKind};
use crate::{DecoderConfig, TimeSpan};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Header,
    Instruction,
    Address,
    Data,
}

/// Value of a data-phase element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataValue {
    /// Byte as seen on the wire
    Byte(u8),
    /// Mode register contents, filled in by consumers that track the
    /// session's instruction
    Mode(Mode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementPayload {
    Header,
    Instruction { instruction: Instruction, opcode: u8 },
    Address { address: u32 },
    Data { value: DataValue },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodedElement {
    pub span: TimeSpan,
    #[serde(flatten)]
    pub payload: ElementPayload,
}

impl DecodedElement {
    pub fn new(span: TimeSpan, payload: ElementPayload) -> Self {
        Self { span, payload }
    }

    pub fn kind(&self) -> ElementKind {
        match self.payload {
            ElementPayload::Header => ElementKind::Header,
            ElementPayload::Instruction { .. } => ElementKind::Instruction,
            ElementPayload::Address { .. } => ElementKind::Address,
            ElementPayload::Data { .. } => ElementKind::Data,
        }
    }
}

impl fmt::Display for DecodedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload {
            ElementPayload::Header => write!(f, "Header"),
            ElementPayload::Instruction { instruction, .. } => write!(f, "Cmd {}", instruction.name()),
            ElementPayload::Address { address } => write!(f, "Address 0x{address:08X}"),
            ElementPayload::Data { value: DataValue::Byte(byte) } => write!(f, "Data: 0x{byte:02X}"),
            ElementPayload::Data { value: DataValue::Mode(mode) } => write!(f, "{} Mode", mode.name()),
        }
    }
}

/// Position within a session. Each variant carries exactly the fields that
/// are valid at that point.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    AwaitOpcode,
    AwaitAddressByte0 { instruction: Instruction },
    AwaitAddressByte1 { instruction: Instruction, address: u32, frame_start: TimeSpan },
    AwaitAddressByte2 { instruction: Instruction, address: u32, frame_start: TimeSpan },
    AwaitDataOrRegister { instruction: Instruction },
    Sink { instruction: Instruction },
}

impl Phase {
    fn instruction(&self) -> Option<Instruction> {
        match *self {
            Phase::Idle | Phase::AwaitOpcode => None,
            Phase::AwaitAddressByte0 { instruction }
            | Phase::AwaitAddressByte1 { instruction, .. }
            | Phase::AwaitAddressByte2 { instruction, .. }
            | Phase::AwaitDataOrRegister { instruction }
            | Phase::Sink { instruction } => Some(instruction),
        }
    }
}

/// Running counters. They never influence decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    pub sessions: u64,
    pub completed: u64,
    pub truncated: u64,
    pub bytes: u64,
}

pub struct ProtocolDecoder {
    config: DecoderConfig,
    phase: Phase,
    session_open: bool,
    stats: DecoderStats,
}

impl Default for ProtocolDecoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl ProtocolDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            session_open: false,
            stats: DecoderStats::default(),
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Drop any partial session, as if chip select had just been asserted.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Process one event, returning the element it completes, if any.
    pub fn feed(&mut self, event: &TransferEvent) -> Option<DecodedElement> {
        match event.kind {
            TransferKind::SessionStart => {
                self.stats.sessions += 1;
                self.session_open = true;
                self.reset();
                None
            }
            TransferKind::ByteTransferred => {
                self.stats.bytes += 1;
                self.on_byte(event.mosi.unwrap_or(0), event.span)
            }
            TransferKind::SessionEnd => {
                self.on_session_end();
                None
            }
        }
    }

    pub fn decode_all<'a, I>(&mut self, events: I) -> Vec<DecodedElement>
    where
        I: IntoIterator<Item = &'a TransferEvent>,
    {
        events.into_iter().filter_map(|event| self.feed(event)).collect()
    }

    fn on_byte(&mut self, byte: u8, span: TimeSpan) -> Option<DecodedElement> {
        let (next, payload) = match self.phase {
            Phase::Idle => (Phase::AwaitOpcode, Some(ElementPayload::Header)),
            Phase::AwaitOpcode => {
                let instruction = Instruction::from_opcode(byte);
                (
                    Phase::AwaitAddressByte0 { instruction },
                    Some(ElementPayload::Instruction { instruction, opcode: byte }),
                )
            }
            Phase::AwaitAddressByte0 { instruction } => (
                Phase::AwaitAddressByte1 { instruction, address: address_byte0(byte), frame_start: span },
                None,
            ),
            Phase::AwaitAddressByte1 { instruction, address, frame_start } => (
                Phase::AwaitAddressByte2 { instruction, address: address | address_byte1(byte), frame_start },
                None,
            ),
            Phase::AwaitAddressByte2 { instruction, address, frame_start } => {
                let address = address | address_byte2(byte);
                return self.advance(
                    Phase::AwaitDataOrRegister { instruction },
                    Some(DecodedElement::new(TimeSpan::merge(frame_start, span), ElementPayload::Address { address })),
                );
            }
            Phase::AwaitDataOrRegister { instruction } => (
                Phase::Sink { instruction },
                Some(ElementPayload::Data { value: DataValue::Byte(byte) }),
            ),
            Phase::Sink { .. } => (self.phase, None),
        };
        self.advance(next, payload.map(|payload| DecodedElement::new(span, payload)))
    }

    fn advance(&mut self, next: Phase, element: Option<DecodedElement>) -> Option<DecodedElement> {
        if next != self.phase {
            trace!("spi: {:?} -> {:?}", self.phase, next);
        }
        self.phase = next;
        element
    }

    fn on_session_end(&mut self) {
        if self.session_open {
            match self.phase {
                Phase::Sink { .. } => self.stats.completed += 1,
                phase => {
                    self.stats.truncated += 1;
                    debug!(
                        "spi: session ended early in {phase:?} (instruction {:?}), partial state dropped",
                        phase.instruction()
                    );
                }
            }
        }
        self.session_open = false;
        self.phase = Phase::Idle;
    }
}
