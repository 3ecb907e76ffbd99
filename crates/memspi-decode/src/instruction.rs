//! Instruction set and mode register of the 23x512-class serial SRAM.

use serde::{Deserialize, Serialize};

/// Write data to memory array
pub const WRITE: u8 = 0x02;
/// Read data from memory array
pub const READ: u8 = 0x03;
/// Write mode register
pub const WRMR: u8 = 0x01;
/// Read mode register
pub const RDMR: u8 = 0x05;

/// Significant opcode bits; the top two are don't-care.
pub const OPCODE_MASK: u8 = 0x3F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    Write,
    Read,
    WriteModeRegister,
    ReadModeRegister,
    Unknown,
}

impl Instruction {
    /// Classify an opcode byte. Reserved high bits are ignored.
    pub fn from_opcode(opcode: u8) -> Self {
        match opcode & OPCODE_MASK {
            WRITE => Self::Write,
            READ => Self::Read,
            WRMR => Self::WriteModeRegister,
            RDMR => Self::ReadModeRegister,
            _ => Self::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Write => "Write",
            Self::Read => "Read",
            Self::WriteModeRegister => "Write Mode Register",
            Self::ReadModeRegister => "Read Mode Register",
            Self::Unknown => "Unknown",
        }
    }

    pub fn is_mode_register_access(&self) -> bool {
        matches!(self, Self::WriteModeRegister | Self::ReadModeRegister)
    }
}

/// Operating mode held in bits 7:6 of the mode register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Byte,
    Sequential,
    Page,
    Reserved,
}

impl Mode {
    pub fn from_register(value: u8) -> Self {
        match (value & 0xC0) >> 6 {
            0x00 => Self::Byte,
            0x01 => Self::Sequential,
            0x02 => Self::Page,
            _ => Self::Reserved,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Byte => "Byte",
            Self::Sequential => "Sequential",
            Self::Page => "Page",
            Self::Reserved => "Reserved",
        }
    }
}

/// Assemble the address field from its three wire bytes.
///
/// The field is not byte aligned: byte 0 carries bits 6:4 at positions 30:28
/// and bits 1:0 at positions 16:15, byte 1 fills 14:7 and byte 2 contributes
/// its upper seven bits at 6:0. The result can use more than 24 bits.
pub fn assemble_address(byte0: u8, byte1: u8, byte2: u8) -> u32 {
    address_byte0(byte0) | address_byte1(byte1) | address_byte2(byte2)
}

pub(crate) fn address_byte0(byte: u8) -> u32 {
    ((byte as u32 & 0x70) << 24) | ((byte as u32 & 0x03) << 15)
}

pub(crate) fn address_byte1(byte: u8) -> u32 {
    (byte as u32) << 7
}

pub(crate) fn address_byte2(byte: u8) -> u32 {
    (byte as u32 & 0xFE) >> 1
}
