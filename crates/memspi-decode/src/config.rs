use serde::{Deserialize, Serialize};
use std::fmt;

/// Addressing mode selected by the user for presentation.
///
/// The decode state machine does not look at this value; it only travels
/// with the decoder so consumers can read it back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressingMode {
    #[default]
    Sequential,
    Byte,
    Page,
}

impl std::str::FromStr for AddressingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "byte" => Ok(Self::Byte),
            "page" => Ok(Self::Page),
            _ => Err(format!("unknown addressing mode '{s}' (expected sequential, byte or page)")),
        }
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sequential => "Sequential",
            Self::Byte => "Byte",
            Self::Page => "Page",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub addressing_mode: AddressingMode,
}
