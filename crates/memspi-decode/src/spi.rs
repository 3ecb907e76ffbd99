//! SPI transfer events as delivered by the capture pipeline.

use crate::TimeSpan;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    /// Chip select asserted.
    SessionStart,
    /// One byte shifted on both data lines.
    ByteTransferred,
    /// Chip select released.
    SessionEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub kind: TransferKind,
    #[serde(default)]
    pub mosi: Option<u8>,
    #[serde(default)]
    pub miso: Option<u8>,
    pub span: TimeSpan,
}

impl TransferEvent {
    pub fn session_start(span: TimeSpan) -> Self {
        Self { kind: TransferKind::SessionStart, mosi: None, miso: None, span }
    }

    pub fn byte(mosi: u8, miso: Option<u8>, span: TimeSpan) -> Self {
        Self { kind: TransferKind::ByteTransferred, mosi: Some(mosi), miso, span }
    }

    pub fn session_end(span: TimeSpan) -> Self {
        Self { kind: TransferKind::SessionEnd, mosi: None, miso: None, span }
    }
}
