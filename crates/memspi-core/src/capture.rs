//! Loading SPI transfer events from capture files.
//!
//! The text format has one event per line:
//!
//! ```text
//! # start_s   end_s      kind    mosi miso
//! 0.000100    0.000100   enable
//! 0.000120    0.000160   result  02   FF
//! 0.000400    0.000400   disable
//! ```
//!
//! `kind` accepts the analyzer frame names (`enable`, `result`, `disable`)
//! or `start`, `byte`, `end`. Bytes are hex with an optional `0x` prefix.

use memspi_decode::{TimeSpan, TransferEvent};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to read capture: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON capture: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

/// Parse one line of a text capture. Blank lines and comments yield `None`.
pub fn parse_line(text: &str, line: usize) -> Result<Option<TransferEvent>, CaptureError> {
    let syntax = |message: String| CaptureError::Syntax { line, message };

    let text = text.split('#').next().unwrap_or("").trim();
    if text.is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(syntax(format!("expected '<start> <end> <kind>', got '{text}'")));
    }

    let start_s = parse_time(fields[0]).map_err(syntax)?;
    let end_s = parse_time(fields[1]).map_err(syntax)?;
    let span = TimeSpan::new(start_s, end_s);

    let event = match fields[2].to_ascii_lowercase().as_str() {
        "enable" | "start" => TransferEvent::session_start(span),
        "disable" | "end" => TransferEvent::session_end(span),
        "result" | "byte" => {
            let mosi = fields
                .get(3)
                .ok_or_else(|| syntax("byte event without a mosi value".to_string()))
                .and_then(|s| parse_byte(s).map_err(syntax))?;
            let miso = fields.get(4).map(|s| parse_byte(s)).transpose().map_err(syntax)?;
            TransferEvent::byte(mosi, miso, span)
        }
        other => return Err(syntax(format!("unknown event kind '{other}'"))),
    };

    Ok(Some(event))
}

pub fn parse_text(text: &str) -> Result<Vec<TransferEvent>, CaptureError> {
    let mut events = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(event) = parse_line(line, idx + 1)? {
            events.push(event);
        }
    }
    Ok(events)
}

/// Read a JSON array of transfer events.
pub fn read_json(text: &str) -> Result<Vec<TransferEvent>, CaptureError> {
    Ok(serde_json::from_str(text)?)
}

/// Load a capture, picking the format from the file extension.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<TransferEvent>, CaptureError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let events = if is_json { read_json(&text)? } else { parse_text(&text)? };
    log::debug!("loaded {} transfer events from {}", events.len(), path.display());
    Ok(events)
}

fn parse_time(s: &str) -> Result<f64, String> {
    s.parse::<f64>().map_err(|e| format!("invalid timestamp '{s}': {e}"))
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let padded = if digits.len() == 1 { format!("0{digits}") } else { digits.to_string() };
    match hex::decode(&padded) {
        Ok(bytes) if bytes.len() == 1 => Ok(bytes[0]),
        Ok(_) => Err(format!("'{s}' is not a single byte")),
        Err(e) => Err(format!("invalid hex byte '{s}': {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memspi_decode::TransferKind;

    #[test]
    fn test_parse_line_kinds() {
        let start = parse_line("0.5 0.5 enable", 1).unwrap().unwrap();
        assert_eq!(start.kind, TransferKind::SessionStart);
        assert_eq!(start.span, TimeSpan::new(0.5, 0.5));

        let byte = parse_line("1.0 1.25 result 0x02 ff", 2).unwrap().unwrap();
        assert_eq!(byte.kind, TransferKind::ByteTransferred);
        assert_eq!(byte.mosi, Some(0x02));
        assert_eq!(byte.miso, Some(0xFF));

        let end = parse_line("2 2 END", 3).unwrap().unwrap();
        assert_eq!(end.kind, TransferKind::SessionEnd);
    }

    #[test]
    fn test_parse_line_skips_comments() {
        assert!(parse_line("", 1).unwrap().is_none());
        assert!(parse_line("   # header", 1).unwrap().is_none());
        let event = parse_line("0 1 byte A # trailing", 1).unwrap().unwrap();
        assert_eq!(event.mosi, Some(0x0A));
        assert_eq!(event.miso, None);
    }

    #[test]
    fn test_parse_line_errors() {
        assert!(matches!(parse_line("0 1", 7), Err(CaptureError::Syntax { line: 7, .. })));
        assert!(matches!(parse_line("x 1 enable", 1), Err(CaptureError::Syntax { .. })));
        assert!(matches!(parse_line("0 1 result", 1), Err(CaptureError::Syntax { .. })));
        assert!(matches!(parse_line("0 1 result 1FF", 1), Err(CaptureError::Syntax { .. })));
        assert!(matches!(parse_line("0 1 result zz", 1), Err(CaptureError::Syntax { .. })));
        assert!(matches!(parse_line("0 1 blink", 1), Err(CaptureError::Syntax { .. })));
    }

    #[test]
    fn test_parse_text_reports_line() {
        let text = "0 0 enable\n\n0 1 byte 02\n0 1 byte\n";
        match parse_text(text) {
            Err(CaptureError::Syntax { line, .. }) => assert_eq!(line, 4),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(parse_text("0 0 enable\n0 1 byte 02\n0 2 end\n").unwrap().len(), 3);
    }

    #[test]
    fn test_read_json() {
        let text = r#"[
            {"kind": "SessionStart", "span": {"start_s": 0.0, "end_s": 0.0}},
            {"kind": "ByteTransferred", "mosi": 3, "span": {"start_s": 0.1, "end_s": 0.2}},
            {"kind": "SessionEnd", "span": {"start_s": 0.3, "end_s": 0.3}}
        ]"#;
        let events = read_json(text).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].mosi, Some(3));
        assert_eq!(events[1].miso, None);
        assert!(matches!(read_json("{"), Err(CaptureError::Json(_))));
    }

    #[test]
    fn test_load_demo_capture() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/mode_then_write.txt");
        let events = load(&path).unwrap();
        assert_eq!(events.len(), 22);

        let mut annotator = crate::Annotator::new(Default::default());
        let texts: Vec<String> = annotator.annotate_all(&events).into_iter().map(|a| a.text).collect();
        assert_eq!(
            texts,
            vec![
                "Header",
                "Cmd Write Mode Register",
                "Address 0x00000000",
                "Sequential Mode",
                "Header",
                "Cmd Write",
                "Address 0x10001018",
                "Data: 0xA5",
                "Header",
                "Cmd Read",
            ]
        );
        let stats = annotator.stats();
        assert_eq!((stats.sessions, stats.completed, stats.truncated), (3, 2, 1));
    }
}
