use crate::annotate::{Annotation, Annotator};
use crate::capture;
use crossbeam_channel::{unbounded, Receiver, Sender};
use memspi_decode::DecoderConfig;
use serialport::SerialPortInfo;
use std::io::{ErrorKind, Read};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PortInfo {
    pub port_name: String,
    pub port_type: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (port_type, vid, pid, product) = match &info.port_type {
            serialport::SerialPortType::UsbPort(usb) => ("USB".to_string(), Some(usb.vid), Some(usb.pid), usb.product.clone()),
            serialport::SerialPortType::PciPort => ("PCI".to_string(), None, None, None),
            serialport::SerialPortType::BluetoothPort => ("Bluetooth".to_string(), None, None, None),
            serialport::SerialPortType::Unknown => ("Unknown".to_string(), None, None, None),
        };
        Self {
            port_name: info.port_name,
            port_type,
            vid,
            pid,
            product,
        }
    }
}

/// Serial link to a sniffer that streams transfer events in the text
/// capture format, one line per event.
#[derive(Debug, Clone)]
pub struct SnifferConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub decoder: DecoderConfig,
}

impl Default for SnifferConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115_200,
            decoder: DecoderConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SnifferEvent {
    Opened(String),
    Annotation(Annotation),
    Error(String),
    /// Partial session dropped after [`SnifferService::reset`]
    Reset,
    Closed,
}

enum Command {
    Reset,
    Close,
}

/// Longest line accepted from the sniffer before the buffer is discarded.
const MAX_LINE: usize = 1024;

pub struct SnifferService {
    cfg: SnifferConfig,
    tx_cmd: Sender<Command>,
    rx_evt: Receiver<SnifferEvent>,
}

impl SnifferService {
    pub fn list_ports() -> Vec<PortInfo> {
        serialport::available_ports()
            .unwrap_or_default()
            .into_iter()
            .map(PortInfo::from)
            .collect()
    }

    /// Open the port on a worker thread. The one decoder instance lives on
    /// that thread; progress is reported through [`SnifferService::events`].
    pub fn open(cfg: SnifferConfig) -> Self {
        Self::with_port(cfg, |cfg| {
            serialport::new(&cfg.port_name, cfg.baud_rate)
                .timeout(Duration::from_millis(50))
                .open()
                .map_err(|e| e.to_string())
        })
    }

    /// Run the worker on any byte source. `open_port` is called on the
    /// worker thread; reads that time out are treated as idle polls.
    pub fn with_port<F, R>(cfg: SnifferConfig, open_port: F) -> Self
    where
        F: FnOnce(&SnifferConfig) -> Result<R, String> + Send + 'static,
        R: Read,
    {
        let (tx_cmd, rx_cmd) = unbounded::<Command>();
        let (tx_evt, rx_evt) = unbounded::<SnifferEvent>();
        let cfg_clone = cfg.clone();

        std::thread::spawn(move || match open_port(&cfg_clone) {
            Ok(port) => {
                let _ = tx_evt.send(SnifferEvent::Opened(cfg_clone.port_name.clone()));
                run_worker(port, LineDecoder::new(cfg_clone.decoder), &rx_cmd, &tx_evt);
                let _ = tx_evt.send(SnifferEvent::Closed);
            }
            Err(e) => {
                let _ = tx_evt.send(SnifferEvent::Error(format!("open failed: {e}")));
                let _ = tx_evt.send(SnifferEvent::Closed);
            }
        });

        Self { cfg, tx_cmd, rx_evt }
    }

    /// Drop any partially decoded session.
    pub fn reset(&self) -> Result<(), String> {
        self.tx_cmd.send(Command::Reset).map_err(|e| e.to_string())
    }

    pub fn close(&self) {
        let _ = self.tx_cmd.send(Command::Close);
    }

    pub fn events(&self) -> &Receiver<SnifferEvent> {
        &self.rx_evt
    }

    pub fn config(&self) -> &SnifferConfig { &self.cfg }
}

fn run_worker<R: Read>(mut port: R, mut reader: LineDecoder, rx_cmd: &Receiver<Command>, tx_evt: &Sender<SnifferEvent>) {
    let mut buf = [0u8; 4096];
    loop {
        match port.read(&mut buf) {
            Ok(n) if n > 0 => {
                for event in reader.push(&buf[..n]) {
                    let _ = tx_evt.send(event);
                }
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::TimedOut => {}
            Err(e) => {
                let _ = tx_evt.send(SnifferEvent::Error(e.to_string()));
                return;
            }
        }
        while let Ok(cmd) = rx_cmd.try_recv() {
            match cmd {
                Command::Reset => {
                    reader.reset();
                    let _ = tx_evt.send(SnifferEvent::Reset);
                }
                Command::Close => {
                    let stats = reader.annotator.stats();
                    log::info!(
                        "sniffer closed: {} sessions, {} complete, {} truncated",
                        stats.sessions,
                        stats.completed,
                        stats.truncated
                    );
                    return;
                }
            }
        }
    }
}

/// Splits the sniffer byte stream into lines and decodes them.
struct LineDecoder {
    annotator: Annotator,
    pending: Vec<u8>,
    line_no: usize,
}

impl LineDecoder {
    fn new(config: DecoderConfig) -> Self {
        Self {
            annotator: Annotator::new(config),
            pending: Vec::new(),
            line_no: 0,
        }
    }

    fn reset(&mut self) {
        self.annotator.reset();
        self.pending.clear();
    }

    fn push(&mut self, data: &[u8]) -> Vec<SnifferEvent> {
        let mut out = Vec::new();
        self.pending.extend_from_slice(data);

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.line_no += 1;
            let text = String::from_utf8_lossy(&line);
            match capture::parse_line(&text, self.line_no) {
                Ok(Some(event)) => {
                    if let Some(annotation) = self.annotator.feed(&event) {
                        out.push(SnifferEvent::Annotation(annotation));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("skipping sniffer line: {e}");
                    out.push(SnifferEvent::Error(e.to_string()));
                }
            }
        }

        if self.pending.len() > MAX_LINE {
            log::warn!("discarding {} bytes without a line break", self.pending.len());
            self.pending.clear();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// Byte source fed from a channel; an empty poll reads as a timeout.
    struct ChannelPort(Receiver<Vec<u8>>);

    impl Read for ChannelPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv_timeout(Duration::from_millis(5)) {
                Ok(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                Err(_) => Err(io::Error::new(ErrorKind::TimedOut, "no data")),
            }
        }
    }

    fn next_event(service: &SnifferService) -> SnifferEvent {
        service
            .events()
            .recv_timeout(Duration::from_secs(5))
            .expect("sniffer worker went quiet")
    }

    fn annotations(events: &[SnifferEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                SnifferEvent::Annotation(a) => Some(a.text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_lines_split_across_reads() {
        let mut reader = LineDecoder::new(DecoderConfig::default());
        let stream = b"0 0 enable\n0 1 byte 00\n1 2 byte 03\n2 3 byte 10\n3 4 byte 20\n4 5 byte 30\n5 6 byte 7F\n6 6 disable\n";
        let (head, tail) = stream.split_at(17);

        let mut events = reader.push(head);
        events.extend(reader.push(tail));
        assert_eq!(annotations(&events), vec!["Header", "Cmd Read", "Address 0x10001018", "Data: 0x7F"]);
        assert_eq!(reader.annotator.stats().completed, 1);
    }

    #[test]
    fn test_bad_line_reported() {
        let mut reader = LineDecoder::new(DecoderConfig::default());
        let events = reader.push(b"0 0 enable\r\nnonsense\n0 1 byte 00\n");
        assert!(matches!(events[0], SnifferEvent::Error(ref msg) if msg.starts_with("line 2")));
        assert_eq!(annotations(&events), vec!["Header"]);
    }

    #[test]
    fn test_overlong_line_discarded() {
        let mut reader = LineDecoder::new(DecoderConfig::default());
        assert!(reader.push(&[b'x'; MAX_LINE + 1]).is_empty());
        assert!(reader.pending.is_empty());
    }

    #[test]
    fn test_reset_drops_partial_line() {
        let mut reader = LineDecoder::new(DecoderConfig::default());
        reader.push(b"0 0 enable\n0 1 by");
        reader.reset();
        assert!(reader.pending.is_empty());
        let events = reader.push(b"0 1 byte 00\n");
        assert_eq!(annotations(&events), vec!["Header"]);
    }

    #[test]
    fn test_service_reset_and_close() {
        let (tx_data, rx_data) = unbounded::<Vec<u8>>();
        let cfg = SnifferConfig { port_name: "mock0".to_string(), ..Default::default() };
        let service = SnifferService::with_port(cfg, move |_| Ok(ChannelPort(rx_data)));
        assert_eq!(service.config().port_name, "mock0");
        assert!(matches!(next_event(&service), SnifferEvent::Opened(ref name) if name == "mock0"));

        tx_data.send(b"0 0 enable\n0 1 byte 00\n1 2 byte 03\n2 3 byte 10\n".to_vec()).unwrap();
        let mut texts = Vec::new();
        while texts.len() < 2 {
            if let SnifferEvent::Annotation(a) = next_event(&service) {
                texts.push(a.text);
            }
        }
        assert_eq!(texts, vec!["Header", "Cmd Read"]);

        // Mid-address: after a reset the next byte opens a new session
        service.reset().unwrap();
        assert!(matches!(next_event(&service), SnifferEvent::Reset));
        tx_data.send(b"3 4 byte 20\n".to_vec()).unwrap();
        match next_event(&service) {
            SnifferEvent::Annotation(a) => assert_eq!(a.text, "Header"),
            other => panic!("unexpected event: {other:?}"),
        }

        service.close();
        assert!(matches!(next_event(&service), SnifferEvent::Closed));
    }

    #[test]
    fn test_service_open_failure() {
        let service = SnifferService::with_port(SnifferConfig::default(), |_| Err::<ChannelPort, _>("no such port".to_string()));
        assert!(matches!(next_event(&service), SnifferEvent::Error(ref msg) if msg == "open failed: no such port"));
        assert!(matches!(next_event(&service), SnifferEvent::Closed));
    }
}
