//! Core functionalities: capture input, annotation log, live sniffer.

pub mod annotate;
pub mod capture;
pub mod sniffer_service;

pub use annotate::{Annotation, AnnotationLog, Annotator};
pub use capture::CaptureError;
pub use sniffer_service::{PortInfo, SnifferConfig, SnifferEvent, SnifferService};
