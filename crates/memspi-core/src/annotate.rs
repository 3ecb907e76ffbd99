use memspi_decode::{
    DataValue, DecodedElement, DecoderConfig, DecoderStats, ElementKind, ElementPayload, Instruction, Mode,
    ProtocolDecoder, TransferEvent,
};
use std::collections::VecDeque;

/// A decoded element together with its display text.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub element: DecodedElement,
    pub text: String,
}

impl From<DecodedElement> for Annotation {
    fn from(element: DecodedElement) -> Self {
        Self { text: element.to_string(), element }
    }
}

/// Runs a [`ProtocolDecoder`] and interprets mode register payloads.
///
/// The decoder reports every data byte raw. When the session's instruction
/// was a mode register read or write, the annotator turns that byte into the
/// mode it selects.
pub struct Annotator {
    decoder: ProtocolDecoder,
    instruction: Option<Instruction>,
}

impl Annotator {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            decoder: ProtocolDecoder::new(config),
            instruction: None,
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        self.decoder.config()
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn reset(&mut self) {
        self.decoder.reset();
        self.instruction = None;
    }

    pub fn feed(&mut self, event: &TransferEvent) -> Option<Annotation> {
        let element = self.decoder.feed(event)?;
        Some(self.interpret(element).into())
    }

    pub fn annotate_all<'a, I>(&mut self, events: I) -> Vec<Annotation>
    where
        I: IntoIterator<Item = &'a TransferEvent>,
    {
        events.into_iter().filter_map(|event| self.feed(event)).collect()
    }

    fn interpret(&mut self, mut element: DecodedElement) -> DecodedElement {
        match element.payload {
            ElementPayload::Header => self.instruction = None,
            ElementPayload::Instruction { instruction, .. } => self.instruction = Some(instruction),
            ElementPayload::Data { value: DataValue::Byte(byte) } => {
                if self.instruction.is_some_and(|i| i.is_mode_register_access()) {
                    element.payload = ElementPayload::Data { value: DataValue::Mode(Mode::from_register(byte)) };
                }
            }
            _ => {}
        }
        element
    }
}

/// Bounded store of annotations with per-kind visibility.
pub struct AnnotationLog {
    entries: VecDeque<Annotation>,
    max_entries: usize,
    hidden: Vec<ElementKind>,
}

impl AnnotationLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
            hidden: Vec::new(),
        }
    }

    pub fn set_visible(&mut self, kind: ElementKind, visible: bool) {
        self.hidden.retain(|k| *k != kind);
        if !visible {
            self.hidden.push(kind);
        }
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.entries.push_back(annotation);

        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    /// Stored annotations, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &Annotation> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_text(&self, show_timestamp: bool) -> String {
        let mut result = String::new();
        for entry in &self.entries {
            if self.hidden.contains(&entry.element.kind()) {
                continue;
            }
            result.push_str(&render_line(entry, show_timestamp));
            result.push('\n');
        }
        result
    }
}

pub fn render_line(annotation: &Annotation, show_timestamp: bool) -> String {
    if show_timestamp {
        format!("[{:.6}s] {}", annotation.element.span.start_s, annotation.text)
    } else {
        annotation.text.clone()
    }
}
