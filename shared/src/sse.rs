//! Incremental decoder for the `text/event-stream` wire format.
//!
//! Shells hand us whatever byte chunks the platform network stack produces,
//! so a line (or a multi-byte UTF-8 sequence, or a CRLF pair) may be split
//! across two chunks. The decoder buffers raw bytes until a line terminator
//! arrives and only then decodes the line.

use crate::error::ChannelError;

pub const DEFAULT_EVENT_TYPE: &str = "message";

/// Longest line the decoder buffers before giving up on the stream.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

const BOM: char = '\u{feff}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

impl SseFrame {
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.event == DEFAULT_EVENT_TYPE
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    data: String,
    event_type: String,
    last_event_id: Option<String>,
    pending_cr: bool,
    started: bool,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the most recent frame that carried one. Survives across frames.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Fails with a transport error once an unterminated line outgrows
    /// [`MAX_LINE_BYTES`]; the decoder is reset and the stream should be
    /// dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, ChannelError> {
        let mut frames = Vec::new();

        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\n' => self.finish_line(&mut frames),
                b'\r' => {
                    self.pending_cr = true;
                    self.finish_line(&mut frames);
                }
                _ => {
                    if self.line.len() >= MAX_LINE_BYTES {
                        *self = Self::new();
                        return Err(ChannelError::transport(format!(
                            "event stream line exceeds {MAX_LINE_BYTES} bytes"
                        )));
                    }
                    self.line.push(byte);
                }
            }
        }

        Ok(frames)
    }

    fn finish_line(&mut self, frames: &mut Vec<SseFrame>) {
        let raw = std::mem::take(&mut self.line);
        let decoded = String::from_utf8_lossy(&raw);

        let line = if self.started {
            &*decoded
        } else {
            self.started = true;
            decoded.strip_prefix(BOM).unwrap_or(&decoded)
        };

        self.process_line(line, frames);
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            self.dispatch(frames);
            return;
        }

        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "event" => self.event_type = value.to_string(),
            "id" => {
                if !value.contains('\0') {
                    // an empty id resets it
                    self.last_event_id = (!value.is_empty()).then(|| value.to_string());
                }
            }
            // retry hints are ignored; the reconnect schedule is ours
            _ => {}
        }
    }

    fn dispatch(&mut self, frames: &mut Vec<SseFrame>) {
        let event_type = std::mem::take(&mut self.event_type);

        if self.data.is_empty() {
            return;
        }

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }

        frames.push(SseFrame {
            event: if event_type.is_empty() {
                DEFAULT_EVENT_TYPE.to_string()
            } else {
                event_type
            },
            data,
            id: self.last_event_id.clone(),
        });
    }
}
