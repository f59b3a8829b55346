// Sentinel-delimited framing for the simulator feed.
//
// A message is everything up to the next `$`. Inside it, the payload follows
// one of the known marker strings. Chunks may split markers, payloads and the
// sentinel anywhere, so unconsumed bytes always stay in the buffer.

use std::fmt;


/// End-of-message byte.
pub const SENTINEL: u8 = b'$';

/// Marker strings the stock simulator scripts send ahead of their JSON body.
pub const DEFAULT_MARKERS: &[&str] = &[
    "Traffic simulation data ready",
    "Three T-intersection simulation data ready",
];

/// Default cap on an unterminated message (64 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Reasons a framed message was dropped. The session always continues.
#[derive(Debug, Clone, PartialEq)]
pub enum FramingError {
    /// No known marker in the message.
    MissingMarker { message_bytes: usize },
    /// A marker only shows up after the sentinel.
    MarkerAfterSentinel { message_bytes: usize },
    /// Payload between marker and sentinel is not valid UTF-8.
    InvalidUtf8 { valid_up_to: usize },
    /// Buffer grew past the limit without a sentinel.
    Oversized { buffered: usize, limit: usize },
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::MissingMarker { message_bytes } => {
                write!(f, "message of {} bytes has no known marker", message_bytes)
            }
            FramingError::MarkerAfterSentinel { message_bytes } => write!(
                f,
                "malformed message of {} bytes: sentinel precedes marker",
                message_bytes
            ),
            FramingError::InvalidUtf8 { valid_up_to } => {
                write!(f, "payload is not valid UTF-8 (valid up to byte {})", valid_up_to)
            }
            FramingError::Oversized { buffered, limit } => write!(
                f,
                "unterminated message of {} bytes exceeds limit of {} bytes",
                buffered, limit
            ),
        }
    }
}

impl std::error::Error for FramingError {}

/// Accumulates raw chunks of one client session and cuts payloads out of them.
#[derive(Debug)]
pub struct FrameReassembler {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no sentinel.
    scanned: usize,
    markers: Vec<Vec<u8>>,
    max_message_bytes: usize,
}

impl FrameReassembler {
    pub fn new<I, S>(markers: I, max_message_bytes: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|m| m.as_ref().as_bytes().to_vec())
            .filter(|m| !m.is_empty())
            .collect();

        Self {
            buffer: Vec::new(),
            scanned: 0,
            markers,
            max_message_bytes,
        }
    }

    /// Append a chunk and try to extract the next complete payload.
    ///
    /// `Ok(None)` means more bytes are needed. Further messages that arrived in
    /// the same chunk are retrieved with [`FrameReassembler::extract`].
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<String>, FramingError> {
        self.buffer.extend_from_slice(chunk);
        self.extract()
    }

    /// Extract the next complete payload already sitting in the buffer.
    pub fn extract(&mut self) -> Result<Option<String>, FramingError> {
        let sentinel = match self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == SENTINEL)
        {
            Some(offset) => self.scanned + offset,
            None => {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_message_bytes {
                    let buffered = self.buffer.len();
                    self.reset();
                    return Err(FramingError::Oversized {
                        buffered,
                        limit: self.max_message_bytes,
                    });
                }
                return Ok(None);
            }
        };

        let result = self.payload_before(sentinel);

        // Everything after the sentinel starts the next message.
        self.buffer.drain(..=sentinel);
        self.scanned = 0;

        result.map(Some)
    }

    /// Discard everything buffered for the current session.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }

    /// Bytes currently held for an incomplete message.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn payload_before(&self, sentinel: usize) -> Result<String, FramingError> {
        let message = &self.buffer[..sentinel];

        let start = self
            .markers
            .iter()
            .filter_map(|marker| find(message, marker).map(|at| at + marker.len()))
            .min();

        let start = match start {
            Some(start) => start,
            None => {
                let rest = &self.buffer[sentinel + 1..];
                let later = self.markers.iter().any(|marker| find(rest, marker).is_some());
                return Err(if later {
                    FramingError::MarkerAfterSentinel {
                        message_bytes: sentinel,
                    }
                } else {
                    FramingError::MissingMarker {
                        message_bytes: sentinel,
                    }
                });
            }
        };

        let body = std::str::from_utf8(&message[start..]).map_err(|e| {
            FramingError::InvalidUtf8 {
                valid_up_to: start + e.valid_up_to(),
            }
        })?;

        Ok(body.trim().to_string())
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS.iter().copied(), DEFAULT_MAX_MESSAGE_BYTES)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
