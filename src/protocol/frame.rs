//! Frame recovery for the rig's undelimited JSON stream.
//!
//! The device writes compact JSON objects back to back, with no newline and
//! no length prefix, and may emit boot noise or partial writes in between:
//! ```text
//! ..noise..{"status":"ok"}..{"obstacles":3,"time":12,"result":"win"}..
//!          └─ ack marker ─┘  └──────────── telemetry marker ───────┘
//! ```
//! A frame starts at the earliest known marker and ends at the first `}`
//! after it. Payloads are flat objects; a nested object would be cut at its
//! first inner brace.

use std::ops::Range;

use bytes::{Buf, BytesMut};
use serde::Deserialize;

use crate::error::FrameError;
use crate::types::{GameResult, TelemetryRecord};

/// Marker that opens a telemetry frame.
pub const TELEMETRY_MARKER: &[u8] = br#"{"obstacles""#;

/// Marker that opens an acknowledgment frame.
pub const ACK_MARKER: &[u8] = br#"{"status""#;

/// Default cap on buffered inbound bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Kind of frame a marker announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// End-of-game report.
    Telemetry,
    /// Reply to a configuration write.
    Acknowledgment,
}

/// Outcome of one extraction pass over a buffer.
#[derive(Debug)]
pub enum Extraction {
    /// A complete telemetry frame decoded into a record.
    Telemetry {
        record: TelemetryRecord,
        span: Range<usize>,
    },
    /// A complete acknowledgment frame.
    Acknowledgment { text: String, span: Range<usize> },
    /// A complete telemetry frame that could not be used.
    Malformed {
        span: Range<usize>,
        error: FrameError,
    },
    /// A marker was found but its closing brace has not arrived yet.
    Incomplete,
    /// No marker in the buffer.
    Empty,
}

impl Extraction {
    /// Byte range the frame occupies, if a complete frame was found.
    #[must_use]
    pub fn span(&self) -> Option<Range<usize>> {
        match self {
            Self::Telemetry { span, .. }
            | Self::Acknowledgment { span, .. }
            | Self::Malformed { span, .. } => Some(span.clone()),
            Self::Incomplete | Self::Empty => None,
        }
    }
}

#[derive(Deserialize)]
struct RawTelemetry {
    obstacles: Option<u32>,
    time: Option<u32>,
    result: Option<String>,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Finds the earliest marker in `buffer`.
#[must_use]
pub fn locate(buffer: &[u8]) -> Option<(FrameKind, usize)> {
    let telemetry = find(buffer, TELEMETRY_MARKER).map(|at| (FrameKind::Telemetry, at));
    let ack = find(buffer, ACK_MARKER).map(|at| (FrameKind::Acknowledgment, at));

    match (telemetry, ack) {
        (Some(t), Some(a)) => Some(if a.1 < t.1 { a } else { t }),
        (found, None) | (None, found) => found,
    }
}

fn decode_telemetry(raw: &[u8]) -> Result<TelemetryRecord, FrameError> {
    let raw: RawTelemetry = serde_json::from_slice(raw)?;
    let obstacles = raw.obstacles.ok_or(FrameError::MissingField("obstacles"))?;
    let time = raw.time.ok_or(FrameError::MissingField("time"))?;
    let result = raw.result.ok_or(FrameError::MissingField("result"))?;

    Ok(TelemetryRecord::new(
        obstacles,
        time,
        GameResult::from_label(&result),
    ))
}

/// Looks for the first complete frame in `buffer`.
///
/// Pure: the buffer is not modified. Callers remove [`Extraction::span`]
/// themselves, or use [`InboundBuffer`] which does it for them.
#[must_use]
pub fn extract(buffer: &[u8]) -> Extraction {
    let Some((kind, start)) = locate(buffer) else {
        return Extraction::Empty;
    };

    let Some(close) = buffer[start..].iter().position(|&b| b == b'}') else {
        return Extraction::Incomplete;
    };

    let span = start..start + close + 1;
    let raw = &buffer[span.clone()];

    match kind {
        FrameKind::Acknowledgment => Extraction::Acknowledgment {
            text: String::from_utf8_lossy(raw).into_owned(),
            span,
        },
        FrameKind::Telemetry => match decode_telemetry(raw) {
            Ok(record) => Extraction::Telemetry { record, span },
            Err(error) => Extraction::Malformed { span, error },
        },
    }
}

/// Bounded accumulator for bytes read off the link.
///
/// Extraction always runs against the whole accumulated buffer, so a frame
/// split across reads is recovered once its last byte lands.
#[derive(Debug)]
pub struct InboundBuffer {
    buffer: BytesMut,
    capacity: usize,
}

impl Default for InboundBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl InboundBuffer {
    /// Creates an empty buffer holding at most `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends bytes, dropping the oldest ones beyond the cap.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        if self.buffer.len() > self.capacity {
            let excess = self.buffer.len() - self.capacity;
            tracing::debug!("inbound buffer over capacity, dropping {} bytes", excess);
            self.buffer.advance(excess);
        }
    }

    /// Extracts the next frame and removes its span from the buffer.
    pub fn next_frame(&mut self) -> Extraction {
        let extraction = extract(&self.buffer);
        if let Some(span) = extraction.span() {
            let mut rest = self.buffer.split_off(span.start);
            rest.advance(span.len());
            self.buffer.unsplit(rest);
        }
        extraction
    }

    /// Extracts every telemetry record currently recoverable.
    ///
    /// Acknowledgments are excised and malformed frames dropped; neither
    /// stops the pass.
    pub fn drain_records(&mut self) -> Vec<TelemetryRecord> {
        let mut records = Vec::new();

        loop {
            match self.next_frame() {
                Extraction::Telemetry { record, .. } => {
                    tracing::trace!("decoded telemetry frame: {:?}", record);
                    records.push(record);
                }
                Extraction::Acknowledgment { text, .. } => {
                    tracing::debug!("discarding unsolicited acknowledgment: {}", text);
                }
                Extraction::Malformed { error, .. } => {
                    tracing::warn!("dropping malformed telemetry frame: {}", error);
                }
                Extraction::Incomplete | Extraction::Empty => break,
            }
        }

        records
    }

    /// Buffered bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
