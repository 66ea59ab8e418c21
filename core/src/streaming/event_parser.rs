use std::collections::VecDeque;
use std::str::from_utf8;

use tracing::{debug, trace, warn};

use super::error::{DecodeError, Result};
use super::types::ChatEvent;
use crate::constants::{DONE_SENTINEL, FRAME_PREFIX};
use crate::errors::FrameDecodeError;

const LOGIFY_MAX_CHARS: usize = 100;
fn logify(text: &str) -> String {
    text.chars().take(LOGIFY_MAX_CHARS).collect()
}

/// Parses the payload of a `data: ` frame.
fn parse_frame(payload: &str) -> std::result::Result<ChatEvent, FrameDecodeError> {
    serde_json::from_str(payload)
        .map(ChatEvent::new)
        .map_err(|source| FrameDecodeError {
            payload: logify(payload),
            source,
        })
}

/// Decodes one complete line. Returns `None` for anything that is not a
/// data frame with a JSON payload.
fn decode_line(line: &str) -> Option<ChatEvent> {
    let line = line.strip_suffix('\r').unwrap_or(line);

    let Some(payload) = line.strip_prefix(FRAME_PREFIX) else {
        if !line.is_empty() {
            trace!("ignoring non-frame line: {:?}", logify(line));
        }
        return None;
    };

    // end-of-reply marker of some backends; not JSON, carries no event
    if payload.trim_end() == DONE_SENTINEL {
        debug!("skipping completion sentinel");
        return None;
    }

    match parse_frame(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("skipping frame: {}", e);
            None
        }
    }
}

/// Incremental decoder from raw body chunks to [`ChatEvent`]s.
///
/// Chunk boundaries carry no meaning: a chunk may end inside a multi-byte
/// character, inside the `data: ` prefix or inside a JSON payload. The
/// decoder buffers partial characters and partial lines between calls, so
/// the produced events only depend on the concatenated bytes.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// leading bytes of a multi-byte character cut off at the end of the last chunk
    pending_bytes: Vec<u8>,
    /// text received after the last newline, pending its terminator
    partial_line: String,
    /// decoded events not yet handed out, in frame order
    events: VecDeque<ChatEvent>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            pending_bytes: Vec::with_capacity(4),
            partial_line: String::new(),
            events: VecDeque::with_capacity(4),
        }
    }

    /// Takes the next decoded event, if any.
    pub fn next_event(&mut self) -> Option<ChatEvent> {
        self.events.pop_front()
    }

    /// Whether the decoder holds input that has not become an event yet.
    pub fn was_processing(&self) -> bool {
        !self.pending_bytes.is_empty() || !self.partial_line.is_empty() || !self.events.is_empty()
    }

    pub fn process_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("decoding {} bytes", bytes.len());

        // frames completed before an invalid byte are still decoded
        let (text, invalid) = self.decode_utf8(bytes);

        // the buffered partial line holds no newline, only new text is scanned
        let scan_from = self.partial_line.len();
        self.partial_line.push_str(&text);
        self.split_complete_lines(scan_from);

        match invalid {
            Some(e) => {
                self.partial_line.clear();
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Flushes state at the end of the body.
    ///
    /// An unterminated last line is emitted only if it is a complete frame
    /// with a parseable payload; anything else is dropped.
    pub fn finish(&mut self) -> Result<()> {
        if !self.pending_bytes.is_empty() {
            let pending = self.pending_bytes.len();
            self.pending_bytes.clear();
            return Err(DecodeError::IncompleteUtf8 { pending });
        }

        let trailing = std::mem::take(&mut self.partial_line);
        if trailing.is_empty() {
            return Ok(());
        }

        match decode_line(&trailing) {
            Some(event) => {
                debug!("flushing unterminated final frame");
                self.events.push_back(event);
            }
            None => debug!("dropping unterminated trailing data: {:?}", logify(&trailing)),
        }
        Ok(())
    }

    // Joins the new bytes with any partial character from the previous chunk
    // and returns the longest valid prefix. An incomplete trailing character
    // is kept for the next call; an invalid sequence is reported alongside
    // the text before it.
    fn decode_utf8(&mut self, bytes: &[u8]) -> (String, Option<DecodeError>) {
        let mut buf = std::mem::take(&mut self.pending_bytes);
        buf.extend_from_slice(bytes);

        let mut invalid = None;
        if let Err(e) = from_utf8(&buf) {
            let valid_up_to = e.valid_up_to();
            let tail = buf.split_off(valid_up_to);
            if e.error_len().is_none() {
                trace!("buffering {} bytes of a split character", tail.len());
                self.pending_bytes = tail;
            } else {
                invalid = Some(DecodeError::InvalidUtf8 {
                    offset: valid_up_to,
                });
            }
        }

        // `buf` now holds exactly the valid prefix
        let text = String::from_utf8(buf)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
        (text, invalid)
    }

    // Decodes every newline-terminated line of the accumulator and removes
    // it in place, leaving the unterminated remainder. Newlines are searched
    // from `scan_from` on.
    fn split_complete_lines(&mut self, scan_from: usize) {
        let mut start = 0;
        let mut search = scan_from;

        while let Some(offset) = self.partial_line[search..].find('\n') {
            let end = search + offset;
            if let Some(event) = decode_line(&self.partial_line[start..end]) {
                self.events.push_back(event);
            }
            start = end + 1;
            search = start;
        }

        if start > 0 {
            self.partial_line.drain(..start);
        }
        if !self.partial_line.is_empty() {
            trace!("buffering incomplete line of {} bytes", self.partial_line.len());
        }
    }
}
