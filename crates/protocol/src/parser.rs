// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental byte-stream parser.
//!
//! `feed()` may be called with arbitrarily fragmented input; state
//! carries over between calls. `finish()` flushes trailing text and
//! extracts the final JSON result.

use crate::frame::{xml_unescape, ProtocolEvent};
use sb_core::AgentResult;
use std::collections::BTreeMap;

const OPENER: &[u8] = b"<skybridge_command>";
const CLOSER: &[u8] = b"</skybridge_command>";

/// Frames larger than this are logged and skipped.
pub const DEFAULT_MAX_FRAME_LEN: usize = 50_000;

/// Free text retained for final-result extraction.
const TEXT_TAIL_CAP: usize = 64 * 1024;

/// Push parser over the agent's stdout byte stream.
#[derive(Debug)]
pub struct Parser {
    buf: Vec<u8>,
    /// Recent free text, searched for the terminating JSON object.
    text_tail: String,
    max_frame_len: usize,
    oversized_frames: u64,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { buf: Vec::new(), text_tail: String::new(), max_frame_len, oversized_frames: 0 }
    }

    /// Number of frames dropped for exceeding the size limit.
    pub fn oversized_frames(&self) -> u64 {
        self.oversized_frames
    }

    /// Consume a chunk of stdout and return the events it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ProtocolEvent> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();

        loop {
            match find(&self.buf, OPENER) {
                None => {
                    // No opener in sight. Emit everything except a tail
                    // that could be the start of one split across reads.
                    let keep = partial_suffix_len(&self.buf, OPENER);
                    let emit_len = self.buf.len() - keep;
                    if emit_len > 0 {
                        let text: Vec<u8> = self.buf.drain(..emit_len).collect();
                        self.emit_text(&text, &mut events);
                    }
                    break;
                }
                Some(open_at) => {
                    if open_at > 0 {
                        let text: Vec<u8> = self.buf.drain(..open_at).collect();
                        self.emit_text(&text, &mut events);
                    }
                    // buf now begins at the opener.
                    match find(&self.buf[OPENER.len()..], CLOSER) {
                        Some(rel) => {
                            let body_end = OPENER.len() + rel;
                            let frame_end = body_end + CLOSER.len();
                            if frame_end > self.max_frame_len {
                                self.skip_oversized(&mut events);
                                continue;
                            }
                            let body = self.buf[OPENER.len()..body_end].to_vec();
                            self.buf.drain(..frame_end);
                            self.parse_frame(&body, &mut events);
                        }
                        None => {
                            // Incomplete frame. If it already blew the
                            // budget there is no point waiting for more.
                            if self.buf.len() > self.max_frame_len {
                                self.skip_oversized(&mut events);
                                continue;
                            }
                            break;
                        }
                    }
                }
            }
        }

        events
    }

    /// Flush trailing bytes and extract the final result, if any.
    pub fn finish(&mut self) -> Vec<ProtocolEvent> {
        let mut events = Vec::new();
        if !self.buf.is_empty() {
            let rest: Vec<u8> = self.buf.drain(..).collect();
            self.emit_text(&rest, &mut events);
        }
        if let Some(result) = extract_final_result(&self.text_tail) {
            events.push(ProtocolEvent::FinalResult(result));
        }
        events
    }

    /// Drop the opener at the head of the buffer and resynchronize on
    /// the next one.
    fn skip_oversized(&mut self, events: &mut Vec<ProtocolEvent>) {
        self.oversized_frames += 1;
        tracing::warn!(
            limit = self.max_frame_len,
            buffered = self.buf.len(),
            "oversized control frame skipped"
        );
        // Everything up to the next opener is downgraded to text.
        let skip = match find(&self.buf[OPENER.len()..], OPENER) {
            Some(rel) => OPENER.len() + rel,
            None => self.buf.len(),
        };
        let text: Vec<u8> = self.buf.drain(..skip).collect();
        self.emit_text(&text, events);
    }

    fn emit_text(&mut self, bytes: &[u8], events: &mut Vec<ProtocolEvent>) {
        if bytes.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(bytes).into_owned();
        self.text_tail.push_str(&text);
        if self.text_tail.len() > TEXT_TAIL_CAP {
            let cut = self.text_tail.len() - TEXT_TAIL_CAP;
            // Stay on a char boundary when trimming the cache.
            let cut = (cut..self.text_tail.len())
                .find(|i| self.text_tail.is_char_boundary(*i))
                .unwrap_or(0);
            self.text_tail.drain(..cut);
        }
        events.push(ProtocolEvent::TextChunk(text));
    }

    fn parse_frame(&mut self, body: &[u8], events: &mut Vec<ProtocolEvent>) {
        let body = String::from_utf8_lossy(body);
        let Some(command) = tag_content(&body, "command") else {
            tracing::warn!("control frame without <command> tag skipped");
            return;
        };
        let params = parse_params(&body);
        match ProtocolEvent::from_frame(&command, &params) {
            Some(event) => events.push(event),
            None => {
                tracing::warn!(command = %command, "unrecognized control command skipped");
            }
        }
    }
}

/// First occurrence of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Length of the longest strict prefix of `needle` that the buffer ends
/// with; those bytes may complete into `needle` on the next read.
fn partial_suffix_len(buf: &[u8], needle: &[u8]) -> usize {
    let max = needle.len().saturating_sub(1).min(buf.len());
    for len in (1..=max).rev() {
        if buf[buf.len() - len..] == needle[..len] {
            return len;
        }
    }
    0
}

/// Content of the first `<tag>…</tag>` pair, unescaped and trimmed.
fn tag_content(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(xml_unescape(body[start..end].trim()))
}

/// All `<parametro name="KEY">VALUE</parametro>` pairs in a frame body.
///
/// Values are entity-unescaped, so angle brackets and ampersands inside
/// a value are literal and a nested `<skybridge_command>` smuggled into
/// a parameter cannot break the outer framing.
fn parse_params(body: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    let mut rest = body;
    while let Some(start) = rest.find("<parametro ") {
        rest = &rest[start + "<parametro ".len()..];
        let Some(tag_end) = rest.find('>') else { break };
        let attrs = &rest[..tag_end];
        rest = &rest[tag_end + 1..];

        let Some(close) = rest.find("</parametro>") else { break };
        let value = &rest[..close];
        rest = &rest[close + "</parametro>".len()..];

        if let Some(name) = attr_value(attrs, "name") {
            params.insert(xml_unescape(&name), xml_unescape(value));
        }
    }
    params
}

/// Value of `key="…"` (or single-quoted) inside a tag's attribute list.
fn attr_value(attrs: &str, key: &str) -> Option<String> {
    for quote in ['"', '\''] {
        let prefix = format!("{key}={quote}");
        if let Some(start) = attrs.find(&prefix) {
            let rest = &attrs[start + prefix.len()..];
            if let Some(end) = rest.find(quote) {
                return Some(rest[..end].to_string());
            }
        }
    }
    None
}

/// Locate the last parseable JSON object in the free text and decode it
/// as the agent result.
fn extract_final_result(text: &str) -> Option<AgentResult> {
    let trimmed = text.trim_end();
    let mut search_end = trimmed.len();
    // Walk candidate opening braces from the end; the terminating object
    // is the last JSON value in the stream. Trailing prose after the
    // object is tolerated via stream deserialization.
    for _ in 0..64 {
        let start = trimmed[..search_end].rfind('{')?;
        let mut stream =
            serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<serde_json::Value>();
        if let Some(Ok(value)) = stream.next() {
            if value.is_object() && value.get("success").is_some() {
                if let Ok(result) = serde_json::from_value::<AgentResult>(value) {
                    return Some(result);
                }
            }
        }
        if start == 0 {
            return None;
        }
        search_end = start;
    }
    None
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
