// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed protocol events and frame decoding.

use sb_core::agent::FrameRecord;
use std::collections::BTreeMap;

/// Severity carried by a `log` frame's `nivel` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

sb_core::str_enum! {
    LogLevel {
        Debug => "debug",
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
}

impl LogLevel {
    /// Unknown levels degrade to `info` rather than dropping the frame.
    fn parse(s: &str) -> Self {
        match s {
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// One item in the parser's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    Log { level: LogLevel, message: String },
    Progress { percent: u8, message: String },
    Checkpoint { message: String },
    Error { message: String, kind: String },
    /// Free-form text between frames.
    TextChunk(String),
    /// The terminating JSON object, surfaced by `finish()`.
    FinalResult(sb_core::AgentResult),
}

impl ProtocolEvent {
    /// Text suitable for a thinking step, when this event carries one.
    pub fn thought(&self) -> Option<&str> {
        match self {
            ProtocolEvent::Log { message, .. }
            | ProtocolEvent::Progress { message, .. }
            | ProtocolEvent::Checkpoint { message }
            | ProtocolEvent::Error { message, .. } => Some(message),
            ProtocolEvent::TextChunk(_) | ProtocolEvent::FinalResult(_) => None,
        }
    }

    /// Progress within a run: `(step_percent, message)` for progress
    /// frames only.
    pub fn progress(&self) -> Option<(u8, &str)> {
        match self {
            ProtocolEvent::Progress { percent, message } => Some((*percent, message)),
            _ => None,
        }
    }

    /// Rebuild the raw frame record for the execution's
    /// `commands_received` trail. Text and final-result items have none.
    pub fn frame_record(&self) -> Option<FrameRecord> {
        let (command, params): (&str, Vec<(&str, String)>) = match self {
            ProtocolEvent::Log { level, message } => {
                ("log", vec![("mensagem", message.clone()), ("nivel", level.to_string())])
            }
            ProtocolEvent::Progress { percent, message } => (
                "progress",
                vec![("porcentagem", percent.to_string()), ("mensagem", message.clone())],
            ),
            ProtocolEvent::Checkpoint { message } => {
                ("checkpoint", vec![("mensagem", message.clone())])
            }
            ProtocolEvent::Error { message, kind } => {
                ("error", vec![("mensagem", message.clone()), ("tipo", kind.clone())])
            }
            ProtocolEvent::TextChunk(_) | ProtocolEvent::FinalResult(_) => return None,
        };
        Some(FrameRecord {
            command: command.to_string(),
            params: params.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        })
    }

    /// Decode a raw frame into a typed event. Unknown commands yield
    /// `None`; the caller logs and skips them.
    pub(crate) fn from_frame(command: &str, params: &BTreeMap<String, String>) -> Option<Self> {
        let message = |key: &str| params.get(key).cloned().unwrap_or_default();
        match command {
            "log" => Some(ProtocolEvent::Log {
                level: LogLevel::parse(params.get("nivel").map(String::as_str).unwrap_or("info")),
                message: message("mensagem"),
            }),
            "progress" => Some(ProtocolEvent::Progress {
                percent: params
                    .get("porcentagem")
                    .and_then(|p| p.trim().parse::<f64>().ok())
                    .map(|p| p.clamp(0.0, 100.0) as u8)
                    .unwrap_or(0),
                message: message("mensagem"),
            }),
            "checkpoint" => Some(ProtocolEvent::Checkpoint { message: message("mensagem") }),
            "error" => {
                Some(ProtocolEvent::Error { message: message("mensagem"), kind: message("tipo") })
            }
            _ => None,
        }
    }
}

/// Unescape the five standard XML entities. Anything else (including a
/// lone `&`) passes through literally.
pub(crate) fn xml_unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let replaced = [
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&amp;", '&'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ]
        .iter()
        .find_map(|(entity, ch)| rest.strip_prefix(entity).map(|tail| (tail, *ch)));
        match replaced {
            Some((tail, ch)) => {
                out.push(ch);
                rest = tail;
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
