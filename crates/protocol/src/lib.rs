// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! sb-protocol: parser for the agent's stdout control dialect.
//!
//! The agent subprocess interleaves free-form text with multi-line
//! control frames:
//!
//! ```text
//! <skybridge_command>
//!   <command>progress</command>
//!   <parametro name="porcentagem">40</parametro>
//!   <parametro name="mensagem">halfway there</parametro>
//! </skybridge_command>
//! ```
//!
//! and terminates with a single JSON object (the agent result). The
//! [`Parser`] is a push parser over raw bytes: it assumes nothing about
//! flushing, tolerates frames straddling read boundaries, skips
//! oversized frames and resynchronizes on the next opener, and treats
//! invalid UTF-8 as replaceable rather than fatal.

mod frame;
mod parser;

pub use frame::{LogLevel, ProtocolEvent};
pub use parser::{Parser, DEFAULT_MAX_FRAME_LEN};
