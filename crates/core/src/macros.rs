// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The [`str_enum!`] macro: stable string names for status enums.
//!
//! Skybridge statuses cross three boundaries with the same spelling:
//! log lines, persisted queue/board records, and the operator surface.
//! Seven enums (`JobStatus`, `AgentExecutionState`, `WorktreeStatus`,
//! `AutonomyLevel`, `EventSource`, `LogLevel`, `CardEvent`) pin those
//! spellings in one place through this macro instead of hand-rolled
//! `Display` impls that can drift from their serde renames.

/// Give a status enum stable string names.
///
/// Generates `as_str()` returning the variant's wire name plus a
/// `Display` impl delegating to it. Unit variants match directly;
/// data-carrying variants use `(..)` to ignore their fields.
///
/// ```ignore
/// crate::str_enum! {
///     JobStatus {
///         Pending => "pending",
///         Processing => "processing",
///         Completed => "completed",
///         Failed => "failed",
///     }
/// }
///
/// assert_eq!(JobStatus::Processing.as_str(), "processing");
/// assert_eq!(JobStatus::Failed.to_string(), "failed");
/// ```
#[macro_export]
macro_rules! str_enum {
    ($enum:ty { $( $variant:ident $(( $($ignore:tt)* ))? => $str:expr ),+ $(,)? }) => {
        impl $enum {
            /// Stable string name of this variant, as spelled in logs,
            /// persisted records, and the operator surface.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant $(( $($ignore)* ))? => $str, )+
                }
            }
        }

        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
