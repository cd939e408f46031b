// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identifiers routed through the event multiplexer.
//!
//! A `TimerId` is a string id so the multiplexer can stay agnostic of what a
//! timer means; the engine parses it back into a typed [`TimerKind`] to
//! dispatch the fire.

use crate::label::Label;

/// Identifier of a timer registered with the multiplexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerId(String);

/// Id of the single shared keep-alive wake-up timer.
const KEEPALIVE_WAKE: &str = "keepalive-wake";

impl TimerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Per-job periodic timer (`StartInterval`).
    pub fn interval(label: &Label) -> Self {
        Self(format!("interval:{label}"))
    }

    /// Per-job calendar fire.
    pub fn calendar(label: &Label) -> Self {
        Self(format!("calendar:{label}"))
    }

    /// TERM-to-KILL grace timer armed at unload.
    pub fn kill_grace(label: &Label) -> Self {
        Self(format!("kill:{label}"))
    }

    /// The shared keep-alive wake-up timer.
    pub fn keepalive_wake() -> Self {
        Self(KEEPALIVE_WAKE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse into a typed kind; `None` for unrecognized ids.
    pub fn kind(&self) -> Option<TimerKind<'_>> {
        if self.0 == KEEPALIVE_WAKE {
            return Some(TimerKind::KeepaliveWake);
        }
        if let Some(rest) = self.0.strip_prefix("interval:") {
            return Some(TimerKind::Interval { label: rest });
        }
        if let Some(rest) = self.0.strip_prefix("calendar:") {
            return Some(TimerKind::Calendar { label: rest });
        }
        if let Some(rest) = self.0.strip_prefix("kill:") {
            return Some(TimerKind::KillGrace { label: rest });
        }
        None
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed representation of a timer id for type-safe routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind<'a> {
    Interval { label: &'a str },
    Calendar { label: &'a str },
    KillGrace { label: &'a str },
    KeepaliveWake,
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
