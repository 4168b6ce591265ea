//! Driver phases
//!
//! ```text
//! Idle ─► Opened ─► Loaded ─► Measuring ─► Reported ─► Closed
//!                     ▲                        │
//!                     └────── next checkpoint ─┘
//! ```

use std::fmt;

use crate::error::{BenchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Opened,
    Loaded,
    Measuring,
    Reported,
    Closed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Opened => "opened",
            Phase::Loaded => "loaded",
            Phase::Measuring => "measuring",
            Phase::Reported => "reported",
            Phase::Closed => "closed",
        }
    }

    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Idle, Phase::Opened)
                | (Phase::Opened, Phase::Loaded)
                | (Phase::Loaded, Phase::Measuring)
                | (Phase::Measuring, Phase::Reported)
                | (Phase::Reported, Phase::Loaded)
                | (Phase::Reported, Phase::Closed)
        )
    }

    /// Checked move to `next`
    pub fn transition(self, next: Phase) -> Result<Phase> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(BenchError::Phase {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
