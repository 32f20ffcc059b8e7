//! Process-wide pause gate for value-moving entry points.

use crate::error::GuardError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseSwitch {
    paused: bool,
}

impl PauseSwitch {
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// First gate of every value-moving entry point. Takes effect for all
    /// calls after the switch flips, not a call already past this check.
    pub fn require_active(&self) -> Result<(), GuardError> {
        if self.paused {
            return Err(GuardError::Paused);
        }
        Ok(())
    }
}
