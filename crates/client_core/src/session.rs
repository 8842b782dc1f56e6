//! The generation session state machine.
//!
//! Every mutation that belongs to a running attempt takes that attempt's id.
//! Writes carrying a superseded id, or arriving outside `Generating`, are
//! ignored, which keeps terminal states stable and makes a cancelled attempt
//! harmless.

use std::sync::Arc;

use shared::{
    domain::{GenerationResult, GenerationStep, Phase},
    error::{FailureKind, SessionFailure},
};
use tracing::{debug, warn};

use crate::{
    event_stream::{DecodedEvent, EventOutcome},
    upload::SessionInputs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { attempt: u64 },
    /// One or both images are missing; nothing happened.
    MissingInputs,
    /// The session is `Generating`, or `Complete` and not yet reset.
    Busy { phase: Phase },
}

#[derive(Debug, Clone, Default)]
enum SessionState {
    #[default]
    Idle,
    Generating,
    Complete(GenerationResult),
    Error(SessionFailure),
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    attempt: u64,
    state: SessionState,
    progress: u8,
    current_step: u8,
    inputs: Option<Arc<SessionInputs>>,
}

impl Session {
    pub fn phase(&self) -> Phase {
        match self.state {
            SessionState::Idle => Phase::Idle,
            SessionState::Generating => Phase::Generating,
            SessionState::Complete(_) => Phase::Complete,
            SessionState::Error(_) => Phase::Error,
        }
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn current_step(&self) -> u8 {
        self.current_step
    }

    pub fn step(&self) -> Option<GenerationStep> {
        GenerationStep::from_ordinal(self.current_step)
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        match &self.state {
            SessionState::Complete(result) => Some(result),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&SessionFailure> {
        match &self.state {
            SessionState::Error(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.failure().map(|failure| failure.message.as_str())
    }

    /// Inputs of the current or last failed attempt. Cleared by `reset`.
    pub fn inputs(&self) -> Option<&Arc<SessionInputs>> {
        self.inputs.as_ref()
    }

    pub fn begin(&mut self, inputs: Arc<SessionInputs>) -> StartOutcome {
        let phase = self.phase();
        if !phase.accepts_start() {
            return StartOutcome::Busy { phase };
        }

        self.attempt += 1;
        self.state = SessionState::Generating;
        self.progress = 0;
        self.current_step = 0;
        self.inputs = Some(inputs);
        StartOutcome::Started {
            attempt: self.attempt,
        }
    }

    fn is_live(&self, attempt: u64) -> bool {
        self.attempt == attempt && matches!(self.state, SessionState::Generating)
    }

    /// Applies a progress update. Step regressions are dropped; progress is
    /// taken as reported, an explicit zero included.
    pub fn advance(
        &mut self,
        attempt: u64,
        step: Option<GenerationStep>,
        progress: Option<u8>,
    ) -> bool {
        if !self.is_live(attempt) {
            return false;
        }

        let mut changed = false;
        if let Some(step) = step {
            let ordinal = step.ordinal();
            if ordinal > self.current_step {
                self.current_step = ordinal;
                changed = true;
            } else if ordinal < self.current_step {
                warn!(
                    attempt,
                    current = self.current_step,
                    reported = ordinal,
                    "ignoring step regression"
                );
            }
        }
        if let Some(progress) = progress {
            let progress = progress.min(100);
            if progress < self.progress {
                debug!(
                    attempt,
                    current = self.progress,
                    reported = progress,
                    "backend reported lower progress"
                );
            }
            changed |= progress != self.progress;
            self.progress = progress;
        }
        changed
    }

    pub fn complete(&mut self, attempt: u64, result: GenerationResult) -> bool {
        if !self.is_live(attempt) {
            return false;
        }
        self.state = SessionState::Complete(result);
        true
    }

    pub fn fail(&mut self, attempt: u64, failure: SessionFailure) -> bool {
        if !self.is_live(attempt) {
            return false;
        }
        self.state = SessionState::Error(failure);
        true
    }

    /// Applies one stream event: progress fields first, then its outcome.
    pub fn apply_event(&mut self, attempt: u64, event: DecodedEvent) -> bool {
        let mut changed = self.advance(attempt, event.step, event.progress);
        match event.outcome {
            Some(EventOutcome::Complete(result)) => changed |= self.complete(attempt, result),
            Some(EventOutcome::Failed(message)) => {
                changed |= self.fail(attempt, SessionFailure::new(FailureKind::Backend, message))
            }
            None => {}
        }
        changed
    }

    /// Back to `Idle` with every field cleared. The attempt counter moves on
    /// so late writes from an abandoned attempt are ignored.
    pub fn reset(&mut self) {
        *self = Self {
            attempt: self.attempt + 1,
            ..Self::default()
        };
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
