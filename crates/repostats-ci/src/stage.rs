//! Run state machine.
//!
//! `Idle -> Fetching -> Archiving -> Publishing -> Done`, with `Archiving ->
//! Done` when publishing is skipped. Any non-terminal state may move to
//! `Failed`. `Done` and `Failed` are terminal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// Lifecycle state of one run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Fetching,
    Archiving,
    Publishing,
    Done,
    Failed,
}

impl RunState {
    /// Get the state name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::Archiving => "archiving",
            RunState::Publishing => "publishing",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (*self, next) {
            (s, Failed) => !s.is_terminal(),
            (Idle, Fetching)
            | (Fetching, Archiving)
            | (Archiving, Publishing)
            | (Archiving, Done)
            | (Publishing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tracks the current state and every state visited.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: RunState,
    history: Vec<RunState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        StateMachine {
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: RunState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = RunState::Failed;
            self.history.push(RunState::Failed);
        }
    }
}
