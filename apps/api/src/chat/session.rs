//! Chat session state machine.
//!
//! `Idle → AwaitingFirstToken → Streaming → Idle`. A failure in either
//! loading phase swaps in the apology and lands back in `Idle`; the error
//! state is never observable from outside a transition.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chat::message::{ChatMessage, Role, APOLOGY_TEXT};
use crate::chat::transport::ChatRequest;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    AwaitingFirstToken,
    Streaming,
}

/// A submission accepted by `begin_turn`, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTurn {
    pub message: String,
    /// Every message that preceded the new user turn.
    pub history: Vec<ChatMessage>,
}

impl From<PendingTurn> for ChatRequest {
    fn from(turn: PendingTurn) -> Self {
        ChatRequest {
            message: turn.message,
            history: turn.history,
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Answered(String),
    Failed,
}

/// What a view needs to render the chat panel.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionSnapshot {
    pub messages: Vec<ChatMessage>,
    pub phase: Phase,
    pub input_enabled: bool,
    /// The typing placeholder is shown until the first fragment arrives.
    pub typing: bool,
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    phase: Phase,
    last_active: DateTime<Utc>,
}

impl ChatSession {
    /// A freshly mounted widget: one assistant greeting, nothing in flight.
    pub fn mount(greeting: &str) -> Self {
        Self {
            messages: vec![ChatMessage::assistant(greeting)],
            phase: Phase::Idle,
            last_active: Utc::now(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn input_enabled(&self) -> bool {
        !self.is_in_flight()
    }

    pub fn show_typing(&self) -> bool {
        self.phase == Phase::AwaitingFirstToken
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.messages.clone(),
            phase: self.phase,
            input_enabled: self.input_enabled(),
            typing: self.show_typing(),
        }
    }

    /// Accepts a submission. Returns `None`, changing nothing, when the
    /// trimmed input is blank or a request is already in flight.
    pub fn begin_turn(&mut self, input: &str) -> Option<PendingTurn> {
        let message = input.trim();
        if message.is_empty() || self.is_in_flight() {
            return None;
        }

        let history = self.messages.clone();
        self.messages.push(ChatMessage::user(message));
        self.phase = Phase::AwaitingFirstToken;
        self.last_active = Utc::now();

        Some(PendingTurn {
            message: message.to_string(),
            history,
        })
    }

    /// Applies one streamed fragment. The first one creates the assistant
    /// message; later ones extend it in place. Returns false if ignored.
    pub fn push_fragment(&mut self, fragment: &str) -> bool {
        if fragment.is_empty() {
            return false;
        }
        match self.phase {
            Phase::Idle => false,
            Phase::AwaitingFirstToken => {
                self.messages.push(ChatMessage::assistant(fragment));
                self.phase = Phase::Streaming;
                true
            }
            Phase::Streaming => match self.messages.last_mut() {
                Some(last) if last.role == Role::Assistant => {
                    last.text.push_str(fragment);
                    true
                }
                _ => false,
            },
        }
    }

    /// Ends the stream. A stream that produced no text counts as a failure.
    pub fn complete(&mut self) -> TurnOutcome {
        match self.phase {
            Phase::Streaming => {
                self.phase = Phase::Idle;
                self.last_active = Utc::now();
                let text = self
                    .messages
                    .last()
                    .map(|m| m.text.clone())
                    .unwrap_or_default();
                TurnOutcome::Answered(text)
            }
            Phase::AwaitingFirstToken => self.fail(),
            Phase::Idle => TurnOutcome::Failed,
        }
    }

    /// Substitutes the apology for the in-progress assistant message (or
    /// appends it if none started) and returns to `Idle`.
    pub fn fail(&mut self) -> TurnOutcome {
        match self.phase {
            Phase::Streaming => {
                if let Some(last) = self.messages.last_mut() {
                    last.text = APOLOGY_TEXT.to_string();
                }
            }
            Phase::AwaitingFirstToken => {
                self.messages.push(ChatMessage::assistant(APOLOGY_TEXT));
            }
            Phase::Idle => return TurnOutcome::Failed,
        }
        self.phase = Phase::Idle;
        self.last_active = Utc::now();
        TurnOutcome::Failed
    }
}
