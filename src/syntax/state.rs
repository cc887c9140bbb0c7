//! Continuation states
//!
//! A line's ending state tells the next line where to resume: which
//! ruleset is active and which multi-line construct, if any, is still
//! open. Continuations are plain values compared structurally; the
//! [`StateRegistry`] maps each distinct one to a small integer.

use std::collections::HashMap;
use std::fmt;

use super::registry::RulesetId;
use super::rules::{SpanFlags, SpanRule};
use super::tokens::Tag;

use crate::error::{ColorizerError, Result};

/// Integer handle for a continuation, valid within one session generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StateId {
    generation: u32,
    index: u32,
}

impl StateId {
    /// "No continuation": start fresh in the session's language
    pub const NONE: StateId = StateId { generation: 0, index: 0 };

    pub fn is_none(&self) -> bool {
        self.index == 0
    }

    /// The small integer identifying the state within its session
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("S0")
        } else {
            write!(f, "S{}.{}", self.generation, self.index)
        }
    }
}

/// What to do at the start of the next line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Restart {
    /// Nothing open; dispatch from the first character
    Clear,
    /// Keep looking for the end of a span
    Span(SpanRestart),
    /// Inside an `@doc` part
    DocPart,
    /// Coloring was re-enabled by `@color`
    Color,
    /// Coloring is off until an `@color` line
    NoColor,
    /// Coloring is off for the rest of the node
    NoColorNode,
    /// Coloring is off for good
    KillColor,
}

impl Restart {
    /// True while tags must not be emitted
    pub fn suppresses_color(&self) -> bool {
        matches!(self, Restart::NoColor | Restart::NoColorNode | Restart::KillColor)
    }
}

/// The bound parameters of an open span
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpanRestart {
    pub end: String,
    pub tag: Tag,
    pub delegate: Option<String>,
    pub exclude_match: bool,
    pub no_escape: bool,
    pub no_line_break: bool,
    pub no_word_break: bool,
}

impl SpanRestart {
    pub fn from_rule(rule: &SpanRule) -> Self {
        Self {
            end: rule.end.clone(),
            tag: rule.tag,
            delegate: rule.delegate.clone(),
            exclude_match: rule.exclude_match,
            no_escape: rule.flags.no_escape,
            no_line_break: rule.flags.no_line_break,
            no_word_break: rule.flags.no_word_break,
        }
    }

    pub fn flags(&self) -> SpanFlags {
        SpanFlags {
            no_escape: self.no_escape,
            no_line_break: self.no_line_break,
            no_word_break: self.no_word_break,
        }
    }
}

/// A restart bound to the ruleset that was active when it was armed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Continuation {
    pub ruleset: RulesetId,
    pub restart: Restart,
}

impl Continuation {
    pub fn new(ruleset: RulesetId, restart: Restart) -> Self {
        Self { ruleset, restart }
    }

    /// The "no continuation" state of a ruleset
    pub fn clear(ruleset: RulesetId) -> Self {
        Self::new(ruleset, Restart::Clear)
    }
}

impl fmt::Display for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ruleset)?;
        match &self.restart {
            Restart::Clear => Ok(()),
            Restart::Span(span) => {
                write!(f, ";span;end={:?};{}", span.end, span.tag)?;
                if let Some(delegate) = &span.delegate {
                    write!(f, ";delegate={}", delegate)?;
                }
                for (set, name) in [
                    (span.exclude_match, "!match"),
                    (span.no_escape, "!esc"),
                    (span.no_line_break, "!lbrk"),
                    (span.no_word_break, "!wbrk"),
                ] {
                    if set {
                        write!(f, ";{}", name)?;
                    }
                }
                Ok(())
            }
            Restart::DocPart => f.write_str(";@doc"),
            Restart::Color => f.write_str(";@color"),
            Restart::NoColor => f.write_str(";@nocolor"),
            Restart::NoColorNode => f.write_str(";@nocolor-node"),
            Restart::KillColor => f.write_str(";@killcolor"),
        }
    }
}

/// Bijective map between continuations and state integers
#[derive(Debug, Default)]
pub struct StateRegistry {
    generation: u32,
    by_continuation: HashMap<Continuation, StateId>,
    by_index: Vec<Continuation>,
}

impl StateRegistry {
    /// Create an empty registry; its first session is generation 1
    pub fn new() -> Self {
        Self {
            generation: 1,
            ..Default::default()
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of continuations allocated in this session
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// Get the state for a continuation, allocating the next integer if new
    pub fn state_of(&mut self, continuation: Continuation) -> StateId {
        if let Some(id) = self.by_continuation.get(&continuation) {
            return *id;
        }
        let id = StateId {
            generation: self.generation,
            index: self.by_index.len() as u32 + 1,
        };
        self.by_index.push(continuation.clone());
        self.by_continuation.insert(continuation, id);
        id
    }

    /// The canonical "no continuation" state for a ruleset
    pub fn clear_state(&mut self, ruleset: &RulesetId) -> StateId {
        self.state_of(Continuation::clear(ruleset.clone()))
    }

    /// Look up a state.
    ///
    /// `StateId::NONE` yields `Ok(None)`. States issued before the last
    /// [`reset`](Self::reset) are rejected rather than reinterpreted.
    pub fn continuation_of(&self, id: StateId) -> Result<Option<&Continuation>> {
        if id.is_none() {
            return Ok(None);
        }
        if id.generation != self.generation {
            return Err(ColorizerError::StaleState {
                state: id,
                state_generation: id.generation,
                current: self.generation,
            });
        }
        self.by_index
            .get(id.index as usize - 1)
            .map(Some)
            .ok_or(ColorizerError::UnknownState(id))
    }

    /// Human readable description of a state
    pub fn describe(&self, id: StateId) -> String {
        match self.continuation_of(id) {
            Ok(Some(continuation)) => format!("{:>2}:{}", id.index, continuation),
            Ok(None) => format!("{:>2}:no-state", id.index),
            Err(_) => format!("{:>2}:stale", id.index),
        }
    }

    /// Forget every state and start a new generation
    pub fn reset(&mut self) {
        self.by_continuation.clear();
        self.by_index.clear();
        self.generation = self.generation.wrapping_add(1).max(1);
    }
}
