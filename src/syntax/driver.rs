//! Line driver
//!
//! A [`Colorizer`] owns one colorizing session: the mode registry, the
//! state registry and the session's language. Each call to
//! [`Colorizer::process_line`] runs a single line from its starting
//! state and returns the tagged ranges plus the line's ending state.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, trace, warn};

use super::library::ModeLibrary;
use super::matchers::{MatchResult, RestartOutcome};
use super::mode::{Matcher, Mode};
use super::registry::{ModeRegistry, RulesetId};
use super::sink::{TagEvent, TagSink};
use super::state::{Continuation, Restart, StateId, StateRegistry};
use super::tokens::Tag;

use crate::error::Result;

/// URLs recognised anywhere in text
pub(super) static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(file|ftp|gopher|http|https|mailto|news|nntp|prospero|telnet|wais)://[^\s'"]+[\w=/]"#)
        .expect("URL pattern is valid")
});

/// Session options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorizerOptions {
    /// Install URL matchers and sweep tagged ranges for URLs
    pub highlight_urls: bool,
    /// Deepest allowed chain of delegated ranges
    pub max_delegation_depth: usize,
}

impl Default for ColorizerOptions {
    fn default() -> Self {
        Self {
            highlight_urls: true,
            max_delegation_depth: 16,
        }
    }
}

/// An `@language` directive seen on a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSwitch {
    /// Declared language name
    pub name: String,
    /// True if the language has rules and is now active
    pub resolved: bool,
}

/// The outcome of processing one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineResult {
    pub events: Vec<TagEvent>,
    /// State to pass to the next line
    pub state: StateId,
    /// Set when the line declared a new language; later lines must be redone
    pub switch: Option<LanguageSwitch>,
    /// Dispatch iterations spent on the line
    pub steps: usize,
}

/// One document's colorizing session
#[derive(Debug)]
pub struct Colorizer {
    registry: ModeRegistry,
    states: StateRegistry,
    language: String,
    base: Arc<Mode>,
    options: ColorizerOptions,
}

impl Colorizer {
    /// Create a session with no language; call [`reset_language`](Self::reset_language) next
    pub fn new(library: ModeLibrary, options: ColorizerOptions) -> Self {
        Self {
            registry: ModeRegistry::new(library, options.highlight_urls),
            states: StateRegistry::new(),
            language: String::new(),
            base: Arc::new(Mode::unknown(RulesetId::new("no-language"))),
            options,
        }
    }

    /// Start a new session in `name`.
    ///
    /// Every state issued before this call becomes stale. Returns the
    /// initial state of the new session.
    pub fn reset_language(&mut self, name: &str) -> StateId {
        let dropped = self.states.len();
        self.states.reset();
        self.language = name.to_string();
        self.base = self.registry.resolve(name);
        if self.base.is_unknown() {
            warn!(target: "linetag::driver", language = %name, "Language has no rules");
        }
        info!(
            target: "linetag::driver",
            language = %name,
            ruleset = %self.base.ruleset,
            generation = self.states.generation(),
            dropped,
            "Language reset"
        );
        self.states.clear_state(&self.base.ruleset)
    }

    /// The session's language
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The mode the session starts in
    pub fn base_mode(&self) -> &Arc<Mode> {
        &self.base
    }

    pub fn generation(&self) -> u32 {
        self.states.generation()
    }

    pub fn registry(&self) -> &ModeRegistry {
        &self.registry
    }

    pub fn options(&self) -> &ColorizerOptions {
        &self.options
    }

    /// State for the first line of a document
    pub fn initial_state(&mut self, enabled: bool) -> StateId {
        let ruleset = self.base.ruleset.clone();
        if enabled {
            self.states.clear_state(&ruleset)
        } else {
            self.states.state_of(Continuation::new(ruleset, Restart::NoColor))
        }
    }

    /// Human readable form of a state
    pub fn describe_state(&self, state: StateId) -> String {
        self.states.describe(state)
    }

    /// Tag one line starting in `state`
    pub fn process_line(&mut self, state: StateId, text: &str) -> Result<LineResult> {
        let continuation = self.states.continuation_of(state)?.cloned();
        let (mode, restart, state) = match continuation {
            None => {
                let state = self.states.clear_state(&self.base.ruleset);
                (Arc::clone(&self.base), Restart::Clear, state)
            }
            Some(continuation) => {
                let mode = self.registry.get(&continuation.ruleset).unwrap_or_else(|| {
                    debug!(target: "linetag::driver", ruleset = %continuation.ruleset, "Ruleset not cached, using base mode");
                    Arc::clone(&self.base)
                });
                (mode, continuation.restart, state)
            }
        };

        let mut run = LineRun::new(
            &mut self.registry,
            &mut self.states,
            &self.options,
            text,
            mode,
            state,
            restart.suppresses_color(),
        );
        // Blank lines keep their incoming state untouched.
        if text.is_empty() || !text.chars().all(char::is_whitespace) {
            run.main_loop(&restart);
        }

        let result = run.finish();
        trace!(
            target: "linetag::driver",
            from = %state,
            to = %result.state,
            events = result.events.len(),
            steps = result.steps,
            "Line processed"
        );
        Ok(result)
    }

    /// Tag one line and forward its events to `sink`
    pub fn process_line_into(
        &mut self,
        state: StateId,
        text: &str,
        sink: &mut dyn TagSink,
    ) -> Result<LineResult> {
        let result = self.process_line(state, text)?;
        for event in &result.events {
            sink.tag(text, event.start, event.end, event.tag);
        }
        Ok(result)
    }
}

/// The working state of one line.
///
/// Matchers borrow the line through this and record their tags and
/// restarts on it. Delegated ranges run with `depth > 0`; only the line's
/// own mode may change the line's state.
pub(super) struct LineRun<'a> {
    registry: &'a mut ModeRegistry,
    states: &'a mut StateRegistry,
    options: &'a ColorizerOptions,
    pub(super) text: &'a str,
    /// The line's mode; replaced by `@language`
    pub(super) mode: Arc<Mode>,
    state: StateId,
    suppressed: bool,
    pub(super) depth: usize,
    events: Vec<TagEvent>,
    switch: Option<LanguageSwitch>,
    steps: usize,
}

impl<'a> LineRun<'a> {
    fn new(
        registry: &'a mut ModeRegistry,
        states: &'a mut StateRegistry,
        options: &'a ColorizerOptions,
        text: &'a str,
        mode: Arc<Mode>,
        state: StateId,
        suppressed: bool,
    ) -> Self {
        Self {
            registry,
            states,
            options,
            text,
            mode,
            state,
            suppressed,
            depth: 0,
            events: Vec::new(),
            switch: None,
            steps: 0,
        }
    }

    fn finish(self) -> LineResult {
        LineResult {
            events: self.events,
            state: self.state,
            switch: self.switch,
            steps: self.steps,
        }
    }

    /// Run the restart, then dispatch on each character until the line ends
    fn main_loop(&mut self, restart: &Restart) {
        let len = self.text.len();
        self.steps += 1;
        let mut i = match self.restart(restart) {
            RestartOutcome::Resume(pos) => pos,
            RestartOutcome::Continues => return,
        };

        while i < len {
            self.steps += 1;
            let Some(c) = self.text[i..].chars().next() else {
                break;
            };
            let mode = Arc::clone(&self.mode);
            let mut advance = c.len_utf8();
            for matcher in mode.rules_for(c) {
                match self.run_matcher(&mode, matcher, i) {
                    MatchResult::NoMatch => continue,
                    MatchResult::Matched(n) | MatchResult::Skip(n) => {
                        debug_assert!(n > 0 && self.text.is_char_boundary(i + n), "matcher broke progress");
                        advance = n.max(1);
                        break;
                    }
                    MatchResult::Continues => return,
                }
            }
            i += advance;
        }
    }

    fn restart(&mut self, restart: &Restart) -> RestartOutcome {
        match restart {
            Restart::Clear => RestartOutcome::Resume(0),
            Restart::Span(span) => self.restart_span(span),
            Restart::DocPart => self.restart_doc_part(),
            Restart::Color => self.restart_color(),
            Restart::NoColor => self.restart_no_color(),
            Restart::NoColorNode | Restart::KillColor => {
                self.set_restart(restart.clone());
                RestartOutcome::Continues
            }
        }
    }

    pub(super) fn run_matcher(&mut self, mode: &Mode, matcher: &Matcher, i: usize) -> MatchResult {
        match matcher {
            Matcher::Directive(directive) => self.match_directive(mode, *directive, i),
            Matcher::Rule(rule) => self.match_rule(mode, &rule.compiled, i),
        }
    }

    /// Record a tag, unless coloring is off
    pub(super) fn set_tag(&mut self, start: usize, end: usize, tag: Tag) {
        let at = self.events.len();
        self.insert_tag(at, start, end, tag);
    }

    /// Record a tag at position `at` of the event list, keeping line order
    fn insert_tag(&mut self, at: usize, start: usize, end: usize, tag: Tag) {
        let end = end.min(self.text.len());
        if self.suppressed || start >= end || tag == Tag::Null {
            return;
        }
        self.events.insert(at, TagEvent::new(start, end, tag));
    }

    /// Tag a range, through a delegate if one is given.
    ///
    /// Any URL inside a range tagged with something other than `url` is
    /// tagged again as a URL.
    pub(super) fn color_range(
        &mut self,
        start: usize,
        end: usize,
        tag: Tag,
        delegate: Option<&str>,
        exclude_match: bool,
    ) {
        if self.suppressed {
            return;
        }
        let end = end.min(self.text.len());
        match delegate {
            Some(delegate) => self.run_range(delegate, start, end, tag),
            None if !exclude_match => self.set_tag(start, end, tag),
            None => {}
        }
        if tag != Tag::Url && self.depth == 0 && self.options.highlight_urls {
            self.sweep_urls(start, end);
        }
    }

    fn sweep_urls(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let text = self.text;
        for m in URL_REGEX.find_iter(&text[start..end]) {
            self.set_tag(start + m.start(), start + m.end(), Tag::Url);
        }
    }

    /// Tag `[start, end)` under the rules of `delegate`.
    ///
    /// Text no delegate rule claims gets the delegate's default tag, or
    /// `fallback` when it declares none.
    pub(super) fn run_range(&mut self, delegate: &str, start: usize, end: usize, fallback: Tag) {
        if self.depth >= self.options.max_delegation_depth {
            warn!(target: "linetag::driver", %delegate, depth = self.depth, "Delegation too deep");
            self.set_tag(start, end, fallback);
            return;
        }
        let mode = self.registry.resolve(delegate);
        let default_tag = mode.default_tag.unwrap_or(fallback);
        let len = self.text.len();

        self.depth += 1;
        let mut i = start;
        let mut unclaimed: Option<usize> = None;
        while i < end && i < len {
            let Some(c) = self.text[i..].chars().next() else {
                break;
            };
            let mark = self.events.len();
            let mut claimed = None;
            for matcher in mode.rules_for(c) {
                match self.run_matcher(&mode, matcher, i) {
                    MatchResult::Matched(n) => {
                        claimed = Some(i + n.max(1));
                        break;
                    }
                    MatchResult::Continues => {
                        claimed = Some(len);
                        break;
                    }
                    MatchResult::NoMatch | MatchResult::Skip(_) => {}
                }
            }
            match claimed {
                Some(next) => {
                    if let Some(from) = unclaimed.take() {
                        self.insert_tag(mark, from, i, default_tag);
                    }
                    i = next;
                }
                None => {
                    unclaimed.get_or_insert(i);
                    i += c.len_utf8();
                }
            }
        }
        if let Some(from) = unclaimed {
            self.set_tag(from, i.min(end), default_tag);
        }
        self.depth -= 1;
    }

    /// Arm a restart for the next line
    pub(super) fn set_restart(&mut self, restart: Restart) {
        if self.depth > 0 {
            return;
        }
        self.suppressed = restart.suppresses_color();
        self.state = self
            .states
            .state_of(Continuation::new(self.mode.ruleset.clone(), restart));
    }

    /// Return to the "no continuation" state of the line's mode
    pub(super) fn clear_state(&mut self) {
        if self.depth > 0 {
            return;
        }
        self.suppressed = false;
        self.state = self.states.clear_state(&self.mode.ruleset);
    }

    /// Make `name` the line's mode if it has rules, and report the switch
    pub(super) fn switch_language(&mut self, name: &str) {
        let mode = if name.is_empty() {
            None
        } else {
            self.registry.try_resolve(name)
        };
        let resolved = mode.is_some();
        if let Some(mode) = mode {
            self.mode = mode;
            self.clear_state();
        }
        info!(target: "linetag::driver", language = %name, resolved, "@language");
        self.switch = Some(LanguageSwitch {
            name: name.to_string(),
            resolved,
        });
    }
}
