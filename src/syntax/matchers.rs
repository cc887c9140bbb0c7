//! Primitive matchers
//!
//! Each matcher looks at the line at one position and either declines,
//! consumes some text (having already tagged it), or reports that the
//! construct runs past the end of the line.

use std::sync::Arc;

use super::driver::LineRun;
use super::mode::Mode;
use super::rules::{
    find_span_end, prev_char, regex_len_at, Anchors, CompiledRule, SpanEnd, SpanRule,
};
use super::state::{Restart, SpanRestart};
use super::tokens::Tag;

/// What a matcher did at a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// Not here; try the next matcher
    NoMatch,
    /// Consumed and tagged this many bytes
    Matched(usize),
    /// A whole token failed; skip this many bytes without trying the rest
    Skip(usize),
    /// Tagged through the end of the line and armed a restart
    Continues,
}

/// Where a restart leaves the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// Carry on dispatching from this offset
    Resume(usize),
    /// The line is finished
    Continues,
}

/// True if `literal` occurs at `pos`, folding ASCII case when asked
fn literal_at(text: &str, pos: usize, literal: &str, ignore_case: bool) -> bool {
    match text.get(pos..pos + literal.len()) {
        Some(found) if ignore_case => found.eq_ignore_ascii_case(literal),
        Some(found) => found == literal,
        None => false,
    }
}

impl LineRun<'_> {
    pub(super) fn match_rule(&mut self, mode: &Mode, rule: &CompiledRule, i: usize) -> MatchResult {
        match rule {
            CompiledRule::Seq { seq, tag, delegate, anchors } => {
                self.match_seq(mode, seq, *tag, delegate.as_deref(), anchors, i)
            }
            CompiledRule::SeqRegexp { regex, tag, delegate, anchors } => {
                if !anchors.permits(self.text, i, 0, mode.word_chars()) {
                    return MatchResult::NoMatch;
                }
                match regex_len_at(regex, self.text, i) {
                    0 => MatchResult::NoMatch,
                    n => {
                        self.color_range(i, i + n, *tag, delegate.as_deref(), false);
                        MatchResult::Matched(n)
                    }
                }
            }
            CompiledRule::Span(rule) => self.match_span(mode, rule, i),
            CompiledRule::SpanRegexp { begin, rule } => {
                if !rule.anchors.permits(self.text, i, 0, mode.word_chars()) {
                    return MatchResult::NoMatch;
                }
                match regex_len_at(begin, self.text, i) {
                    0 => MatchResult::NoMatch,
                    n => self.match_span_regexp(mode, rule, i, i + n),
                }
            }
            CompiledRule::EolSpan { seq, tag, delegate, exclude_match, anchors } => {
                if !literal_at(self.text, i, seq, mode.ignore_case)
                    || !anchors.permits(self.text, i, seq.len(), mode.word_chars())
                {
                    return MatchResult::NoMatch;
                }
                self.match_eol_span(i, i + seq.len(), *tag, delegate.as_deref(), *exclude_match)
            }
            CompiledRule::EolSpanRegexp { regex, tag, delegate, exclude_match, anchors } => {
                if !anchors.permits(self.text, i, 0, mode.word_chars()) {
                    return MatchResult::NoMatch;
                }
                match regex_len_at(regex, self.text, i) {
                    0 => MatchResult::NoMatch,
                    n => self.match_eol_span(i, i + n, *tag, delegate.as_deref(), *exclude_match),
                }
            }
            CompiledRule::Keywords => self.match_keywords(mode, i),
            CompiledRule::MarkFollowing { pattern, tag, exclude_match, anchors } => {
                self.match_mark_following(mode, pattern, *tag, *exclude_match, anchors, i)
            }
            CompiledRule::WordAndRegexp { word, word_tag, regex, pattern_tag, exclude_match, anchors } => {
                if !literal_at(self.text, i, word, mode.ignore_case)
                    || !anchors.permits(self.text, i, word.len(), mode.word_chars())
                {
                    return MatchResult::NoMatch;
                }
                let j = i + word.len();
                match regex_len_at(regex, self.text, j) {
                    0 => MatchResult::NoMatch,
                    n => {
                        self.color_range(i, j, *word_tag, None, *exclude_match);
                        self.color_range(j, j + n, *pattern_tag, None, false);
                        MatchResult::Matched(j + n - i)
                    }
                }
            }
            CompiledRule::Invalid => MatchResult::NoMatch,
        }
    }

    fn match_seq(
        &mut self,
        mode: &Mode,
        seq: &str,
        tag: Tag,
        delegate: Option<&str>,
        anchors: &Anchors,
        i: usize,
    ) -> MatchResult {
        if !literal_at(self.text, i, seq, mode.ignore_case)
            || !anchors.permits(self.text, i, seq.len(), mode.word_chars())
        {
            return MatchResult::NoMatch;
        }
        self.color_range(i, i + seq.len(), tag, delegate, false);
        MatchResult::Matched(seq.len())
    }

    /// Tag a span's delimiters and interior.
    ///
    /// `[start, from)` is the begin marker, `[from, to)` the interior and
    /// `[to, stop)` the end marker, which is empty for an open span.
    fn color_span(&mut self, start: usize, from: usize, to: usize, stop: usize, span: &SpanParts<'_>) {
        match span.delegate {
            Some(delegate) => {
                self.color_range(start, from, span.tag, None, span.exclude_match);
                self.color_range(from, to, span.tag, Some(delegate), false);
                self.color_range(to, stop, span.tag, None, span.exclude_match);
            }
            None if span.exclude_match => self.color_range(from, to, span.tag, None, false),
            None => self.color_range(start, stop, span.tag, None, false),
        }
    }

    fn match_span(&mut self, mode: &Mode, rule: &SpanRule, i: usize) -> MatchResult {
        if !literal_at(self.text, i, &rule.begin, mode.ignore_case)
            || !rule.anchors.permits(self.text, i, rule.begin.len(), mode.word_chars())
        {
            return MatchResult::NoMatch;
        }
        let from = i + rule.begin.len();
        let len = self.text.len();
        let parts = SpanParts::from_rule(rule);
        match find_span_end(self.text, from, &rule.end, mode.escape, rule.flags, mode.word_chars()) {
            SpanEnd::Failed => MatchResult::NoMatch,
            SpanEnd::Found(j) => {
                let stop = j + rule.end.len();
                self.color_span(i, from, j, stop, &parts);
                self.clear_state();
                MatchResult::Matched(stop - i)
            }
            SpanEnd::NotFound => {
                self.color_span(i, from, len, len, &parts);
                self.set_restart(Restart::Span(SpanRestart::from_rule(rule)));
                MatchResult::Continues
            }
        }
    }

    /// A regex begin marker ending at `from`, and a literal end marker on the same line
    fn match_span_regexp(&mut self, mode: &Mode, rule: &SpanRule, i: usize, from: usize) -> MatchResult {
        let Some(offset) = self.text[from..].find(&rule.end) else {
            return MatchResult::NoMatch;
        };
        let j = from + offset;
        if let Some(escape) = mode.escape.filter(|_| !rule.flags.no_escape) {
            let escapes = self.text[..j].chars().rev().take_while(|c| *c == escape).count();
            // No way to resume a regex past an escaped end marker.
            if escapes % 2 == 1 {
                return MatchResult::NoMatch;
            }
        }
        let stop = j + rule.end.len();
        self.color_span(i, from, j, stop, &SpanParts::from_rule(rule));
        MatchResult::Matched(stop - i)
    }

    fn match_eol_span(
        &mut self,
        i: usize,
        from: usize,
        tag: Tag,
        delegate: Option<&str>,
        exclude_match: bool,
    ) -> MatchResult {
        let len = self.text.len();
        match delegate {
            Some(delegate) => {
                self.color_range(i, from, tag, None, exclude_match);
                self.color_range(from, len, tag, Some(delegate), false);
            }
            None if exclude_match => self.color_range(from, len, tag, None, false),
            None => self.color_range(i, len, tag, None, false),
        }
        MatchResult::Matched(len - i)
    }

    fn match_keywords(&mut self, mode: &Mode, i: usize) -> MatchResult {
        if prev_char(self.text, i).is_some_and(|c| mode.word_chars().contains(c)) {
            return MatchResult::NoMatch;
        }
        let j = mode.keyword_chars().scan(self.text, i);
        if j == i {
            return MatchResult::NoMatch;
        }
        let word = &self.text[i..j];
        if let Some(tag) = mode.keyword(word) {
            self.color_range(i, j, tag, None, false);
            MatchResult::Matched(j - i)
        } else if mode.is_digit_word(word) {
            self.color_range(i, j, Tag::Digit, None, false);
            MatchResult::Matched(j - i)
        } else {
            MatchResult::Skip(j - i)
        }
    }

    fn match_mark_following(
        &mut self,
        mode: &Mode,
        pattern: &str,
        tag: Tag,
        exclude_match: bool,
        anchors: &Anchors,
        i: usize,
    ) -> MatchResult {
        if !literal_at(self.text, i, pattern, mode.ignore_case)
            || !anchors.permits(self.text, i, pattern.len(), mode.word_chars())
        {
            return MatchResult::NoMatch;
        }
        let j = i + pattern.len();
        let k = mode.word_chars().scan(self.text, j);
        // Nothing matches unless a token follows the marker.
        if k == j {
            return MatchResult::NoMatch;
        }
        self.color_range(i, j, tag, None, exclude_match);
        self.color_range(j, k, tag, None, false);
        MatchResult::Matched(k - i)
    }

    /// Look for the end of an open span from the start of the line
    pub(super) fn restart_span(&mut self, span: &SpanRestart) -> RestartOutcome {
        let mode = Arc::clone(&self.mode);
        let len = self.text.len();
        let parts = SpanParts::from_restart(span);
        match find_span_end(self.text, 0, &span.end, mode.escape, span.flags(), mode.word_chars()) {
            SpanEnd::Found(j) => {
                let stop = j + span.end.len();
                self.color_span(0, 0, j, stop, &parts);
                self.clear_state();
                RestartOutcome::Resume(stop)
            }
            SpanEnd::NotFound | SpanEnd::Failed => {
                self.color_span(0, 0, len, len, &parts);
                self.set_restart(Restart::Span(span.clone()));
                RestartOutcome::Continues
            }
        }
    }
}

/// The tagging parameters shared by span rules and span restarts
struct SpanParts<'r> {
    tag: Tag,
    delegate: Option<&'r str>,
    exclude_match: bool,
}

impl<'r> SpanParts<'r> {
    fn from_rule(rule: &'r SpanRule) -> Self {
        Self {
            tag: rule.tag,
            delegate: rule.delegate.as_deref(),
            exclude_match: rule.exclude_match,
        }
    }

    fn from_restart(span: &'r SpanRestart) -> Self {
        Self {
            tag: span.tag,
            delegate: span.delegate.as_deref(),
            exclude_match: span.exclude_match,
        }
    }
}
