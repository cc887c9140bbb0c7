//! Rule descriptors for lexical tagging
//!
//! Mode files describe their matchers as a closed set of rule kinds. This
//! module holds the serialized form ([`RuleSpec`]), the compiled form
//! ([`Rule`]) and the small text primitives every matcher shares.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use tracing::warn;

use super::tokens::Tag;

/// Position constraints a rule may place on where it starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Anchors {
    /// The match must start the line
    pub at_line_start: bool,
    /// The match must be the first non-whitespace text of the line
    pub at_whitespace_end: bool,
    /// The match must start a word and be followed by a non-word character
    pub at_word_start: bool,
}

impl Anchors {
    /// Check the constraints for a match of `len` bytes at `pos`.
    ///
    /// `len` is only consulted for the trailing word-boundary check and
    /// may be zero for regex-led rules whose extent is not known yet.
    pub fn permits(&self, text: &str, pos: usize, len: usize, word_chars: &WordChars) -> bool {
        if self.at_line_start && pos != 0 {
            return false;
        }
        if self.at_whitespace_end && pos != skip_ws(text, 0) {
            return false;
        }
        if self.at_word_start {
            if prev_char(text, pos).is_some_and(|c| word_chars.contains(c)) {
                return false;
            }
            if len > 0 && text[pos + len..].chars().next().is_some_and(|c| word_chars.contains(c)) {
                return false;
            }
        }
        true
    }
}

/// Flags controlling how a span searches for its terminator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct SpanFlags {
    /// Escape characters do not suppress the end marker
    pub no_escape: bool,
    /// The span may not continue onto the next line
    pub no_line_break: bool,
    /// The end marker may not directly follow a word character
    pub no_word_break: bool,
}

/// A rule as written in a mode file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    /// Literal sequence
    Seq {
        seq: String,
        tag: String,
        #[serde(default)]
        delegate: Option<String>,
        #[serde(flatten)]
        anchors: Anchors,
    },
    /// Regex anchored at the current position
    SeqRegexp {
        regexp: String,
        tag: String,
        #[serde(default)]
        delegate: Option<String>,
        #[serde(flatten)]
        anchors: Anchors,
    },
    /// Literal begin marker, literal end marker, may cross lines
    Span {
        begin: String,
        end: String,
        tag: String,
        #[serde(default)]
        delegate: Option<String>,
        #[serde(default)]
        exclude_match: bool,
        #[serde(flatten)]
        flags: SpanFlags,
        #[serde(flatten)]
        anchors: Anchors,
    },
    /// Regex begin marker, literal end marker on the same line
    SpanRegexp {
        begin: String,
        end: String,
        tag: String,
        #[serde(default)]
        delegate: Option<String>,
        #[serde(default)]
        exclude_match: bool,
        #[serde(flatten)]
        flags: SpanFlags,
        #[serde(flatten)]
        anchors: Anchors,
    },
    /// Literal marker, then everything to end of line
    EolSpan {
        seq: String,
        tag: String,
        #[serde(default)]
        delegate: Option<String>,
        #[serde(default)]
        exclude_match: bool,
        #[serde(flatten)]
        anchors: Anchors,
    },
    /// Regex marker, then everything to end of line
    EolSpanRegexp {
        regexp: String,
        tag: String,
        #[serde(default)]
        delegate: Option<String>,
        #[serde(default)]
        exclude_match: bool,
        #[serde(flatten)]
        anchors: Anchors,
    },
    /// Keyword table lookup of the word at the current position
    Keywords,
    /// Literal marker followed by the next word
    MarkFollowing {
        pattern: String,
        tag: String,
        #[serde(default)]
        exclude_match: bool,
        #[serde(flatten)]
        anchors: Anchors,
    },
    /// Literal word followed by a regex
    WordAndRegexp {
        word: String,
        word_tag: String,
        pattern: String,
        pattern_tag: String,
        #[serde(default)]
        exclude_match: bool,
        #[serde(flatten)]
        anchors: Anchors,
    },
}

/// A rule entry: a descriptor plus its optional explicit dispatch characters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleEntry {
    /// Leading characters this rule is dispatched on
    #[serde(default)]
    pub chars: Option<String>,
    #[serde(flatten)]
    pub spec: RuleSpec,
}

/// A span rule ready to run, also the payload of span restarts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRule {
    pub begin: String,
    pub end: String,
    pub tag: Tag,
    pub delegate: Option<String>,
    pub exclude_match: bool,
    pub flags: SpanFlags,
    pub anchors: Anchors,
}

/// Compiled form of a rule
#[derive(Debug, Clone)]
pub enum CompiledRule {
    Seq {
        seq: String,
        tag: Tag,
        delegate: Option<String>,
        anchors: Anchors,
    },
    SeqRegexp {
        regex: Regex,
        tag: Tag,
        delegate: Option<String>,
        anchors: Anchors,
    },
    Span(SpanRule),
    SpanRegexp {
        begin: Regex,
        rule: SpanRule,
    },
    EolSpan {
        seq: String,
        tag: Tag,
        delegate: Option<String>,
        exclude_match: bool,
        anchors: Anchors,
    },
    EolSpanRegexp {
        regex: Regex,
        tag: Tag,
        delegate: Option<String>,
        exclude_match: bool,
        anchors: Anchors,
    },
    Keywords,
    MarkFollowing {
        pattern: String,
        tag: Tag,
        exclude_match: bool,
        anchors: Anchors,
    },
    WordAndRegexp {
        word: String,
        word_tag: Tag,
        regex: Regex,
        pattern_tag: Tag,
        exclude_match: bool,
        anchors: Anchors,
    },
    /// A rule that failed to compile; never matches
    Invalid,
}

/// A rule of a mode: the descriptor it came from and its compiled form
#[derive(Debug, Clone)]
pub struct Rule {
    pub spec: RuleSpec,
    pub compiled: CompiledRule,
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

impl Rule {
    /// Compile a descriptor against a ruleset's case sensitivity.
    ///
    /// Problems are logged and produce an always-failing rule.
    pub fn compile(spec: RuleSpec, ignore_case: bool) -> Self {
        let compiled = match compile_spec(&spec, ignore_case) {
            Ok(compiled) => compiled,
            Err(reason) => {
                warn!(target: "linetag::rules", rule = ?spec, %reason, "Rule disabled");
                CompiledRule::Invalid
            }
        };
        Self { spec, compiled }
    }

    /// The leading literal used to derive dispatch characters, if any
    fn leading_literal(&self) -> Option<&str> {
        match &self.spec {
            RuleSpec::Seq { seq, .. } | RuleSpec::EolSpan { seq, .. } => Some(seq),
            RuleSpec::Span { begin, .. } => Some(begin),
            RuleSpec::MarkFollowing { pattern, .. } => Some(pattern),
            RuleSpec::WordAndRegexp { word, .. } => Some(word),
            _ => None,
        }
    }

    /// Characters this rule is dispatched on.
    ///
    /// Explicit `chars` win; otherwise the first character of the leading
    /// literal (both cases when ignoring case), and the whole keyword
    /// alphabet for keyword rules.
    pub fn dispatch_chars(
        &self,
        explicit: Option<&str>,
        keyword_chars: &WordChars,
        ignore_case: bool,
    ) -> Vec<char> {
        if let Some(chars) = explicit {
            return dedup_chars(chars.chars());
        }
        if matches!(self.spec, RuleSpec::Keywords) {
            let mut chars: Vec<char> = keyword_chars.iter().collect();
            chars.sort_unstable();
            return chars;
        }
        match self.leading_literal().and_then(|lit| lit.chars().next()) {
            Some(first) if ignore_case && first.is_alphabetic() => {
                dedup_chars(first.to_lowercase().chain(first.to_uppercase()))
            }
            Some(first) => vec![first],
            None => {
                warn!(target: "linetag::rules", rule = ?self.spec, "Regex rule without dispatch chars");
                Vec::new()
            }
        }
    }
}

fn dedup_chars(chars: impl Iterator<Item = char>) -> Vec<char> {
    let mut out = Vec::new();
    for c in chars {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

fn parse_tag(name: &str) -> Result<Tag, String> {
    Tag::from_name(name).ok_or_else(|| format!("unknown tag '{}'", name))
}

fn non_empty(literal: &str, what: &str) -> Result<String, String> {
    if literal.is_empty() {
        Err(format!("empty {}", what))
    } else {
        Ok(literal.to_string())
    }
}

fn compile_spec(spec: &RuleSpec, ignore_case: bool) -> Result<CompiledRule, String> {
    let compiled = match spec {
        RuleSpec::Seq { seq, tag, delegate, anchors } => CompiledRule::Seq {
            seq: non_empty(seq, "seq")?,
            tag: parse_tag(tag)?,
            delegate: delegate.clone(),
            anchors: anchors.clone(),
        },
        RuleSpec::SeqRegexp { regexp, tag, delegate, anchors } => CompiledRule::SeqRegexp {
            regex: compile_regex(regexp, ignore_case)?,
            tag: parse_tag(tag)?,
            delegate: delegate.clone(),
            anchors: anchors.clone(),
        },
        RuleSpec::Span { begin, end, tag, delegate, exclude_match, flags, anchors } => {
            CompiledRule::Span(SpanRule {
                begin: non_empty(begin, "begin")?,
                end: non_empty(end, "end")?,
                tag: parse_tag(tag)?,
                delegate: delegate.clone(),
                exclude_match: *exclude_match,
                flags: *flags,
                anchors: anchors.clone(),
            })
        }
        RuleSpec::SpanRegexp { begin, end, tag, delegate, exclude_match, flags, anchors } => {
            CompiledRule::SpanRegexp {
                begin: compile_regex(begin, ignore_case)?,
                rule: SpanRule {
                    begin: begin.clone(),
                    end: non_empty(end, "end")?,
                    tag: parse_tag(tag)?,
                    delegate: delegate.clone(),
                    exclude_match: *exclude_match,
                    flags: *flags,
                    anchors: anchors.clone(),
                },
            }
        }
        RuleSpec::EolSpan { seq, tag, delegate, exclude_match, anchors } => CompiledRule::EolSpan {
            seq: non_empty(seq, "seq")?,
            tag: parse_tag(tag)?,
            delegate: delegate.clone(),
            exclude_match: *exclude_match,
            anchors: anchors.clone(),
        },
        RuleSpec::EolSpanRegexp { regexp, tag, delegate, exclude_match, anchors } => {
            CompiledRule::EolSpanRegexp {
                regex: compile_regex(regexp, ignore_case)?,
                tag: parse_tag(tag)?,
                delegate: delegate.clone(),
                exclude_match: *exclude_match,
                anchors: anchors.clone(),
            }
        }
        RuleSpec::Keywords => CompiledRule::Keywords,
        RuleSpec::MarkFollowing { pattern, tag, exclude_match, anchors } => {
            CompiledRule::MarkFollowing {
                pattern: non_empty(pattern, "pattern")?,
                tag: parse_tag(tag)?,
                exclude_match: *exclude_match,
                anchors: anchors.clone(),
            }
        }
        RuleSpec::WordAndRegexp { word, word_tag, pattern, pattern_tag, exclude_match, anchors } => {
            CompiledRule::WordAndRegexp {
                word: non_empty(word, "word")?,
                word_tag: parse_tag(word_tag)?,
                regex: compile_regex(pattern, ignore_case)?,
                pattern_tag: parse_tag(pattern_tag)?,
                exclude_match: *exclude_match,
                anchors: anchors.clone(),
            }
        }
    };
    Ok(compiled)
}

/// Compile a pattern, honouring the ruleset's case folding
pub fn compile_regex(pattern: &str, ignore_case: bool) -> Result<Regex, String> {
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| format!("invalid regex '{}': {}", pattern, e))
}

/// Length of the match of `regex` starting exactly at `pos`, 0 if none
pub fn regex_len_at(regex: &Regex, text: &str, pos: usize) -> usize {
    if pos > text.len() {
        return 0;
    }
    regex
        .find_at(text, pos)
        .filter(|m| m.start() == pos)
        .map(|m| m.len())
        .unwrap_or(0)
}

/// The set of characters that make up words for one mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordChars(HashSet<char>);

impl WordChars {
    /// ASCII letters and digits
    pub fn alphanumeric() -> Self {
        Self(('a'..='z').chain('A'..='Z').chain('0'..='9').collect())
    }

    /// Add characters, never whitespace
    pub fn extend(&mut self, chars: impl IntoIterator<Item = char>) {
        self.0.extend(chars.into_iter().filter(|c| *c != ' ' && *c != '\t'));
    }

    pub fn contains(&self, c: char) -> bool {
        self.0.contains(&c)
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.0.iter().copied()
    }

    /// End of the run of word characters starting at `pos`
    pub fn scan(&self, text: &str, pos: usize) -> usize {
        let run: usize = text[pos..]
            .chars()
            .take_while(|c| self.contains(*c))
            .map(char::len_utf8)
            .sum();
        pos + run
    }
}

/// Where a span's end marker was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanEnd {
    /// The end marker starts at this offset
    Found(usize),
    /// No end marker on this line; the span continues
    NotFound,
    /// The span cannot match at all
    Failed,
}

/// Search for an unescaped `end` marker from `from`.
///
/// An end marker preceded by an odd number of consecutive escape
/// characters is skipped; an even number does not escape it.
pub fn find_span_end(
    text: &str,
    from: usize,
    end: &str,
    escape: Option<char>,
    flags: SpanFlags,
    word_chars: &WordChars,
) -> SpanEnd {
    let mut pos = from;
    loop {
        let Some(offset) = text.get(pos..).and_then(|rest| rest.find(end)) else {
            return if flags.no_line_break { SpanEnd::Failed } else { SpanEnd::NotFound };
        };
        let j = pos + offset;
        if flags.no_word_break && prev_char(text, j).is_some_and(|c| word_chars.contains(c)) {
            return SpanEnd::Failed;
        }
        if flags.no_line_break && text[from..j].contains('\n') {
            return SpanEnd::Failed;
        }
        match escape {
            Some(esc) if !flags.no_escape => {
                let escapes = text[..j].chars().rev().take_while(|c| *c == esc).count();
                if escapes % 2 == 1 {
                    // Step over the escaped character only.
                    pos = j + text[j..].chars().next().map_or(1, char::len_utf8);
                    continue;
                }
                return SpanEnd::Found(j);
            }
            _ => return SpanEnd::Found(j),
        }
    }
}

/// Offset of the first non-blank character at or after `pos`
pub fn skip_ws(text: &str, pos: usize) -> usize {
    let blanks: usize = text[pos..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(char::len_utf8)
        .sum();
    pos + blanks
}

/// Offset just past the identifier starting at `pos`
pub fn skip_id(text: &str, pos: usize) -> usize {
    let id: usize = text[pos..]
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .map(char::len_utf8)
        .sum();
    pos + id
}

/// True if `word` occurs at `pos` and is not followed by an identifier character
pub fn match_word(text: &str, pos: usize, word: &str) -> bool {
    text.get(pos..).is_some_and(|rest| rest.starts_with(word))
        && !text[pos + word.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// The character just before `pos`
pub fn prev_char(text: &str, pos: usize) -> Option<char> {
    text[..pos].chars().next_back()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words() -> WordChars {
        WordChars::alphanumeric()
    }

    #[test]
    fn test_regex_len_at_is_anchored() {
        let regex = compile_regex(r"\d+", false).unwrap();
        assert_eq!(regex_len_at(&regex, "abc 123 def", 4), 3);
        assert_eq!(regex_len_at(&regex, "abc 123 def", 0), 0);
        assert_eq!(regex_len_at(&regex, "abc", 3), 0);
    }

    #[test]
    fn test_span_end_plain() {
        let end = find_span_end("hello\" rest", 0, "\"", None, SpanFlags::default(), &words());
        assert_eq!(end, SpanEnd::Found(5));
    }

    #[test]
    fn test_span_end_escape_parity() {
        // One backslash escapes the first quote; the second quote ends the span.
        let text = r#"abc\"def""#;
        let end = find_span_end(text, 0, "\"", Some('\\'), SpanFlags::default(), &words());
        assert_eq!(end, SpanEnd::Found(8));

        // Two backslashes escape each other, not the quote.
        let text = r#"abc\\"def"#;
        let end = find_span_end(text, 0, "\"", Some('\\'), SpanFlags::default(), &words());
        assert_eq!(end, SpanEnd::Found(5));
    }

    #[test]
    fn test_span_end_no_escape_flag() {
        let flags = SpanFlags { no_escape: true, ..Default::default() };
        let end = find_span_end(r#"a\"b""#, 0, "\"", Some('\\'), flags, &words());
        assert_eq!(end, SpanEnd::Found(2));
    }

    #[test]
    fn test_span_end_not_found_vs_failed() {
        let open = find_span_end("no end here", 0, "*/", None, SpanFlags::default(), &words());
        assert_eq!(open, SpanEnd::NotFound);

        let flags = SpanFlags { no_line_break: true, ..Default::default() };
        let failed = find_span_end("no end here", 0, "*/", None, flags, &words());
        assert_eq!(failed, SpanEnd::Failed);
    }

    #[test]
    fn test_span_end_no_word_break() {
        let flags = SpanFlags { no_word_break: true, ..Default::default() };
        assert_eq!(find_span_end("abc'", 0, "'", None, flags, &words()), SpanEnd::Failed);
        assert_eq!(find_span_end("abc '", 0, "'", None, flags, &words()), SpanEnd::Found(4));
    }

    #[test]
    fn test_anchors() {
        let w = words();
        let line_start = Anchors { at_line_start: true, ..Default::default() };
        assert!(line_start.permits("#x", 0, 1, &w));
        assert!(!line_start.permits(" #x", 1, 1, &w));

        let ws_end = Anchors { at_whitespace_end: true, ..Default::default() };
        assert!(ws_end.permits("   #define", 3, 1, &w));
        assert!(!ws_end.permits("x  #define", 3, 1, &w));

        let word = Anchors { at_word_start: true, ..Default::default() };
        assert!(word.permits("a or b", 2, 2, &w));
        assert!(!word.permits("a orb", 2, 2, &w));
        assert!(!word.permits("xor b", 1, 2, &w));
    }

    #[test]
    fn test_word_scan_and_helpers() {
        let mut w = words();
        w.extend(['_', ' ']);
        assert!(!w.contains(' '));
        assert_eq!(w.scan("foo_bar baz", 0), 7);
        assert_eq!(skip_ws("  \tx", 0), 3);
        assert_eq!(skip_id("rust rest", 0), 4);
        assert!(match_word("@nocolor-node", 0, "@nocolor"));
        assert!(!match_word("@colored", 0, "@color"));
        assert_eq!(prev_char("ab", 1), Some('a'));
        assert_eq!(prev_char("ab", 0), None);
    }

    #[test]
    fn test_invalid_rules_never_match() {
        let spec = RuleSpec::SeqRegexp {
            regexp: "(unclosed".into(),
            tag: "keyword1".into(),
            delegate: None,
            anchors: Anchors::default(),
        };
        assert!(matches!(Rule::compile(spec, false).compiled, CompiledRule::Invalid));

        let spec = RuleSpec::Seq {
            seq: "+".into(),
            tag: "no-such-tag".into(),
            delegate: None,
            anchors: Anchors::default(),
        };
        assert!(matches!(Rule::compile(spec, false).compiled, CompiledRule::Invalid));
    }

    #[test]
    fn test_dispatch_chars() {
        let w = words();
        let seq = Rule::compile(
            RuleSpec::Seq {
                seq: "if".into(),
                tag: "keyword1".into(),
                delegate: None,
                anchors: Anchors::default(),
            },
            true,
        );
        assert_eq!(seq.dispatch_chars(None, &w, true), vec!['i', 'I']);
        assert_eq!(seq.dispatch_chars(None, &w, false), vec!['i']);
        assert_eq!(seq.dispatch_chars(Some("xyx"), &w, false), vec!['x', 'y']);

        let keywords = Rule::compile(RuleSpec::Keywords, false);
        assert_eq!(keywords.dispatch_chars(None, &w, false).len(), 62);
    }

    #[test]
    fn test_rule_entry_from_toml() {
        let entry: RuleEntry = toml::from_str(
            r#"
kind = "span"
begin = '"'
end = '"'
tag = "literal1"
no_line_break = true
at_word_start = true
"#,
        )
        .unwrap();
        assert_eq!(entry.chars, None);
        match entry.spec {
            RuleSpec::Span { flags, anchors, .. } => {
                assert!(flags.no_line_break);
                assert!(!flags.no_escape);
                assert!(anchors.at_word_start);
            }
            other => panic!("unexpected rule {:?}", other),
        }
    }
}
