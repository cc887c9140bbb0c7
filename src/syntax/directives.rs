//! Built-in directive matchers
//!
//! Every mode gets the same set of language independent matchers for
//! Leo's `@` directives, section references and URLs. They are placed in
//! the dispatch table by [`install`] and run through [`LineRun`] like any
//! other matcher.

use super::driver::{LineRun, URL_REGEX};
use super::matchers::{MatchResult, RestartOutcome};
use super::mode::Mode;
use super::rules::{match_word, regex_len_at, skip_id, skip_ws};
use super::state::Restart;
use super::tokens::Tag;

/// Directive words tagged as `leokeyword` wherever they start a line's text
pub const LEO_DIRECTIVES: &[&str] = &[
    "all", "beautify", "c", "code", "color", "colorcache", "comment", "delims", "doc",
    "encoding", "end_raw", "first", "header", "ignore", "killbeautify", "killcolor",
    "language", "last", "lineending", "markup", "nobeautify", "nocolor", "nocolor-node",
    "noheader", "nopyflakes", "nosearch", "nowrap", "others", "pagewidth", "path", "quiet",
    "raw", "root", "root-code", "root-doc", "silent", "tabwidth", "terse", "unit",
    "verbose", "wrap",
];

/// Initial letters of the recognised URL schemes
const URL_CHARS: &[char] = &['f', 'g', 'h', 'm', 'n', 'p', 't', 'w'];

/// A built-in matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    /// `@doc` or a bare `@` opening a documentation part
    DocPart,
    /// `@wrap`
    Wrap,
    /// `@nocolor-node`
    NoColorNode,
    /// `@nocolor`
    NoColor,
    /// `@language <name>`
    Language,
    /// `@killcolor`
    KillColor,
    /// `@color`
    Color,
    /// Any other `@word` directive
    LeoKeywords,
    /// `<<name>>`
    SectionRef,
    /// URLs
    Url,
}

/// Put the built-in matchers into a mode's dispatch table.
///
/// `@` directives go in front of the mode's own `@` rules, in the order
/// they are tried; section references go first for `<`; URL matchers go
/// behind everything the mode declares.
pub fn install(mode: &mut Mode, highlight_urls: bool) {
    const AT_FIRST_TO_LAST: [Directive; 8] = [
        Directive::DocPart,
        Directive::Wrap,
        Directive::NoColorNode,
        Directive::NoColor,
        Directive::Language,
        Directive::KillColor,
        Directive::Color,
        Directive::LeoKeywords,
    ];
    for directive in AT_FIRST_TO_LAST.into_iter().rev() {
        mode.prepend_directive('@', directive);
    }
    mode.prepend_directive('<', Directive::SectionRef);
    if highlight_urls {
        for c in URL_CHARS {
            mode.append_directive(*c, Directive::Url);
        }
    }
}

impl LineRun<'_> {
    /// True where line-start directives may match
    fn at_line_start(&self, i: usize) -> bool {
        i == 0 && self.depth == 0
    }

    pub(super) fn match_directive(&mut self, mode: &Mode, directive: Directive, i: usize) -> MatchResult {
        let text = self.text;
        match directive {
            Directive::DocPart => self.match_doc_part(i),
            Directive::Wrap => {
                if !self.at_line_start(i) || !match_word(text, 0, "@wrap") {
                    return MatchResult::NoMatch;
                }
                let k = skip_ws(text, "@wrap".len());
                self.color_range(0, k, Tag::LeoKeyword, None, false);
                MatchResult::Matched(k)
            }
            Directive::NoColorNode => {
                if !self.at_line_start(i) || !match_word(text, 0, "@nocolor-node") {
                    return MatchResult::NoMatch;
                }
                self.set_restart(Restart::NoColorNode);
                MatchResult::Continues
            }
            Directive::NoColor => {
                if !self.at_line_start(i) || text.starts_with("@nocolor-") || !match_word(text, 0, "@nocolor") {
                    return MatchResult::NoMatch;
                }
                self.set_restart(Restart::NoColor);
                MatchResult::Continues
            }
            Directive::Language => {
                if !self.at_line_start(i) || !match_word(text, 0, "@language") {
                    return MatchResult::NoMatch;
                }
                MatchResult::Matched(self.match_at_language())
            }
            Directive::KillColor => {
                if !self.at_line_start(i) || !match_word(text, 0, "@killcolor") {
                    return MatchResult::NoMatch;
                }
                self.set_restart(Restart::KillColor);
                MatchResult::Continues
            }
            Directive::Color => {
                if !self.at_line_start(i) || !match_word(text, 0, "@color") {
                    return MatchResult::NoMatch;
                }
                self.set_restart(Restart::Color);
                self.color_range(0, "@color".len(), Tag::LeoKeyword, None, false);
                MatchResult::Matched("@color".len())
            }
            Directive::LeoKeywords => self.match_leo_keywords(mode, i),
            Directive::SectionRef => self.match_section_ref(i),
            Directive::Url => match regex_len_at(&URL_REGEX, text, i) {
                0 => MatchResult::NoMatch,
                n => {
                    self.color_range(i, i + n, Tag::Url, None, false);
                    MatchResult::Matched(n)
                }
            },
        }
    }

    /// `@language <name>` at the start of the line; returns the bytes consumed
    fn match_at_language(&mut self) -> usize {
        let text = self.text;
        let keyword = "@language".len();
        let j = skip_ws(text, keyword);
        let k = skip_id(text, j);
        self.color_range(0, keyword, Tag::LeoKeyword, None, false);
        self.switch_language(&text[j..k]);
        k
    }

    fn match_doc_part(&mut self, i: usize) -> MatchResult {
        let text = self.text;
        if !self.at_line_start(i) {
            return MatchResult::NoMatch;
        }
        let j = if match_word(text, 0, "@doc") {
            "@doc".len()
        } else if text.starts_with('@') && text[1..].chars().next().map_or(true, |c| c == ' ' || c == '\t') {
            1
        } else {
            return MatchResult::NoMatch;
        };
        self.color_range(0, j, Tag::LeoKeyword, None, false);
        self.color_range(j, text.len(), Tag::DocPart, None, false);
        self.set_restart(Restart::DocPart);
        MatchResult::Continues
    }

    /// An `@word` preceded by nothing but blanks and followed by a blank or the end
    fn match_leo_keywords(&mut self, mode: &Mode, i: usize) -> MatchResult {
        let text = self.text;
        if !text[..i].chars().all(|c| c == ' ' || c == '\t') {
            return MatchResult::NoMatch;
        }
        let word_start = i + 1;
        let word_len: usize = text[word_start..]
            .chars()
            .take_while(|c| mode.word_chars().contains(*c) || *c == '-')
            .map(char::len_utf8)
            .sum();
        let j = word_start + word_len;
        if text[j..].chars().next().is_some_and(|c| c != ' ' && c != '\t') {
            return MatchResult::NoMatch;
        }
        // The blank after the word is consumed too.
        let through_blank = (j - i + 1).min(text.len() - i);
        let word = &text[word_start..j];
        if LEO_DIRECTIVES.contains(&word) {
            self.color_range(i, j, Tag::LeoKeyword, None, false);
            MatchResult::Matched(through_blank)
        } else if let Some(tag) = mode.keyword(&text[i..j]) {
            self.color_range(i, j, tag, None, false);
            MatchResult::Matched(j - i)
        } else {
            MatchResult::Skip(through_blank)
        }
    }

    fn match_section_ref(&mut self, i: usize) -> MatchResult {
        let text = self.text;
        if !text[i..].starts_with("<<") {
            return MatchResult::NoMatch;
        }
        let Some(offset) = text[i + 2..].find(">>") else {
            return MatchResult::NoMatch;
        };
        let k = i + 2 + offset;
        self.color_range(i, i + 2, Tag::NameBrackets, None, false);
        self.color_range(i + 2, k, Tag::Name, None, false);
        self.color_range(k, k + 2, Tag::NameBrackets, None, false);
        MatchResult::Matched(k + 2 - i)
    }

    /// Inside a doc part: stop at `@c`, `@code` or `@language`
    pub(super) fn restart_doc_part(&mut self) -> RestartOutcome {
        let text = self.text;
        if match_word(text, 0, "@language") {
            return RestartOutcome::Resume(self.match_at_language());
        }
        for word in ["@c", "@code"] {
            if match_word(text, 0, word) {
                self.color_range(0, word.len(), Tag::LeoKeyword, None, false);
                self.clear_state();
                return RestartOutcome::Resume(word.len());
            }
        }
        self.set_restart(Restart::DocPart);
        self.color_range(0, text.len(), Tag::DocPart, None, false);
        RestartOutcome::Continues
    }

    /// After `@color`: keep coloring until a directive turns it off
    pub(super) fn restart_color(&mut self) -> RestartOutcome {
        let text = self.text;
        if match_word(text, 0, "@killcolor") {
            self.set_restart(Restart::KillColor);
            RestartOutcome::Continues
        } else if match_word(text, 0, "@nocolor-node") {
            self.set_restart(Restart::NoColorNode);
            RestartOutcome::Continues
        } else if match_word(text, 0, "@nocolor") {
            self.set_restart(Restart::NoColor);
            RestartOutcome::Continues
        } else {
            self.set_restart(Restart::Color);
            RestartOutcome::Resume(0)
        }
    }

    /// After `@nocolor`: swallow lines until one starts with `@color`
    pub(super) fn restart_no_color(&mut self) -> RestartOutcome {
        let text = self.text;
        if match_word(text, 0, "@color") {
            self.set_restart(Restart::Color);
            self.color_range(0, "@color".len(), Tag::LeoKeyword, None, false);
            RestartOutcome::Resume("@color".len())
        } else {
            self.set_restart(Restart::NoColor);
            RestartOutcome::Continues
        }
    }
}
