//! Modes: the rule set for one language or delegate
//!
//! A mode file is a declarative TOML bundle holding one or more rulesets.
//! Compiling a ruleset yields a [`Mode`], which is immutable once the
//! registry has finished importing and installing directive matchers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use super::directives::Directive;
use super::registry::RulesetId;
use super::rules::{compile_regex, regex_len_at, CompiledRule, Rule, RuleEntry, WordChars};
use super::tokens::Tag;

/// Languages whose keyword alphabet also contains the apostrophe
const APOSTROPHE_WORD_LANGUAGES: &[&str] = &["haskell"];

/// A parsed mode file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModeFile {
    /// Language name; defaults to the file stem when loaded from disk
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    /// Rulesets keyed by name; `main` is the language's own ruleset
    #[serde(default)]
    pub rulesets: BTreeMap<String, RulesetSpec>,
}

/// Mode-wide properties
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Properties {
    pub line_comment: Option<String>,
    pub comment_start: Option<String>,
    pub comment_end: Option<String>,
    /// Mode that replaces this one as soon as it is loaded
    pub initial_delegate: Option<String>,
}

/// One ruleset of a mode file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RulesetSpec {
    /// Other rulesets whose rules are merged into this one
    pub imports: Vec<String>,
    pub attributes: Attributes,
    /// Keywords grouped by tag name
    pub keywords: BTreeMap<String, Vec<String>>,
    pub rules: Vec<RuleEntry>,
}

/// Ruleset attributes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Attributes {
    /// Tag for text no rule claims inside a delegated range
    pub default: Option<String>,
    pub escape: String,
    pub digit_re: String,
    pub highlight_digits: bool,
    pub ignore_case: bool,
    /// Extra characters that do not separate words
    pub no_word_sep: String,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            default: None,
            escape: String::new(),
            digit_re: String::new(),
            highlight_digits: true,
            ignore_case: true,
            no_word_sep: String::new(),
        }
    }
}

/// Comment delimiters declared by a mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentDelims {
    pub line: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl CommentDelims {
    pub fn from_properties(properties: &Properties) -> Self {
        Self {
            line: properties.line_comment.clone(),
            start: properties.comment_start.clone(),
            end: properties.comment_end.clone(),
        }
    }

    /// Space separated form: line comment, then block start and end.
    ///
    /// Returns `None` when the mode declares no usable delimiters.
    pub fn to_delims_string(&self) -> Option<String> {
        match (&self.line, &self.start, &self.end) {
            (Some(line), Some(start), Some(end)) => Some(format!("{} {} {}", line, start, end)),
            (_, Some(start), Some(end)) => Some(format!("{} {}", start, end)),
            (Some(line), _, _) => Some(line.clone()),
            _ => None,
        }
    }
}

/// An entry in a mode's dispatch table
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Built-in, language independent matcher
    Directive(Directive),
    /// Matcher described by the mode file
    Rule(Rule),
}

/// A compiled ruleset
#[derive(Debug)]
pub struct Mode {
    /// Language the ruleset belongs to
    pub language: String,
    pub ruleset: RulesetId,
    /// Declared default tag, used for unclaimed text in delegated ranges
    pub default_tag: Option<Tag>,
    pub escape: Option<char>,
    pub highlight_digits: bool,
    digit_re: Option<Regex>,
    pub ignore_case: bool,
    keywords: HashMap<String, Tag>,
    word_chars: WordChars,
    keyword_chars: WordChars,
    rules: HashMap<char, Vec<Arc<Matcher>>>,
    pub delims: CommentDelims,
    unknown: bool,
}

impl Mode {
    /// The sentinel mode cached for rulesets that cannot be loaded
    pub fn unknown(ruleset: RulesetId) -> Self {
        Self {
            language: "unknown-language".to_string(),
            ruleset,
            default_tag: None,
            escape: None,
            highlight_digits: false,
            digit_re: None,
            ignore_case: false,
            keywords: HashMap::new(),
            word_chars: WordChars::alphanumeric(),
            keyword_chars: WordChars::alphanumeric(),
            rules: HashMap::new(),
            delims: CommentDelims::default(),
            unknown: true,
        }
    }

    /// Compile one ruleset, without imports or directive matchers
    pub fn compile(
        language: &str,
        ruleset: RulesetId,
        properties: &Properties,
        spec: &RulesetSpec,
    ) -> Self {
        let attributes = &spec.attributes;
        let ignore_case = attributes.ignore_case;

        let mut keywords = HashMap::new();
        for (tag_name, words) in &spec.keywords {
            let Some(tag) = Tag::from_name(tag_name) else {
                warn!(target: "linetag::rules", %ruleset, tag = %tag_name, "Unknown keyword tag");
                continue;
            };
            for word in words {
                let word = if ignore_case { word.to_lowercase() } else { word.clone() };
                keywords.insert(word, tag);
            }
        }

        let mut word_chars = WordChars::alphanumeric();
        word_chars.extend(keywords.keys().flat_map(|k| k.chars()));
        word_chars.extend(attributes.no_word_sep.chars());
        let mut keyword_chars = word_chars.clone();
        if APOSTROPHE_WORD_LANGUAGES.contains(&language) {
            keyword_chars.extend(['\'']);
        }

        let default_tag = attributes.default.as_deref().and_then(|name| {
            let tag = Tag::from_name(name);
            if tag.is_none() {
                warn!(target: "linetag::rules", %ruleset, tag = %name, "Unknown default tag");
            }
            tag
        });

        let digit_re = if attributes.digit_re.is_empty() {
            None
        } else {
            compile_regex(&attributes.digit_re, ignore_case)
                .map_err(|reason| warn!(target: "linetag::rules", %ruleset, %reason, "Digit regex disabled"))
                .ok()
        };

        let mut mode = Self {
            language: language.to_string(),
            ruleset,
            default_tag,
            escape: attributes.escape.chars().next(),
            highlight_digits: attributes.highlight_digits,
            digit_re,
            ignore_case,
            keywords,
            word_chars,
            keyword_chars,
            rules: HashMap::new(),
            delims: CommentDelims::from_properties(properties),
            unknown: false,
        };

        for entry in &spec.rules {
            let rule = Rule::compile(entry.spec.clone(), ignore_case);
            let chars = rule.dispatch_chars(entry.chars.as_deref(), &mode.keyword_chars, ignore_case);
            let matcher = Arc::new(Matcher::Rule(rule));
            for c in chars {
                mode.rules.entry(c).or_default().push(Arc::clone(&matcher));
            }
        }
        mode
    }

    /// True for the sentinel mode
    pub fn is_unknown(&self) -> bool {
        self.unknown
    }

    /// Matchers to try, in order, for a leading character
    pub fn rules_for(&self, c: char) -> &[Arc<Matcher>] {
        self.rules.get(&c).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Characters that form words in this mode
    pub fn word_chars(&self) -> &WordChars {
        &self.word_chars
    }

    /// Characters scanned by the keyword matcher
    pub fn keyword_chars(&self) -> &WordChars {
        &self.keyword_chars
    }

    /// Look up a keyword, folding case if the mode ignores it
    pub fn keyword(&self, word: &str) -> Option<Tag> {
        if self.ignore_case {
            self.keywords.get(&word.to_lowercase()).copied()
        } else {
            self.keywords.get(word).copied()
        }
    }

    /// True if `word` should be tagged as a number
    pub fn is_digit_word(&self, word: &str) -> bool {
        if !self.highlight_digits || word.is_empty() {
            return false;
        }
        match &self.digit_re {
            Some(regex) => regex_len_at(regex, word, 0) == word.len(),
            None => word.starts_with(|c: char| c.is_ascii_digit()),
        }
    }

    /// Merge another ruleset's rules, skipping ones already present.
    ///
    /// Directive matchers are never imported; the registry installs them
    /// once on the importing mode.
    pub fn merge_rules_from(&mut self, other: &Mode) {
        for (c, imported) in &other.rules {
            let list = self.rules.entry(*c).or_default();
            for matcher in imported {
                if matches!(**matcher, Matcher::Directive(_)) {
                    continue;
                }
                if !list.iter().any(|existing| existing == matcher) {
                    list.push(Arc::clone(matcher));
                }
            }
        }
    }

    /// Put a directive in front of the matchers for `c`, unless present
    pub fn prepend_directive(&mut self, c: char, directive: Directive) {
        let matcher = Matcher::Directive(directive);
        let list = self.rules.entry(c).or_default();
        if !list.iter().any(|existing| **existing == matcher) {
            list.insert(0, Arc::new(matcher));
        }
    }

    /// Put a directive behind the matchers for `c`, unless present.
    ///
    /// A keyword lookup stays last: its failure skips the whole word, so
    /// nothing placed after it could match inside that word.
    pub fn append_directive(&mut self, c: char, directive: Directive) {
        let matcher = Matcher::Directive(directive);
        let list = self.rules.entry(c).or_default();
        if list.iter().any(|existing| **existing == matcher) {
            return;
        }
        let at = list
            .iter()
            .position(|m| matches!(&**m, Matcher::Rule(rule) if matches!(rule.compiled, CompiledRule::Keywords)))
            .unwrap_or(list.len());
        list.insert(at, Arc::new(matcher));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r##"
language = "demo"

[properties]
line_comment = "#"

[rulesets.main.attributes]
ignore_case = false
escape = "\\"
no_word_sep = "_"

[rulesets.main.keywords]
keyword1 = ["import", "@decorator"]
keyword2 = ["self"]

[[rulesets.main.rules]]
kind = "span"
begin = '"'
end = '"'
tag = "literal1"

[[rulesets.main.rules]]
kind = "keywords"

[[rulesets.main.rules]]
kind = "seq_regexp"
regexp = "[0-9]+"
tag = "digit"
"##;

    fn demo() -> Mode {
        let file: ModeFile = toml::from_str(SOURCE).unwrap();
        let spec = &file.rulesets["main"];
        Mode::compile("demo", RulesetId::new("demo_main"), &file.properties, spec)
    }

    #[test]
    fn test_compile_attributes_and_keywords() {
        let mode = demo();
        assert_eq!(mode.escape, Some('\\'));
        assert!(!mode.ignore_case);
        assert_eq!(mode.default_tag, None);
        assert_eq!(mode.keyword("import"), Some(Tag::Keyword1));
        assert_eq!(mode.keyword("Import"), None);
        assert_eq!(mode.keyword("self"), Some(Tag::Keyword2));
        assert_eq!(mode.delims.to_delims_string().as_deref(), Some("#"));
    }

    #[test]
    fn test_word_chars_include_keyword_chars() {
        let mode = demo();
        assert!(mode.word_chars().contains('@'));
        assert!(mode.word_chars().contains('_'));
        assert!(!mode.word_chars().contains('-'));
        assert!(!mode.keyword_chars().contains('\''));
    }

    #[test]
    fn test_dispatch_table() {
        let mode = demo();
        assert_eq!(mode.rules_for('"').len(), 1);
        // Keywords dispatch on every word character.
        assert_eq!(mode.rules_for('x').len(), 1);
        // The regex rule has no dispatch characters and is never reachable.
        assert!(mode.rules_for('1').iter().all(|m| matches!(
            &**m,
            Matcher::Rule(rule) if matches!(rule.compiled, CompiledRule::Keywords)
        )));
    }

    #[test]
    fn test_ignore_case_keywords() {
        let file: ModeFile = toml::from_str(
            r#"
[rulesets.main.keywords]
keyword1 = ["SELECT"]
"#,
        )
        .unwrap();
        let mode = Mode::compile("sql", RulesetId::new("sql_main"), &file.properties, &file.rulesets["main"]);
        assert!(mode.ignore_case);
        assert_eq!(mode.keyword("select"), Some(Tag::Keyword1));
        assert_eq!(mode.keyword("SeLeCt"), Some(Tag::Keyword1));
    }

    #[test]
    fn test_apostrophe_language() {
        let spec = RulesetSpec::default();
        let mode = Mode::compile("haskell", RulesetId::new("haskell_main"), &Properties::default(), &spec);
        assert!(mode.keyword_chars().contains('\''));
        assert!(!mode.word_chars().contains('\''));
    }

    #[test]
    fn test_digit_words() {
        let mode = demo();
        assert!(mode.is_digit_word("42"));
        assert!(!mode.is_digit_word("x42"));

        let mut spec = RulesetSpec::default();
        spec.attributes.digit_re = "0x[0-9a-f]+".to_string();
        let hex = Mode::compile("hex", RulesetId::new("hex_main"), &Properties::default(), &spec);
        assert!(hex.is_digit_word("0xff"));
        assert!(!hex.is_digit_word("42"));
    }

    #[test]
    fn test_merge_skips_duplicates() {
        let mut mode = demo();
        let copy = demo();
        mode.merge_rules_from(&copy);
        assert_eq!(mode.rules_for('"').len(), 1);
        assert_eq!(mode.rules_for('x').len(), 1);
    }

    #[test]
    fn test_directive_placement() {
        let mut mode = demo();
        mode.prepend_directive('"', Directive::SectionRef);
        mode.prepend_directive('"', Directive::SectionRef);
        mode.append_directive('"', Directive::Url);
        let list = mode.rules_for('"');
        assert_eq!(list.len(), 3);
        assert_eq!(*list[0], Matcher::Directive(Directive::SectionRef));
        assert_eq!(*list[2], Matcher::Directive(Directive::Url));

        // Appended directives still run before the keyword lookup.
        mode.append_directive('h', Directive::Url);
        let list = mode.rules_for('h');
        assert_eq!(list.len(), 2);
        assert_eq!(*list[0], Matcher::Directive(Directive::Url));
    }

    #[test]
    fn test_unknown_mode_is_empty() {
        let mode = Mode::unknown(RulesetId::new("nope_main"));
        assert!(mode.is_unknown());
        assert!(mode.rules_for('a').is_empty());
        assert_eq!(mode.keyword("if"), None);
    }
}
