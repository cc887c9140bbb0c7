//! Interfaces to the colorizer's collaborators
//!
//! The engine hands tagged ranges to a [`TagSink`] and learns which
//! language a document starts in from a [`LanguageResolver`]. Neither
//! collaborator is consulted for anything else.

use super::tokens::Tag;

/// One tagged range of a line, in byte offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagEvent {
    pub start: usize,
    pub end: usize,
    pub tag: Tag,
}

impl TagEvent {
    pub fn new(start: usize, end: usize, tag: Tag) -> Self {
        Self { start, end, tag }
    }

    /// The tagged slice of `text`
    pub fn slice<'t>(&self, text: &'t str) -> &'t str {
        &text[self.start..self.end]
    }
}

/// Receiver of tagged ranges.
///
/// Ranges may overlap: the URL sweep re-tags parts of ranges that were
/// already tagged.
pub trait TagSink {
    fn tag(&mut self, text: &str, start: usize, end: usize, tag: Tag);
}

impl TagSink for Vec<TagEvent> {
    fn tag(&mut self, _text: &str, start: usize, end: usize, tag: Tag) {
        self.push(TagEvent::new(start, end, tag));
    }
}

/// The language governing a document and whether coloring is on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveLanguage {
    pub name: String,
    pub enabled: bool,
}

impl ActiveLanguage {
    pub fn new(name: &str, enabled: bool) -> Self {
        Self {
            name: name.to_string(),
            enabled,
        }
    }
}

/// Decides which language is active at a line of a document
pub trait LanguageResolver {
    fn language_at(&self, line: usize) -> ActiveLanguage;
}

/// A resolver that answers the same for every line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedLanguage(pub ActiveLanguage);

impl FixedLanguage {
    pub fn new(name: &str) -> Self {
        Self(ActiveLanguage::new(name, true))
    }

    /// The same language with coloring disabled
    pub fn disabled(name: &str) -> Self {
        Self(ActiveLanguage::new(name, false))
    }
}

impl LanguageResolver for FixedLanguage {
    fn language_at(&self, _line: usize) -> ActiveLanguage {
        self.0.clone()
    }
}
