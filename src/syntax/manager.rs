//! Per-document colorizing cache
//!
//! A [`DocumentColorizer`] keeps the end state and tags of every line it
//! has seen, so that after an edit only the lines whose starting state
//! actually changed are run again.

use tracing::debug;

use super::driver::{Colorizer, ColorizerOptions};
use super::library::ModeLibrary;
use super::sink::{ActiveLanguage, LanguageResolver, TagEvent};
use super::state::StateId;

use crate::error::Result;

/// Cached result of one line
#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedLine {
    state: StateId,
    events: Vec<TagEvent>,
}

/// Incremental colorizing of one document
#[derive(Debug)]
pub struct DocumentColorizer {
    colorizer: Colorizer,
    /// Language and enabled flag the cache was built under
    active: Option<ActiveLanguage>,
    first_state: StateId,
    lines: Vec<CachedLine>,
    /// Edited lines, as an inclusive range, not yet recomputed
    dirty: Option<(usize, usize)>,
}

impl DocumentColorizer {
    pub fn new(library: ModeLibrary, options: ColorizerOptions) -> Self {
        Self {
            colorizer: Colorizer::new(library, options),
            active: None,
            first_state: StateId::NONE,
            lines: Vec::new(),
            dirty: None,
        }
    }

    pub fn colorizer(&self) -> &Colorizer {
        &self.colorizer
    }

    /// The language the cache was last built under
    pub fn active_language(&self) -> Option<&ActiveLanguage> {
        self.active.as_ref()
    }

    /// Ask `resolver` for the document's language.
    ///
    /// Returns true if the language or its enabled flag changed, in which
    /// case the session was reset and every cached line dropped.
    pub fn refresh(&mut self, resolver: &dyn LanguageResolver) -> bool {
        let wanted = resolver.language_at(0);
        if self.active.as_ref() == Some(&wanted) {
            return false;
        }
        self.colorizer.reset_language(&wanted.name);
        self.first_state = self.colorizer.initial_state(wanted.enabled);
        debug!(target: "linetag::driver", language = %wanted.name, enabled = wanted.enabled, "Document reset");
        self.active = Some(wanted);
        self.invalidate_all();
        true
    }

    /// Mark a line whose text changed
    pub fn edit_line(&mut self, line: usize) {
        self.dirty = Some(match self.dirty {
            Some((from, through)) => (from.min(line), through.max(line)),
            None => (line, line),
        });
    }

    /// Drop the cache from `line` onwards, e.g. after lines were inserted or removed
    pub fn invalidate_from(&mut self, line: usize) {
        self.lines.truncate(line);
    }

    pub fn invalidate_all(&mut self) {
        self.lines.clear();
        self.dirty = None;
    }

    /// Bring the cache up to date with `lines`; returns how many lines were run.
    ///
    /// Work starts at the first edited or uncached line and stops as soon as
    /// an unedited line ends in the same state it ended in before.
    pub fn highlight<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<usize> {
        self.lines.truncate(lines.len());
        let (start, edited_through) = match self.dirty.take() {
            Some((from, through)) => (from.min(self.lines.len()), through),
            None => (self.lines.len(), 0),
        };

        let mut state = self.state_before(start);
        let mut recomputed = 0;
        let mut i = start;
        while i < lines.len() {
            let result = self.colorizer.process_line(state, lines[i].as_ref())?;
            recomputed += 1;
            state = result.state;
            let previous = self.lines.get(i).map(|cached| cached.state);
            let entry = CachedLine {
                state: result.state,
                events: result.events,
            };
            if i < self.lines.len() {
                self.lines[i] = entry;
            } else {
                self.lines.push(entry);
            }

            if result.switch.is_some() {
                // Later lines were colored in the old language.
                self.lines.truncate(i + 1);
            } else if i >= edited_through && previous == Some(state) && self.lines.len() > i + 1 {
                i = self.lines.len();
                state = self.state_before(i);
                continue;
            }
            i += 1;
        }
        debug!(target: "linetag::driver", start, recomputed, total = lines.len(), "Document highlighted");
        Ok(recomputed)
    }

    fn state_before(&self, line: usize) -> StateId {
        match line.checked_sub(1) {
            Some(prev) => self.lines[prev].state,
            None => self.first_state,
        }
    }

    /// Cached tags of a line
    pub fn events(&self, line: usize) -> Option<&[TagEvent]> {
        self.lines.get(line).map(|cached| cached.events.as_slice())
    }

    /// Cached end state of a line
    pub fn state_after(&self, line: usize) -> Option<StateId> {
        self.lines.get(line).map(|cached| cached.state)
    }

    /// Number of cached lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::sink::FixedLanguage;
    use crate::syntax::tokens::Tag;

    fn document(language: &str) -> DocumentColorizer {
        let mut doc = DocumentColorizer::new(ModeLibrary::builtin(), ColorizerOptions::default());
        assert!(doc.refresh(&FixedLanguage::new(language)));
        doc
    }

    #[test]
    fn test_highlight_caches_lines() {
        let mut doc = document("python");
        let lines = ["import os", "x = 1"];
        assert_eq!(doc.highlight(&lines).unwrap(), 2);
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.events(0), Some(&[TagEvent::new(0, 6, Tag::Keyword1)][..]));
        // Nothing changed, nothing to do.
        assert_eq!(doc.highlight(&lines).unwrap(), 0);
    }

    #[test]
    fn test_edit_stops_early() {
        let mut doc = document("python");
        let mut lines = vec!["x = 1", "y = 2", "z = 3"];
        doc.highlight(&lines).unwrap();
        lines[0] = "x = 4";
        doc.edit_line(0);
        assert_eq!(doc.highlight(&lines).unwrap(), 1);
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn test_edit_that_opens_string_reruns_following_lines() {
        let mut doc = document("python");
        let mut lines = vec!["x = 1", "y = 2", "z = 3"];
        doc.highlight(&lines).unwrap();
        lines[0] = "x = '''";
        doc.edit_line(0);
        assert_eq!(doc.highlight(&lines).unwrap(), 3);
        assert_eq!(doc.events(2), Some(&[TagEvent::new(0, 5, Tag::Literal2)][..]));
        assert_eq!(doc.state_after(2), doc.state_after(0));
    }

    #[test]
    fn test_edited_range_is_fully_rerun() {
        let mut doc = document("python");
        let lines = vec!["a", "b", "c", "d"];
        doc.highlight(&lines).unwrap();
        doc.edit_line(2);
        doc.edit_line(0);
        assert_eq!(doc.highlight(&lines).unwrap(), 3);
    }

    #[test]
    fn test_language_switch_invalidates_following_lines() {
        let mut doc = document("python");
        let mut lines = vec!["@language rust", "fn x", "fn y"];
        doc.highlight(&lines).unwrap();
        assert_eq!(doc.events(1), Some(&[TagEvent::new(0, 2, Tag::Keyword1)][..]));

        lines[0] = "@language python";
        doc.edit_line(0);
        assert_eq!(doc.highlight(&lines).unwrap(), 3);
        assert_eq!(doc.events(1), Some(&[][..]));
    }

    #[test]
    fn test_refresh_resets_on_change_only() {
        let mut doc = document("python");
        doc.highlight(&["import os"]).unwrap();
        assert!(!doc.refresh(&FixedLanguage::new("python")));
        assert_eq!(doc.len(), 1);

        assert!(doc.refresh(&FixedLanguage::disabled("python")));
        assert!(doc.is_empty());
        doc.highlight(&["import os"]).unwrap();
        assert_eq!(doc.events(0), Some(&[][..]));
        assert_eq!(doc.active_language().map(|a| a.enabled), Some(false));
    }

    #[test]
    fn test_shorter_document_truncates_cache() {
        let mut doc = document("rust");
        doc.highlight(&["fn a", "fn b", "fn c"]).unwrap();
        doc.highlight(&["fn a"]).unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.events(1), None);
    }

    #[test]
    fn test_invalidate_from_recomputes_tail() {
        let mut doc = document("rust");
        let lines = ["fn a", "fn b", "fn c"];
        doc.highlight(&lines).unwrap();
        doc.invalidate_from(1);
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.highlight(&lines).unwrap(), 2);
    }
}
