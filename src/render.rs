//! Terminal output for tagged lines
//!
//! Tags may overlap; when they do the later tag wins, which is how a URL
//! inside a comment ends up styled as a URL.

use std::io::Write;

use crossterm::queue;
use crossterm::style::{Print, PrintStyledContent, ResetColor, StyledContent};

use crate::error::Result;
use crate::syntax::{Span, TagEvent};

/// Flatten a line's events into non-overlapping styled spans.
///
/// Untagged text gets no span.
pub fn line_spans(text: &str, events: &[TagEvent]) -> Vec<Span> {
    let mut bounds: Vec<usize> = events
        .iter()
        .flat_map(|e| [e.start.min(text.len()), e.end.min(text.len())])
        .collect();
    bounds.sort_unstable();
    bounds.dedup();

    let mut spans: Vec<Span> = Vec::new();
    for pair in bounds.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let Some(event) = events.iter().rev().find(|e| e.start <= start && end <= e.end) else {
            continue;
        };
        let style = event.tag.default_style();
        match spans.last_mut() {
            Some(last) if last.end == start && last.style == style => last.end = end,
            _ => spans.push(Span::new(start, end, style)),
        }
    }
    spans
}

/// Write one line with its tags as terminal colors, then a newline
pub fn render_line<W: Write>(out: &mut W, text: &str, events: &[TagEvent]) -> Result<()> {
    let mut pos = 0;
    for span in line_spans(text, events) {
        if pos < span.start {
            queue!(out, Print(&text[pos..span.start]))?;
        }
        let styled = StyledContent::new(span.style.to_content_style(), &text[span.start..span.end]);
        queue!(out, PrintStyledContent(styled))?;
        pos = span.end;
    }
    queue!(out, Print(&text[pos..]), ResetColor, Print("\n"))?;
    Ok(())
}

/// Write one line's events as `line start end tag text` records
pub fn dump_line<W: Write>(out: &mut W, line: usize, text: &str, events: &[TagEvent]) -> Result<()> {
    for event in events {
        writeln!(out, "{}\t{}\t{}\t{}\t{:?}", line + 1, event.start, event.end, event.tag, event.slice(text))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Tag;

    #[test]
    fn test_line_spans_later_tag_wins() {
        let events = [TagEvent::new(0, 10, Tag::Comment1), TagEvent::new(2, 6, Tag::Url)];
        let spans = line_spans("# http://x", &events);
        assert_eq!(spans.len(), 3);
        assert_eq!((spans[0].start, spans[0].end), (0, 2));
        assert_eq!(spans[1].style, Tag::Url.default_style());
        assert_eq!((spans[2].start, spans[2].end), (6, 10));
    }

    #[test]
    fn test_line_spans_skips_untagged() {
        let events = [TagEvent::new(0, 2, Tag::Keyword1), TagEvent::new(5, 7, Tag::Keyword1)];
        let spans = line_spans("fn  x  ", &events);
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[1].start, spans[1].end), (5, 7));
    }

    #[test]
    fn test_render_line_keeps_text() {
        let mut out = Vec::new();
        render_line(&mut out, "fn main", &[TagEvent::new(0, 2, Tag::Keyword1)]).unwrap();
        let rendered = String::from_utf8(out).unwrap();
        assert!(rendered.contains("fn"));
        assert!(rendered.contains(" main"));
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn test_dump_line() {
        let mut out = Vec::new();
        dump_line(&mut out, 0, "fn main", &[TagEvent::new(0, 2, Tag::Keyword1)]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1\t0\t2\tkeyword1\t\"fn\"\n");
    }
}
