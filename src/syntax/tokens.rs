//! Tags for lexical highlighting
//!
//! This module defines the symbolic categories attached to ranges of a
//! line and their default visual styles. Tags never carry colors
//! themselves; the renderer maps them through [`Tag::default_style`].

use super::style::{Color, Style};

/// Symbolic tag attached to a half-open range of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    /// Comments, four flavours
    Comment1,
    Comment2,
    Comment3,
    Comment4,
    /// Function names
    Function,
    /// Keywords, five flavours
    Keyword1,
    Keyword2,
    Keyword3,
    Keyword4,
    Keyword5,
    /// Labels
    Label,
    /// Literals (strings, characters), four flavours
    Literal1,
    Literal2,
    Literal3,
    Literal4,
    /// Markup (headings, emphasis)
    Markup,
    /// Operators
    Operator,
    /// Numbers recognised through `highlight_digits`
    Digit,
    /// Leo directives such as `@language`
    LeoKeyword,
    /// Body of an `@doc` part
    DocPart,
    /// Defined section name; only emitted by mode files that name it
    Link,
    /// Section name inside `<< >>`
    Name,
    /// The `<<` and `>>` brackets of a section reference
    NameBrackets,
    /// URLs
    Url,
    /// Visible blanks; only emitted by mode files that name it
    Blank,
    /// Visible tabs; only emitted by mode files that name it
    Tab,
    /// Plain text, never emitted
    Null,
}

impl Tag {
    /// All tags, in declaration order
    pub const ALL: [Tag; 27] = [
        Tag::Comment1,
        Tag::Comment2,
        Tag::Comment3,
        Tag::Comment4,
        Tag::Function,
        Tag::Keyword1,
        Tag::Keyword2,
        Tag::Keyword3,
        Tag::Keyword4,
        Tag::Keyword5,
        Tag::Label,
        Tag::Literal1,
        Tag::Literal2,
        Tag::Literal3,
        Tag::Literal4,
        Tag::Markup,
        Tag::Operator,
        Tag::Digit,
        Tag::LeoKeyword,
        Tag::DocPart,
        Tag::Link,
        Tag::Name,
        Tag::NameBrackets,
        Tag::Url,
        Tag::Blank,
        Tag::Tab,
        Tag::Null,
    ];

    /// Get the default style for this tag
    pub fn default_style(&self) -> Style {
        match self {
            Tag::Comment1 | Tag::Comment2 => Style::fg(Color::Red).with_italic(),
            Tag::Comment3 | Tag::Comment4 => Style::fg(Color::BrightRed).with_italic(),
            Tag::Function => Style::fg(Color::BrightBlue),
            Tag::Keyword1 => Style::fg(Color::Blue).with_bold(),
            Tag::Keyword2 => Style::fg(Color::Blue),
            Tag::Keyword3 | Tag::Keyword4 | Tag::Keyword5 => Style::fg(Color::Cyan),
            Tag::Label => Style::fg(Color::Yellow).with_underline(),
            Tag::Literal1 | Tag::Literal2 => Style::fg(Color::Green),
            Tag::Literal3 | Tag::Literal4 => Style::fg(Color::BrightGreen),
            Tag::Markup => Style::fg(Color::Red).with_bold(),
            Tag::Operator => Style::fg(Color::BrightWhite),
            Tag::Digit => Style::fg(Color::Cyan),
            Tag::LeoKeyword => Style::fg(Color::Blue).with_bold(),
            Tag::DocPart => Style::fg(Color::Red),
            Tag::Link => Style::fg(Color::Red).with_underline(),
            Tag::Name => Style::fg(Color::Red),
            Tag::NameBrackets => Style::fg(Color::Blue),
            Tag::Url => Style::fg(Color::Magenta).with_underline(),
            Tag::Blank | Tag::Tab => Style::bg(Color::BrightBlack),
            Tag::Null => Style::default(),
        }
    }

    /// Get the tag name used in mode files
    pub fn name(&self) -> &'static str {
        match self {
            Tag::Comment1 => "comment1",
            Tag::Comment2 => "comment2",
            Tag::Comment3 => "comment3",
            Tag::Comment4 => "comment4",
            Tag::Function => "function",
            Tag::Keyword1 => "keyword1",
            Tag::Keyword2 => "keyword2",
            Tag::Keyword3 => "keyword3",
            Tag::Keyword4 => "keyword4",
            Tag::Keyword5 => "keyword5",
            Tag::Label => "label",
            Tag::Literal1 => "literal1",
            Tag::Literal2 => "literal2",
            Tag::Literal3 => "literal3",
            Tag::Literal4 => "literal4",
            Tag::Markup => "markup",
            Tag::Operator => "operator",
            Tag::Digit => "digit",
            Tag::LeoKeyword => "leokeyword",
            Tag::DocPart => "docpart",
            Tag::Link => "link",
            Tag::Name => "name",
            Tag::NameBrackets => "namebrackets",
            Tag::Url => "url",
            Tag::Blank => "blank",
            Tag::Tab => "tab",
            Tag::Null => "null",
        }
    }

    /// Parse a tag from its name, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        Tag::ALL.iter().copied().find(|tag| tag.name() == lowered)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
