//! Incremental lexical tagging
//!
//! Lines are tagged one at a time. Each line starts in the state the
//! previous line ended in, so a host can recolor an edited document by
//! running only the lines whose starting state changed.
//!
//! - [`ModeLibrary`] holds the declarative mode files
//! - [`ModeRegistry`] compiles and caches rulesets on first use
//! - [`Colorizer`] runs lines and hands out [`StateId`]s
//! - [`DocumentColorizer`] caches a whole document's results

mod builtin;
mod directives;
mod driver;
mod library;
mod manager;
mod matchers;
mod mode;
mod registry;
mod rules;
mod sink;
mod state;
mod style;
mod tokens;

pub use directives::{Directive, LEO_DIRECTIVES};
pub use driver::{Colorizer, ColorizerOptions, LanguageSwitch, LineResult};
pub use library::ModeLibrary;
pub use manager::DocumentColorizer;
pub use mode::{CommentDelims, Mode, ModeFile};
pub use registry::{ModeRegistry, RulesetId};
pub use sink::{ActiveLanguage, FixedLanguage, LanguageResolver, TagEvent, TagSink};
pub use state::StateId;
pub use style::{Color, Span, Style};
pub use tokens::Tag;
