//! linetag - incremental, line-oriented lexical tagging
//!
//! Source text is tagged one line at a time by rules read from
//! declarative mode files. See [`syntax`] for the engine.

pub mod config;
pub mod error;
pub mod logging;
pub mod render;
pub mod syntax;
