//! Bundled mode files
//!
//! These are compiled into the binary so a colorizer works without a
//! modes directory. A directory given at run time can override any of
//! them by language name.

/// All bundled mode files as `(language, toml source)` pairs
pub fn all_sources() -> Vec<(&'static str, &'static str)> {
    vec![
        ("c", include_str!("../../../modes/c.toml")),
        ("markdown", include_str!("../../../modes/markdown.toml")),
        ("python", include_str!("../../../modes/python.toml")),
        ("rust", include_str!("../../../modes/rust.toml")),
        ("toml", include_str!("../../../modes/toml.toml")),
    ]
}
