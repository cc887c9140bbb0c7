//! Configuration file support
//!
//! Loads settings from ~/.linetag.conf (or %USERPROFILE%\.linetag.conf on Windows)
//!
//! Format: simple key=value pairs, one per line
//! Lines starting with # are comments
//!
//! Example:
//! ```text
//! # linetag configuration
//! modes-dir = /home/me/.linetag/modes
//! default-language = python
//! highlight-urls = true
//! max-delegation-depth = 16
//! trace = false
//! color-output = true
//! language-alias = py3=python, h=c
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{ColorizerError, Result};
use crate::syntax::{ColorizerOptions, ModeLibrary};

/// Configuration settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory of extra `*.toml` mode files
    pub modes_dir: Option<PathBuf>,
    /// Language used when none is given on the command line
    pub default_language: Option<String>,
    /// Tag URLs
    pub highlight_urls: bool,
    /// Deepest allowed chain of delegated ranges
    pub max_delegation_depth: usize,
    /// Verbose logging
    pub trace: bool,
    /// Colored terminal output
    pub color_output: bool,
    /// Alternative language names, as (alias, language)
    pub language_aliases: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        let options = ColorizerOptions::default();
        Self {
            modes_dir: None,
            default_language: None,
            highlight_urls: options.highlight_urls,
            max_delegation_depth: options.max_delegation_depth,
            trace: false,
            color_output: true,
            language_aliases: Vec::new(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            std::env::var("USERPROFILE")
                .ok()
                .map(|home| PathBuf::from(home).join(".linetag.conf"))
        }

        #[cfg(not(windows))]
        {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".linetag.conf"))
        }
    }

    /// Load configuration from the default location; never fails
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Config not loaded");
                Config::default()
            }),
            _ => Config::default(),
        }
    }

    /// Load configuration from a file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config = Config::default();
        config.apply(&Self::parse(&contents));
        Ok(config)
    }

    /// Parse config file contents into key-value pairs
    fn parse(contents: &str) -> HashMap<String, String> {
        let mut settings = HashMap::new();

        for line in contents.lines() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse key = value
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim().to_lowercase();
                let value = value.trim().to_string();
                settings.insert(key, value);
            }
        }

        settings
    }

    /// Apply settings from parsed config; bad values keep their defaults
    fn apply(&mut self, settings: &HashMap<String, String>) {
        if let Some(value) = settings.get("modes-dir") {
            if !value.is_empty() {
                self.modes_dir = Some(PathBuf::from(value));
            }
        }

        if let Some(value) = settings.get("default-language") {
            if !value.is_empty() {
                self.default_language = Some(value.to_lowercase());
            }
        }

        if let Some(value) = settings.get("highlight-urls") {
            self.highlight_urls = parse_bool(value);
        }

        if let Some(value) = settings.get("max-delegation-depth") {
            match value.parse::<usize>() {
                Ok(n) => self.max_delegation_depth = n.clamp(1, 64),
                Err(_) => warn!(%value, "Ignoring max-delegation-depth"),
            }
        }

        if let Some(value) = settings.get("trace") {
            self.trace = parse_bool(value);
        }

        if let Some(value) = settings.get("color-output") {
            self.color_output = parse_bool(value);
        }

        if let Some(value) = settings.get("language-alias") {
            match parse_aliases(value) {
                Ok(aliases) => self.language_aliases = aliases,
                Err(e) => warn!(error = %e, "Ignoring language-alias"),
            }
        }
    }

    /// Session options for a colorizer
    pub fn colorizer_options(&self) -> ColorizerOptions {
        ColorizerOptions {
            highlight_urls: self.highlight_urls,
            max_delegation_depth: self.max_delegation_depth,
        }
    }

    /// The bundled modes plus the modes directory and aliases
    pub fn mode_library(&self) -> Result<ModeLibrary> {
        let mut library = ModeLibrary::builtin();
        if let Some(dir) = &self.modes_dir {
            let count = library.load_dir(dir)?;
            info!(dir = %dir.display(), count, "Loaded mode files");
        }
        for (alias, language) in &self.language_aliases {
            library.add_alias(alias, language);
        }
        Ok(library)
    }
}

/// Parse a boolean value from string
fn parse_bool(s: &str) -> bool {
    let s = s.to_lowercase();
    matches!(s.as_str(), "true" | "yes" | "on" | "1")
}

/// Parse `alias=language` pairs separated by commas
fn parse_aliases(s: &str) -> Result<Vec<(String, String)>> {
    s.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((alias, language)) if !alias.trim().is_empty() && !language.trim().is_empty() => {
                Ok((alias.trim().to_lowercase(), language.trim().to_lowercase()))
            }
            _ => Err(ColorizerError::Config(format!("bad language alias '{}'", pair))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let contents = r#"
# Comment
modes-dir = /tmp/modes
highlight-urls = false
max-delegation-depth = 8
language-alias = py3=python, h=c
        "#;

        let settings = Config::parse(contents);
        assert_eq!(settings.get("modes-dir"), Some(&"/tmp/modes".to_string()));
        assert_eq!(settings.get("highlight-urls"), Some(&"false".to_string()));
        assert_eq!(settings.get("max-delegation-depth"), Some(&"8".to_string()));
        assert_eq!(settings.get("language-alias"), Some(&"py3=python, h=c".to_string()));
    }

    #[test]
    fn test_apply_settings() {
        let mut config = Config::default();
        let mut settings = HashMap::new();
        settings.insert("default-language".to_string(), "Python".to_string());
        settings.insert("highlight-urls".to_string(), "no".to_string());
        settings.insert("max-delegation-depth".to_string(), "500".to_string());
        settings.insert("trace".to_string(), "on".to_string());
        settings.insert("color-output".to_string(), "off".to_string());

        config.apply(&settings);

        assert_eq!(config.default_language.as_deref(), Some("python"));
        assert!(!config.highlight_urls);
        assert_eq!(config.max_delegation_depth, 64);
        assert!(config.trace);
        assert!(!config.color_output);
        assert!(!config.colorizer_options().highlight_urls);
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let mut config = Config::default();
        let mut settings = HashMap::new();
        settings.insert("max-delegation-depth".to_string(), "deep".to_string());
        settings.insert("language-alias".to_string(), "py3=python, broken".to_string());

        config.apply(&settings);

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_aliases() {
        let aliases = parse_aliases("py3 = Python, h=c,").unwrap();
        assert_eq!(
            aliases,
            vec![("py3".to_string(), "python".to_string()), ("h".to_string(), "c".to_string())]
        );
        assert!(matches!(parse_aliases("=c"), Err(ColorizerError::Config(_))));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("True"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("on"));
        assert!(parse_bool("1"));

        assert!(!parse_bool("false"));
        assert!(!parse_bool("off"));
        assert!(!parse_bool("anything"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linetag.conf");
        fs::write(&path, "trace = yes\nlanguage-alias = py3=python\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.trace);
        assert_eq!(config.language_aliases, vec![("py3".to_string(), "python".to_string())]);

        let missing = Config::load_from(&dir.path().join("nope.conf"));
        assert!(matches!(missing, Err(ColorizerError::Io(_))));
    }

    #[test]
    fn test_mode_library_uses_dir_and_aliases() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ini.toml"), "[rulesets.main]\n").unwrap();
        let config = Config {
            modes_dir: Some(dir.path().to_path_buf()),
            language_aliases: vec![("py3".to_string(), "python".to_string())],
            ..Config::default()
        };

        let library = config.mode_library().unwrap();
        assert!(library.contains("ini"));
        assert!(library.contains("rust"));
        assert_eq!(library.canonical_language("py3"), "python");
    }
}
