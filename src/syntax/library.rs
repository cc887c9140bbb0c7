//! Mode library: the parsed mode files available to a registry
//!
//! Bundled modes are embedded in the binary; a directory of `*.toml`
//! files may add to or override them by language name.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use super::builtin;
use super::mode::ModeFile;

use crate::error::{ColorizerError, Result};

/// Parsed mode files keyed by language name
#[derive(Debug, Clone, Default)]
pub struct ModeLibrary {
    files: HashMap<String, ModeFile>,
    aliases: HashMap<String, String>,
}

impl ModeLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a library holding the bundled modes
    pub fn builtin() -> Self {
        let mut library = Self::new();
        for (language, source) in builtin::all_sources() {
            // Bundled sources are covered by tests; a broken one is skipped.
            if let Err(e) = library.add_toml(language, source) {
                warn!(target: "linetag::registry", language, error = %e, "Bundled mode rejected");
            }
        }
        library
    }

    /// Parse and add a mode file.
    ///
    /// The file's own `language` field wins over `language`.
    pub fn add_toml(&mut self, language: &str, source: &str) -> Result<()> {
        let file: ModeFile = toml::from_str(source).map_err(|source| ColorizerError::ModeParse {
            path: format!("<{}>", language).into(),
            source,
        })?;
        self.insert(language, file);
        Ok(())
    }

    /// Add an already parsed mode file
    pub fn insert(&mut self, language: &str, mut file: ModeFile) {
        let name = file.language.clone().unwrap_or_else(|| language.to_string());
        file.language = Some(name.clone());
        debug!(target: "linetag::registry", language = %name, rulesets = file.rulesets.len(), "Mode file added");
        self.files.insert(name, file);
    }

    /// Load every `*.toml` file in a directory.
    ///
    /// Files that fail to parse are logged and skipped. Returns the
    /// number of files loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut loaded = 0;
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();
        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let source = fs::read_to_string(&path)?;
            match toml::from_str::<ModeFile>(&source) {
                Ok(file) => {
                    self.insert(stem, file);
                    loaded += 1;
                }
                Err(source) => {
                    let e = ColorizerError::ModeParse { path: path.clone(), source };
                    warn!(target: "linetag::registry", error = %e, "Mode file skipped");
                }
            }
        }
        Ok(loaded)
    }

    /// Make `alias` resolve to `language`
    pub fn add_alias(&mut self, alias: &str, language: &str) {
        self.aliases.insert(alias.to_string(), language.to_string());
    }

    /// Apply the alias table to a language name
    pub fn canonical_language<'a>(&'a self, language: &'a str) -> &'a str {
        self.aliases.get(language).map(String::as_str).unwrap_or(language)
    }

    pub fn get(&self, language: &str) -> Option<&ModeFile> {
        self.files.get(language)
    }

    pub fn contains(&self, language: &str) -> bool {
        self.files.contains_key(self.canonical_language(language))
    }

    /// Known language names, sorted
    pub fn languages(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.files.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_languages() {
        let library = ModeLibrary::builtin();
        assert_eq!(library.languages(), vec!["c", "markdown", "python", "rust", "toml"]);
    }

    #[test]
    fn test_add_toml_uses_declared_language() {
        let mut library = ModeLibrary::new();
        library.add_toml("file-stem", "language = \"demo\"\n").unwrap();
        assert!(library.contains("demo"));
        assert!(!library.contains("file-stem"));
    }

    #[test]
    fn test_add_toml_rejects_bad_source() {
        let mut library = ModeLibrary::new();
        let err = library.add_toml("bad", "rulesets = 3").unwrap_err();
        assert!(matches!(err, ColorizerError::ModeParse { .. }));
    }

    #[test]
    fn test_aliases() {
        let mut library = ModeLibrary::builtin();
        library.add_alias("py", "python");
        assert_eq!(library.canonical_language("py"), "python");
        assert_eq!(library.canonical_language("rust"), "rust");
        assert!(library.contains("py"));
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut good = fs::File::create(dir.path().join("lua.toml")).unwrap();
        writeln!(good, "[rulesets.main.keywords]\nkeyword1 = [\"local\"]").unwrap();
        fs::write(dir.path().join("broken.toml"), "[rulesets.main\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut library = ModeLibrary::new();
        let loaded = library.load_dir(dir.path()).unwrap();
        assert_eq!(loaded, 1);
        assert!(library.contains("lua"));
        assert!(!library.contains("broken"));
    }

    #[test]
    fn test_load_dir_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("python.toml"), "[properties]\nline_comment = \"//\"\n").unwrap();
        let mut library = ModeLibrary::builtin();
        library.load_dir(dir.path()).unwrap();
        let python = library.get("python").unwrap();
        assert_eq!(python.properties.line_comment.as_deref(), Some("//"));
        assert!(python.rulesets.is_empty());
    }
}
