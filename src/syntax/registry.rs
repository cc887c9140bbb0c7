//! Mode registry: resolves mode names to compiled, cached modes
//!
//! A name is either a bare language (`python`) or a compound
//! `language::ruleset` name (`c::cpp`). Each name maps to a ruleset id
//! that keys the cache. Modes are immutable once cached, so the cache is
//! shared by every line of every session that uses this registry.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::directives;
use super::library::ModeLibrary;
use super::mode::Mode;

/// Canonical identifier of one ruleset, e.g. `python_main` or `c_cpp`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RulesetId(String);

impl RulesetId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RulesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase ASCII identifier characters, everything else becomes `_`
pub fn munge(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// A resolved mode name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeName {
    pub language: String,
    /// Ruleset key inside the language's mode file
    pub ruleset: String,
    pub id: RulesetId,
}

/// Split a mode name into language and ruleset and derive the ruleset id.
///
/// Aliases apply to the language part.
pub fn name_to_ruleset(library: &ModeLibrary, name: &str) -> ModeName {
    let (language, ruleset) = match name.split_once("::") {
        Some((language, ruleset)) => (language, ruleset),
        None => (name, "main"),
    };
    let language = library.canonical_language(language).to_string();
    let id = if ruleset == "main" {
        RulesetId(format!("{}_main", language))
    } else {
        RulesetId(munge(&format!("{}_{}", language, ruleset)))
    };
    ModeName {
        language,
        ruleset: ruleset.to_string(),
        id,
    }
}

/// Loads modes from a library and caches them by ruleset id
#[derive(Debug)]
pub struct ModeRegistry {
    library: ModeLibrary,
    modes: HashMap<RulesetId, Arc<Mode>>,
    highlight_urls: bool,
}

impl ModeRegistry {
    pub fn new(library: ModeLibrary, highlight_urls: bool) -> Self {
        Self {
            library,
            modes: HashMap::new(),
            highlight_urls,
        }
    }

    pub fn library(&self) -> &ModeLibrary {
        &self.library
    }

    pub fn highlight_urls(&self) -> bool {
        self.highlight_urls
    }

    /// Number of cached ruleset ids, sentinels included
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Resolve a mode name; unresolvable names yield the cached sentinel
    pub fn resolve(&mut self, name: &str) -> Arc<Mode> {
        let mut visited = HashSet::new();
        self.load(name, &mut visited)
    }

    /// Resolve a mode name, `None` if it is unknown
    pub fn try_resolve(&mut self, name: &str) -> Option<Arc<Mode>> {
        let mode = self.resolve(name);
        (!mode.is_unknown()).then_some(mode)
    }

    /// A mode already in the cache
    pub fn get(&self, id: &RulesetId) -> Option<Arc<Mode>> {
        self.modes.get(id).cloned()
    }

    /// Drop every cached mode, sentinels included
    pub fn clear(&mut self) {
        debug!(target: "linetag::registry", modes = self.modes.len(), "Mode cache cleared");
        self.modes.clear();
    }

    fn load(&mut self, name: &str, visited: &mut HashSet<RulesetId>) -> Arc<Mode> {
        let ModeName { language, ruleset, id } = name_to_ruleset(&self.library, name);
        if let Some(mode) = self.modes.get(&id) {
            return Arc::clone(mode);
        }
        visited.insert(id.clone());

        let Some((properties, spec)) = self
            .library
            .get(&language)
            .and_then(|file| file.rulesets.get(&ruleset).map(|spec| (file.properties.clone(), spec.clone())))
        else {
            warn!(target: "linetag::registry", %name, %id, "No rules for mode, using empty mode");
            let sentinel = Arc::new(Mode::unknown(id.clone()));
            self.modes.insert(id, Arc::clone(&sentinel));
            return sentinel;
        };

        let mut mode = Mode::compile(&language, id.clone(), &properties, &spec);

        for import in &spec.imports {
            let import_id = name_to_ruleset(&self.library, import).id;
            if visited.contains(&import_id) {
                debug!(target: "linetag::registry", %id, import = %import_id, "Import already in progress, skipped");
                continue;
            }
            let imported = self.load(import, visited);
            if imported.is_unknown() {
                continue;
            }
            mode.merge_rules_from(&imported);
        }

        directives::install(&mut mode, self.highlight_urls);
        let mode = Arc::new(mode);
        self.modes.insert(id.clone(), Arc::clone(&mode));
        info!(target: "linetag::registry", %name, %id, "Mode loaded");

        if let Some(delegate) = &properties.initial_delegate {
            let delegate_id = name_to_ruleset(&self.library, delegate).id;
            if !visited.contains(&delegate_id) {
                let live = self.load(delegate, visited);
                if !live.is_unknown() {
                    debug!(target: "linetag::registry", %id, delegate = %delegate_id, "Initial delegate installed");
                    self.modes.insert(id, Arc::clone(&live));
                    return live;
                }
            }
        }
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::mode::Matcher;

    fn library_with(language: &str, source: &str) -> ModeLibrary {
        let mut library = ModeLibrary::new();
        library.add_toml(language, source).unwrap();
        library
    }

    #[test]
    fn test_munge() {
        assert_eq!(munge("C::CPP"), "c__cpp");
        assert_eq!(munge("html_Javascript-2"), "html_javascript_2");
    }

    #[test]
    fn test_name_to_ruleset() {
        let mut library = ModeLibrary::new();
        library.add_alias("py", "python");

        let name = name_to_ruleset(&library, "python");
        assert_eq!(name.language, "python");
        assert_eq!(name.ruleset, "main");
        assert_eq!(name.id.as_str(), "python_main");

        let name = name_to_ruleset(&library, "c::CPP");
        assert_eq!(name.language, "c");
        assert_eq!(name.ruleset, "CPP");
        assert_eq!(name.id.as_str(), "c_cpp");

        assert_eq!(name_to_ruleset(&library, "py").id.as_str(), "python_main");
    }

    #[test]
    fn test_resolve_caches() {
        let mut registry = ModeRegistry::new(ModeLibrary::builtin(), true);
        let first = registry.resolve("python");
        let second = registry.resolve("python");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.ruleset.as_str(), "python_main");
        assert!(registry.get(&RulesetId::new("python_main")).is_some());
    }

    #[test]
    fn test_unknown_language_is_cached_sentinel() {
        let mut registry = ModeRegistry::new(ModeLibrary::builtin(), true);
        let mode = registry.resolve("cobol");
        assert!(mode.is_unknown());
        assert!(registry.try_resolve("cobol").is_none());
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&mode, &registry.resolve("cobol")));
    }

    #[test]
    fn test_unknown_ruleset_of_known_language() {
        let mut registry = ModeRegistry::new(ModeLibrary::builtin(), true);
        assert!(registry.resolve("python::nothing").is_unknown());
        assert!(!registry.resolve("python").is_unknown());
    }

    #[test]
    fn test_directives_installed() {
        let mut registry = ModeRegistry::new(library_with("plain", "[rulesets.main]\n"), true);
        let mode = registry.resolve("plain");
        assert!(!mode.is_unknown());
        assert!(matches!(*mode.rules_for('@')[0], Matcher::Directive(_)));
        assert!(matches!(*mode.rules_for('<')[0], Matcher::Directive(_)));
        assert_eq!(mode.rules_for('h').len(), 1);

        let mut quiet = ModeRegistry::new(library_with("plain", "[rulesets.main]\n"), false);
        assert!(quiet.resolve("plain").rules_for('h').is_empty());
    }

    #[test]
    fn test_imports_merge_and_cycles() {
        let source = r#"
[rulesets.main]
imports = ["demo::extra"]

[[rulesets.main.rules]]
kind = "seq"
seq = "+"
tag = "operator"

[rulesets.extra]
imports = ["demo"]

[[rulesets.extra.rules]]
kind = "seq"
seq = "+"
tag = "operator"

[[rulesets.extra.rules]]
kind = "seq"
seq = "-"
tag = "operator"
"#;
        let mut registry = ModeRegistry::new(library_with("demo", source), false);
        let main = registry.resolve("demo");
        // The duplicate "+" rule is merged once.
        assert_eq!(main.rules_for('+').len(), 1);
        assert_eq!(main.rules_for('-').len(), 1);
        let extra = registry.resolve("demo::extra");
        assert_eq!(extra.rules_for('-').len(), 1);
    }

    #[test]
    fn test_initial_delegate() {
        let source = r#"
[properties]
initial_delegate = "outer::inner"

[rulesets.main]

[rulesets.inner]
[[rulesets.inner.rules]]
kind = "seq"
seq = "*"
tag = "operator"
"#;
        let mut registry = ModeRegistry::new(library_with("outer", source), false);
        let live = registry.resolve("outer");
        assert_eq!(live.ruleset.as_str(), "outer_inner");
        assert_eq!(live.rules_for('*').len(), 1);
        let again = registry.get(&RulesetId::new("outer_main")).unwrap();
        assert!(Arc::ptr_eq(&live, &again));
    }

    #[test]
    fn test_clear() {
        let mut registry = ModeRegistry::new(ModeLibrary::builtin(), true);
        let before = registry.resolve("rust");
        registry.clear();
        assert!(registry.is_empty());
        let after = registry.resolve("rust");
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
