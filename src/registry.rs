//! Bundle registry (spec §4.7): file-extension → scope-name lookup,
//! scope-name → compiled grammar cache, and the active theme.
//!
//! Grounded on `BundleManager` in `examples/original_source/src/bundlemanager.{h,cpp}`:
//! `fileTypes: QMap<ext, scopeName>`, `syntaxData: QMap<scopeName, QVariantMap>`,
//! `getSyntaxData`/`getHighlighterForExtension`. The original notifies theme
//! changes through a Qt `themeChanged` signal; there's no GUI event loop
//! here, so that becomes a plain `AtomicU64` generation counter a host can
//! poll (or compare against a value it cached) to notice the active theme
//! changed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::grammar::Grammar;
use crate::plist::{self, Value};
use crate::theme::Theme;

/// An in-memory index of grammars and themes, with lazy, cached grammar
/// compilation (spec §5: grammars are compiled once and shared read-only
/// across highlighting sessions).
pub struct BundleRegistry {
    syntax_table: HashMap<String, Value>,
    file_types: HashMap<String, String>,
    themes: HashMap<String, Theme>,
    active_theme: Mutex<Option<String>>,
    theme_generation: AtomicU64,
    grammar_cache: Mutex<HashMap<String, Grammar>>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        BundleRegistry {
            syntax_table: HashMap::new(),
            file_types: HashMap::new(),
            themes: HashMap::new(),
            active_theme: Mutex::new(None),
            theme_generation: AtomicU64::new(0),
            grammar_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a grammar's raw plist document (already parsed), indexing
    /// its `fileTypes` against its `scopeName`. A grammar with no
    /// `scopeName` is warned about and ignored.
    pub fn add_grammar(&mut self, document: Value) {
        let Some(scope_name) = document.get_str("scopeName").map(str::to_string) else {
            tracing::warn!("grammar document has no scopeName, ignoring");
            return;
        };
        if let Some(extensions) = document.get_array("fileTypes") {
            for ext in extensions.iter().filter_map(Value::as_str) {
                self.file_types.insert(ext.to_string(), scope_name.clone());
            }
        }
        self.syntax_table.insert(scope_name, document);
    }

    /// Parses and registers a grammar from a plist XML document.
    pub fn add_grammar_xml(&mut self, xml: &str) -> Result<(), plist::Error> {
        self.add_grammar(plist::parse_str(xml)?);
        Ok(())
    }

    /// Registers a theme under `name`, making it selectable via
    /// [`BundleRegistry::set_active_theme`].
    pub fn add_theme(&mut self, name: impl Into<String>, document: &Value) {
        self.themes.insert(name.into(), Theme::from_plist(document));
    }

    /// The scope name registered for `extension` (without a leading dot),
    /// if any. `fileTypes` entries are looked up verbatim, so a host can
    /// also call this with a full basename (e.g. `"Makefile"`) as a
    /// fallback when the extension lookup misses — some bundles register
    /// a basename instead of an extension in `fileTypes`.
    pub fn scope_for_extension(&self, extension: &str) -> Option<&str> {
        self.file_types.get(extension).map(String::as_str)
    }

    /// Runs `f` with the compiled grammar for `scope_name`, compiling and
    /// caching it on first use. Returns `None` if no grammar is registered
    /// under that scope name.
    pub fn with_grammar_for_scope<T>(&self, scope_name: &str, f: impl FnOnce(&Grammar) -> T) -> Option<T> {
        {
            let cache = self.grammar_cache.lock().expect("grammar cache mutex poisoned");
            if let Some(grammar) = cache.get(scope_name) {
                return Some(f(grammar));
            }
        }
        if !self.syntax_table.contains_key(scope_name) {
            return None;
        }
        let grammar = match Grammar::compile(&self.syntax_table, scope_name) {
            Ok(grammar) => grammar,
            Err(err) => {
                tracing::warn!(scope_name, error = %err, "grammar failed to compile, caching an empty grammar");
                Grammar::compile(&HashMap::new(), scope_name).expect("compiling an empty syntax table never fails")
            }
        };
        let mut cache = self.grammar_cache.lock().expect("grammar cache mutex poisoned");
        let grammar = cache.entry(scope_name.to_string()).or_insert(grammar);
        Some(f(grammar))
    }

    /// Selects the active theme by name, bumping the generation counter so
    /// callers polling [`BundleRegistry::theme_generation`] notice the
    /// change. A name with no registered theme clears the active theme.
    pub fn set_active_theme(&self, name: &str) {
        let mut active = self.active_theme.lock().expect("active theme mutex poisoned");
        if self.themes.contains_key(name) {
            *active = Some(name.to_string());
        } else {
            tracing::warn!(name, "no theme registered under this name, clearing active theme");
            *active = None;
        }
        self.theme_generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Runs `f` with the currently active theme, if one is set.
    pub fn with_active_theme<T>(&self, f: impl FnOnce(&Theme) -> T) -> Option<T> {
        let active = self.active_theme.lock().expect("active theme mutex poisoned");
        let name = active.as_ref()?;
        self.themes.get(name).map(f)
    }

    /// Monotonically increasing counter bumped every time the active theme
    /// changes. A host can cache the value it last saw and recompute
    /// styling only when it differs (spec §4.7).
    pub fn theme_generation(&self) -> u64 {
        self.theme_generation.load(Ordering::SeqCst)
    }
}

impl Default for BundleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
