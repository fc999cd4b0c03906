//! Module registry
//!
//! Maps a qualified module path (`system`, `app.util`) to the complete
//! record of values it exports. `import` statements resolve against the
//! registry owned by the machine's actor system; there is no process-wide
//! registry.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;

use super::builtins;
use super::value::{Feature, Rec, Value, ValueOrVar};

/// Catalog of importable modules
pub struct ModuleRegistry {
    modules: RwLock<HashMap<String, Value>>,
}

impl ModuleRegistry {
    /// Registry with no modules
    pub fn new() -> Self {
        Self {
            modules: RwLock::new(HashMap::new()),
        }
    }

    /// Registry pre-populated with the `system` module
    pub fn with_system() -> Self {
        let registry = Self::new();
        registry.register(builtins::SYSTEM_MODULE, builtins::system_module());
        registry
    }

    /// Register (or replace) a module under `path`
    pub fn register(&self, path: &str, exports: Value) {
        self.modules.write().insert(path.to_string(), exports);
    }

    /// Register a module from named exports
    pub fn register_exports(&self, path: &str, exports: Vec<(&str, Value)>) {
        let fields = exports
            .into_iter()
            .map(|(name, value)| (Feature::str(name), ValueOrVar::Value(value)))
            .collect();
        let rec = Rec::new(None, fields).unwrap_or_else(|_| Rec::tuple(None, Vec::new()));
        self.register(path, Value::Rec(std::sync::Arc::new(rec)));
    }

    /// Exports of the module at `path`
    pub fn lookup(&self, path: &str) -> Option<Value> {
        self.modules.read().get(path).cloned()
    }

    /// Whether a module is registered under `path`
    pub fn contains(&self, path: &str) -> bool {
        self.modules.read().contains_key(path)
    }

    /// Registered module paths, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.modules.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_system()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.paths())
            .finish()
    }
}
