//! Lexical environments
//!
//! An [`Env`] is an immutable frame of `(Ident, Var)` entries with an
//! optional parent. Extending an environment never mutates the parent, so
//! closures can share captured frames freely.

use std::fmt;
use std::sync::Arc;

use super::ident::Ident;
use super::var::Var;

/// One binding in an environment frame
#[derive(Debug, Clone)]
pub struct EnvEntry {
    /// Bound identifier
    pub ident: Ident,
    /// Variable the identifier denotes
    pub var: Var,
}

impl EnvEntry {
    /// Create an entry
    pub fn new(ident: Ident, var: Var) -> Self {
        Self { ident, var }
    }
}

struct EnvFrame {
    parent: Option<Env>,
    entries: Vec<EnvEntry>,
}

/// Environment handle
#[derive(Clone)]
pub struct Env(Arc<EnvFrame>);

impl Env {
    /// Root environment with no bindings
    pub fn empty() -> Self {
        Self(Arc::new(EnvFrame {
            parent: None,
            entries: Vec::new(),
        }))
    }

    /// Root environment with the given bindings
    pub fn new(entries: Vec<EnvEntry>) -> Self {
        Self(Arc::new(EnvFrame {
            parent: None,
            entries,
        }))
    }

    /// Child environment whose entries shadow this one
    pub fn extend(&self, entries: Vec<EnvEntry>) -> Self {
        if entries.is_empty() {
            return self.clone();
        }
        Self(Arc::new(EnvFrame {
            parent: Some(self.clone()),
            entries,
        }))
    }

    /// Look up an identifier, innermost frame first
    pub fn get(&self, ident: &Ident) -> Option<&Var> {
        let mut frame = self;
        loop {
            if let Some(entry) = frame.0.entries.iter().rev().find(|e| &e.ident == ident) {
                return Some(&entry.var);
            }
            frame = frame.0.parent.as_ref()?;
        }
    }

    /// Look up a user identifier by name
    pub fn get_by_name(&self, name: &str) -> Option<&Var> {
        self.get(&Ident::user(name))
    }

    /// Whether an identifier is bound
    pub fn contains(&self, ident: &Ident) -> bool {
        self.get(ident).is_some()
    }

    /// Flat environment holding only `idents`; returns the first missing identifier on failure
    pub fn capture<'a>(&self, idents: impl IntoIterator<Item = &'a Ident>) -> Result<Env, Ident> {
        let mut entries = Vec::new();
        for ident in idents {
            let var = self.get(ident).ok_or_else(|| ident.clone())?;
            entries.push(EnvEntry::new(ident.clone(), var.clone()));
        }
        Ok(Env::new(entries))
    }

    /// Entries of the innermost frame
    pub fn entries(&self) -> &[EnvEntry] {
        &self.0.entries
    }

    /// Every visible entry, innermost shadowing outer ones
    pub fn visible_entries(&self) -> Vec<EnvEntry> {
        let mut seen = Vec::<Ident>::new();
        let mut out = Vec::new();
        let mut frame = Some(self);
        while let Some(current) = frame {
            for entry in current.0.entries.iter().rev() {
                if !seen.contains(&entry.ident) {
                    seen.push(entry.ident.clone());
                    out.push(entry.clone());
                }
            }
            frame = current.0.parent.as_ref();
        }
        out
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .visible_entries()
            .iter()
            .map(|e| e.ident.to_string())
            .collect();
        write!(f, "Env[{}]", names.join(", "))
    }
}
