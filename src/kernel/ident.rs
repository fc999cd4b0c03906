//! Identifiers bound in kernel environments
//!
//! User identifiers come straight from source text. System identifiers are
//! synthesized by the generator and live in a namespace that user code can
//! never spell, because the lexer does not accept `$` in identifiers.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Kernel identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Ident {
    /// Identifier written by the user (possibly backtick-quoted)
    User(Arc<str>),
    /// Compiler-synthesized identifier: a readable prefix plus a unique suffix
    System {
        /// Readable prefix used when printing kernel code
        prefix: &'static str,
        /// Unique suffix within one generator run
        id: u32,
    },
}

impl Ident {
    /// Create a user identifier
    pub fn user(name: impl Into<Arc<str>>) -> Self {
        Ident::User(name.into())
    }

    /// Create a system identifier
    pub fn system(prefix: &'static str, id: u32) -> Self {
        Ident::System { prefix, id }
    }

    /// Whether this identifier was synthesized by the compiler
    pub fn is_system(&self) -> bool {
        matches!(self, Ident::System { .. })
    }

    /// Name of a user identifier
    pub fn name(&self) -> Option<&str> {
        match self {
            Ident::User(name) => Some(name),
            Ident::System { .. } => None,
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ident::User(name) => {
                if is_plain_name(name) {
                    write!(f, "{}", name)
                } else {
                    write!(f, "`{}`", name.replace('`', "\\`"))
                }
            }
            Ident::System { prefix, id } => write!(f, "${}{}", prefix, id),
        }
    }
}

/// Reserved words of the surface language, sorted
pub const KEYWORDS: &[&str] = &[
    "act", "actor", "ask", "begin", "break", "case", "catch", "continue", "do", "else", "elseif",
    "end", "eof", "false", "finally", "for", "func", "handle", "if", "import", "in", "local",
    "nothing", "null", "of", "proc", "return", "self", "skip", "spawn", "tell", "then", "throw",
    "true", "try", "var", "when", "while",
];

/// Whether `name` is a reserved word
pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.binary_search(&name).is_ok()
}

/// Whether `name` can be written without backtick quoting
pub fn is_plain_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name != "_" && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !is_keyword(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_unusual_names() {
        assert_eq!(Ident::user("abc").to_string(), "abc");
        assert_eq!(Ident::user("a b").to_string(), "`a b`");
        assert_eq!(Ident::user("end").to_string(), "`end`");
        assert_eq!(Ident::system("v", 3).to_string(), "$v3");
    }

    #[test]
    fn test_system_idents_never_equal_user_idents() {
        assert_ne!(Ident::user("$v3"), Ident::system("v", 3));
        assert!(Ident::system("v", 3).is_system());
    }
}
