//! Source text handles and byte spans used for diagnostics.

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Shared, immutable source text
#[derive(Clone, PartialEq, Eq)]
pub struct SourceText(Arc<str>);

impl SourceText {
    /// Wrap source text
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Full text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the text is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SourceText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceText({} bytes)", self.0.len())
    }
}

/// Byte range inside a [`SourceText`]
#[derive(Clone, PartialEq, Eq)]
pub struct Span {
    source: Option<SourceText>,
    /// Inclusive begin offset
    pub begin: usize,
    /// Exclusive end offset
    pub end: usize,
}

impl Span {
    /// Span over `source[begin..end]`
    pub fn new(source: SourceText, begin: usize, end: usize) -> Self {
        Self {
            source: Some(source),
            begin,
            end,
        }
    }

    /// Span for synthesized code with no source text
    pub fn none() -> Self {
        Self {
            source: None,
            begin: 0,
            end: 0,
        }
    }

    /// Smallest span covering both `self` and `other`
    pub fn adjoin(&self, other: &Span) -> Span {
        match (&self.source, &other.source) {
            (Some(_), None) => self.clone(),
            (None, Some(_)) => other.clone(),
            _ => Span {
                source: self.source.clone(),
                begin: self.begin.min(other.begin),
                end: self.end.max(other.end),
            },
        }
    }

    /// Source text covered by this span
    pub fn text(&self) -> &str {
        match &self.source {
            Some(source) => source.as_str().get(self.begin..self.end).unwrap_or(""),
            None => "",
        }
    }

    /// Source text this span points into, if any
    pub fn source(&self) -> Option<&SourceText> {
        self.source.as_ref()
    }

    /// One-based line and column of the span start
    pub fn line_and_column(&self) -> Option<(usize, usize)> {
        let source = self.source.as_ref()?;
        let prefix = source.as_str().get(..self.begin)?;
        let line = prefix.matches('\n').count() + 1;
        let column = match prefix.rfind('\n') {
            Some(pos) => prefix[pos + 1..].chars().count() + 1,
            None => prefix.chars().count() + 1,
        };
        Some((line, column))
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.begin, self.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line_and_column() {
            Some((line, column)) => write!(f, "{}:{}", line, column),
            None => write!(f, "<synthetic>"),
        }
    }
}

impl Serialize for Span {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.begin, self.end).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_and_column() {
        let source = SourceText::new("var x = 1\n  x + 2");
        let span = Span::new(source, 12, 13);
        assert_eq!(span.text(), "x");
        assert_eq!(span.line_and_column(), Some((2, 3)));
        assert_eq!(span.to_string(), "2:3");
    }

    #[test]
    fn test_adjoin_covers_both() {
        let source = SourceText::new("abcdef");
        let a = Span::new(source.clone(), 1, 2);
        let b = Span::new(source, 4, 6);
        let joined = a.adjoin(&b);
        assert_eq!((joined.begin, joined.end), (1, 6));
        assert_eq!(joined.text(), "bcdef");
        assert_eq!(Span::none().adjoin(&a).text(), "b");
    }
}
