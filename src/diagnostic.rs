//! Template-located problem reports shared by the compiler and the checker.

use std::fmt;

/// A 1-based line/column position inside a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Translate a position relative to a fragment that starts at `self`.
    ///
    /// The first fragment line is offset by the fragment's starting column;
    /// later lines were copied verbatim, so their columns carry over as-is.
    pub fn advance(self, rel_line: usize, rel_column: usize) -> Location {
        if rel_line <= 1 {
            Location::new(self.line, self.column + rel_column.saturating_sub(1))
        } else {
            Location::new(self.line + rel_line - 1, rel_column.max(1))
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub template: String,
    pub severity: Severity,
    pub message: String,
    /// `None` when the problem does not map back to any template position.
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn error(template: &str, message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            template: template.to_string(),
            severity: Severity::Error,
            message: message.into(),
            location,
        }
    }

    pub fn warning(template: &str, message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            template: template.to_string(),
            severity: Severity::Warning,
            message: message.into(),
            location,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{}:{}: {}: {}",
                self.template, loc, self.severity, self.message
            ),
            None => write!(
                f,
                "{}: {}: {} (unknown location)",
                self.template, self.severity, self.message
            ),
        }
    }
}

impl std::error::Error for Diagnostic {}

impl miette::Diagnostic for Diagnostic {
    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
        })
    }
}

/// Order diagnostics by template position, unknown locations last.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| match (a.location, b.location) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.severity.cmp(&b.severity)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}
