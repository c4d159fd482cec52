//! Structured diagnostics collected across the pipeline.
//!
//! Every diagnostic carries a severity, a typed kind, the offending name and
//! a source location. Warnings and infos accumulate and ride alongside the
//! successful surface; an `Error` aborts the stage that raised it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Typed diagnostic kinds raised by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagKind {
    /// A referenced type cannot be mapped (e.g. `long double`, SIMD vectors).
    UnsupportedType,
    /// A `va_list` parameter or `...` caused the function to be skipped.
    VariadicFunctionDropped,
    /// An object-like macro body is not a single literal.
    MacroObjectNotTranspiled,
    /// Multi-target merge found divergent node shapes.
    MergePlatformNodes,
    /// A name was synthesized for an anonymous entity.
    AnonymousNamed,
    /// An alias target collides with a target built-in type.
    AliasShadowsBuiltin,
    /// A construct is recognised but not handled (e.g. wide enum storage).
    NotImplemented,
    /// A cursor kind the Explorer does not understand was skipped.
    UnknownCursorKind,
    /// A type reference does not resolve in the surface's type table.
    UnresolvedTypeReference,
}

impl DiagKind {
    /// The severity this kind is raised at.
    pub fn severity(self) -> Severity {
        match self {
            DiagKind::UnsupportedType => Severity::Error,
            DiagKind::VariadicFunctionDropped => Severity::Warning,
            DiagKind::MacroObjectNotTranspiled => Severity::Warning,
            DiagKind::MergePlatformNodes => Severity::Error,
            DiagKind::AnonymousNamed => Severity::Info,
            DiagKind::AliasShadowsBuiltin => Severity::Warning,
            DiagKind::NotImplemented => Severity::Warning,
            DiagKind::UnknownCursorKind => Severity::Warning,
            DiagKind::UnresolvedTypeReference => Severity::Error,
        }
    }
}

/// Source position of the offending declaration (file, line, column).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// A single structured diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagKind,
    /// The offending name (declaration, type, macro, …).
    pub name: String,
    pub location: SourceLocation,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:?}: `{}`: {} ({})",
            self.severity, self.kind, self.name, self.message, self.location
        )
    }
}

/// Ordered diagnostic sink. Production order is stable across runs given a
/// stable input, so the CLI can print in collection order.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        kind: DiagKind,
        name: impl Into<String>,
        location: SourceLocation,
        message: impl Into<String>,
    ) {
        self.items.push(Diagnostic {
            severity: kind.severity(),
            kind,
            name: name.into(),
            location,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Count of diagnostics of a given kind.
    pub fn count_of(&self, kind: DiagKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_mapping() {
        assert_eq!(DiagKind::UnsupportedType.severity(), Severity::Error);
        assert_eq!(
            DiagKind::VariadicFunctionDropped.severity(),
            Severity::Warning
        );
        assert_eq!(DiagKind::AnonymousNamed.severity(), Severity::Info);
    }

    #[test]
    fn error_detection() {
        let mut diags = Diagnostics::new();
        diags.push(
            DiagKind::AnonymousNamed,
            "Anonymous_Union_u",
            SourceLocation::default(),
            "synthesized name",
        );
        assert!(!diags.has_errors());
        diags.push(
            DiagKind::UnsupportedType,
            "long double",
            SourceLocation::default(),
            "no target mapping",
        );
        assert!(diags.has_errors());
        assert_eq!(diags.len(), 2);
        assert_eq!(diags.count_of(DiagKind::UnsupportedType), 1);
    }

    #[test]
    fn display_includes_location() {
        let d = Diagnostic {
            severity: Severity::Warning,
            kind: DiagKind::VariadicFunctionDropped,
            name: "printf".into(),
            location: SourceLocation {
                file: "stdio.h".into(),
                line: 12,
                column: 5,
            },
            message: "variadic function".into(),
        };
        let text = d.to_string();
        assert!(text.contains("printf"));
        assert!(text.contains("stdio.h:12:5"));
    }
}
