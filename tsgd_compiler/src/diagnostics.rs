use serde::Serialize;
use std::fmt::{Display, Formatter};

use crate::source_span::{SourceSpan, Span, range_to_span};

/// Closed set of problems the translator reports without aborting a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    SignalNamingError,
    ExportMetadataShapeError,
    MissingSourceForSuperclass,
    ToolAnnotationOnNonDefaultClass,
    UnsupportedMultipleInheritance,
    UnsupportedSyntax,
}

impl Display for DiagnosticKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SignalNamingError => "SignalNamingError",
            Self::ExportMetadataShapeError => "ExportMetadataShapeError",
            Self::MissingSourceForSuperclass => "MissingSourceForSuperclass",
            Self::ToolAnnotationOnNonDefaultClass => "ToolAnnotationOnNonDefaultClass",
            Self::UnsupportedMultipleInheritance => "UnsupportedMultipleInheritance",
            Self::UnsupportedSyntax => "UnsupportedSyntax",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub location: SourceSpan,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.kind, self.message)
    }
}

/// Append-only list of diagnostics for one compilation unit.
#[derive(Debug)]
pub struct Diagnostics {
    file: String,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            entries: Vec::new(),
        }
    }

    pub fn report(&mut self, source: &str, span: Span, kind: DiagnosticKind, message: String) {
        let location = range_to_span(source, span, self.file.clone());
        log::debug!("{location}: {kind}: {message}");
        self.entries.push(Diagnostic {
            kind,
            message,
            location,
        });
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_keeps_insertion_order_and_location() {
        let source = "class A {\n  foo: Signal;\n}";
        let mut diagnostics = Diagnostics::new("src/A.ts");
        diagnostics.report(
            source,
            Span::new(12, 15),
            DiagnosticKind::SignalNamingError,
            "first".into(),
        );
        diagnostics.report(
            source,
            Span::new(0, 5),
            DiagnosticKind::UnsupportedSyntax,
            "second".into(),
        );

        let all = diagnostics.into_vec();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, DiagnosticKind::SignalNamingError);
        assert_eq!(
            all[0].to_string(),
            "src/A.ts:2:3: SignalNamingError: first"
        );
        assert_eq!(all[1].message, "second");
    }
}
