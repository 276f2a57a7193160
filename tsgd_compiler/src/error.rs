use std::path::PathBuf;
use thiserror::Error;

use crate::source_span::SourceSpan;

/// Conditions that abort translation of a whole compilation unit.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error(
        "`{class}` has more than one direct base type ({bases}); multiple inheritance is not supported"
    )]
    MultipleInheritance {
        class: String,
        bases: String,
        location: Option<SourceSpan>,
    },
}

impl CompileError {
    /// Attach a source location to errors raised by location-less type queries.
    pub fn at(self, span: SourceSpan) -> Self {
        match self {
            Self::MultipleInheritance {
                class,
                bases,
                location: None,
            } => Self::MultipleInheritance {
                class,
                bases,
                location: Some(span),
            },
            other => other,
        }
    }

    pub fn location(&self) -> Option<&SourceSpan> {
        match self {
            Self::MultipleInheritance { location, .. } => location.as_ref(),
            _ => None,
        }
    }
}
