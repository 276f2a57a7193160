// Source span tracking for diagnostics
use serde::Serialize;

/// Byte range of a syntax node inside its compilation unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start..self.end).unwrap_or("")
    }
}

/// Represents a location in the original source code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSpan {
    /// Source file identifier (e.g., "src/Player.ts")
    pub file: String,
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed, character offset)
    pub column: u32,
    /// Length of the span in characters
    pub length: u32,
}

impl SourceSpan {
    pub fn new(file: String, line: u32, column: u32, length: u32) -> Self {
        Self {
            file,
            line,
            column,
            length,
        }
    }

    /// Create a source span for a single character
    pub fn single_char(file: String, line: u32, column: u32) -> Self {
        Self::new(file, line, column, 1)
    }
}

impl std::fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Given a source string and a byte offset, compute line and column
pub fn position_to_span(source: &str, byte_offset: usize, file: String) -> SourceSpan {
    let mut line = 1u32;
    let mut column = 1u32;

    for (idx, ch) in source.char_indices() {
        if idx >= byte_offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    SourceSpan::single_char(file, line, column)
}

/// Helper to extract source span from a range in a string
pub fn range_to_span(source: &str, span: Span, file: String) -> SourceSpan {
    let start_span = position_to_span(source, span.start, file.clone());
    let end_span = position_to_span(source, span.end, file);

    let length = if start_span.line == end_span.line {
        end_span.column - start_span.column
    } else {
        // Multi-line span - approximate
        end_span.column
    };

    SourceSpan {
        line: start_span.line,
        column: start_span.column,
        length,
        file: start_span.file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_to_span_counts_lines_and_columns() {
        let source = "let a = 1;\nlet bb = 2;\n";
        let span = position_to_span(source, 15, "a.ts".into());
        assert_eq!(span.line, 2);
        assert_eq!(span.column, 5);
    }

    #[test]
    fn range_to_span_measures_single_line_length() {
        let source = "class Foo {}";
        let span = range_to_span(source, Span::new(6, 9), "a.ts".into());
        assert_eq!((span.line, span.column, span.length), (1, 7, 3));
        assert_eq!(span.to_string(), "a.ts:1:7");
    }
}
