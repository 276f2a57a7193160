pub mod builtins;
pub mod class;
pub mod expression;
pub mod hoisting;
pub mod resolver;
pub mod source_file;
pub mod statement;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashSet;
use std::path::Path;

use crate::{
    ast::TypeRef,
    diagnostics::{DiagnosticKind, Diagnostics},
    index::ProgramIndex,
    scope::{ScopeKind, ScopeStack},
    source_span::{SourceSpan, Span, range_to_span},
    types::{Type, TypeEnv, TypeQuery},
    units::{UnitRef, UnitResolver},
};
use hoisting::LibraryFunction;

pub const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePosition {
    Before,
    After,
}

/// A statement that must run right before or after the statement containing an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraLine {
    pub position: LinePosition,
    pub line: String,
}

/// A whole extra output file produced while translating a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub unit: UnitRef,
    pub content: String,
}

/// Result of translating one syntax node.
#[derive(Debug, Clone, Default)]
pub struct Translation {
    pub content: String,
    pub extra_lines: Vec<ExtraLine>,
    pub hoisted_helpers: IndexSet<LibraryFunction>,
    /// Closure name to its full `func` definition.
    pub hoisted_closures: IndexMap<String, String>,
    /// Enum name to its constant mapping, for enums declared in other units.
    pub hoisted_enums: IndexMap<String, String>,
    pub files: Vec<OutputFile>,
}

impl Translation {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Merges children through a text-level merge function. Absent children
    /// contribute an empty string and no side-channel data.
    pub fn combine<I, F>(children: I, merge: F) -> Translation
    where
        I: IntoIterator,
        I::Item: Into<Option<Translation>>,
        F: FnOnce(&[&str]) -> String,
    {
        let children: Vec<Translation> = children
            .into_iter()
            .map(|child| child.into().unwrap_or_default())
            .collect();
        let content = {
            let texts: Vec<&str> = children.iter().map(|c| c.content.as_str()).collect();
            merge(&texts)
        };
        Self::merged(children, content)
    }

    /// Merges children through a merge function that sees whole child results,
    /// for rules that must place a child's extra lines themselves.
    pub fn combine_with<I, F>(children: I, merge: F) -> Translation
    where
        I: IntoIterator,
        I::Item: Into<Option<Translation>>,
        F: FnOnce(&[Translation]) -> String,
    {
        let children: Vec<Translation> = children
            .into_iter()
            .map(|child| child.into().unwrap_or_default())
            .collect();
        let content = merge(&children);
        Self::merged(children, content)
    }

    fn merged(children: Vec<Translation>, content: String) -> Translation {
        let mut out = Translation::text(content);
        for child in children {
            out.absorb(child);
        }
        out
    }

    /// Takes over a child's side channels (everything but its content).
    pub fn absorb(&mut self, child: Translation) {
        self.extra_lines.extend(child.extra_lines);
        self.absorb_hoists(child.hoisted_helpers, child.hoisted_closures, child.hoisted_enums);
        self.files.extend(child.files);
    }

    fn absorb_hoists(
        &mut self,
        helpers: IndexSet<LibraryFunction>,
        closures: IndexMap<String, String>,
        enums: IndexMap<String, String>,
    ) {
        self.hoisted_helpers.extend(helpers);
        for (name, body) in closures {
            self.hoisted_closures.entry(name).or_insert(body);
        }
        for (name, body) in enums {
            self.hoisted_enums.entry(name).or_insert(body);
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn push_extra(&mut self, position: LinePosition, line: impl Into<String>) {
        self.extra_lines.push(ExtraLine {
            position,
            line: line.into(),
        });
    }

    pub fn lines_at(&self, position: LinePosition) -> Vec<&str> {
        self.extra_lines
            .iter()
            .filter(|l| l.position == position)
            .map(|l| l.line.as_str())
            .collect()
    }

    /// Drains extra lines around the content, turning an expression result
    /// into a finished statement.
    pub fn into_statement(mut self) -> Translation {
        if self.extra_lines.is_empty() {
            return self;
        }
        let mut lines: Vec<String> = self
            .lines_at(LinePosition::Before)
            .into_iter()
            .map(str::to_string)
            .collect();
        if !self.content.is_empty() {
            lines.push(std::mem::take(&mut self.content));
        }
        lines.extend(self.lines_at(LinePosition::After).into_iter().map(str::to_string));
        self.extra_lines.clear();
        self.content = join_lines(lines);
        self
    }
}

/// Indents every non-empty line by `depth` levels.
pub fn indent(text: &str, depth: usize) -> String {
    let prefix = INDENT.repeat(depth);
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Joins non-empty fragments with newlines.
pub fn join_lines<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .filter(|p| !p.as_ref().trim().is_empty())
        .map(|p| p.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indented block body, falling back to `pass` when nothing was emitted.
pub fn block_body(text: &str) -> String {
    if text.trim().is_empty() {
        indent("pass", 1)
    } else {
        indent(text, 1)
    }
}

/// Statement that an unlabeled `break` or `continue` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpTarget {
    /// A loop, with the increment text `continue` must repeat.
    Loop(Option<String>),
    SwitchCase,
}

/// Per-unit state threaded through every lowering rule.
pub struct ParseState<'a> {
    pub scopes: ScopeStack,
    /// Enclosing loops and switch cases, innermost last.
    pub jump_targets: Vec<JumpTarget>,
    pub is_autoload: bool,
    pub types: &'a ProgramIndex,
    pub units: &'a dyn UnitResolver,
    pub unit: &'a UnitRef,
    pub module_path: &'a Path,
    pub source: &'a str,
    pub diagnostics: Diagnostics,
    /// Names read in the function (or file top level) being translated.
    pub used_names: Vec<FxHashSet<String>>,
    pub self_type: Option<Type>,
    closure_counter: usize,
    extra_file_counter: usize,
}

impl<'a> ParseState<'a> {
    pub fn new(
        module_path: &'a Path,
        source: &'a str,
        unit: &'a UnitRef,
        types: &'a ProgramIndex,
        units: &'a dyn UnitResolver,
    ) -> Self {
        Self {
            scopes: ScopeStack::new(),
            jump_targets: Vec::new(),
            is_autoload: false,
            types,
            units,
            unit,
            module_path,
            source,
            diagnostics: Diagnostics::new(module_path.display().to_string()),
            used_names: Vec::new(),
            self_type: None,
            closure_counter: 0,
            extra_file_counter: 0,
        }
    }

    /// Runs `f` inside a fresh scope; the scope is left whatever `f` returns.
    pub fn with_scope<T>(&mut self, kind: ScopeKind, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.enter(kind);
        let result = f(self);
        self.scopes.leave();
        result
    }

    /// Runs `f` with `target` as the innermost jump target.
    pub fn with_jump_target<T>(&mut self, target: JumpTarget, f: impl FnOnce(&mut Self) -> T) -> T {
        self.jump_targets.push(target);
        let result = f(self);
        self.jump_targets.pop();
        result
    }

    /// Runs `f` as a function body whose reads are `used`.
    pub fn with_function<T>(
        &mut self,
        used: FxHashSet<String>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.used_names.push(used);
        let saved_targets = std::mem::take(&mut self.jump_targets);
        let result = self.with_scope(ScopeKind::Function, f);
        self.jump_targets = saved_targets;
        self.used_names.pop();
        result
    }

    /// Declares a local or parameter, prefixing `_` when the enclosing function never reads it.
    pub fn declare_local(&mut self, name: &str, ty: Type) -> String {
        let unused = self
            .used_names
            .last()
            .is_some_and(|used| !used.contains(name));
        let emitted = if unused && !name.starts_with('_') {
            format!("_{name}")
        } else {
            name.to_string()
        };
        self.scopes.declare(name, &emitted, ty)
    }

    pub fn next_closure_name(&mut self) -> String {
        let name = format!("__gen_{}", self.closure_counter);
        self.closure_counter += 1;
        name
    }

    pub fn next_extra_file(&mut self, name: Option<&str>) -> UnitRef {
        let suffix = match name {
            Some(name) => name.to_string(),
            None => {
                self.extra_file_counter += 1;
                format!("anonymous_{}", self.extra_file_counter)
            }
        };
        self.unit.sibling(&suffix)
    }

    pub fn report(&mut self, span: Span, kind: DiagnosticKind, message: impl Into<String>) {
        self.diagnostics
            .report(self.source, span, kind, message.into());
    }

    pub fn location(&self, span: Span) -> SourceSpan {
        range_to_span(self.source, span, self.module_path.display().to_string())
    }

    pub fn text(&self, span: Span) -> &'a str {
        span.text(self.source)
    }
}

impl TypeEnv for ParseState<'_> {
    fn binding_type(&self, name: &str) -> Option<Type> {
        self.scopes.lookup(name).map(|b| b.ty.clone())
    }

    fn self_type(&self) -> Option<Type> {
        self.self_type.clone()
    }

    fn annotation_type(&self, ty: &TypeRef) -> Type {
        self.types.type_of_annotation(self.module_path, ty)
    }

    fn resolve_type_name(&self, name: &str) -> Option<Type> {
        self.types.resolve_name(self.module_path, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_merges_side_channels_in_child_order() {
        let mut a = Translation::text("a");
        a.push_extra(LinePosition::Before, "pre_a");
        a.hoisted_helpers.insert(LibraryFunction::Print);
        let mut b = Translation::text("b");
        b.push_extra(LinePosition::After, "post_b");
        b.hoisted_helpers.insert(LibraryFunction::Print);
        b.hoisted_helpers.insert(LibraryFunction::Map);

        let merged = Translation::combine(vec![Some(a), None, Some(b)], |parts| {
            format!("{}({}{})", parts[0], parts[1], parts[2])
        });

        assert_eq!(merged.content, "a(b)");
        assert_eq!(merged.lines_at(LinePosition::Before), vec!["pre_a"]);
        assert_eq!(merged.lines_at(LinePosition::After), vec!["post_b"]);
        assert_eq!(
            merged.hoisted_helpers.iter().copied().collect::<Vec<_>>(),
            vec![LibraryFunction::Print, LibraryFunction::Map]
        );
    }

    #[test]
    fn combine_with_exposes_child_results() {
        let mut cond = Translation::text("x");
        cond.push_extra(LinePosition::After, "x += 1");
        let merged = Translation::combine_with(vec![cond], |children| {
            format!("{} / {}", children[0].content, children[0].lines_at(LinePosition::After).len())
        });
        assert_eq!(merged.content, "x / 1");
        assert_eq!(merged.extra_lines.len(), 1);
    }

    #[test]
    fn into_statement_drains_extra_lines() {
        let mut t = Translation::text("print(x)");
        t.push_extra(LinePosition::After, "x += 1");
        t.push_extra(LinePosition::Before, "y += 1");
        let stmt = t.into_statement();
        assert_eq!(stmt.content, "y += 1\nprint(x)\nx += 1");
        assert!(stmt.extra_lines.is_empty());
    }

    #[test]
    fn indent_skips_blank_lines() {
        assert_eq!(indent("a\n\n  b", 1), "  a\n\n    b");
        assert_eq!(block_body(""), "  pass");
    }
}
