use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    File,
    Class,
    Function,
    Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Identifier written to the output, after shadow renaming.
    pub emitted: String,
    pub ty: Type,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    names: IndexMap<String, Binding>,
    /// Every identifier emitted here, including ones a later declaration of
    /// the same source name replaced.
    emitted: FxHashSet<String>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            names: IndexMap::new(),
            emitted: FxHashSet::default(),
        }
    }
}

/// Lexical scopes of the unit being translated.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeKind::File)],
        }
    }

    pub fn enter(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    pub fn leave(&mut self) {
        // the file scope is never popped
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declares `name` in the innermost scope and returns the identifier to emit.
    ///
    /// Locals cannot shadow each other inside one target function, so a name
    /// already bound between here and the enclosing function scope gets a
    /// numeric suffix.
    pub fn declare(&mut self, name: &str, emitted: &str, ty: Type) -> String {
        let mut candidate = emitted.to_string();
        let mut suffix = 0;
        while self.taken_in_function(&candidate) {
            suffix += 1;
            candidate = format!("{emitted}_{suffix}");
        }

        if let Some(scope) = self.scopes.last_mut() {
            scope.emitted.insert(candidate.clone());
            scope.names.insert(
                name.to_string(),
                Binding {
                    emitted: candidate.clone(),
                    ty,
                },
            );
        }
        candidate
    }

    fn taken_in_function(&self, emitted: &str) -> bool {
        let Some(innermost) = self.scopes.last() else {
            return false;
        };
        if matches!(innermost.kind, ScopeKind::File | ScopeKind::Class) {
            return false;
        }
        for scope in self.scopes.iter().rev() {
            if scope.emitted.contains(emitted) {
                return true;
            }
            if scope.kind == ScopeKind::Function {
                break;
            }
        }
        false
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.names.get(name))
    }

    /// Whether `name` resolves to a binding declared inside the current function.
    pub fn is_local(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.names.contains_key(name) {
                return true;
            }
            if scope.kind == ScopeKind::Function {
                break;
            }
        }
        false
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_block_shadowing_is_renamed() {
        let mut scopes = ScopeStack::new();
        scopes.enter(ScopeKind::Function);
        assert_eq!(scopes.declare("x", "x", Type::Int), "x");
        scopes.enter(ScopeKind::Block);
        assert_eq!(scopes.declare("x", "x", Type::String), "x_1");
        assert_eq!(scopes.lookup("x").map(|b| b.emitted.as_str()), Some("x_1"));
        scopes.leave();
        assert_eq!(scopes.lookup("x").map(|b| b.ty.clone()), Some(Type::Int));
        scopes.leave();
        assert_eq!(scopes.depth(), 1);
    }

    #[test]
    fn redeclaring_in_one_scope_keeps_earlier_names_taken() {
        let mut scopes = ScopeStack::new();
        scopes.enter(ScopeKind::Function);
        let emitted: Vec<String> = (0..3).map(|_| scopes.declare("i", "i", Type::Int)).collect();
        assert_eq!(emitted, vec!["i", "i_1", "i_2"]);
        assert_eq!(scopes.lookup("i").map(|b| b.emitted.as_str()), Some("i_2"));
    }

    #[test]
    fn separate_functions_do_not_rename() {
        let mut scopes = ScopeStack::new();
        scopes.enter(ScopeKind::Function);
        scopes.declare("i", "i", Type::Int);
        scopes.enter(ScopeKind::Function);
        assert_eq!(scopes.declare("i", "i", Type::Int), "i");
        assert!(scopes.is_local("i"));
    }

    #[test]
    fn file_scope_survives_extra_leaves() {
        let mut scopes = ScopeStack::new();
        scopes.leave();
        scopes.declare("g", "g", Type::Any);
        assert!(scopes.lookup("g").is_some());
    }
}
