use std::path::{Path, PathBuf};

use crate::{
    ast::{Expr, ExprKind, TypeRef},
    error::CompileError,
};

/// Identity of a class, either engine-native or declared in a compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClassRef {
    Native(String),
    /// `name` is `None` for an anonymous default-exported class.
    User { unit: PathBuf, name: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumRef {
    pub unit: PathBuf,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Any,
    Void,
    Null,
    Int,
    Float,
    Bool,
    String,
    Array(Box<Type>),
    Dictionary,
    Function(Box<Type>),
    Signal,
    Class(ClassRef),
    Enum(EnumRef),
    Union(Vec<Type>),
}

impl Type {
    pub fn native(name: &str) -> Self {
        Type::Class(ClassRef::Native(name.to_string()))
    }

    /// Drops `null`/`undefined` members, returning the remaining type and whether any were dropped.
    pub fn strip_nullable(&self) -> (Type, bool) {
        match self {
            Type::Union(members) => {
                let rest: Vec<Type> = members
                    .iter()
                    .filter(|m| **m != Type::Null)
                    .cloned()
                    .collect();
                let nullable = rest.len() != members.len();
                (union_of(rest), nullable)
            }
            Type::Null => (Type::Any, true),
            other => (other.clone(), false),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }
}

/// Flattens and dedupes union members; a single member collapses to itself.
pub fn union_of(members: Vec<Type>) -> Type {
    let mut flat: Vec<Type> = Vec::new();
    for member in members {
        let parts = match member {
            Type::Union(inner) => inner,
            other => vec![other],
        };
        for part in parts {
            if !flat.contains(&part) {
                flat.push(part);
            }
        }
    }
    match flat.len() {
        0 => Type::Any,
        1 => flat.remove(0),
        _ => Type::Union(flat),
    }
}

pub fn number_literal_type(text: &str) -> Type {
    let lower = text.to_ascii_lowercase();
    let is_radix = lower.starts_with("0x") || lower.starts_with("0b") || lower.starts_with("0o");
    if !is_radix && (lower.contains('.') || lower.contains('e')) {
        Type::Float
    } else {
        Type::Int
    }
}

/// Names visible at the expression being typed.
pub trait TypeEnv {
    fn binding_type(&self, name: &str) -> Option<Type>;
    fn self_type(&self) -> Option<Type>;
    fn annotation_type(&self, ty: &TypeRef) -> Type;
    fn resolve_type_name(&self, name: &str) -> Option<Type>;
}

/// Read-only static type information shared by every unit of a build.
pub trait TypeQuery {
    fn type_of_annotation(&self, unit: &Path, ty: &TypeRef) -> Type;

    /// Ancestor chain from the direct base upward. Fails when any class on the
    /// chain has more than one direct base.
    fn base_types_of(&self, ty: &Type) -> Result<Vec<Type>, CompileError>;

    fn stringify_type(&self, ty: &Type) -> String;

    /// Property or method type declared on `ty` or any ancestor.
    fn member_type(&self, ty: &Type, member: &str) -> Option<Type>;

    /// Property names declared on `ty` and all of its ancestors.
    fn properties_of(&self, ty: &Type) -> Vec<String>;

    fn enum_members(&self, e: &EnumRef) -> Option<Vec<(String, i64)>>;

    fn type_of_expr(&self, expr: &Expr, env: &dyn TypeEnv) -> Type {
        match &expr.kind {
            ExprKind::Number(text) => number_literal_type(text),
            ExprKind::Str(_) | ExprKind::Template(_) => Type::String,
            ExprKind::Bool(_) => Type::Bool,
            ExprKind::Null => Type::Null,
            ExprKind::Array(_) => Type::Array(Box::new(Type::Any)),
            ExprKind::Object(_) => Type::Dictionary,
            ExprKind::Ident(name) => env.binding_type(name).unwrap_or(Type::Any),
            ExprKind::This => env.self_type().unwrap_or(Type::Any),
            ExprKind::Member { object, property } => {
                if object.as_ident() == Some("Math") {
                    return Type::Float;
                }
                let object_ty = self.type_of_expr(object, env).strip_nullable().0;
                match (&object_ty, property.as_str()) {
                    (Type::Array(_) | Type::String, "length") => Type::Int,
                    _ => self.member_type(&object_ty, property).unwrap_or(Type::Any),
                }
            }
            ExprKind::Index { object, .. } => match self.type_of_expr(object, env) {
                Type::Array(elem) => *elem,
                _ => Type::Any,
            },
            ExprKind::Call { callee, .. } => match &callee.unwrapped().kind {
                ExprKind::Member { object, property } => {
                    if object.as_ident() == Some("Math") {
                        return Type::Float;
                    }
                    let object_ty = self.type_of_expr(object, env).strip_nullable().0;
                    match self.member_type(&object_ty, property) {
                        Some(Type::Function(ret)) => *ret,
                        _ => Type::Any,
                    }
                }
                ExprKind::Ident(name) => match env.binding_type(name) {
                    Some(Type::Function(ret)) => *ret,
                    _ => Type::Any,
                },
                _ => Type::Any,
            },
            ExprKind::New { class, .. } => class
                .as_ident()
                .and_then(|name| env.resolve_type_name(name))
                .filter(|ty| matches!(ty, Type::Class(_)))
                .unwrap_or(Type::Any),
            ExprKind::Binary { op, left, right } => binary_result_type(
                op,
                self.type_of_expr(left, env),
                self.type_of_expr(right, env),
            ),
            ExprKind::Unary { op, operand } => match op.as_str() {
                "!" => Type::Bool,
                "typeof" => Type::String,
                "~" => Type::Int,
                _ => self.type_of_expr(operand, env),
            },
            ExprKind::Update { target, .. } => self.type_of_expr(target, env),
            ExprKind::Assign { value, .. } => self.type_of_expr(value, env),
            ExprKind::Ternary { then, .. } => self.type_of_expr(then, env),
            ExprKind::Sequence(exprs) => exprs
                .last()
                .map(|last| self.type_of_expr(last, env))
                .unwrap_or(Type::Any),
            ExprKind::Paren(inner) | ExprKind::NonNull(inner) => self.type_of_expr(inner, env),
            ExprKind::Cast { ty, .. } => env.annotation_type(ty),
            ExprKind::Function { .. } => Type::Function(Box::new(Type::Any)),
            ExprKind::Super | ExprKind::Class(_) | ExprKind::Unsupported(_) => Type::Any,
        }
    }
}

fn binary_result_type(op: &str, left: Type, right: Type) -> Type {
    match op {
        "==" | "!=" | "===" | "!==" | "<" | ">" | "<=" | ">=" | "instanceof" | "in" | "&&"
        | "||" => Type::Bool,
        "??" => left.strip_nullable().0,
        "&" | "|" | "^" | "<<" | ">>" | ">>>" => Type::Int,
        "**" => Type::Float,
        "+" if left == Type::String || right == Type::String => Type::String,
        "+" | "-" | "*" | "/" | "%" => match (left, right) {
            (Type::Int, Type::Int) => Type::Int,
            (l, r) if l.is_numeric() && r.is_numeric() => Type::Float,
            (Type::Class(c), _) => Type::Class(c),
            _ => Type::Any,
        },
        _ => Type::Any,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_literals_distinguish_int_and_float() {
        assert_eq!(number_literal_type("1"), Type::Int);
        assert_eq!(number_literal_type("1.0"), Type::Float);
        assert_eq!(number_literal_type("1e3"), Type::Float);
        assert_eq!(number_literal_type("0xE0"), Type::Int);
    }

    #[test]
    fn strip_nullable_keeps_the_non_null_member() {
        let ty = union_of(vec![Type::Int, Type::Null, Type::Null]);
        assert_eq!(ty.strip_nullable(), (Type::Int, true));
        assert_eq!(Type::Float.strip_nullable(), (Type::Float, false));
    }

    #[test]
    fn arithmetic_promotes_to_float() {
        assert_eq!(binary_result_type("+", Type::Int, Type::Int), Type::Int);
        assert_eq!(binary_result_type("*", Type::Int, Type::Float), Type::Float);
        assert_eq!(binary_result_type("+", Type::String, Type::Int), Type::String);
        assert_eq!(binary_result_type("<", Type::Int, Type::Int), Type::Bool);
    }
}
