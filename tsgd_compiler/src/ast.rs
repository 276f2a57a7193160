use std::path::PathBuf;

use crate::source_span::Span;

/// One parsed compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub path: PathBuf,
    pub source: String,
    pub body: Vec<Stmt>,
}

impl Module {
    pub fn text(&self, span: Span) -> &str {
        span.text(&self.source)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.body.iter().filter_map(|stmt| match &stmt.kind {
            StmtKind::Class(class) => Some(class),
            _ => None,
        })
    }

    pub fn default_class(&self) -> Option<&ClassDecl> {
        self.classes().find(|c| c.is_default_export)
    }
}

// ---------------------------------------------------
// Statements
// ---------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    Var(VarDecl),
    Expr(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        binding: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    Switch {
        value: Expr,
        cases: Vec<SwitchCase>,
    },
    Block(Vec<Stmt>),
    Return(Option<Expr>),
    Break,
    Continue,
    Empty,
    Class(ClassDecl),
    Function(FunctionDecl),
    Enum(EnumDecl),
    Import(ImportDecl),
    /// Interfaces, type aliases and other type-only statements.
    TypeOnly,
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub kind: VarKind,
    pub declarators: Vec<Declarator>,
    pub is_exported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declarator {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCase {
    /// `None` for `default:`.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub is_declare: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub default: Option<String>,
    pub names: Vec<ImportName>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportName {
    pub imported: String,
    pub local: String,
}

// ---------------------------------------------------
// Classes
// ---------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: Option<String>,
    /// Heritage expressions in source order; more than one is rejected downstream.
    pub extends: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub is_default_export: bool,
    pub is_declare: bool,
    pub members: Vec<ClassMember>,
    pub span: Span,
}

impl ClassDecl {
    pub fn has_annotation(&self, wanted: &Annotation) -> bool {
        self.annotations.iter().any(|a| a == wanted)
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDecl> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Property(p) => Some(p),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Method(m) => Some(m),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassMember {
    Property(PropertyDecl),
    Method(MethodDecl),
    Unsupported(String, Span),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDecl {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub value: Option<Expr>,
    pub annotations: Vec<Annotation>,
    pub is_static: bool,
    pub is_readonly: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Constructor,
    Getter,
    Setter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub kind: MethodKind,
    pub params: Vec<Param>,
    pub return_type: Option<TypeRef>,
    /// `None` for overload signatures and abstract methods.
    pub body: Option<Vec<Stmt>>,
    pub is_static: bool,
    pub span: Span,
}

/// Decorators recognised by the translator, parsed once from source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Exports,
    ExportFlags(ExportFlagsArgs),
    Tool,
    Autoload,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportFlagsArgs {
    /// Arguments of `@export_flags(...)`, in order.
    Call(Vec<Expr>),
    /// Written without a call, as in `@export_flags`.
    Malformed,
}

// ---------------------------------------------------
// Types
// ---------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named { name: String, args: Vec<TypeRef> },
    Array(Box<TypeRef>),
    Tuple(Vec<TypeRef>),
    Union(Vec<TypeRef>),
    Object,
    Function { ret: Box<TypeRef> },
    Null,
    Undefined,
    Literal(String),
    Unknown(String),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

// ---------------------------------------------------
// Expressions
// ---------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Ident(String),
    This,
    Super,
    /// Numeric literal as written.
    Number(String),
    /// String literal body, already escaped for a double-quoted target string.
    Str(String),
    Template(Vec<TemplatePart>),
    Bool(bool),
    Null,
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        class: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
    },
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: String,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Sequence(Vec<Expr>),
    Paren(Box<Expr>),
    Cast {
        expr: Box<Expr>,
        ty: TypeRef,
    },
    NonNull(Box<Expr>),
    Function {
        params: Vec<Param>,
        body: FunctionBody,
    },
    Class(Box<ClassDecl>),
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Strips casts, non-null assertions and grouping parentheses.
    pub fn unwrapped(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner)
            | ExprKind::NonNull(inner)
            | ExprKind::Cast { expr: inner, .. } => inner.unwrapped(),
            _ => self,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }
}
