use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser};

use crate::{ast::*, error::CompileError, source_span::Span};

pub struct TypeScriptParser {
    parser: Parser,
}

impl TypeScriptParser {
    pub fn new() -> Result<Self, CompileError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .map_err(|err| CompileError::Parse {
                path: PathBuf::new(),
                message: format!("error loading TypeScript grammar: {err}"),
            })?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, path: &Path, source: String) -> Result<Module, CompileError> {
        let tree = self
            .parser
            .parse(&source, None)
            .ok_or_else(|| CompileError::Parse {
                path: path.to_path_buf(),
                message: "failed to parse TypeScript source".into(),
            })?;

        let body = NodeReader { source: &source }.statements(tree.root_node());
        log::debug!("parsed {} ({} top-level statements)", path.display(), body.len());

        Ok(Module {
            path: path.to_path_buf(),
            source,
            body,
        })
    }
}

/// Parses a single source text; convenient for one-off compiles.
pub fn parse_module(path: impl AsRef<Path>, source: impl Into<String>) -> Result<Module, CompileError> {
    TypeScriptParser::new()?.parse(path.as_ref(), source.into())
}

/// Lowers tree-sitter nodes into the owned syntax tree.
struct NodeReader<'s> {
    source: &'s str,
}

impl<'s> NodeReader<'s> {
    // ---------------------------------------------------
    // Statements
    // ---------------------------------------------------

    fn statements(&self, node: Node) -> Vec<Stmt> {
        named_children(node)
            .into_iter()
            .map(|child| self.statement(child))
            .collect()
    }

    fn statement(&self, node: Node) -> Stmt {
        let kind = match node.kind() {
            "expression_statement" => match named_children(node).into_iter().next() {
                Some(expr) => StmtKind::Expr(self.expression(expr)),
                None => StmtKind::Empty,
            },
            "lexical_declaration" | "variable_declaration" => StmtKind::Var(self.var_decl(node)),
            "if_statement" => StmtKind::If {
                cond: self.condition(node),
                then: Box::new(self.stmt_field(node, "consequence")),
                otherwise: node
                    .child_by_field_name("alternative")
                    .and_then(|alt| named_children(alt).into_iter().next())
                    .map(|stmt| Box::new(self.statement(stmt))),
            },
            "for_statement" => self.for_statement(node),
            "for_in_statement" => self.for_in_statement(node),
            "while_statement" => StmtKind::While {
                cond: self.condition(node),
                body: Box::new(self.stmt_field(node, "body")),
            },
            "do_statement" => StmtKind::DoWhile {
                body: Box::new(self.stmt_field(node, "body")),
                cond: self.condition(node),
            },
            "switch_statement" => self.switch_statement(node),
            "statement_block" => StmtKind::Block(self.statements(node)),
            "return_statement" => {
                StmtKind::Return(named_children(node).into_iter().next().map(|e| self.expression(e)))
            }
            "break_statement" => StmtKind::Break,
            "continue_statement" => StmtKind::Continue,
            "empty_statement" => StmtKind::Empty,
            "class_declaration" | "abstract_class_declaration" => {
                StmtKind::Class(self.class_decl(node))
            }
            "function_declaration" => StmtKind::Function(self.function_decl(node)),
            "enum_declaration" => StmtKind::Enum(self.enum_decl(node)),
            "import_statement" => StmtKind::Import(self.import_decl(node)),
            "export_statement" => return self.export_statement(node),
            "ambient_declaration" => return self.ambient_declaration(node),
            "interface_declaration" | "type_alias_declaration" | "module"
            | "internal_module" => StmtKind::TypeOnly,
            "ERROR" => StmtKind::Unsupported("unparsable syntax".into()),
            other => StmtKind::Unsupported(format!("`{other}` statements")),
        };

        Stmt {
            kind,
            span: span_of(node),
        }
    }

    fn stmt_field(&self, node: Node, field: &str) -> Stmt {
        match node.child_by_field_name(field) {
            Some(child) => self.statement(child),
            None => Stmt {
                kind: StmtKind::Empty,
                span: span_of(node),
            },
        }
    }

    /// Reads the `condition` field, dropping the parentheses that are part of the statement syntax.
    fn condition(&self, node: Node) -> Expr {
        match node.child_by_field_name("condition") {
            Some(cond) if cond.kind() == "parenthesized_expression" => {
                match named_children(cond).into_iter().next() {
                    Some(inner) => self.expression(inner),
                    None => self.unsupported(cond, "empty condition"),
                }
            }
            Some(cond) => self.expression(cond),
            None => self.unsupported(node, "missing condition"),
        }
    }

    fn var_decl(&self, node: Node) -> VarDecl {
        let kind = if has_token(node, "const") {
            VarKind::Const
        } else if has_token(node, "var") {
            VarKind::Var
        } else {
            VarKind::Let
        };

        let declarators = named_children(node)
            .into_iter()
            .filter(|child| child.kind() == "variable_declarator")
            .map(|child| Declarator {
                name: child
                    .child_by_field_name("name")
                    .map(|n| self.text(n))
                    .unwrap_or_default(),
                ty: child.child_by_field_name("type").map(|t| self.type_ref(t)),
                value: child.child_by_field_name("value").map(|v| self.expression(v)),
                span: span_of(child),
            })
            .collect();

        VarDecl {
            kind,
            declarators,
            is_exported: false,
        }
    }

    fn for_statement(&self, node: Node) -> StmtKind {
        let init = node
            .child_by_field_name("initializer")
            .and_then(|init| match init.kind() {
                "empty_statement" | ";" => None,
                "lexical_declaration" | "variable_declaration" | "expression_statement" => {
                    Some(Box::new(self.statement(init)))
                }
                _ => Some(Box::new(Stmt {
                    kind: StmtKind::Expr(self.expression(init)),
                    span: span_of(init),
                })),
            });

        let cond = node
            .child_by_field_name("condition")
            .and_then(|cond| match cond.kind() {
                "empty_statement" | ";" => None,
                "expression_statement" => named_children(cond)
                    .into_iter()
                    .next()
                    .map(|e| self.expression(e)),
                _ => Some(self.expression(cond)),
            });

        StmtKind::For {
            init,
            cond,
            update: node
                .child_by_field_name("increment")
                .map(|incr| self.expression(incr)),
            body: Box::new(self.stmt_field(node, "body")),
        }
    }

    fn for_in_statement(&self, node: Node) -> StmtKind {
        let Some(left) = node.child_by_field_name("left") else {
            return StmtKind::Unsupported("for-in without a binding".into());
        };
        if left.kind() != "identifier" {
            return StmtKind::Unsupported("destructuring in for-in/for-of".into());
        }

        StmtKind::ForIn {
            binding: self.text(left),
            iterable: self.expr_field(node, "right"),
            body: Box::new(self.stmt_field(node, "body")),
        }
    }

    fn switch_statement(&self, node: Node) -> StmtKind {
        let value = match node.child_by_field_name("value") {
            Some(value) if value.kind() == "parenthesized_expression" => {
                match named_children(value).into_iter().next() {
                    Some(inner) => self.expression(inner),
                    None => self.unsupported(value, "empty switch value"),
                }
            }
            Some(value) => self.expression(value),
            None => self.unsupported(node, "missing switch value"),
        };

        let mut cases = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            for case in named_children(body) {
                match case.kind() {
                    "switch_case" => {
                        let test = case.child_by_field_name("value");
                        let body = named_children(case)
                            .into_iter()
                            .filter(|child| Some(child.id()) != test.map(|t| t.id()))
                            .map(|child| self.statement(child))
                            .collect();
                        cases.push(SwitchCase {
                            test: test.map(|t| self.expression(t)),
                            body,
                        });
                    }
                    "switch_default" => cases.push(SwitchCase {
                        test: None,
                        body: self.statements(case),
                    }),
                    _ => {}
                }
            }
        }

        StmtKind::Switch { value, cases }
    }

    fn export_statement(&self, node: Node) -> Stmt {
        let decorators: Vec<Annotation> = children(node)
            .into_iter()
            .filter(|child| child.kind() == "decorator")
            .map(|child| self.annotation(child))
            .collect();
        let is_default = has_token(node, "default");

        if let Some(decl) = node.child_by_field_name("declaration") {
            let mut stmt = self.statement(decl);
            match &mut stmt.kind {
                StmtKind::Class(class) => {
                    class.is_default_export = is_default;
                    class.annotations.splice(0..0, decorators);
                }
                StmtKind::Var(var) => var.is_exported = true,
                _ => {}
            }
            stmt.span = span_of(node);
            return stmt;
        }

        let kind = match node.child_by_field_name("value") {
            Some(value) if value.kind() == "class" => {
                let mut class = self.class_decl(value);
                class.is_default_export = is_default;
                class.annotations.splice(0..0, decorators);
                StmtKind::Class(class)
            }
            _ => StmtKind::TypeOnly,
        };

        Stmt {
            kind,
            span: span_of(node),
        }
    }

    fn ambient_declaration(&self, node: Node) -> Stmt {
        let kind = match named_children(node).into_iter().next() {
            Some(decl) => match self.statement(decl).kind {
                StmtKind::Class(mut class) => {
                    class.is_declare = true;
                    StmtKind::Class(class)
                }
                StmtKind::Enum(mut decl) => {
                    decl.is_declare = true;
                    StmtKind::Enum(decl)
                }
                _ => StmtKind::TypeOnly,
            },
            None => StmtKind::TypeOnly,
        };

        Stmt {
            kind,
            span: span_of(node),
        }
    }

    fn function_decl(&self, node: Node) -> FunctionDecl {
        FunctionDecl {
            name: node
                .child_by_field_name("name")
                .map(|n| self.text(n))
                .unwrap_or_default(),
            params: self.params(node),
            body: node
                .child_by_field_name("body")
                .map(|b| self.statements(b))
                .unwrap_or_default(),
            span: span_of(node),
        }
    }

    fn enum_decl(&self, node: Node) -> EnumDecl {
        let mut members = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            for member in named_children(body) {
                match member.kind() {
                    "property_identifier" | "identifier" => members.push(EnumMember {
                        name: self.text(member),
                        value: None,
                    }),
                    "string" => members.push(EnumMember {
                        name: self.string_value(member),
                        value: None,
                    }),
                    "enum_assignment" => members.push(EnumMember {
                        name: member
                            .child_by_field_name("name")
                            .map(|n| self.text(n).trim_matches(['"', '\'']).to_string())
                            .unwrap_or_default(),
                        value: member
                            .child_by_field_name("value")
                            .and_then(|v| self.text(v).replace(' ', "").parse::<i64>().ok()),
                    }),
                    _ => {}
                }
            }
        }

        EnumDecl {
            name: node
                .child_by_field_name("name")
                .map(|n| self.text(n))
                .unwrap_or_default(),
            members,
            is_declare: false,
            span: span_of(node),
        }
    }

    fn import_decl(&self, node: Node) -> ImportDecl {
        let mut default = None;
        let mut names = Vec::new();

        for child in named_children(node) {
            if child.kind() != "import_clause" {
                continue;
            }
            for part in named_children(child) {
                match part.kind() {
                    "identifier" => default = Some(self.text(part)),
                    "named_imports" => {
                        for spec in named_children(part) {
                            let Some(name) = spec.child_by_field_name("name") else {
                                continue;
                            };
                            let imported = self.text(name);
                            let local = spec
                                .child_by_field_name("alias")
                                .map(|a| self.text(a))
                                .unwrap_or_else(|| imported.clone());
                            names.push(ImportName { imported, local });
                        }
                    }
                    _ => {}
                }
            }
        }

        ImportDecl {
            default,
            names,
            source: node
                .child_by_field_name("source")
                .map(|s| self.string_value(s))
                .unwrap_or_default(),
        }
    }

    // ---------------------------------------------------
    // Classes
    // ---------------------------------------------------

    fn class_decl(&self, node: Node) -> ClassDecl {
        let mut annotations = Vec::new();
        let mut extends = Vec::new();

        for child in children(node) {
            match child.kind() {
                "decorator" => annotations.push(self.annotation(child)),
                "class_heritage" => {
                    for clause in named_children(child) {
                        if clause.kind() != "extends_clause" {
                            continue;
                        }
                        for value in named_children(clause) {
                            if value.kind() != "type_arguments" {
                                extends.push(self.text(value));
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let mut members = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut pending = Vec::new();
            for member in named_children(body) {
                match member.kind() {
                    "decorator" => pending.push(self.annotation(member)),
                    "public_field_definition" => {
                        let mut prop = self.property(member);
                        prop.annotations.splice(0..0, pending.drain(..));
                        members.push(ClassMember::Property(prop));
                    }
                    "method_definition" => {
                        pending.clear();
                        members.push(ClassMember::Method(self.method(member)));
                    }
                    "method_signature" | "abstract_method_signature" | "index_signature" => {
                        pending.clear();
                    }
                    other => {
                        pending.clear();
                        members.push(ClassMember::Unsupported(
                            format!("`{other}` class members"),
                            span_of(member),
                        ));
                    }
                }
            }
        }

        ClassDecl {
            name: node.child_by_field_name("name").map(|n| self.text(n)),
            extends,
            annotations,
            is_default_export: false,
            is_declare: false,
            members,
            span: span_of(node),
        }
    }

    fn property(&self, node: Node) -> PropertyDecl {
        PropertyDecl {
            name: node
                .child_by_field_name("name")
                .map(|n| self.member_name(n))
                .unwrap_or_default(),
            ty: node.child_by_field_name("type").map(|t| self.type_ref(t)),
            value: node.child_by_field_name("value").map(|v| self.expression(v)),
            annotations: children(node)
                .into_iter()
                .filter(|child| child.kind() == "decorator")
                .map(|child| self.annotation(child))
                .collect(),
            is_static: has_token(node, "static"),
            is_readonly: has_token(node, "readonly"),
            span: span_of(node),
        }
    }

    fn method(&self, node: Node) -> MethodDecl {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.member_name(n))
            .unwrap_or_default();
        let kind = if name == "constructor" {
            MethodKind::Constructor
        } else if has_token(node, "get") {
            MethodKind::Getter
        } else if has_token(node, "set") {
            MethodKind::Setter
        } else {
            MethodKind::Method
        };

        MethodDecl {
            name,
            kind,
            params: self.params(node),
            return_type: node
                .child_by_field_name("return_type")
                .map(|t| self.type_ref(t)),
            body: node
                .child_by_field_name("body")
                .map(|b| self.statements(b)),
            is_static: has_token(node, "static"),
            span: span_of(node),
        }
    }

    fn params(&self, node: Node) -> Vec<Param> {
        let Some(list) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };

        named_children(list)
            .into_iter()
            .filter(|p| matches!(p.kind(), "required_parameter" | "optional_parameter"))
            .filter_map(|p| {
                let pattern = p.child_by_field_name("pattern")?;
                if pattern.kind() == "this" {
                    return None;
                }
                Some(Param {
                    name: self.text(pattern).trim_start_matches("...").to_string(),
                    ty: p.child_by_field_name("type").map(|t| self.type_ref(t)),
                    default: p.child_by_field_name("value").map(|v| self.expression(v)),
                    span: span_of(p),
                })
            })
            .collect()
    }

    fn member_name(&self, node: Node) -> String {
        match node.kind() {
            "string" => self.string_value(node),
            _ => self.text(node).trim_start_matches('#').to_string(),
        }
    }

    fn annotation(&self, node: Node) -> Annotation {
        let Some(inner) = named_children(node).into_iter().next() else {
            return Annotation::Unknown(String::new());
        };

        match inner.kind() {
            "identifier" => annotation_by_name(&self.text(inner), None),
            "call_expression" => {
                let name = inner
                    .child_by_field_name("function")
                    .map(|f| self.text(f))
                    .unwrap_or_default();
                let args = inner
                    .child_by_field_name("arguments")
                    .map(|args| {
                        named_children(args)
                            .into_iter()
                            .map(|arg| self.expression(arg))
                            .collect()
                    })
                    .unwrap_or_default();
                annotation_by_name(&name, Some(args))
            }
            _ => Annotation::Unknown(self.text(inner)),
        }
    }

    // ---------------------------------------------------
    // Types
    // ---------------------------------------------------

    fn type_ref(&self, node: Node) -> TypeRef {
        match node.kind() {
            "type_annotation"
            | "opting_type_annotation"
            | "omitting_type_annotation"
            | "parenthesized_type"
            | "readonly_type" => match named_children(node).into_iter().next() {
                Some(inner) => self.type_ref(inner),
                None => TypeRef::Unknown(self.text(node)),
            },
            "predefined_type" | "type_identifier" | "nested_type_identifier" | "identifier" => {
                match self.text(node).as_str() {
                    "undefined" => TypeRef::Undefined,
                    "null" => TypeRef::Null,
                    name => TypeRef::named(name),
                }
            }
            "generic_type" => TypeRef::Named {
                name: node
                    .child_by_field_name("name")
                    .map(|n| self.text(n))
                    .unwrap_or_default(),
                args: node
                    .child_by_field_name("type_arguments")
                    .map(|args| {
                        named_children(args)
                            .into_iter()
                            .map(|arg| self.type_ref(arg))
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            "array_type" => match named_children(node).into_iter().next() {
                Some(elem) => TypeRef::Array(Box::new(self.type_ref(elem))),
                None => TypeRef::Unknown(self.text(node)),
            },
            "tuple_type" => TypeRef::Tuple(
                named_children(node)
                    .into_iter()
                    .map(|t| self.type_ref(t))
                    .collect(),
            ),
            "union_type" => {
                let mut members = Vec::new();
                for child in named_children(node) {
                    match self.type_ref(child) {
                        TypeRef::Union(inner) => members.extend(inner),
                        other => members.push(other),
                    }
                }
                TypeRef::Union(members)
            }
            "object_type" => TypeRef::Object,
            "function_type" | "constructor_type" => TypeRef::Function {
                ret: Box::new(
                    node.child_by_field_name("return_type")
                        .map(|r| self.type_ref(r))
                        .unwrap_or(TypeRef::Unknown(String::new())),
                ),
            },
            "literal_type" => match named_children(node).into_iter().next() {
                Some(lit) if lit.kind() == "null" => TypeRef::Null,
                Some(lit) if lit.kind() == "undefined" => TypeRef::Undefined,
                _ => TypeRef::Literal(self.text(node)),
            },
            "null" => TypeRef::Null,
            "undefined" => TypeRef::Undefined,
            _ => TypeRef::Unknown(self.text(node)),
        }
    }

    // ---------------------------------------------------
    // Expressions
    // ---------------------------------------------------

    fn expression(&self, node: Node) -> Expr {
        let kind = match node.kind() {
            "identifier" | "shorthand_property_identifier" | "property_identifier" => {
                match self.text(node).as_str() {
                    "undefined" => ExprKind::Null,
                    name => ExprKind::Ident(name.to_string()),
                }
            }
            "this" => ExprKind::This,
            "super" => ExprKind::Super,
            "number" => ExprKind::Number(self.text(node)),
            "string" => ExprKind::Str(self.string_value(node)),
            "template_string" => ExprKind::Template(self.template_parts(node)),
            "true" => ExprKind::Bool(true),
            "false" => ExprKind::Bool(false),
            "null" | "undefined" => ExprKind::Null,
            "array" => ExprKind::Array(
                named_children(node)
                    .into_iter()
                    .map(|e| self.expression(e))
                    .collect(),
            ),
            "object" => return self.object(node),
            "member_expression" => ExprKind::Member {
                object: Box::new(self.expr_field(node, "object")),
                property: node
                    .child_by_field_name("property")
                    .map(|p| self.text(p).trim_start_matches('#').to_string())
                    .unwrap_or_default(),
            },
            "subscript_expression" => ExprKind::Index {
                object: Box::new(self.expr_field(node, "object")),
                index: Box::new(self.expr_field(node, "index")),
            },
            "call_expression" => match node.child_by_field_name("arguments") {
                Some(args) if args.kind() == "arguments" => ExprKind::Call {
                    callee: Box::new(self.expr_field(node, "function")),
                    args: self.arguments(args),
                },
                _ => ExprKind::Unsupported("tagged templates".into()),
            },
            "new_expression" => ExprKind::New {
                class: Box::new(self.expr_field(node, "constructor")),
                args: node
                    .child_by_field_name("arguments")
                    .map(|args| self.arguments(args))
                    .unwrap_or_default(),
            },
            "unary_expression" => ExprKind::Unary {
                op: node
                    .child_by_field_name("operator")
                    .map(|op| self.text(op))
                    .unwrap_or_default(),
                operand: Box::new(self.expr_field(node, "argument")),
            },
            "update_expression" => {
                match (
                    node.child_by_field_name("operator"),
                    node.child_by_field_name("argument"),
                ) {
                    (Some(op), Some(arg)) => ExprKind::Update {
                        increment: self.text(op) == "++",
                        prefix: op.start_byte() < arg.start_byte(),
                        target: Box::new(self.expression(arg)),
                    },
                    _ => ExprKind::Unsupported("malformed update expression".into()),
                }
            }
            "binary_expression" => ExprKind::Binary {
                op: node
                    .child_by_field_name("operator")
                    .map(|op| self.text(op))
                    .unwrap_or_default(),
                left: Box::new(self.expr_field(node, "left")),
                right: Box::new(self.expr_field(node, "right")),
            },
            "assignment_expression" => ExprKind::Assign {
                op: "=".into(),
                target: Box::new(self.expr_field(node, "left")),
                value: Box::new(self.expr_field(node, "right")),
            },
            "augmented_assignment_expression" => ExprKind::Assign {
                op: node
                    .child_by_field_name("operator")
                    .map(|op| self.text(op))
                    .unwrap_or_else(|| "=".into()),
                target: Box::new(self.expr_field(node, "left")),
                value: Box::new(self.expr_field(node, "right")),
            },
            "ternary_expression" => ExprKind::Ternary {
                cond: Box::new(self.expr_field(node, "condition")),
                then: Box::new(self.expr_field(node, "consequence")),
                otherwise: Box::new(self.expr_field(node, "alternative")),
            },
            "parenthesized_expression" => match named_children(node).into_iter().next() {
                Some(inner) => ExprKind::Paren(Box::new(self.expression(inner))),
                None => ExprKind::Unsupported("empty parentheses".into()),
            },
            "as_expression" | "satisfies_expression" => {
                let parts = named_children(node);
                match parts.first() {
                    Some(inner) => ExprKind::Cast {
                        expr: Box::new(self.expression(*inner)),
                        ty: parts
                            .get(1)
                            .map(|t| self.type_ref(*t))
                            .unwrap_or(TypeRef::Unknown("const".into())),
                    },
                    None => ExprKind::Unsupported("empty cast".into()),
                }
            }
            "type_assertion" => {
                let parts = named_children(node);
                match (parts.first(), parts.get(1)) {
                    (Some(ty), Some(inner)) => ExprKind::Cast {
                        expr: Box::new(self.expression(*inner)),
                        ty: named_children(*ty)
                            .into_iter()
                            .next()
                            .map(|t| self.type_ref(t))
                            .unwrap_or(TypeRef::Unknown(String::new())),
                    },
                    _ => ExprKind::Unsupported("malformed type assertion".into()),
                }
            }
            "non_null_expression" => match named_children(node).into_iter().next() {
                Some(inner) => ExprKind::NonNull(Box::new(self.expression(inner))),
                None => ExprKind::Unsupported("empty non-null assertion".into()),
            },
            "sequence_expression" => {
                let mut exprs = Vec::new();
                for child in named_children(node) {
                    match self.expression(child).kind {
                        ExprKind::Sequence(inner) => exprs.extend(inner),
                        kind => exprs.push(Expr::new(kind, span_of(child))),
                    }
                }
                ExprKind::Sequence(exprs)
            }
            "arrow_function" => {
                let params = match node.child_by_field_name("parameter") {
                    Some(single) => vec![Param {
                        name: self.text(single),
                        ty: None,
                        default: None,
                        span: span_of(single),
                    }],
                    None => self.params(node),
                };
                ExprKind::Function {
                    params,
                    body: self.function_body(node),
                }
            }
            "function_expression" | "function" => ExprKind::Function {
                params: self.params(node),
                body: self.function_body(node),
            },
            "class" => ExprKind::Class(Box::new(self.class_decl(node))),
            "ERROR" => ExprKind::Unsupported("unparsable expression".into()),
            other => ExprKind::Unsupported(format!("`{other}` expressions")),
        };

        Expr::new(kind, span_of(node))
    }

    fn expr_field(&self, node: Node, field: &str) -> Expr {
        match node.child_by_field_name(field) {
            Some(child) => self.expression(child),
            None => self.unsupported(node, &format!("missing `{field}`")),
        }
    }

    fn unsupported(&self, node: Node, what: &str) -> Expr {
        Expr::new(ExprKind::Unsupported(what.to_string()), span_of(node))
    }

    fn arguments(&self, node: Node) -> Vec<Expr> {
        named_children(node)
            .into_iter()
            .map(|arg| self.expression(arg))
            .collect()
    }

    fn function_body(&self, node: Node) -> FunctionBody {
        match node.child_by_field_name("body") {
            Some(body) if body.kind() == "statement_block" => {
                FunctionBody::Block(self.statements(body))
            }
            Some(body) => FunctionBody::Expr(Box::new(self.expression(body))),
            None => FunctionBody::Block(Vec::new()),
        }
    }

    fn object(&self, node: Node) -> Expr {
        let mut pairs = Vec::new();
        for entry in named_children(node) {
            match entry.kind() {
                "pair" => {
                    let key = entry.child_by_field_name("key").map(|k| match k.kind() {
                        "string" => Some(self.string_value(k)),
                        "property_identifier" | "number" => Some(self.text(k)),
                        _ => None,
                    });
                    match key.flatten() {
                        Some(key) => pairs.push((key, self.expr_field(entry, "value"))),
                        None => return self.unsupported(entry, "computed object keys"),
                    }
                }
                "shorthand_property_identifier" => {
                    let name = self.text(entry);
                    pairs.push((name.clone(), Expr::new(ExprKind::Ident(name), span_of(entry))));
                }
                other => return self.unsupported(entry, &format!("`{other}` in object literals")),
            }
        }
        Expr::new(ExprKind::Object(pairs), span_of(node))
    }

    /// Splits a template literal into raw text runs and substitutions by byte position.
    fn template_parts(&self, node: Node) -> Vec<TemplatePart> {
        let mut parts = Vec::new();
        let mut cursor = node.start_byte() + 1;
        let end = node.end_byte().saturating_sub(1);

        for child in named_children(node) {
            if child.kind() != "template_substitution" {
                continue;
            }
            let raw = self.source.get(cursor..child.start_byte()).unwrap_or("");
            if !raw.is_empty() {
                parts.push(TemplatePart::Text(template_text(raw)));
            }
            if let Some(inner) = named_children(child).into_iter().next() {
                parts.push(TemplatePart::Expr(self.expression(inner)));
            }
            cursor = child.end_byte();
        }

        let raw = self.source.get(cursor..end).unwrap_or("");
        if !raw.is_empty() {
            parts.push(TemplatePart::Text(template_text(raw)));
        }
        parts
    }

    fn string_value(&self, node: Node) -> String {
        let text = self.text(node);
        let mut chars = text.chars();
        match chars.next() {
            Some('\'') => requote_single(text.get(1..text.len().saturating_sub(1)).unwrap_or("")),
            Some('"') => text.get(1..text.len().saturating_sub(1)).unwrap_or("").to_string(),
            _ => text,
        }
    }

    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source.as_bytes())
            .unwrap_or("")
            .to_string()
    }
}

fn annotation_by_name(name: &str, args: Option<Vec<Expr>>) -> Annotation {
    match name {
        "exports" => Annotation::Exports,
        "tool" => Annotation::Tool,
        "autoload" => Annotation::Autoload,
        "export_flags" => Annotation::ExportFlags(match args {
            Some(args) => ExportFlagsArgs::Call(args),
            None => ExportFlagsArgs::Malformed,
        }),
        other => Annotation::Unknown(other.to_string()),
    }
}

/// Converts the body of a single-quoted literal into a double-quoted one.
fn requote_single(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}

fn template_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('`') => out.push('`'),
                Some('$') => out.push('$'),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn span_of(node: Node) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

fn children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

fn has_token(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Module {
        parse_module("test.ts", source).expect("parse failed")
    }

    #[test]
    fn parses_default_class_with_decorators_and_heritage() {
        let module = parse("@tool\nexport default class Player extends Node2D {\n  speed = 1;\n}\n");
        let class = module.default_class().expect("default class");
        assert_eq!(class.name.as_deref(), Some("Player"));
        assert_eq!(class.extends, vec!["Node2D".to_string()]);
        assert!(class.has_annotation(&Annotation::Tool));
        assert_eq!(class.properties().count(), 1);
    }

    #[test]
    fn parses_export_flags_payload() {
        let module = parse(
            "export default class A {\n  @export_flags(\"A\", 2)\n  flags = 0;\n  @export_flags\n  bad = 0;\n}\n",
        );
        let class = module.default_class().expect("default class");
        let props: Vec<_> = class.properties().collect();
        let [Annotation::ExportFlags(ExportFlagsArgs::Call(args))] = props[0].annotations.as_slice() else {
            panic!("expected call arguments, got {:?}", props[0].annotations);
        };
        let kinds: Vec<&ExprKind> = args.iter().map(|a| &a.kind).collect();
        assert_eq!(
            kinds,
            vec![&ExprKind::Str("A".into()), &ExprKind::Number("2".into())]
        );
        assert_eq!(
            props[1].annotations,
            vec![Annotation::ExportFlags(ExportFlagsArgs::Malformed)]
        );
    }

    #[test]
    fn distinguishes_prefix_and_postfix_updates() {
        let module = parse("++x;\nx--;\n");
        let updates: Vec<(bool, bool)> = module
            .body
            .iter()
            .filter_map(|stmt| match &stmt.kind {
                StmtKind::Expr(Expr {
                    kind:
                        ExprKind::Update {
                            increment, prefix, ..
                        },
                    ..
                }) => Some((*increment, *prefix)),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec![(true, true), (false, false)]);
    }

    #[test]
    fn union_types_are_flattened() {
        let module = parse("let x: int | null | undefined = 1;\n");
        let StmtKind::Var(decl) = &module.body[0].kind else {
            panic!("expected a variable declaration");
        };
        assert_eq!(
            decl.declarators[0].ty,
            Some(TypeRef::Union(vec![
                TypeRef::named("int"),
                TypeRef::Null,
                TypeRef::Undefined
            ]))
        );
    }

    #[test]
    fn single_quoted_strings_are_requoted() {
        assert_eq!(requote_single(r#"it\'s "ok""#), r#"it's \"ok\""#);
    }
}
