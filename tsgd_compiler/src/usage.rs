use rustc_hash::FxHashSet;

use crate::ast::{ClassMember, Expr, ExprKind, FunctionBody, Stmt, StmtKind, TemplatePart};

/// Identifiers read anywhere inside a function body (including nested closures).
pub fn referenced_names(body: &[Stmt]) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    for stmt in body {
        visit_stmt(stmt, &mut names);
    }
    names
}

pub fn expr_references(expr: &Expr) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    visit_expr(expr, &mut names);
    names
}

fn visit_stmt(stmt: &Stmt, names: &mut FxHashSet<String>) {
    match &stmt.kind {
        StmtKind::Var(decl) => {
            for d in &decl.declarators {
                if let Some(value) = &d.value {
                    visit_expr(value, names);
                }
            }
        }
        StmtKind::Expr(expr) => visit_expr(expr, names),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            visit_expr(cond, names);
            visit_stmt(then, names);
            if let Some(otherwise) = otherwise {
                visit_stmt(otherwise, names);
            }
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            if let Some(init) = init {
                visit_stmt(init, names);
            }
            for expr in cond.iter().chain(update.iter()) {
                visit_expr(expr, names);
            }
            visit_stmt(body, names);
        }
        StmtKind::ForIn { iterable, body, .. } => {
            visit_expr(iterable, names);
            visit_stmt(body, names);
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            visit_expr(cond, names);
            visit_stmt(body, names);
        }
        StmtKind::Switch { value, cases } => {
            visit_expr(value, names);
            for case in cases {
                if let Some(test) = &case.test {
                    visit_expr(test, names);
                }
                for stmt in &case.body {
                    visit_stmt(stmt, names);
                }
            }
        }
        StmtKind::Block(stmts) => {
            for stmt in stmts {
                visit_stmt(stmt, names);
            }
        }
        StmtKind::Return(Some(expr)) => visit_expr(expr, names),
        StmtKind::Function(func) => {
            for stmt in &func.body {
                visit_stmt(stmt, names);
            }
        }
        StmtKind::Class(class) => {
            for member in &class.members {
                match member {
                    ClassMember::Property(p) => {
                        if let Some(value) = &p.value {
                            visit_expr(value, names);
                        }
                    }
                    ClassMember::Method(m) => {
                        for stmt in m.body.iter().flatten() {
                            visit_stmt(stmt, names);
                        }
                    }
                    ClassMember::Unsupported(..) => {}
                }
            }
        }
        _ => {}
    }
}

fn visit_expr(expr: &Expr, names: &mut FxHashSet<String>) {
    match &expr.kind {
        ExprKind::Ident(name) => {
            names.insert(name.clone());
        }
        ExprKind::Template(parts) => {
            for part in parts {
                if let TemplatePart::Expr(e) = part {
                    visit_expr(e, names);
                }
            }
        }
        ExprKind::Array(items) | ExprKind::Sequence(items) => {
            for item in items {
                visit_expr(item, names);
            }
        }
        ExprKind::Object(pairs) => {
            for (_, value) in pairs {
                visit_expr(value, names);
            }
        }
        ExprKind::Member { object, .. } => visit_expr(object, names),
        ExprKind::Index { object, index } => {
            visit_expr(object, names);
            visit_expr(index, names);
        }
        ExprKind::Call { callee, args } | ExprKind::New { class: callee, args } => {
            visit_expr(callee, names);
            for arg in args {
                visit_expr(arg, names);
            }
        }
        ExprKind::Unary { operand: inner, .. }
        | ExprKind::Update { target: inner, .. }
        | ExprKind::Paren(inner)
        | ExprKind::NonNull(inner)
        | ExprKind::Cast { expr: inner, .. } => visit_expr(inner, names),
        ExprKind::Binary { left, right, .. } => {
            visit_expr(left, names);
            visit_expr(right, names);
        }
        ExprKind::Assign { target, value, .. } => {
            visit_expr(target, names);
            visit_expr(value, names);
        }
        ExprKind::Ternary {
            cond,
            then,
            otherwise,
        } => {
            visit_expr(cond, names);
            visit_expr(then, names);
            visit_expr(otherwise, names);
        }
        ExprKind::Function { params, body } => {
            for param in params {
                if let Some(default) = &param.default {
                    visit_expr(default, names);
                }
            }
            match body {
                FunctionBody::Expr(e) => visit_expr(e, names),
                FunctionBody::Block(stmts) => {
                    for stmt in stmts {
                        visit_stmt(stmt, names);
                    }
                }
            }
        }
        ExprKind::Class(class) => {
            for member in &class.members {
                if let ClassMember::Method(m) = member {
                    for stmt in m.body.iter().flatten() {
                        visit_stmt(stmt, names);
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    #[test]
    fn collects_reads_but_not_member_names() {
        let module = parse_module(
            "t.ts",
            "let a = 1;\nlet b = a + c.d;\nfor (const x of xs) { print(`${y}`); }",
        )
        .expect("parse failed");
        let names = referenced_names(&module.body);
        for expected in ["a", "c", "xs", "print", "y"] {
            assert!(names.contains(expected), "missing {expected}");
        }
        assert!(!names.contains("d"));
        assert!(!names.contains("b"));
        assert!(!names.contains("x"));
    }
}
