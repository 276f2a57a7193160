use crate::{
    ast::{EnumDecl, Expr, ExprKind, FunctionBody, FunctionDecl, Param, Stmt, StmtKind, SwitchCase, VarDecl},
    diagnostics::DiagnosticKind,
    error::CompileError,
    index::numbered_members,
    scope::ScopeKind,
    types::{Type, TypeEnv, TypeQuery},
    usage::referenced_names,
};

use super::{
    JumpTarget, LinePosition, ParseState, Translation, block_body,
    expression::{assign_op, translate_closure, translate_expr},
    indent, join_lines,
    resolver::{render_enum, var_type_hint},
};

pub fn translate_stmt(stmt: &Stmt, state: &mut ParseState) -> Result<Translation, CompileError> {
    match &stmt.kind {
        StmtKind::Var(decl) => translate_var(decl, state),
        StmtKind::Expr(expr) => translate_expr_stmt(expr, state),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => translate_if(cond, then, otherwise.as_deref(), state),
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => translate_for(init.as_deref(), cond.as_ref(), update.as_ref(), body, state),
        StmtKind::ForIn {
            binding,
            iterable,
            body,
        } => translate_for_in(binding, iterable, body, state),
        StmtKind::While { cond, body } => {
            let cond_t = translate_expr(cond, state)?;
            let body_t = loop_body(body, None, state)?;
            let (header, prelude) = loop_header(&cond_t);
            let content = format!("{header}\n{}", block_body(&join_lines([prelude, body_t.content.clone()])));
            Ok(finish(vec![cond_t, body_t], content))
        }
        StmtKind::DoWhile { body, cond } => {
            let cond_t = translate_expr(cond, state)?;
            let check = exit_check(&cond_t);
            let body_t = loop_body(body, Some(check.clone()), state)?;
            let content = format!(
                "while true:\n{}",
                block_body(&join_lines([body_t.content.clone(), check]))
            );
            Ok(finish(vec![cond_t, body_t], content))
        }
        StmtKind::Switch { value, cases } => translate_switch(value, cases, state),
        StmtKind::Block(stmts) => state.with_scope(ScopeKind::Block, |state| translate_block(stmts, state)),
        StmtKind::Return(None) => Ok(Translation::text("return")),
        StmtKind::Return(Some(value)) => {
            let value = translate_expr(value, state)?;
            Ok(return_value(value))
        }
        StmtKind::Break => {
            if matches!(state.jump_targets.last(), Some(JumpTarget::SwitchCase)) {
                state.report(
                    stmt.span,
                    DiagnosticKind::UnsupportedSyntax,
                    "`break` inside a switch case is only supported as the last statement of the case",
                );
                return Ok(Translation::empty());
            }
            Ok(Translation::text("break"))
        }
        StmtKind::Continue => match state.jump_targets.last().cloned() {
            Some(JumpTarget::SwitchCase) => {
                // `continue` in a match arm moves on to the next pattern
                state.report(
                    stmt.span,
                    DiagnosticKind::UnsupportedSyntax,
                    "`continue` cannot be used inside a switch case",
                );
                Ok(Translation::empty())
            }
            Some(JumpTarget::Loop(increment)) => Ok(Translation::text(join_lines(
                increment.into_iter().chain(Some("continue".to_string())),
            ))),
            None => Ok(Translation::text("continue")),
        },
        StmtKind::Empty | StmtKind::Import(_) | StmtKind::TypeOnly => Ok(Translation::empty()),
        StmtKind::Class(class) => {
            state.report(
                class.span,
                DiagnosticKind::UnsupportedSyntax,
                "classes can only be declared at the top level of a file",
            );
            Ok(Translation::empty())
        }
        StmtKind::Function(decl) => translate_nested_function(decl, state),
        StmtKind::Enum(decl) => Ok(translate_enum(decl)),
        StmtKind::Unsupported(what) => {
            state.report(
                stmt.span,
                DiagnosticKind::UnsupportedSyntax,
                format!("{what} cannot be translated"),
            );
            Ok(Translation::empty())
        }
    }
}

/// Statements of a block at the current indentation; opens no scope itself.
pub fn translate_block(stmts: &[Stmt], state: &mut ParseState) -> Result<Translation, CompileError> {
    let mut children = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        children.push(translate_stmt(stmt, state)?);
    }
    Ok(Translation::combine(children, |parts| join_lines(parts.iter())))
}

/// Declares parameters in the current function scope and renders the parameter list.
pub fn translate_params(params: &[Param], state: &mut ParseState) -> Result<Translation, CompileError> {
    let mut children = Vec::with_capacity(params.len());
    for param in params {
        let default = param.default.as_ref().map(|d| translate_expr(d, state)).transpose()?;
        let ty = param
            .ty
            .as_ref()
            .map(|t| state.annotation_type(t))
            .unwrap_or(Type::Any);
        let name = state.declare_local(&param.name, ty);
        children.push(match default {
            Some(default) => Translation::combine(vec![default], |p| format!("{name} = {}", p[0])),
            None => Translation::text(name),
        });
    }
    let mut out = Translation::combine(children, |p| p.join(", "));
    out.extra_lines.clear();
    Ok(out)
}

/// `return <value>`, parking the value in a temporary when lines must run after it.
pub fn return_value(value: Translation) -> Translation {
    let before: Vec<String> = value.lines_at(LinePosition::Before).iter().map(|l| l.to_string()).collect();
    let after: Vec<String> = value.lines_at(LinePosition::After).iter().map(|l| l.to_string()).collect();
    let content = if after.is_empty() {
        join_lines(before.into_iter().chain(Some(format!("return {}", value.content))))
    } else {
        join_lines(
            before
                .into_iter()
                .chain(Some(format!("var __ret = {}", value.content)))
                .chain(after)
                .chain(Some("return __ret".to_string())),
        )
    };
    let mut out = Translation::text(content);
    out.absorb(value);
    out.extra_lines.clear();
    out
}

/// A top-level `function`, emitted as a script method.
pub fn translate_function(decl: &FunctionDecl, state: &mut ParseState) -> Result<Translation, CompileError> {
    let (params, body) = state.with_function(referenced_names(&decl.body), |state| {
        let params = translate_params(&decl.params, state)?;
        let body = translate_block(&decl.body, state)?;
        Ok::<_, CompileError>((params, body))
    })?;
    let content = format!(
        "func {}({}):\n{}",
        decl.name,
        params.content,
        block_body(&body.content)
    );
    Ok(finish(vec![params, body], content))
}

fn finish(children: Vec<Translation>, content: String) -> Translation {
    let mut out = Translation::combine(children, |_| String::new()).with_content(content);
    out.extra_lines.clear();
    out
}

fn translate_var(decl: &VarDecl, state: &mut ParseState) -> Result<Translation, CompileError> {
    let mut children = Vec::with_capacity(decl.declarators.len());
    for declarator in &decl.declarators {
        let ty = match (&declarator.ty, &declarator.value) {
            (Some(ty), _) => state.annotation_type(ty),
            (None, Some(value)) => state.types.type_of_expr(value, &*state),
            (None, None) => Type::Any,
        };
        let value = declarator
            .value
            .as_ref()
            .map(|v| translate_expr(v, state))
            .transpose()?;
        let hint = var_type_hint(&ty).map(|h| format!(": {h}")).unwrap_or_default();
        // declared after the initializer so `let x = x + 1` reads the outer binding
        let name = state.declare_local(&declarator.name, ty);
        children.push(match value {
            Some(value) => {
                Translation::combine(vec![value], |p| format!("var {name}{hint} = {}", p[0])).into_statement()
            }
            None => Translation::text(format!("var {name}{hint}")),
        });
    }
    Ok(Translation::combine(children, |p| join_lines(p.iter())))
}

fn translate_expr_stmt(expr: &Expr, state: &mut ParseState) -> Result<Translation, CompileError> {
    match &expr.kind {
        ExprKind::Update {
            increment, target, ..
        } => {
            let target = translate_expr(target, state)?;
            let op = if *increment { "+=" } else { "-=" };
            Ok(Translation::combine(vec![target], |p| format!("{} {op} 1", p[0])).into_statement())
        }
        ExprKind::Assign { op, target, value } => {
            let children = vec![translate_expr(target, state)?, translate_expr(value, state)?];
            let op = assign_op(op).to_string();
            Ok(Translation::combine(children, |p| format!("{} {op} {}", p[0], p[1])).into_statement())
        }
        _ => Ok(translate_expr(expr, state)?.into_statement()),
    }
}

/// A branch or loop body in its own block scope.
fn scoped_body(stmt: &Stmt, state: &mut ParseState) -> Result<Translation, CompileError> {
    state.with_scope(ScopeKind::Block, |state| match &stmt.kind {
        StmtKind::Block(stmts) => translate_block(stmts, state),
        _ => translate_stmt(stmt, state),
    })
}

fn loop_body(stmt: &Stmt, increment: Option<String>, state: &mut ParseState) -> Result<Translation, CompileError> {
    state.with_jump_target(JumpTarget::Loop(increment), |state| scoped_body(stmt, state))
}

/// Loop header for a condition; conditions with extra lines are checked inside the body.
fn loop_header(cond: &Translation) -> (String, String) {
    if cond.extra_lines.is_empty() {
        return (format!("while {}:", cond.content), String::new());
    }
    let before = cond.lines_at(LinePosition::Before);
    let after = cond.lines_at(LinePosition::After);
    let exit = join_lines(after.iter().copied().chain(Some("break")));
    let prelude = join_lines(
        before
            .iter()
            .map(|l| l.to_string())
            .chain(Some(format!("if not ({}):\n{}", cond.content, indent(&exit, 1))))
            .chain(after.iter().map(|l| l.to_string())),
    );
    ("while true:".to_string(), prelude)
}

/// Exit test that closes a `do ... while` body.
fn exit_check(cond: &Translation) -> String {
    let (_, prelude) = loop_header(cond);
    if prelude.is_empty() {
        format!("if not ({}):\n{}", cond.content, indent("break", 1))
    } else {
        prelude
    }
}

fn translate_if(
    cond: &Expr,
    then: &Stmt,
    otherwise: Option<&Stmt>,
    state: &mut ParseState,
) -> Result<Translation, CompileError> {
    let cond_t = translate_expr(cond, state)?;
    let then_t = scoped_body(then, state)?;
    let else_t = otherwise.map(|o| scoped_body(o, state)).transpose()?;

    let mut out = Translation::combine_with(
        [Some(cond_t), Some(then_t), else_t],
        |children| {
            let (cond, then, otherwise) = (&children[0], &children[1], &children[2]);
            let after = cond.lines_at(LinePosition::After);
            let mut lines: Vec<String> = cond
                .lines_at(LinePosition::Before)
                .iter()
                .map(|l| l.to_string())
                .collect();
            lines.push(format!("if {}:", cond.content));
            lines.push(block_body(&join_lines(
                Some(then.content.as_str()).into_iter().chain(after.iter().copied()),
            )));
            let else_body = join_lines(
                Some(otherwise.content.as_str()).into_iter().chain(after.iter().copied()),
            );
            if !else_body.is_empty() {
                lines.push("else:".to_string());
                lines.push(block_body(&else_body));
            }
            lines.join("\n")
        },
    );
    out.extra_lines.clear();
    Ok(out)
}

fn translate_for(
    init: Option<&Stmt>,
    cond: Option<&Expr>,
    update: Option<&Expr>,
    body: &Stmt,
    state: &mut ParseState,
) -> Result<Translation, CompileError> {
    // the initializer's `var` lands in the enclosing block, so it is declared there
    let init_t = init.map(|i| translate_stmt(i, state)).transpose()?;
    let cond_t = cond.map(|c| translate_expr(c, state)).transpose()?;
    let update_t = update.map(|u| translate_expr_stmt(u, state)).transpose()?;
    let increment = update_t
        .as_ref()
        .map(|u| u.content.clone())
        .filter(|u| !u.trim().is_empty());
    let body_t = loop_body(body, increment.clone(), state)?;

    let (header, prelude) = match &cond_t {
        Some(cond) => loop_header(cond),
        None => ("while true:".to_string(), String::new()),
    };
    let loop_body = join_lines([prelude, body_t.content.clone(), increment.unwrap_or_default()]);
    let content = join_lines([
        init_t.as_ref().map(|i| i.content.clone()).unwrap_or_default(),
        format!("{header}\n{}", block_body(&loop_body)),
    ]);

    let mut children: Vec<Translation> = Vec::new();
    children.extend(init_t);
    children.extend(cond_t);
    children.extend(update_t);
    children.push(body_t);
    Ok(finish(children, content))
}

fn translate_for_in(
    binding: &str,
    iterable: &Expr,
    body: &Stmt,
    state: &mut ParseState,
) -> Result<Translation, CompileError> {
    let iterable_t = translate_expr(iterable, state)?;
    let element = match state.types.type_of_expr(iterable, &*state) {
        Type::Array(inner) => *inner,
        _ => Type::Any,
    };
    let (name, body_t) = state.with_scope(ScopeKind::Block, |state| {
        let name = state.declare_local(binding, element);
        let body = loop_body(body, None, state)?;
        Ok::<_, CompileError>((name, body))
    })?;

    // the iterable is evaluated once, so all of its extra lines run before the loop
    let lines = iterable_t
        .lines_at(LinePosition::Before)
        .into_iter()
        .chain(iterable_t.lines_at(LinePosition::After))
        .map(str::to_string)
        .chain(Some(format!(
            "for {name} in {}:\n{}",
            iterable_t.content,
            block_body(&body_t.content)
        )));
    let content = join_lines(lines);
    Ok(finish(vec![iterable_t, body_t], content))
}

fn translate_switch(value: &Expr, cases: &[SwitchCase], state: &mut ParseState) -> Result<Translation, CompileError> {
    let value_t = translate_expr(value, state)?;
    let mut children = Vec::new();
    let mut arms = Vec::new();
    let mut patterns: Vec<String> = Vec::new();

    for case in cases {
        match &case.test {
            Some(test) => {
                let test_t = translate_expr(test, state)?;
                patterns.push(test_t.content.clone());
                children.push(test_t);
            }
            None => patterns.push("_".to_string()),
        }
        // empty cases fall through into the next one
        if case.body.is_empty() {
            continue;
        }
        let body = case_statements(&case.body);
        let body_t = state.with_jump_target(JumpTarget::SwitchCase, |state| {
            state.with_scope(ScopeKind::Block, |state| translate_block(body, state))
        })?;
        let pattern = if patterns.iter().any(|p| p == "_") {
            "_".to_string()
        } else {
            patterns.join(", ")
        };
        arms.push(format!("{pattern}:\n{}", block_body(&body_t.content)));
        children.push(body_t);
        patterns.clear();
    }
    if !patterns.is_empty() {
        let pattern = if patterns.iter().any(|p| p == "_") {
            "_".to_string()
        } else {
            patterns.join(", ")
        };
        arms.push(format!("{pattern}:\n{}", block_body("")));
    }

    let statement_prefix = join_lines(value_t.lines_at(LinePosition::Before).into_iter().chain(value_t.lines_at(LinePosition::After)));
    let content = if arms.is_empty() {
        statement_prefix
    } else {
        join_lines([
            statement_prefix,
            format!("match {}:\n{}", value_t.content, indent(&arms.join("\n"), 1)),
        ])
    };
    children.insert(0, value_t);
    Ok(finish(children, content))
}

/// Statements of a case body without its closing `break`. A body written as a
/// single braced block is unwrapped first.
fn case_statements(body: &[Stmt]) -> &[Stmt] {
    let body = match body {
        [Stmt {
            kind: StmtKind::Block(inner),
            ..
        }] => inner.as_slice(),
        _ => body,
    };
    match body {
        [
            rest @ ..,
            Stmt {
                kind: StmtKind::Break,
                ..
            },
        ] => rest,
        _ => body,
    }
}

fn translate_nested_function(decl: &FunctionDecl, state: &mut ParseState) -> Result<Translation, CompileError> {
    let closure = translate_closure(&decl.params, &FunctionBody::Block(decl.body.clone()), state)?;
    let name = state.declare_local(&decl.name, Type::Function(Box::new(Type::Any)));
    Ok(Translation::combine(vec![closure], |p| format!("var {name} = {}", p[0])))
}

fn translate_enum(decl: &EnumDecl) -> Translation {
    if decl.is_declare {
        return Translation::empty();
    }
    Translation::text(render_enum(&decl.name, &numbered_members(decl)))
}
