use crate::{
    ast::{Expr, ExprKind, FunctionBody, Param, TemplatePart},
    diagnostics::DiagnosticKind,
    error::CompileError,
    types::{Type, TypeQuery},
    usage::{expr_references, referenced_names},
};

use super::{
    LinePosition, ParseState, Translation,
    block_body,
    builtins::{TypeScriptArray, TypeScriptConsole, TypeScriptMath},
    class,
    hoisting::LibraryFunction,
    statement,
};

pub fn translate_expr(expr: &Expr, state: &mut ParseState) -> Result<Translation, CompileError> {
    match &expr.kind {
        ExprKind::Ident(name) => Ok(Translation::text(emitted_name(name, state))),
        ExprKind::This => Ok(Translation::text("self")),
        ExprKind::Super => Ok(Translation::empty()),
        ExprKind::Number(text) => Ok(Translation::text(text.clone())),
        ExprKind::Str(value) => Ok(Translation::text(format!("\"{value}\""))),
        ExprKind::Template(parts) => translate_template(parts, state),
        ExprKind::Bool(value) => Ok(Translation::text(value.to_string())),
        ExprKind::Null => Ok(Translation::text("null")),
        ExprKind::Array(items) => {
            let items = translate_all(items, state)?;
            Ok(Translation::combine(items, |parts| format!("[{}]", parts.join(", "))))
        }
        ExprKind::Object(pairs) => {
            let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
            let mut values = Vec::with_capacity(pairs.len());
            for (_, value) in pairs {
                values.push(translate_expr(value, state)?);
            }
            Ok(Translation::combine(values, |parts| {
                let entries: Vec<String> = keys
                    .iter()
                    .zip(parts)
                    .map(|(k, v)| format!("\"{k}\": {v}"))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }))
        }
        ExprKind::Member { object, property } => translate_member(object, property, state),
        ExprKind::Index { object, index } => {
            let children = vec![translate_expr(object, state)?, translate_expr(index, state)?];
            Ok(Translation::combine(children, |p| format!("{}[{}]", p[0], p[1])))
        }
        ExprKind::Call { callee, args } => translate_call(callee, args, state),
        ExprKind::New { class, args } => {
            let mut children = vec![translate_expr(class, state)?];
            children.extend(translate_all(args, state)?);
            Ok(Translation::combine(children, |p| {
                format!("{}.new({})", p[0], p[1..].join(", "))
            }))
        }
        ExprKind::Unary { op, operand } => {
            let inner = translate_expr(operand, state)?;
            let content = match op.as_str() {
                "!" => format!("not {}", inner.content),
                "typeof" => format!("typeof({})", inner.content),
                "-" | "+" | "~" => format!("{op}{}", inner.content),
                other => {
                    state.report(
                        expr.span,
                        DiagnosticKind::UnsupportedSyntax,
                        format!("the `{other}` operator has no GDScript equivalent"),
                    );
                    inner.content.clone()
                }
            };
            Ok(inner.with_content(content))
        }
        ExprKind::Update {
            increment,
            prefix,
            target,
        } => {
            let mut out = translate_expr(target, state)?;
            let line = format!("{} {} 1", out.content, if *increment { "+=" } else { "-=" });
            let position = if *prefix {
                LinePosition::Before
            } else {
                LinePosition::After
            };
            out.push_extra(position, line);
            Ok(out)
        }
        ExprKind::Binary { op, left, right } => {
            let children = vec![translate_expr(left, state)?, translate_expr(right, state)?];
            let op = op.clone();
            Ok(Translation::combine(children, move |p| {
                binary_text(&op, p[0], p[1])
            }))
        }
        ExprKind::Assign { op, target, value } => {
            // assignment used as a value: run it first, then read the target
            let target_t = translate_expr(target, state)?;
            let value_t = translate_expr(value, state)?;
            let line = format!("{} {} {}", target_t.content, assign_op(op), value_t.content);
            let mut out = Translation::combine(vec![target_t, value_t], |p| p[0].to_string());
            out.push_extra(LinePosition::Before, line);
            Ok(out)
        }
        ExprKind::Ternary {
            cond,
            then,
            otherwise,
        } => {
            let children = vec![
                translate_expr(cond, state)?,
                translate_expr(then, state)?,
                translate_expr(otherwise, state)?,
            ];
            Ok(Translation::combine(children, |p| {
                format!("({} if {} else {})", p[1], p[0], p[2])
            }))
        }
        ExprKind::Sequence(exprs) => {
            let mut out = Translation::empty();
            let count = exprs.len();
            for (i, e) in exprs.iter().enumerate() {
                let t = translate_expr(e, state)?;
                if i + 1 == count {
                    let content = t.content.clone();
                    out.absorb(t);
                    out.content = content;
                } else {
                    let stmt = t.into_statement();
                    out.push_extra(LinePosition::Before, stmt.content.clone());
                    out.absorb(stmt);
                }
            }
            Ok(out)
        }
        ExprKind::Paren(inner) => match &inner.kind {
            ExprKind::Cast { .. } | ExprKind::NonNull(_) => translate_expr(inner.unwrapped(), state),
            _ => {
                let inner = translate_expr(inner, state)?;
                Ok(Translation::combine(vec![inner], |p| format!("({})", p[0])))
            }
        },
        ExprKind::Cast { expr: inner, .. } | ExprKind::NonNull(inner) => translate_expr(inner, state),
        ExprKind::Function { params, body } => translate_closure(params, body, state),
        ExprKind::Class(decl) => class::translate_class_expression(decl, state),
        ExprKind::Unsupported(what) => {
            state.report(
                expr.span,
                DiagnosticKind::UnsupportedSyntax,
                format!("{what} cannot be translated"),
            );
            Ok(Translation::empty())
        }
    }
}

pub fn translate_all(exprs: &[Expr], state: &mut ParseState) -> Result<Vec<Translation>, CompileError> {
    exprs.iter().map(|e| translate_expr(e, state)).collect()
}

fn emitted_name(name: &str, state: &ParseState) -> String {
    state
        .scopes
        .lookup(name)
        .map(|b| b.emitted.clone())
        .unwrap_or_else(|| name.to_string())
}

pub fn assign_op(op: &str) -> &str {
    match op {
        ">>>=" => ">>=",
        other => other,
    }
}

pub fn binary_text(op: &str, left: &str, right: &str) -> String {
    match op {
        "===" | "==" => format!("{left} == {right}"),
        "!==" | "!=" => format!("{left} != {right}"),
        "&&" => format!("{left} and {right}"),
        "||" => format!("{left} or {right}"),
        "**" => format!("pow({left}, {right})"),
        "??" => format!("({left} if {left} != null else {right})"),
        "instanceof" => format!("{left} is {right}"),
        "in" => format!("{right}.has({left})"),
        ">>>" => format!("{left} >> {right}"),
        other => format!("{left} {other} {right}"),
    }
}

fn translate_template(parts: &[TemplatePart], state: &mut ParseState) -> Result<Translation, CompileError> {
    if parts.is_empty() {
        return Ok(Translation::text("\"\""));
    }

    let mut children = Vec::with_capacity(parts.len());
    for part in parts {
        children.push(match part {
            TemplatePart::Text(text) => Translation::text(format!("\"{text}\"")),
            TemplatePart::Expr(e) => {
                let t = translate_expr(e, state)?;
                let content = format!("str({})", t.content);
                t.with_content(content)
            }
        });
    }

    let single = children.len() == 1;
    Ok(Translation::combine(children, |p| {
        if single {
            p[0].to_string()
        } else {
            format!("({})", p.join(" + "))
        }
    }))
}

fn translate_member(object: &Expr, property: &str, state: &mut ParseState) -> Result<Translation, CompileError> {
    if is_global(object, TypeScriptMath::NAME, state) {
        if let Some(constant) = TypeScriptMath::resolve_constant(property) {
            return Ok(Translation::text(constant));
        }
    }
    if matches!(object.kind, ExprKind::Super) {
        return Ok(Translation::text(format!(".{property}")));
    }

    let types = state.types;
    let object_ty = types.type_of_expr(object, &*state).strip_nullable().0;
    let receiver = translate_expr(object, state)?;

    if property == "length" && matches!(object_ty, Type::Array(_) | Type::String) {
        return Ok(Translation::combine(vec![receiver], |p| format!("len({})", p[0])));
    }

    let property = property.to_string();
    Ok(Translation::combine(vec![receiver], move |p| {
        format!("{}.{property}", p[0])
    }))
}

fn translate_call(callee: &Expr, args: &[Expr], state: &mut ParseState) -> Result<Translation, CompileError> {
    match &callee.kind {
        // a parenthesized call target is invalid in GDScript
        ExprKind::Paren(inner) => {
            let target = translate_expr(inner.unwrapped(), state)?;
            let mut children = vec![target];
            children.extend(translate_all(args, state)?);
            Ok(call_with(children))
        }
        ExprKind::Member { object, property } => translate_method_call(object, property, args, state),
        ExprKind::Ident(name) => {
            let args_t = translate_all(args, state)?;
            if name == "print" && args.len() > 1 && !state.scopes.is_local(name) {
                return Ok(print_helper_call(args_t));
            }

            let emitted = emitted_name(name, state);
            let is_funcref = state.scopes.is_local(name)
                && matches!(state.scopes.lookup(name).map(|b| &b.ty), Some(Type::Function(_)));
            let target = if is_funcref {
                format!("{emitted}.call_func")
            } else {
                emitted
            };
            let mut children = vec![Translation::text(target)];
            children.extend(args_t);
            Ok(call_with(children))
        }
        _ => {
            let mut children = vec![translate_expr(callee, state)?];
            children.extend(translate_all(args, state)?);
            Ok(call_with(children))
        }
    }
}

fn translate_method_call(
    object: &Expr,
    property: &str,
    args: &[Expr],
    state: &mut ParseState,
) -> Result<Translation, CompileError> {
    if is_global(object, TypeScriptConsole::NAME, state) {
        if let Some(target) = TypeScriptConsole::resolve_method(property) {
            let args_t = translate_all(args, state)?;
            if target == "print" && args.len() > 1 {
                return Ok(print_helper_call(args_t));
            }
            let mut children = vec![Translation::text(target)];
            children.extend(args_t);
            return Ok(call_with(children));
        }
    }

    if is_global(object, TypeScriptMath::NAME, state) {
        if let Some(target) = TypeScriptMath::resolve_method(property) {
            let mut children = vec![Translation::text(target)];
            children.extend(translate_all(args, state)?);
            return Ok(call_with(children));
        }
    }

    if matches!(object.kind, ExprKind::Super) {
        let mut children = vec![Translation::text(format!(".{property}"))];
        children.extend(translate_all(args, state)?);
        return Ok(call_with(children));
    }

    // this.$signal.emit(args) -> self.emit_signal("signal", args)
    if property == "emit" {
        if let ExprKind::Member {
            object: owner,
            property: signal,
        } = &object.unwrapped().kind
        {
            if let Some(signal) = signal.strip_prefix('$') {
                let mut children = vec![translate_expr(owner, state)?];
                children.extend(translate_all(args, state)?);
                let signal = signal.to_string();
                return Ok(Translation::combine(children, move |p| {
                    let mut call_args = vec![format!("\"{signal}\"")];
                    call_args.extend(p[1..].iter().map(|s| s.to_string()));
                    format!("{}.emit_signal({})", p[0], call_args.join(", "))
                }));
            }
        }
    }

    let types = state.types;
    let object_ty = types.type_of_expr(object, &*state).strip_nullable().0;
    let receiver = translate_expr(object, state)?;
    let args_t = translate_all(args, state)?;

    if matches!(object_ty, Type::Array(_)) {
        if let Some(helper) = LibraryFunction::for_array_method(property) {
            let mut children = vec![receiver];
            children.extend(args_t);
            let mut out = Translation::combine(children, |p| {
                format!("{}({})", helper.name(), p.join(", "))
            });
            out.hoisted_helpers.insert(helper);
            return Ok(out);
        }
        if let Some(target) = TypeScriptArray::resolve_method(property) {
            let mut children = vec![receiver];
            children.extend(args_t);
            return Ok(Translation::combine(children, |p| {
                format!("{}.{target}({})", p[0], p[1..].join(", "))
            }));
        }
    }

    let mut children = vec![receiver];
    children.extend(args_t);
    let property = property.to_string();
    Ok(Translation::combine(children, move |p| {
        format!("{}.{property}({})", p[0], p[1..].join(", "))
    }))
}

fn call_with(children: Vec<Translation>) -> Translation {
    Translation::combine(children, |p| format!("{}({})", p[0], p[1..].join(", ")))
}

fn print_helper_call(args: Vec<Translation>) -> Translation {
    let mut out = Translation::combine(args, |p| {
        format!("{}([{}])", LibraryFunction::Print.name(), p.join(", "))
    });
    out.hoisted_helpers.insert(LibraryFunction::Print);
    out
}

/// Whether `expr` names a global object that no local shadows.
fn is_global(expr: &Expr, name: &str, state: &ParseState) -> bool {
    expr.as_ident() == Some(name) && state.scopes.lookup(name).is_none()
}

/// Lifts a function expression to a file-level method and references it through a funcref.
pub fn translate_closure(
    params: &[Param],
    body: &FunctionBody,
    state: &mut ParseState,
) -> Result<Translation, CompileError> {
    let name = state.next_closure_name();
    let used = match body {
        FunctionBody::Expr(e) => expr_references(e),
        FunctionBody::Block(stmts) => referenced_names(stmts),
    };

    let (signature, body_t) = state.with_function(used, |state| {
        let signature = statement::translate_params(params, state)?;
        let body_t = match body {
            FunctionBody::Expr(e) => {
                let value = translate_expr(e, state)?;
                statement::return_value(value)
            }
            FunctionBody::Block(stmts) => statement::translate_block(stmts, state)?,
        };
        Ok::<_, CompileError>((signature, body_t))
    })?;

    let definition = format!(
        "func {name}({}):\n{}",
        signature.content,
        block_body(&body_t.content)
    );
    let mut out = Translation::text(format!("funcref(self, \"{name}\")"));
    out.absorb(signature);
    out.absorb(body_t);
    out.extra_lines.clear();
    out.hoisted_closures.insert(name, definition);
    Ok(out)
}
