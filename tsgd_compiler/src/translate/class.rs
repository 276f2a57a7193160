use log::debug;

use crate::{
    ast::{Annotation, ClassDecl, ClassMember, ExportFlagsArgs, Expr, ExprKind, MethodDecl, MethodKind, PropertyDecl, StmtKind},
    diagnostics::DiagnosticKind,
    error::CompileError,
    scope::ScopeKind,
    types::{ClassRef, Type, TypeEnv, TypeQuery},
    units::normalize_path,
    usage::{expr_references, referenced_names},
};

use super::{
    OutputFile, ParseState, Translation, block_body,
    expression::{translate_all, translate_expr},
    hoisting::HoistCollector,
    join_lines,
    resolver::{ClassPlacement, class_header, export_payload, is_onready, superclass_type, var_type_hint},
    source_file::render_script,
    statement::{translate_block, translate_params},
};

/// A translated class before it is placed in a file.
pub struct ClassOutput {
    pub header: String,
    /// Member definitions, unindented, with hoists still attached.
    pub body: Translation,
}

pub fn translate_class(
    class: &ClassDecl,
    placement: ClassPlacement,
    state: &mut ParseState,
) -> Result<ClassOutput, CompileError> {
    let self_type = if placement == ClassPlacement::Expression {
        None
    } else {
        let class_ref = ClassRef::User {
            unit: normalize_path(state.module_path),
            name: class.name.clone(),
        };
        state
            .types
            .class_info(&class_ref)
            .is_some()
            .then_some(Type::Class(class_ref))
    };

    let header = class_header(class, placement, state)?;
    let saved_self = std::mem::replace(&mut state.self_type, self_type);
    let body = state.with_scope(ScopeKind::Class, |state| translate_members(class, state));
    state.self_type = saved_self;

    Ok(ClassOutput { header, body: body? })
}

/// A non-default top-level class as an indented `class` block. Inner classes
/// cannot call methods of the outer script, so the helpers and closures they
/// use are defined inside the block; enums stay hoisted.
pub fn translate_inner_class(class: &ClassDecl, state: &mut ParseState) -> Result<Translation, CompileError> {
    let ClassOutput { header, mut body } = translate_class(class, ClassPlacement::Inner, state)?;
    let helpers = join_lines(std::mem::take(&mut body.hoisted_helpers).into_iter().map(|h| h.definition()));
    let closures = join_lines(std::mem::take(&mut body.hoisted_closures).into_values());
    let inner = join_lines([helpers, closures, std::mem::take(&mut body.content)]);
    Ok(body.with_content(format!("{header}\n{}", block_body(&inner))))
}

/// Class expressions become their own script, referenced with `preload`.
pub fn translate_class_expression(class: &ClassDecl, state: &mut ParseState) -> Result<Translation, CompileError> {
    let unit = state.next_extra_file(class.name.as_deref());
    let ClassOutput { header, mut body } = translate_class(class, ClassPlacement::Expression, state)?;

    let mut hoists = HoistCollector::new();
    hoists.collect(&mut body);
    let content = render_script(&header, &mut hoists, "", &body.content);

    debug!("class expression written to {}", unit.gd_path.display());
    let mut out = Translation::text(format!("preload(\"{}\")", unit.res_path));
    out.files = std::mem::take(&mut body.files);
    out.files.push(OutputFile { unit, content });
    Ok(out)
}

fn translate_members(class: &ClassDecl, state: &mut ParseState) -> Result<Translation, CompileError> {
    let superclass = superclass_type(class, state);
    let inherited = match &superclass {
        Some(base) => {
            let mut names = state.types.properties_of(base);
            // properties of the base's own ancestors count too
            for ancestor in state
                .types
                .base_types_of(base)
                .map_err(|e| e.at(state.location(class.span)))?
            {
                names.extend(state.types.properties_of(&ancestor));
            }
            names
        }
        None => Vec::new(),
    };

    let mut properties = Vec::new();
    let mut methods = Vec::new();
    for member in &class.members {
        match member {
            ClassMember::Property(prop) => {
                if !prop.is_static && inherited.contains(&prop.name) {
                    debug!("skipping `{}`, already declared by a superclass", prop.name);
                    continue;
                }
                properties.push(translate_property(prop, state)?);
            }
            ClassMember::Method(method) => methods.push(translate_method(method, state)?),
            ClassMember::Unsupported(what, span) => {
                state.report(
                    *span,
                    DiagnosticKind::UnsupportedSyntax,
                    format!("{what} cannot be translated"),
                );
            }
        }
    }

    let property_count = properties.len();
    let mut children = properties;
    children.extend(methods);
    Ok(Translation::combine(children, |parts| {
        let fields = join_lines(&parts[..property_count]);
        let funcs: Vec<&str> = parts[property_count..]
            .iter()
            .copied()
            .filter(|p| !p.trim().is_empty())
            .collect();
        [fields, funcs.join("\n\n")]
            .into_iter()
            .filter(|section| !section.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }))
}

fn translate_property(prop: &PropertyDecl, state: &mut ParseState) -> Result<Translation, CompileError> {
    let declared = prop.ty.as_ref().map(|t| state.annotation_type(t));

    if declared == Some(Type::Signal) {
        return Ok(match prop.name.strip_prefix('$') {
            Some(name) => Translation::text(format!("signal {name}")),
            None => {
                state.report(
                    prop.span,
                    DiagnosticKind::SignalNamingError,
                    format!("signal `{0}` must be named `${0}`", prop.name),
                );
                Translation::empty()
            }
        });
    }

    let mut value = prop.value.as_ref().map(|v| translate_expr(v, state)).transpose()?;
    if let Some(v) = value.as_mut().filter(|v| !v.extra_lines.is_empty()) {
        state.report(
            prop.span,
            DiagnosticKind::UnsupportedSyntax,
            format!("the initializer of `{}` needs statements, which properties cannot run", prop.name),
        );
        v.extra_lines.clear();
    }

    let ty = match (&declared, &prop.value) {
        (Some(ty), _) => ty.clone(),
        (None, Some(v)) => state.types.type_of_expr(v, &*state),
        (None, None) => Type::Any,
    };

    let mut out = Translation::empty();
    if prop.is_static && prop.is_readonly {
        if let Some(value) = value {
            let line = format!("const {} = {}", prop.name, value.content);
            out.absorb(value);
            return Ok(out.with_content(line));
        }
    }

    let mut prefix = String::new();
    for annotation in &prop.annotations {
        match annotation {
            Annotation::Exports => {
                let (payload, hoisted) = export_payload(&ty, state);
                if let Some((name, mapping)) = hoisted {
                    out.hoisted_enums.entry(name).or_insert(mapping);
                }
                prefix = format!("export({payload}) ");
            }
            Annotation::ExportFlags(ExportFlagsArgs::Call(args)) => {
                let mut flags = Translation::combine(translate_all(args, state)?, |p| {
                    p.iter().map(|f| format!(", {f}")).collect::<String>()
                });
                flags.extra_lines.clear();
                prefix = format!("export(int, FLAGS{}) ", flags.content);
                out.absorb(flags);
            }
            Annotation::ExportFlags(ExportFlagsArgs::Malformed) => {
                state.report(
                    prop.span,
                    DiagnosticKind::ExportMetadataShapeError,
                    "@export_flags must be called with the flag names, like @export_flags(\"A\", \"B\")",
                );
            }
            _ => {}
        }
    }

    let onready = match &prop.value {
        Some(v) if is_onready(v, &ty, state)? => "onready ",
        _ => "",
    };
    let hint = var_type_hint(&ty).map(|h| format!(": {h}")).unwrap_or_default();
    let line = match value {
        Some(value) => {
            let line = format!("{prefix}{onready}var {}{hint} = {}", prop.name, value.content);
            out.absorb(value);
            line
        }
        None => format!("{prefix}var {}{hint}", prop.name),
    };
    Ok(out.with_content(line))
}

/// Parameters the engine passes to its callbacks, for overrides that omit them.
fn engine_callback_params(name: &str) -> Option<&'static str> {
    match name {
        "_process" | "_physics_process" => Some("_delta: float"),
        "_input" | "_unhandled_input" => Some("_event: InputEvent"),
        "_unhandled_key_input" => Some("_event: InputEventKey"),
        _ => None,
    }
}

fn translate_method(method: &MethodDecl, state: &mut ParseState) -> Result<Translation, CompileError> {
    if matches!(method.kind, MethodKind::Getter | MethodKind::Setter) {
        state.report(
            method.span,
            DiagnosticKind::UnsupportedSyntax,
            format!("accessor `{}` cannot be translated, use a method instead", method.name),
        );
        return Ok(Translation::empty());
    }
    let Some(body) = &method.body else {
        return Ok(Translation::empty());
    };

    let mut used = referenced_names(body);
    for default in method.params.iter().filter_map(|p| p.default.as_ref()) {
        used.extend(expr_references(default));
    }

    let (super_args, rest) = match (method.kind, body.first().map(|s| &s.kind)) {
        (MethodKind::Constructor, Some(StmtKind::Expr(Expr { kind: ExprKind::Call { callee, args }, .. })))
            if matches!(callee.kind, ExprKind::Super) =>
        {
            (Some(args.as_slice()), &body[1..])
        }
        _ => (None, &body[..]),
    };

    let (params, super_call, body_t) = state.with_function(used, |state| {
        let mut params = translate_params(&method.params, state)?;
        if method.params.is_empty() {
            if let Some(defaults) = engine_callback_params(&method.name) {
                params = params.with_content(defaults);
            }
        }
        let super_call = super_args
            .map(|args| {
                translate_all(args, state).map(|args| Translation::combine(args, |p| format!(".({})", p.join(", "))))
            })
            .transpose()?;
        let body_t = translate_block(rest, state)?;
        Ok::<_, CompileError>((params, super_call, body_t))
    })?;

    let name = match method.kind {
        MethodKind::Constructor => "_init",
        _ => method.name.as_str(),
    };
    let static_kw = if method.is_static { "static " } else { "" };
    let super_text = super_call.as_ref().map(|s| s.content.clone()).unwrap_or_default();
    let content = format!(
        "{static_kw}func {name}({}){super_text}:\n{}",
        params.content,
        block_body(&body_t.content)
    );

    let mut out = Translation::combine([Some(params), super_call, Some(body_t)], |_| String::new());
    out.extra_lines.clear();
    Ok(out.with_content(content))
}
