use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    ast::{Annotation, ClassDecl, Expr},
    diagnostics::DiagnosticKind,
    error::CompileError,
    index::Superclass,
    types::{ClassRef, Type, TypeQuery},
    units::normalize_path,
};

use super::ParseState;

static NODE_LOOKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"get_node\s*\(|get_node_unsafe").expect("valid node lookup pattern"));

/// Engine node types whose instances only exist once the owner is in the scene tree.
const SCENE_NODE_TYPES: [&str; 2] = ["Node2D", "Node"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassPlacement {
    /// The default export, emitted as the file's own script.
    Main,
    /// Any other top-level class, emitted as a nested `class` block.
    Inner,
    /// A class expression, emitted into a separate file.
    Expression,
}

/// Hint written after `var name`; only non-nullable primitives get one.
pub fn var_type_hint(ty: &Type) -> Option<&'static str> {
    match ty {
        Type::Int => Some("int"),
        Type::Float => Some("float"),
        Type::String => Some("String"),
        Type::Bool => Some("bool"),
        _ => None,
    }
}

/// Payload of `export(...)` for a property type, plus an enum mapping to hoist
/// when the enum is declared in another unit.
pub fn export_payload(ty: &Type, state: &ParseState) -> (String, Option<(String, String)>) {
    let (inner, _) = ty.strip_nullable();
    match &inner {
        Type::Int => ("int".into(), None),
        Type::Float => ("float".into(), None),
        Type::String => ("String".into(), None),
        Type::Bool => ("bool".into(), None),
        Type::Array(_) => ("Array".into(), None),
        Type::Dictionary => ("Dictionary".into(), None),
        Type::Class(ClassRef::User { name: None, .. }) => ("null".into(), None),
        Type::Class(_) => (state.types.stringify_type(&inner), None),
        Type::Enum(e) => {
            let hoisted = if e.unit != normalize_path(state.module_path) {
                state
                    .types
                    .enum_members(e)
                    .map(|members| (e.name.clone(), render_enum(&e.name, &members)))
            } else {
                None
            };
            (e.name.clone(), hoisted)
        }
        _ => ("null".into(), None),
    }
}

/// Ordered constant mapping that stands in for an enum at runtime.
pub fn render_enum(name: &str, members: &[(String, i64)]) -> String {
    let mut out = format!("const {name} = {{\n");
    for (member, value) in members {
        out.push_str(&format!("  \"{member}\": {value},\n"));
    }
    out.push('}');
    out
}

/// Whether an initializer must wait for the scene tree: either its text looks
/// up a node, or its static type descends from a scene node type.
pub fn is_onready(value: &Expr, ty: &Type, state: &ParseState) -> Result<bool, CompileError> {
    if NODE_LOOKUP.is_match(state.text(value.span)) {
        return Ok(true);
    }

    let (ty, _) = ty.strip_nullable();
    if !matches!(ty, Type::Class(_)) {
        return Ok(false);
    }
    let mut chain = vec![ty.clone()];
    chain.extend(
        state
            .types
            .base_types_of(&ty)
            .map_err(|e| e.at(state.location(value.span)))?,
    );
    Ok(chain.iter().any(|t| {
        matches!(t, Type::Class(ClassRef::Native(name)) if SCENE_NODE_TYPES.contains(&name.as_str()))
    }))
}

/// Type of the class `class` extends, when it resolves.
pub fn superclass_type(class: &ClassDecl, state: &ParseState) -> Option<Type> {
    let name = class.extends.first()?;
    match state.types.resolve_superclass(state.module_path, name) {
        Superclass::Resolved(base) => Some(Type::Class(base)),
        Superclass::MissingSource => None,
    }
}

/// Renders the inheritance target, quoting cross-file references the target
/// language cannot name directly.
pub fn extends_target(class: &ClassDecl, state: &mut ParseState) -> Result<Option<String>, CompileError> {
    if class.extends.len() > 1 {
        return Err(CompileError::MultipleInheritance {
            class: class.name.clone().unwrap_or_else(|| "default class".into()),
            bases: class.extends.join(", "),
            location: Some(state.location(class.span)),
        });
    }
    let Some(name) = class.extends.first() else {
        return Ok(None);
    };

    let types = state.types;
    let base = match types.resolve_superclass(state.module_path, name) {
        Superclass::Resolved(base) => base,
        Superclass::MissingSource => {
            state.report(
                class.span,
                DiagnosticKind::MissingSourceForSuperclass,
                format!("could not find the source file that declares `{name}`"),
            );
            return Ok(Some(name.clone()));
        }
    };

    // ancestors further up must also be single-inheritance
    types
        .base_types_of(&Type::Class(base.clone()))
        .map_err(|e| e.at(state.location(class.span)))?;

    let ClassRef::User {
        unit,
        name: base_name,
    } = &base
    else {
        return Ok(Some(name.clone()));
    };

    if *unit == normalize_path(state.module_path) {
        return Ok(Some(base_name.clone().unwrap_or_else(|| name.clone())));
    }

    let Some(target) = state.units.resolve_unit(unit) else {
        state.report(
            class.span,
            DiagnosticKind::MissingSourceForSuperclass,
            format!("`{name}` is declared in {}, which is not compiled", unit.display()),
        );
        return Ok(Some(name.clone()));
    };

    let info = types.class_info(&base);
    let is_default = info.is_some_and(|i| i.is_default);
    let is_autoload = info.is_some_and(|i| i.is_autoload);

    Ok(Some(match base_name {
        Some(base_name) if is_default && !is_autoload => base_name.clone(),
        Some(base_name) if !is_default => format!("\"{}\".{base_name}", target.res_path),
        _ => format!("\"{}\"", target.res_path),
    }))
}

/// Header lines of a class: tool marker, inheritance and name.
pub fn class_header(
    class: &ClassDecl,
    placement: ClassPlacement,
    state: &mut ParseState,
) -> Result<String, CompileError> {
    let is_tool = class.has_annotation(&Annotation::Tool);
    let is_autoload = class.has_annotation(&Annotation::Autoload);

    if placement == ClassPlacement::Inner && (is_tool || is_autoload) {
        let marker = if is_tool { "@tool" } else { "@autoload" };
        state.report(
            class.span,
            DiagnosticKind::ToolAnnotationOnNonDefaultClass,
            format!(
                "{marker} can only be used on the default export of a file, not on `{}`",
                class.name.as_deref().unwrap_or("class")
            ),
        );
    }

    let extends = extends_target(class, state)?;

    if placement == ClassPlacement::Inner {
        let name = class.name.as_deref().unwrap_or("Anonymous");
        return Ok(match extends {
            Some(base) => format!("class {name} extends {base}:"),
            None => format!("class {name}:"),
        });
    }

    let mut lines = Vec::new();
    if is_tool {
        lines.push("tool".to_string());
    }
    if let Some(base) = extends {
        lines.push(format!("extends {base}"));
    }
    if placement == ClassPlacement::Main && !is_autoload {
        if let Some(name) = &class.name {
            lines.push(format!("class_name {name}"));
        }
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_primitives_get_var_hints() {
        assert_eq!(var_type_hint(&Type::Int), Some("int"));
        assert_eq!(var_type_hint(&Type::String), Some("String"));
        assert_eq!(var_type_hint(&Type::Union(vec![Type::Int, Type::Null])), None);
        assert_eq!(var_type_hint(&Type::native("Vector2")), None);
    }

    #[test]
    fn enums_render_as_ordered_mappings() {
        assert_eq!(
            render_enum("Mode", &[("A".into(), 0), ("B".into(), 1)]),
            "const Mode = {\n  \"A\": 0,\n  \"B\": 1,\n}"
        );
    }

    #[test]
    fn node_lookup_pattern_matches_both_shapes() {
        assert!(NODE_LOOKUP.is_match("this.get_node(\"Sprite\")"));
        assert!(NODE_LOOKUP.is_match("this.get_node_unsafe<Sprite>(\"x\")"));
        assert!(!NODE_LOOKUP.is_match("this.get_nodes"));
    }
}
