use log::{debug, info};

use crate::{
    ast::{Annotation, ClassDecl, ExprKind, Module, StmtKind, VarDecl},
    diagnostics::Diagnostic,
    error::CompileError,
    index::ProgramIndex,
    units::{UnitRef, UnitResolver},
    usage::referenced_names,
};

use super::{
    OutputFile, ParseState, Translation,
    class::{ClassOutput, translate_class, translate_inner_class},
    hoisting::HoistCollector,
    join_lines,
    resolver::ClassPlacement,
    statement::{translate_function, translate_stmt},
};

pub const GENERATED_HEADER: &str = "# This file has been autogenerated by tsgd. DO NOT EDIT!";

/// Everything one compilation unit produced.
#[derive(Debug, Default)]
pub struct UnitOutput {
    /// The unit's own script first, then any extra files in creation order.
    pub files: Vec<OutputFile>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lays out a script: header, class header, hoisted enums, library helpers,
/// closures, top-level code, then the class body.
pub fn render_script(class_header: &str, hoists: &mut HoistCollector, top_level: &str, body: &str) -> String {
    let sections = [
        GENERATED_HEADER.to_string(),
        class_header.to_string(),
        hoists.render_enums(),
        hoists.render_helpers(),
        hoists.take_closures(),
        top_level.to_string(),
        body.to_string(),
    ];
    let mut out = sections
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    out.push('\n');
    out
}

pub fn translate_module(
    module: &Module,
    unit: &UnitRef,
    types: &ProgramIndex,
    units: &dyn UnitResolver,
) -> Result<UnitOutput, CompileError> {
    info!("translating {}", module.path.display());
    let mut state = ParseState::new(&module.path, &module.source, unit, types, units);

    let main = module.default_class().filter(|c| !c.is_declare);
    state.is_autoload = main.is_some_and(|c| c.has_annotation(&Annotation::Autoload));
    state.used_names.push(referenced_names(&module.body));

    let (header, mut main_body) = match main {
        Some(class) => {
            let ClassOutput { header, body } = translate_class(class, ClassPlacement::Main, &mut state)?;
            (header, body)
        }
        None => (String::new(), Translation::empty()),
    };

    let mut top_level = Vec::new();
    for stmt in &module.body {
        match &stmt.kind {
            StmtKind::Class(_) => continue,
            StmtKind::Var(decl) if state.is_autoload && is_autoload_instance(decl, main) => {
                debug!("dropping autoload instance declaration in {}", module.path.display());
                continue;
            }
            StmtKind::Function(decl) => top_level.push(translate_function(decl, &mut state)?),
            _ => top_level.push(translate_stmt(stmt, &mut state)?),
        }
    }
    let mut top_level = Translation::combine(top_level, |p| join_lines(p.iter()));

    let mut inner = Vec::new();
    for class in module.classes().filter(|c| !c.is_default_export && !c.is_declare) {
        inner.push(translate_inner_class(class, &mut state)?);
    }
    let mut inner = Translation::combine(inner, |p| {
        p.iter()
            .filter(|c| !c.trim().is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n\n")
    });

    let mut hoists = HoistCollector::new();
    hoists.collect(&mut main_body);
    hoists.collect(&mut top_level);
    hoists.collect(&mut inner);

    let top_section = [top_level.content.as_str(), inner.content.as_str()]
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    let content = render_script(&header, &mut hoists, &top_section, &main_body.content);

    let mut files = vec![OutputFile {
        unit: unit.clone(),
        content,
    }];
    for t in [main_body, top_level, inner] {
        files.extend(t.files);
    }

    let diagnostics = state.diagnostics.into_vec();
    if !diagnostics.is_empty() {
        debug!("{} diagnostics in {}", diagnostics.len(), module.path.display());
    }
    Ok(UnitOutput { files, diagnostics })
}

/// `const G = new Main()` next to an autoload class; the engine creates that instance itself.
fn is_autoload_instance(decl: &VarDecl, main: Option<&ClassDecl>) -> bool {
    let Some(main_name) = main.and_then(|c| c.name.as_deref()) else {
        return false;
    };
    decl.declarators.iter().all(|d| {
        d.value.as_ref().is_some_and(|v| match &v.unwrapped().kind {
            ExprKind::New { class, .. } => class.as_ident() == Some(main_name),
            _ => false,
        })
    })
}
