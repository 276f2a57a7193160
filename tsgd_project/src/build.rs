use indexmap::IndexSet;
use log::{debug, info, warn};
use rustc_hash::FxHashSet;
use std::{
    collections::BTreeSet,
    fs, io,
    path::{Path, PathBuf},
};
use tsgd_compiler::{
    CompileError, Diagnostic, DiagnosticKind, Module, OutputFile, ProgramIndex, TypeScriptParser,
    compile_unit, source_span::SourceSpan, units::normalize_path,
};

use crate::{
    ProjectError,
    assets::{ScriptAsset, asset_declarations, write_asset_declarations},
    project::{Effect, Project},
};

/// Outcome of draining the project's event queue.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Units that were translated.
    pub compiled: usize,
    pub written: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Handles every queued event in order, then performs the resulting effects.
///
/// Output is only touched when `write` is set and no unit reported a
/// diagnostic; otherwise the report describes what would have happened.
pub fn build(project: &mut Project, write: bool) -> Result<BuildReport, ProjectError> {
    let mut effects: IndexSet<Effect> = IndexSet::new();
    while let Some(event) = project.next_event() {
        debug!("handling {event:?}");
        effects.extend(project.apply(&event));
    }

    let requested: FxHashSet<PathBuf> = effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Compile(path) => Some(normalize_path(path)),
            _ => None,
        })
        .collect();

    let mut parser = TypeScriptParser::new()?;
    let modules = project
        .sources()
        .map(|path| parse_file(&mut parser, path))
        .collect::<Result<Vec<_>, _>>()?;
    let mut index = ProgramIndex::from_modules(&modules);
    for path in project.declarations() {
        index.add_declarations(&parse_file(&mut parser, path)?);
    }
    let units = project.units();

    let mut report = BuildReport::default();
    let mut outputs: Vec<(&Path, Vec<OutputFile>)> = Vec::new();
    for module in modules.iter().filter(|m| requested.contains(&normalize_path(&m.path))) {
        report.compiled += 1;
        match compile_unit(module, &index, &units) {
            Ok(unit) => {
                report.diagnostics.extend(unit.diagnostics);
                outputs.push((module.path.as_path(), unit.files));
            }
            Err(err @ CompileError::MultipleInheritance { .. }) => {
                report.diagnostics.push(inheritance_diagnostic(module, &err));
            }
            Err(err) => return Err(err.into()),
        }
    }

    if !report.is_clean() {
        warn!(
            "{} diagnostics, no files were written",
            report.diagnostics.len()
        );
        return Ok(report);
    }
    if !write {
        return Ok(report);
    }

    for (source, files) in outputs {
        let mut written = BTreeSet::new();
        for output in files {
            if let Some(dir) = output.unit.gd_path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(&output.unit.gd_path, &output.content)?;
            written.insert(output.unit.gd_path.clone());
            report.written.push(output.unit.gd_path);
        }
        for stale in project.record_outputs(source, written) {
            delete_output(&stale, &mut report)?;
        }
    }

    for effect in &effects {
        match effect {
            Effect::DeleteOutput(path) => delete_output(path, &mut report)?,
            Effect::RegenerateAssetDeclarations => {
                let scripts = script_assets(project, &modules);
                let contents = asset_declarations(&project.paths, project.assets(), &scripts);
                write_asset_declarations(&project.paths, &contents)?;
            }
            Effect::Compile(_) => {}
        }
    }

    info!(
        "compiled {} units, wrote {} files",
        report.compiled,
        report.written.len()
    );
    Ok(report)
}

fn delete_output(path: &Path, report: &mut BuildReport) -> Result<(), ProjectError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("deleted {}", path.display());
            report.deleted.push(path.to_path_buf());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_file(parser: &mut TypeScriptParser, path: &Path) -> Result<Module, ProjectError> {
    let source = fs::read_to_string(path).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parser.parse(path, source)?)
}

fn inheritance_diagnostic(module: &Module, err: &CompileError) -> Diagnostic {
    Diagnostic {
        kind: DiagnosticKind::UnsupportedMultipleInheritance,
        message: err.to_string(),
        location: err
            .location()
            .cloned()
            .unwrap_or_else(|| SourceSpan::single_char(module.path.display().to_string(), 1, 1)),
    }
}

/// Compiled scripts whose default class can be instanced by path.
fn script_assets(project: &Project, modules: &[Module]) -> Vec<ScriptAsset> {
    modules
        .iter()
        .filter_map(|module| {
            let class_name = module.default_class()?.name.clone()?;
            Some(ScriptAsset {
                res_path: project.paths.unit_for(&module.path).res_path,
                class_name,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Paths, ProjectEvent, TsgdConfig};

    fn project_with(files: &[(&str, &str)]) -> (tempfile::TempDir, Project) {
        let dir = tempfile::tempdir().unwrap();
        for (path, contents) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        let mut project = Project::new(Paths::new(dir.path(), &TsgdConfig::default()));
        project.scan().unwrap();
        (dir, project)
    }

    #[test]
    fn build_writes_scripts_and_asset_declarations() {
        let (dir, mut project) = project_with(&[
            ("src/Player.ts", "export default class Player extends Node2D {}"),
            ("main.tscn", ""),
        ]);

        let report = build(&mut project, true).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.compiled, 1);

        let script = fs::read_to_string(dir.path().join("compiled/Player.gd")).unwrap();
        assert!(script.contains("class_name Player"));

        let defs = fs::read_to_string(
            dir.path().join("_godot_defs/dynamic/@asset_paths.d.ts"),
        )
        .unwrap();
        assert!(defs.contains("'res://compiled/Player.gd': PackedScene<Player>"));
        assert!(defs.contains("| 'res://main.tscn'"));
    }

    #[test]
    fn imports_resolve_across_units() {
        let (dir, mut project) = project_with(&[
            ("src/base.ts", "export class Inner extends Node {}\nexport default class Base extends Node {}"),
            (
                "src/game/main.ts",
                "import { Inner } from \"../base\";\nexport default class Main extends Inner {}",
            ),
        ]);

        build(&mut project, true).unwrap();
        let script = fs::read_to_string(dir.path().join("compiled/game/main.gd")).unwrap();
        assert!(script.contains("extends \"res://compiled/base.gd\".Inner"));
    }

    #[test]
    fn diagnostics_suppress_all_output() {
        let (dir, mut project) = project_with(&[
            ("src/ok.ts", "export default class Ok extends Node {}"),
            ("src/bad.ts", "export default class Bad extends Node { ping: Signal; }"),
            ("src/twice.ts", "export default class Twice extends Node, Node2D {}"),
        ]);

        let report = build(&mut project, true).unwrap();
        let kinds: Vec<DiagnosticKind> = report.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::SignalNamingError,
                DiagnosticKind::UnsupportedMultipleInheritance
            ]
        );
        assert!(report.written.is_empty());
        assert!(!dir.path().join("compiled/ok.gd").exists());
    }

    #[test]
    fn removed_sources_lose_their_output() {
        let (dir, mut project) = project_with(&[("src/gone.ts", "export default class Gone extends Node {}")]);
        build(&mut project, true).unwrap();
        let output = dir.path().join("compiled/gone.gd");
        assert!(output.exists());

        fs::remove_file(dir.path().join("src/gone.ts")).unwrap();
        project.enqueue(ProjectEvent::Removed(dir.path().join("src/gone.ts")));
        let report = build(&mut project, true).unwrap();
        assert_eq!(report.deleted, vec![output.clone()]);
        assert!(!output.exists());
    }

    #[test]
    fn class_expression_scripts_follow_their_source() {
        let (dir, mut project) = project_with(&[(
            "src/level.ts",
            "export default class Level extends Node {\n  spawner = class Spawner extends Node {};\n}\n",
        )]);
        build(&mut project, true).unwrap();
        let extra = dir.path().join("compiled/level_Spawner.gd");
        assert!(extra.exists());

        fs::write(
            dir.path().join("src/level.ts"),
            "export default class Level extends Node {}\n",
        )
        .unwrap();
        project.enqueue(ProjectEvent::Changed(dir.path().join("src/level.ts")));
        let report = build(&mut project, true).unwrap();
        assert_eq!(report.deleted, vec![extra.clone()]);
        assert!(!extra.exists());

        project.enqueue(ProjectEvent::Removed(dir.path().join("src/level.ts")));
        fs::remove_file(dir.path().join("src/level.ts")).unwrap();
        build(&mut project, true).unwrap();
        assert!(!dir.path().join("compiled/level.gd").exists());
    }
}
