use log::{debug, warn};
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    path::{Path, PathBuf},
};
use tsgd_compiler::units::normalize_path;
use walkdir::{DirEntry, WalkDir};

use crate::{
    ProjectError,
    assets::AssetKind,
    paths::{Paths, SourceUnits, is_declaration_file},
};

/// A file-system change, queued and handled strictly one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectEvent {
    Added(PathBuf),
    Changed(PathBuf),
    Removed(PathBuf),
}

/// Work requested by a state transition; the caller performs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Effect {
    Compile(PathBuf),
    DeleteOutput(PathBuf),
    RegenerateAssetDeclarations,
}

/// Files the project knows about, plus the pending event queue.
#[derive(Debug)]
pub struct Project {
    pub paths: Paths,
    sources: BTreeSet<PathBuf>,
    declarations: BTreeSet<PathBuf>,
    assets: BTreeSet<PathBuf>,
    /// Scripts last written for each source, extra class files included.
    outputs: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    queue: VecDeque<ProjectEvent>,
}

impl Project {
    pub fn new(paths: Paths) -> Self {
        Self {
            paths,
            sources: BTreeSet::new(),
            declarations: BTreeSet::new(),
            assets: BTreeSet::new(),
            outputs: BTreeMap::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, event: ProjectEvent) {
        self.queue.push_back(event);
    }

    pub fn next_event(&mut self) -> Option<ProjectEvent> {
        self.queue.pop_front()
    }

    pub fn sources(&self) -> impl Iterator<Item = &PathBuf> {
        self.sources.iter()
    }

    pub fn declarations(&self) -> impl Iterator<Item = &PathBuf> {
        self.declarations.iter()
    }

    pub fn assets(&self) -> impl Iterator<Item = &PathBuf> {
        self.assets.iter()
    }

    pub fn units(&self) -> SourceUnits {
        SourceUnits::new(&self.paths, &self.sources)
    }

    /// Remembers the scripts written for `source` and returns the ones an
    /// earlier build wrote that are no longer produced.
    pub fn record_outputs(&mut self, source: &Path, written: BTreeSet<PathBuf>) -> Vec<PathBuf> {
        let previous = self
            .outputs
            .insert(normalize_path(source), written.clone())
            .unwrap_or_default();
        previous.difference(&written).cloned().collect()
    }

    /// Enqueues an `Added` event for every project file under the root.
    pub fn scan(&mut self) -> Result<usize, ProjectError> {
        let mut found = 0;
        let walker = WalkDir::new(&self.paths.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.skips_entry(entry));
        let mut events = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|err| {
                ProjectError::Io(err.into_io_error().unwrap_or_else(|| {
                    std::io::Error::other("file system loop while scanning the project")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            events.push(ProjectEvent::Added(entry.into_path()));
            found += 1;
        }
        self.queue.extend(events);
        debug!("scan queued {found} files under {}", self.paths.root.display());
        Ok(found)
    }

    fn skips_entry(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0 && self.paths.is_ignored(entry.path())
    }

    /// Applies one event to the known file sets and reports the work it implies.
    pub fn apply(&mut self, event: &ProjectEvent) -> Vec<Effect> {
        match event {
            ProjectEvent::Added(path) => self.file_added(&normalize_path(path)),
            ProjectEvent::Changed(path) => self.file_changed(&normalize_path(path)),
            ProjectEvent::Removed(path) => self.file_removed(&normalize_path(path)),
        }
    }

    fn file_added(&mut self, path: &Path) -> Vec<Effect> {
        if self.paths.is_source(path) {
            self.sources.insert(path.to_path_buf());
            return vec![
                Effect::Compile(path.to_path_buf()),
                Effect::RegenerateAssetDeclarations,
            ];
        }
        if is_declaration_file(path) && !self.paths.is_ignored(path) {
            self.declarations.insert(path.to_path_buf());
            return self.recompile_all();
        }
        if AssetKind::of(path).is_some() && !self.paths.is_ignored(path) {
            self.assets.insert(path.to_path_buf());
            return vec![Effect::RegenerateAssetDeclarations];
        }
        Vec::new()
    }

    fn file_changed(&mut self, path: &Path) -> Vec<Effect> {
        if self.sources.contains(path) {
            // the default class name feeds the asset declarations
            return vec![
                Effect::Compile(path.to_path_buf()),
                Effect::RegenerateAssetDeclarations,
            ];
        }
        if self.declarations.contains(path) {
            return self.recompile_all();
        }
        if self.assets.contains(path) {
            return Vec::new();
        }
        // unseen file: treat like a creation
        self.file_added(path)
    }

    fn file_removed(&mut self, path: &Path) -> Vec<Effect> {
        if self.sources.remove(path) {
            let mut outputs = self.outputs.remove(path).unwrap_or_default();
            outputs.insert(self.paths.gd_path(path));
            return outputs
                .into_iter()
                .map(Effect::DeleteOutput)
                .chain(Some(Effect::RegenerateAssetDeclarations))
                .collect();
        }
        if self.declarations.remove(path) {
            return self.recompile_all();
        }
        if self.assets.remove(path) {
            return vec![Effect::RegenerateAssetDeclarations];
        }
        warn!("removal of untracked file {}", path.display());
        Vec::new()
    }

    fn recompile_all(&self) -> Vec<Effect> {
        self.sources.iter().cloned().map(Effect::Compile).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TsgdConfig;
    use std::fs;

    fn project() -> Project {
        Project::new(Paths::new(Path::new("/game"), &TsgdConfig::default()))
    }

    #[test]
    fn adding_a_source_compiles_it() {
        let mut project = project();
        let effects = project.apply(&ProjectEvent::Added("/game/src/main.ts".into()));
        assert_eq!(
            effects,
            vec![
                Effect::Compile("/game/src/main.ts".into()),
                Effect::RegenerateAssetDeclarations
            ]
        );
        assert_eq!(project.sources().count(), 1);
    }

    #[test]
    fn removing_a_source_deletes_its_output() {
        let mut project = project();
        project.apply(&ProjectEvent::Added("/game/src/a/b.ts".into()));
        let effects = project.apply(&ProjectEvent::Removed("/game/src/a/b.ts".into()));
        assert_eq!(
            effects,
            vec![
                Effect::DeleteOutput("/game/compiled/a/b.gd".into()),
                Effect::RegenerateAssetDeclarations
            ]
        );
        assert_eq!(project.sources().count(), 0);
    }

    #[test]
    fn removing_a_source_deletes_its_class_expression_scripts() {
        let mut project = project();
        project.apply(&ProjectEvent::Added("/game/src/level.ts".into()));
        let written: BTreeSet<PathBuf> = ["/game/compiled/level.gd", "/game/compiled/level_Spawner.gd"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        assert!(project.record_outputs(Path::new("/game/src/level.ts"), written).is_empty());

        let effects = project.apply(&ProjectEvent::Removed("/game/src/level.ts".into()));
        assert_eq!(
            effects,
            vec![
                Effect::DeleteOutput("/game/compiled/level.gd".into()),
                Effect::DeleteOutput("/game/compiled/level_Spawner.gd".into()),
                Effect::RegenerateAssetDeclarations
            ]
        );
    }

    #[test]
    fn recording_outputs_reports_stale_scripts() {
        let mut project = project();
        let source = Path::new("/game/src/level.ts");
        let first: BTreeSet<PathBuf> = ["/game/compiled/level.gd", "/game/compiled/level_anonymous_1.gd"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        project.record_outputs(source, first);
        let second: BTreeSet<PathBuf> = [PathBuf::from("/game/compiled/level.gd")].into();
        assert_eq!(
            project.record_outputs(source, second),
            vec![PathBuf::from("/game/compiled/level_anonymous_1.gd")]
        );
    }

    #[test]
    fn declaration_changes_recompile_every_source() {
        let mut project = project();
        project.apply(&ProjectEvent::Added("/game/src/a.ts".into()));
        project.apply(&ProjectEvent::Added("/game/src/b.ts".into()));
        let effects = project.apply(&ProjectEvent::Added("/game/src/engine.d.ts".into()));
        assert_eq!(
            effects,
            vec![
                Effect::Compile("/game/src/a.ts".into()),
                Effect::Compile("/game/src/b.ts".into())
            ]
        );
    }

    #[test]
    fn output_and_unknown_files_are_ignored() {
        let mut project = project();
        assert!(project.apply(&ProjectEvent::Added("/game/compiled/main.gd".into())).is_empty());
        assert!(project.apply(&ProjectEvent::Added("/game/README".into())).is_empty());
        assert_eq!(
            project.apply(&ProjectEvent::Added("/game/main.tscn".into())),
            vec![Effect::RegenerateAssetDeclarations]
        );
    }

    #[test]
    fn events_are_handled_in_arrival_order() {
        let mut project = project();
        project.enqueue(ProjectEvent::Added("/game/src/a.ts".into()));
        project.enqueue(ProjectEvent::Removed("/game/src/a.ts".into()));
        let mut effects = Vec::new();
        while let Some(event) = project.next_event() {
            effects.extend(project.apply(&event));
        }
        assert_eq!(effects[0], Effect::Compile("/game/src/a.ts".into()));
        assert_eq!(effects[2], Effect::DeleteOutput("/game/compiled/a.gd".into()));
        assert_eq!(project.sources().count(), 0);
    }

    #[test]
    fn scan_skips_output_and_tooling_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("compiled")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/main.ts"), "").unwrap();
        fs::write(root.join("compiled/main.gd"), "").unwrap();
        fs::write(root.join("node_modules/pkg/index.ts"), "").unwrap();

        let mut project = Project::new(Paths::new(root, &TsgdConfig::default()));
        assert_eq!(project.scan().unwrap(), 1);
        assert_eq!(
            project.next_event(),
            Some(ProjectEvent::Added(root.join("src/main.ts")))
        );
    }
}
