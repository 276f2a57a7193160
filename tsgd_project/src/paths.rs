use rustc_hash::FxHashMap;
use std::path::{Component, Path, PathBuf};
use tsgd_compiler::{UnitRef, UnitResolver, units::normalize_path};

use crate::{ProjectError, TsgdConfig, config::load_config};

/// Directories that never hold project files.
const SKIPPED_DIRS: [&str; 4] = ["node_modules", "_godot_defs", ".git", ".import"];

/// Resolved project locations, built once at start-up.
#[derive(Debug, Clone)]
pub struct Paths {
    pub root: PathBuf,
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    ignore: Vec<PathBuf>,
}

impl Paths {
    pub fn new(root: &Path, config: &TsgdConfig) -> Self {
        let root = normalize_path(root);
        Self {
            source_root: normalize_path(&root.join(&config.source)),
            destination_root: normalize_path(&root.join(&config.destination)),
            ignore: config
                .ignore
                .iter()
                .map(|p| normalize_path(&root.join(p)))
                .collect(),
            root,
        }
    }

    /// Reads `tsgd.toml` under `root`.
    pub fn load(root: &Path) -> Result<Self, ProjectError> {
        let config = load_config(root)?;
        Ok(Self::new(root, &config))
    }

    pub fn dynamic_defs_dir(&self) -> PathBuf {
        self.root.join("_godot_defs").join("dynamic")
    }

    pub fn asset_declarations_path(&self) -> PathBuf {
        self.dynamic_defs_dir().join("@asset_paths.d.ts")
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        if path.starts_with(&self.destination_root) {
            return true;
        }
        if self.ignore.iter().any(|prefix| path.starts_with(prefix)) {
            return true;
        }
        path.strip_prefix(&self.root)
            .unwrap_or(&path)
            .components()
            .any(|c| matches!(c, Component::Normal(name) if SKIPPED_DIRS.iter().any(|d| name == *d)))
    }

    /// A `.ts` compilation unit: inside the source root, not a declaration file.
    pub fn is_source(&self, path: &Path) -> bool {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        name.ends_with(".ts")
            && !is_declaration_file(path)
            && normalize_path(path).starts_with(&self.source_root)
            && !self.is_ignored(path)
    }

    /// Output file for a source: same relative location under the destination, `.gd` extension.
    pub fn gd_path(&self, source: &Path) -> PathBuf {
        let source = normalize_path(source);
        let relative = source.strip_prefix(&self.source_root).unwrap_or(&source);
        self.destination_root.join(relative).with_extension("gd")
    }

    /// Engine resource path (`res://...`) of a file inside the project.
    pub fn res_path(&self, path: &Path) -> String {
        let path = normalize_path(path);
        let relative = path.strip_prefix(&self.root).unwrap_or(&path);
        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        format!("res://{}", segments.join("/"))
    }

    pub fn unit_for(&self, source: &Path) -> UnitRef {
        let gd_path = self.gd_path(source);
        UnitRef {
            source_path: normalize_path(source),
            res_path: self.res_path(&gd_path),
            gd_path,
        }
    }
}

pub fn is_declaration_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".d.ts"))
}

/// Every compiled unit of the project, keyed by normalized source path.
#[derive(Debug, Default, Clone)]
pub struct SourceUnits {
    units: FxHashMap<PathBuf, UnitRef>,
}

impl SourceUnits {
    pub fn new<'p>(paths: &Paths, sources: impl IntoIterator<Item = &'p PathBuf>) -> Self {
        let units = sources
            .into_iter()
            .map(|source| (normalize_path(source), paths.unit_for(source)))
            .collect();
        Self { units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl UnitResolver for SourceUnits {
    fn resolve_unit(&self, source: &Path) -> Option<UnitRef> {
        self.units.get(&normalize_path(source)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> Paths {
        let config = TsgdConfig {
            ignore: vec![PathBuf::from("src/vendor")],
            ..TsgdConfig::default()
        };
        Paths::new(Path::new("/game"), &config)
    }

    #[test]
    fn sources_map_into_the_destination() {
        let paths = paths();
        let unit = paths.unit_for(Path::new("/game/src/actors/Player.ts"));
        assert_eq!(unit.gd_path, PathBuf::from("/game/compiled/actors/Player.gd"));
        assert_eq!(unit.res_path, "res://compiled/actors/Player.gd");
    }

    #[test]
    fn declaration_and_ignored_files_are_not_sources() {
        let paths = paths();
        assert!(paths.is_source(Path::new("/game/src/main.ts")));
        assert!(!paths.is_source(Path::new("/game/src/globals.d.ts")));
        assert!(!paths.is_source(Path::new("/game/src/vendor/lib.ts")));
        assert!(!paths.is_source(Path::new("/game/src/node_modules/x/index.ts")));
        assert!(!paths.is_source(Path::new("/game/other/main.ts")));
    }

    #[test]
    fn source_units_resolve_unnormalized_paths() {
        let paths = paths();
        let sources = vec![PathBuf::from("/game/src/a.ts")];
        let units = SourceUnits::new(&paths, &sources);
        let unit = units.resolve_unit(Path::new("/game/src/./b/../a.ts")).unwrap();
        assert_eq!(unit.res_path, "res://compiled/a.gd");
        assert!(units.resolve_unit(Path::new("/game/src/c.ts")).is_none());
    }
}
