use rustc_hash::FxHashMap;
use std::path::{Component, Path, PathBuf};

/// Where a compilation unit's output lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRef {
    pub source_path: PathBuf,
    pub gd_path: PathBuf,
    /// Engine resource path, e.g. `res://compiled/Player.gd`.
    pub res_path: String,
}

impl UnitRef {
    /// Output location for an extra file emitted next to this unit.
    pub fn sibling(&self, suffix: &str) -> UnitRef {
        let stem = self
            .gd_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unit");
        let file_name = format!("{stem}_{suffix}.gd");
        let res_dir = self
            .res_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("res:/");

        UnitRef {
            source_path: self.source_path.clone(),
            gd_path: self.gd_path.with_file_name(&file_name),
            res_path: format!("{res_dir}/{file_name}"),
        }
    }
}

/// Cross-file lookup provided by the project layer.
pub trait UnitResolver {
    fn resolve_unit(&self, source: &Path) -> Option<UnitRef>;
}

/// Fixed table of units, used when the caller already knows every file.
#[derive(Debug, Default, Clone)]
pub struct UnitMap {
    units: FxHashMap<PathBuf, UnitRef>,
}

impl UnitMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: UnitRef) {
        self.units.insert(normalize_path(&unit.source_path), unit);
    }

    pub fn with_unit(mut self, source: &str, gd: &str, res: &str) -> Self {
        self.insert(UnitRef {
            source_path: PathBuf::from(source),
            gd_path: PathBuf::from(gd),
            res_path: res.to_string(),
        });
        self
    }
}

impl UnitResolver for UnitMap {
    fn resolve_unit(&self, source: &Path) -> Option<UnitRef> {
        self.units.get(&normalize_path(source)).cloned()
    }
}

/// Resolves a relative import specifier against the importing file.
/// Bare package specifiers are not project units and resolve to `None`.
pub fn resolve_import(from: &Path, specifier: &str) -> Option<PathBuf> {
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return None;
    }
    let dir = from.parent().unwrap_or(Path::new(""));
    let mut target = normalize_path(&dir.join(specifier));
    if target.extension().and_then(|e| e.to_str()) != Some("ts") {
        let mut name = target.file_name()?.to_os_string();
        name.push(".ts");
        target.set_file_name(name);
    }
    Some(target)
}

/// Lexically removes `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_import_handles_parent_segments() {
        assert_eq!(
            resolve_import(Path::new("src/ui/Menu.ts"), "../Player"),
            Some(PathBuf::from("src/Player.ts"))
        );
        assert_eq!(
            resolve_import(Path::new("src/Main.ts"), "./lib/util.ts"),
            Some(PathBuf::from("src/lib/util.ts"))
        );
        assert_eq!(resolve_import(Path::new("src/Main.ts"), "godot"), None);
    }

    #[test]
    fn sibling_units_share_the_output_directory() {
        let unit = UnitRef {
            source_path: "src/Main.ts".into(),
            gd_path: "compiled/Main.gd".into(),
            res_path: "res://compiled/Main.gd".into(),
        };
        let extra = unit.sibling("Helper");
        assert_eq!(extra.gd_path, PathBuf::from("compiled/Main_Helper.gd"));
        assert_eq!(extra.res_path, "res://compiled/Main_Helper.gd");
    }

    #[test]
    fn unit_map_normalizes_lookups() {
        let map = UnitMap::new().with_unit("src/A.ts", "compiled/A.gd", "res://compiled/A.gd");
        assert!(map.resolve_unit(Path::new("src/./A.ts")).is_some());
        assert!(map.resolve_unit(Path::new("src/B.ts")).is_none());
    }
}
