use std::{fs, path::Path};

use crate::paths::Paths;

/// Project files the engine can load by resource path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Scene,
    Image,
    Font,
    Glb,
}

impl AssetKind {
    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "tscn" | "scn" => Some(Self::Scene),
            "png" | "jpg" | "jpeg" | "svg" | "webp" => Some(Self::Image),
            "ttf" | "otf" => Some(Self::Font),
            "glb" | "gltf" => Some(Self::Glb),
            _ => None,
        }
    }

    pub fn ts_type(self) -> &'static str {
        match self {
            Self::Scene => "PackedScene<Node>",
            Self::Image => "StreamTexture",
            Self::Font => "DynamicFont",
            Self::Glb => "PackedScene<Spatial>",
        }
    }
}

/// A compiled script that can be loaded by resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptAsset {
    pub res_path: String,
    pub class_name: String,
}

/// Renders `@asset_paths.d.ts`: every loadable path with its type, the scene
/// paths, and the key type over both.
pub fn asset_declarations<'a>(
    paths: &Paths,
    assets: impl IntoIterator<Item = &'a std::path::PathBuf>,
    scripts: &[ScriptAsset],
) -> String {
    let mut entries = Vec::new();
    let mut scenes = Vec::new();
    for asset in assets {
        let Some(kind) = AssetKind::of(asset) else {
            continue;
        };
        let res_path = paths.res_path(asset);
        entries.push(format!("  '{res_path}': {}", kind.ts_type()));
        if kind == AssetKind::Scene {
            scenes.push(format!("  | '{res_path}'"));
        }
    }
    for script in scripts {
        entries.push(format!(
            "  '{}': PackedScene<{}>",
            script.res_path, script.class_name
        ));
    }

    let scenes = if scenes.is_empty() {
        "  never;".to_string()
    } else {
        scenes.join("\n")
    };
    format!(
        "declare type AssetType = {{\n{}\n}}\n\ndeclare type SceneName =\n{scenes}\n\ndeclare type AssetPath = keyof AssetType;\n",
        entries.join(",\n")
    )
}

pub fn write_asset_declarations(paths: &Paths, contents: &str) -> std::io::Result<()> {
    let target = paths.asset_declarations_path();
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir)?;
    }
    log::debug!("writing {}", target.display());
    fs::write(target, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TsgdConfig;
    use std::path::PathBuf;

    #[test]
    fn asset_kinds_follow_extensions() {
        assert_eq!(AssetKind::of(Path::new("a/Main.TSCN")), Some(AssetKind::Scene));
        assert_eq!(AssetKind::of(Path::new("icon.png")), Some(AssetKind::Image));
        assert_eq!(AssetKind::of(Path::new("font.ttf")), Some(AssetKind::Font));
        assert_eq!(AssetKind::of(Path::new("main.ts")), None);
    }

    #[test]
    fn declarations_list_assets_scripts_and_scenes() {
        let paths = Paths::new(Path::new("/game"), &TsgdConfig::default());
        let assets = vec![
            PathBuf::from("/game/main.tscn"),
            PathBuf::from("/game/art/icon.png"),
        ];
        let scripts = vec![ScriptAsset {
            res_path: "res://compiled/Player.gd".into(),
            class_name: "Player".into(),
        }];

        let out = asset_declarations(&paths, &assets, &scripts);
        assert!(out.contains("  'res://main.tscn': PackedScene<Node>,\n"));
        assert!(out.contains("  'res://art/icon.png': StreamTexture,\n"));
        assert!(out.contains("  'res://compiled/Player.gd': PackedScene<Player>\n}"));
        assert!(out.contains("declare type SceneName =\n  | 'res://main.tscn'\n"));
        assert!(out.ends_with("declare type AssetPath = keyof AssetType;\n"));
    }

    #[test]
    fn projects_without_scenes_have_no_scene_names() {
        let paths = Paths::new(Path::new("/game"), &TsgdConfig::default());
        let out = asset_declarations(&paths, &Vec::<PathBuf>::new(), &[]);
        assert!(out.contains("declare type SceneName =\n  never;"));
    }
}
