use std::{
    fs,
    path::{Path, PathBuf},
};
use toml::Value;

use crate::ProjectError;

pub const CONFIG_FILE: &str = "tsgd.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsgdConfig {
    /// Directory holding the `.ts` sources, relative to the project root.
    pub source: PathBuf,
    /// Directory the `.gd` output is written to, relative to the project root.
    pub destination: PathBuf,
    /// Path prefixes, relative to the project root, that are never compiled.
    pub ignore: Vec<PathBuf>,
}

impl Default for TsgdConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("./src"),
            destination: PathBuf::from("./compiled"),
            ignore: Vec::new(),
        }
    }
}

pub fn load_config(root: &Path) -> Result<TsgdConfig, ProjectError> {
    let contents = fs::read_to_string(root.join(CONFIG_FILE))?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<TsgdConfig, ProjectError> {
    let value: Value = contents.parse::<Value>()?;

    let source = required_path(&value, "source")?;
    let destination = required_path(&value, "destination")?;
    if source == destination {
        return Err(ProjectError::InvalidField(
            "destination",
            "must differ from `source`".to_string(),
        ));
    }

    let ignore = match value.get("ignore") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(PathBuf::from).ok_or_else(|| {
                    ProjectError::InvalidField("ignore", "entries must be strings".to_string())
                })
            })
            .collect::<Result<_, _>>()?,
        Some(_) => {
            return Err(ProjectError::InvalidField(
                "ignore",
                "expected an array of paths".to_string(),
            ));
        }
    };

    Ok(TsgdConfig {
        source,
        destination,
        ignore,
    })
}

fn required_path(value: &Value, field: &'static str) -> Result<PathBuf, ProjectError> {
    let raw = value
        .get(field)
        .ok_or(ProjectError::MissingField(field))?
        .as_str()
        .ok_or_else(|| ProjectError::InvalidField(field, "expected a path string".to_string()))?;
    if raw.trim().is_empty() {
        return Err(ProjectError::InvalidField(field, "must not be empty".to_string()));
    }
    Ok(PathBuf::from(raw))
}

pub fn default_config_toml() -> String {
    r#"# Where the .ts files live
source = "./src"

# Where the compiled .gd files are written
destination = "./compiled"

# Path prefixes to skip
ignore = []
"#
    .to_string()
}

/// Writes a default `tsgd.toml` and creates the source and output directories.
pub fn init_project(root: &Path) -> Result<TsgdConfig, ProjectError> {
    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        return Err(ProjectError::AlreadyExists(config_path));
    }
    fs::create_dir_all(root)?;
    fs::write(&config_path, default_config_toml())?;

    let config = parse_config(&default_config_toml())?;
    fs::create_dir_all(root.join(&config.source))?;
    fs::create_dir_all(root.join(&config.destination))?;
    log::info!("initialized tsgd project at {}", root.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_reads_paths_and_ignores() {
        let toml = r#"
source = "./src"
destination = "./compiled"
ignore = ["src/vendor", "src/generated"]
"#;
        let parsed = parse_config(toml).expect("failed to parse tsgd.toml");
        assert_eq!(parsed.source, PathBuf::from("./src"));
        assert_eq!(parsed.destination, PathBuf::from("./compiled"));
        assert_eq!(
            parsed.ignore,
            vec![PathBuf::from("src/vendor"), PathBuf::from("src/generated")]
        );
    }

    #[test]
    fn parse_config_requires_destination() {
        let err = parse_config("source = \"./src\"").expect_err("expected parse failure");
        assert!(matches!(err, ProjectError::MissingField("destination")));
    }

    #[test]
    fn parse_config_rejects_non_string_ignores() {
        let toml = r#"
source = "./src"
destination = "./out"
ignore = [1]
"#;
        let err = parse_config(toml).expect_err("expected parse failure");
        assert!(matches!(err, ProjectError::InvalidField("ignore", _)));
    }

    #[test]
    fn default_config_round_trips() {
        assert_eq!(parse_config(&default_config_toml()).unwrap(), TsgdConfig::default());
    }

    #[test]
    fn init_refuses_existing_projects() {
        let dir = tempfile::tempdir().unwrap();
        init_project(dir.path()).unwrap();
        assert!(dir.path().join("src").is_dir());
        assert!(dir.path().join("compiled").is_dir());

        let err = init_project(dir.path()).expect_err("second init must fail");
        assert!(matches!(err, ProjectError::AlreadyExists(_)));
    }
}
