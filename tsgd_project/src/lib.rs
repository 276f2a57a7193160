pub mod assets;
pub mod build;
pub mod config;
pub mod paths;
pub mod project;

use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
};
use tsgd_compiler::CompileError;

pub use build::{BuildReport, build};
pub use config::{TsgdConfig, init_project, load_config, parse_config};
pub use paths::{Paths, SourceUnits};
pub use project::{Effect, Project, ProjectEvent};

#[derive(Debug)]
pub enum ProjectError {
    Io(std::io::Error),
    ParseToml(toml::de::Error),
    MissingField(&'static str),
    InvalidField(&'static str, String),
    AlreadyExists(PathBuf),
    Compile(CompileError),
}

impl Display for ProjectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::ParseToml(err) => write!(f, "{err}"),
            Self::MissingField(field) => write!(f, "missing required field `{field}`"),
            Self::InvalidField(field, reason) => write!(f, "invalid field `{field}`: {reason}"),
            Self::AlreadyExists(path) => {
                write!(f, "project already initialized: {}", path.display())
            }
            Self::Compile(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ProjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::ParseToml(err) => Some(err),
            Self::Compile(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProjectError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::de::Error> for ProjectError {
    fn from(value: toml::de::Error) -> Self {
        Self::ParseToml(value)
    }
}

impl From<CompileError> for ProjectError {
    fn from(value: CompileError) -> Self {
        Self::Compile(value)
    }
}
