use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::resolve::ResolveMode;

/// Location of the registry relative to the source root.
pub const REGISTRY_FILE: &str = "xml/vk.xml";

pub const DEFAULT_API: &str = "vulkan";

/// Options shared by loading and resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Elements whose `api` attribute does not list this name are skipped.
    pub api: String,
    pub mode: ResolveMode,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            api: String::from(DEFAULT_API),
            mode: ResolveMode::default(),
        }
    }
}

/// Paths and options for one generator run.
#[derive(Debug, Clone)]
pub struct Config {
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub options: Options,
}

impl Config {
    pub fn new<S: Into<PathBuf>, D: Into<PathBuf>>(
        source_root: S,
        destination_root: D,
        options: Options,
    ) -> Self {
        Config {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            options,
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.source_root.join(REGISTRY_FILE)
    }

    /// Checks the environment before any parsing happens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let registry = self.registry_path();
        if !registry.is_file() {
            return Err(ConfigError::MissingRegistry(registry));
        }
        check_destination(&self.destination_root)
    }
}

fn check_destination(path: &Path) -> Result<(), ConfigError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) if m.is_dir() => m,
        _ => return Err(ConfigError::NotADirectory(path.to_path_buf())),
    };
    if metadata.permissions().readonly() {
        return Err(ConfigError::NotWritable(path.to_path_buf()));
    }
    Ok(())
}
