use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::emit::Output;
use crate::error::WriteError;

pub const EXTENSION: &str = "ron";

fn pretty_config() -> ron::ser::PrettyConfig {
    ron::ser::PrettyConfig::new()
        .depth_limit(usize::max_value())
        .new_line(String::from("\n"))
        .indentor(String::from("\t"))
        .separate_tuple_members(false)
        .enumerate_arrays(false)
}

/// Serializes one bundle or table.
pub fn to_ron<T: Serialize>(name: &str, value: &T) -> Result<String, WriteError> {
    let mut text =
        ron::ser::to_string_pretty(value, pretty_config()).map_err(|source| WriteError::Serialize {
            name: String::from(name),
            source,
        })?;
    text.push('\n');
    Ok(text)
}

fn write_file<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf, WriteError> {
    let text = to_ron(name, value)?;
    let path = dir.join(format!("{}.{}", name, EXTENSION));
    std::fs::write(&path, text).map_err(|source| WriteError::Io {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "written");
    Ok(path)
}

/// Writes every bundle and both type tables into `dir`, one file each.
///
/// Returns the written paths in the order they were written.
pub fn write_output(dir: &Path, output: &Output) -> Result<Vec<PathBuf>, WriteError> {
    let mut written = Vec::with_capacity(output.bundles.len() + 2);
    for bundle in &output.bundles {
        written.push(write_file(dir, &bundle.name, bundle)?);
    }
    written.push(write_file(dir, &output.core_types.name, &output.core_types)?);
    written.push(write_file(
        dir,
        &output.extension_types.name,
        &output.extension_types,
    )?);
    Ok(written)
}
