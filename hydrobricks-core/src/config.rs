//! Configuration documents.
//!
//! Parameter values and model settings are written as hierarchical documents
//! (`component -> field -> value`) that can be reused by the command-line version of
//! the model. JSON, YAML and TOML are supported; the format is picked from the
//! [`FileType`] when writing and from the file extension when reading.

use crate::errors::{HBError, HBResult};
use crate::parameters::ParameterValue;
use indexmap::IndexMap;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Parameter values grouped by component, in definition order.
pub type ParameterTree = IndexMap<String, IndexMap<String, Option<ParameterValue>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Json,
    Yaml,
    Toml,
    /// JSON and YAML
    Both,
}

impl FileType {
    fn formats(self) -> &'static [Format] {
        match self {
            FileType::Json => &[Format::Json],
            FileType::Yaml => &[Format::Yaml],
            FileType::Toml => &[Format::Toml],
            FileType::Both => &[Format::Json, Format::Yaml],
        }
    }
}

impl FromStr for FileType {
    type Err = HBError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(FileType::Json),
            "yaml" | "yml" => Ok(FileType::Yaml),
            "toml" => Ok(FileType::Toml),
            "both" => Ok(FileType::Both),
            other => Err(HBError::InvalidInput(format!(
                "Unknown configuration file type \"{}\"",
                other
            ))),
        }
    }
}

/// A single serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Toml => "toml",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> HBResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(Format::Json),
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some("toml") => Ok(Format::Toml),
            _ => Err(HBError::InvalidInput(format!(
                "Cannot infer the configuration format of {}",
                path.display()
            ))),
        }
    }
}

/// Serialize a document to a string.
///
/// TOML has no null value, so unset entries are left out of TOML documents.
pub fn to_string<T: Serialize + ?Sized>(content: &T, format: Format) -> HBResult<String> {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(content)?),
        Format::Yaml => Ok(serde_yaml::to_string(content)?),
        Format::Toml => {
            let mut value = serde_json::to_value(content)?;
            strip_nulls(&mut value);
            Ok(toml::to_string(&value)?)
        }
    }
}

/// Parse a document from a string.
pub fn from_str<T: DeserializeOwned>(content: &str, format: Format) -> HBResult<T> {
    match format {
        Format::Json => Ok(serde_json::from_str(content)?),
        Format::Yaml => Ok(serde_yaml::from_str(content)?),
        Format::Toml => Ok(toml::from_str(content)?),
    }
}

/// Write `content` to `directory/name.<ext>` for every format of `file_type`.
///
/// The directory is created if needed. Returns the paths of the written files.
pub fn dump_config_file<T: Serialize + ?Sized>(
    content: &T,
    directory: &Path,
    name: &str,
    file_type: FileType,
) -> HBResult<Vec<PathBuf>> {
    fs::create_dir_all(directory)?;

    let mut written = vec![];
    for format in file_type.formats() {
        let path = directory.join(format!("{}.{}", name, format.extension()));
        fs::write(&path, to_string(content, *format)?)?;
        debug!("Configuration written to {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Read a configuration document, the format being inferred from the extension.
pub fn load_config_file<T: DeserializeOwned>(path: &Path) -> HBResult<T> {
    let format = Format::from_path(path)?;
    let content = fs::read_to_string(path)?;
    from_str(&content, format)
}

fn strip_nulls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}
