//! Plan archives and the build identifiers that locate them.

use crate::error::GtfError;
use crate::validation::validate_pattern;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use regex::Regex;
use std::fmt;
use std::io::Read;
use std::path::Component;

const BUILD_ID_FORMAT: &str = "<YYYY-MM-DD>__<hex> or <hex>";

/// `<date>__<hex>` key a plan archive is stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildId(String);

impl BuildId {
    /// Fresh identifier for `date` with 8 random bytes
    pub fn generate(date: NaiveDate) -> Self {
        let random: [u8; 8] = rand::random();
        Self(format!("{}__{}", date.format("%Y-%m-%d"), hex::encode(random)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A build identifier as typed by the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildRef {
    /// Full `<date>__<hex>` key
    Full(BuildId),
    /// Just the hex part; the date has to be looked up
    Hex(String),
}

impl BuildRef {
    pub fn parse(value: &str) -> Result<Self, GtfError> {
        let pattern = Regex::new(r"^(\d{4}-\d{2}-\d{2}__)?[0-9a-f]{4,64}$")
            .map_err(|e| GtfError::Usage(e.to_string()))?;
        validate_pattern("build id", value, &pattern, BUILD_ID_FORMAT)?;

        if value.contains("__") {
            Ok(BuildRef::Full(BuildId(value.to_string())))
        } else {
            Ok(BuildRef::Hex(value.to_string()))
        }
    }

    /// Whether a listed key (e.g. `gs://b/local/2026-01-02__ab12/`) belongs to this reference
    pub fn matches_key(&self, key: &str) -> bool {
        let key = key.trim_end_matches('/');
        let name = key.rsplit('/').next().unwrap_or(key);
        match self {
            BuildRef::Full(id) => name == id.as_str(),
            BuildRef::Hex(hex) => name
                .split_once("__")
                .is_some_and(|(_, suffix)| suffix == hex),
        }
    }

    /// The single listed key this reference points at
    pub fn find_in(&self, keys: &[String]) -> Result<BuildId, GtfError> {
        let matches: Vec<&str> = keys
            .iter()
            .filter(|key| self.matches_key(key))
            .map(|key| {
                let key = key.trim_end_matches('/');
                key.rsplit('/').next().unwrap_or(key)
            })
            .collect();

        match matches.as_slice() {
            [] => Err(GtfError::PlanNotFound(self.to_string())),
            [name] => Ok(BuildId(name.to_string())),
            _ => Err(GtfError::Usage(format!(
                "build id '{}' is ambiguous: {}",
                self,
                matches.join(", ")
            ))),
        }
    }
}

impl fmt::Display for BuildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildRef::Full(id) => write!(f, "{}", id),
            BuildRef::Hex(hex) => f.write_str(hex),
        }
    }
}

/// Gzip-compressed tar holding the given named files
pub fn pack(entries: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        builder
            .append_data(&mut header, name, *contents)
            .with_context(|| format!("Failed to add {} to archive", name))?;
    }

    let encoder = builder.into_inner().context("Failed to finish archive")?;
    encoder.finish().context("Failed to compress archive")
}

/// Files contained in an archive produced by `pack`
pub fn unpack(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut files = Vec::new();

    for entry in archive.entries().context("Failed to read archive")? {
        let mut entry = entry.context("Failed to read archive entry")?;
        let path = entry.path()?.into_owned();

        if !path.components().all(|c| matches!(c, Component::Normal(_))) {
            anyhow::bail!("Refusing to extract unsafe archive path {}", path.display());
        }

        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        files.push((path.to_string_lossy().into_owned(), contents));
    }

    Ok(files)
}
